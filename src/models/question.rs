// src/models/question.rs

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// A multiple-choice question from the bank. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_answer_index))]
pub struct Question {
    #[validate(length(min = 1, max = 100))]
    pub category: String,

    /// The text content of the question.
    #[validate(length(min = 1, max = 1000))]
    pub question: String,

    /// Exactly four options, in display order.
    #[validate(length(equal = 4), custom(function = validate_options))]
    pub options: Vec<String>,

    /// Index into `options`.
    pub correct_answer: usize,
}

impl Question {
    pub fn is_correct(&self, selected_index: usize) -> bool {
        selected_index == self.correct_answer
    }
}

/// DTO for sending a question to the client (excludes the answer).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub index: usize,
    pub category: String,
    pub question: String,
    pub options: Vec<String>,
}

impl PublicQuestion {
    pub fn from_question(index: usize, question: &Question) -> Self {
        Self {
            index,
            category: question.category.clone(),
            question: question.question.clone(),
            options: question.options.clone(),
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_answer_index(question: &Question) -> Result<(), validator::ValidationError> {
    if question.correct_answer >= question.options.len() {
        return Err(validator::ValidationError::new("correct_answer_out_of_range"));
    }
    Ok(())
}

/// Parses a question bank from its JSON array form and validates every entry.
pub fn parse_question_bank(raw: &str) -> Result<Vec<Question>, AppError> {
    let questions: Vec<Question> = serde_json::from_str(raw)?;

    for (index, question) in questions.iter().enumerate() {
        question
            .validate()
            .map_err(|e| AppError::BadRequest(format!("question #{}: {}", index, e)))?;
    }

    Ok(questions)
}

/// Loads the question bank from disk. Called once at startup.
pub fn load_question_bank(path: &Path) -> Result<Vec<Question>, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Storage(format!("failed to read {}: {}", path.display(), e)))?;

    let questions = parse_question_bank(&raw)?;
    tracing::info!("Loaded {} questions from {}", questions.len(), path.display());

    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_bank() {
        let raw = r#"[
            {"category": "Geography", "question": "Capital of Kenya?",
             "options": ["Nairobi", "Mombasa", "Kisumu", "Nakuru"], "correctAnswer": 0}
        ]"#;

        let bank = parse_question_bank(raw).unwrap();
        assert_eq!(bank.len(), 1);
        assert!(bank[0].is_correct(0));
        assert!(!bank[0].is_correct(2));
    }

    #[test]
    fn test_parse_rejects_out_of_range_answer() {
        let raw = r#"[
            {"category": "Geography", "question": "Capital of Kenya?",
             "options": ["Nairobi", "Mombasa", "Kisumu", "Nakuru"], "correctAnswer": 4}
        ]"#;

        assert!(matches!(parse_question_bank(raw), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_parse_rejects_wrong_option_count() {
        let raw = r#"[
            {"category": "History", "question": "Year of independence?",
             "options": ["1963", "1964"], "correctAnswer": 0}
        ]"#;

        assert!(parse_question_bank(raw).is_err());
    }
}
