// src/engine/mod.rs

pub mod countdown;
pub mod levels;
pub mod scoring;
pub mod session;

#[cfg(test)]
pub(crate) fn sample_bank(count: usize) -> Vec<crate::models::question::Question> {
    (0..count)
        .map(|i| crate::models::question::Question {
            category: "General".to_string(),
            question: format!("Question {}", i),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: i % 4,
        })
        .collect()
}
