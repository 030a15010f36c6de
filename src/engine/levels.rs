// src/engine/levels.rs

use std::sync::Arc;

use crate::{
    config::{MIN_PASS_PERCENTAGE, QUESTIONS_PER_LEVEL},
    models::{level::Level, question::Question},
};

/// Partitions `total_questions` into consecutive levels of `QUESTIONS_PER_LEVEL`.
/// The last level holds the remainder.
pub fn generate_levels(total_questions: usize) -> Vec<Level> {
    let total_levels = total_questions.div_ceil(QUESTIONS_PER_LEVEL);

    (0..total_levels)
        .map(|index| {
            let start_index = index * QUESTIONS_PER_LEVEL;
            let end_index = ((index + 1) * QUESTIONS_PER_LEVEL).min(total_questions);
            let id = index as u32 + 1;

            Level {
                id,
                name: format!("Level {}", id),
                description: format!("Questions {}-{}", start_index + 1, end_index),
                start_index,
                end_index,
                question_count: end_index - start_index,
            }
        })
        .collect()
}

/// Level-completion stars (0..=5). Distinct from the post-game grade stars.
pub fn calculate_stars(accuracy: f64) -> u8 {
    if accuracy >= 95.0 {
        5
    } else if accuracy >= 85.0 {
        4
    } else if accuracy >= 75.0 {
        3
    } else if accuracy >= 65.0 {
        2
    } else if accuracy >= MIN_PASS_PERCENTAGE {
        1
    } else {
        0
    }
}

pub fn is_level_passed(accuracy: f64) -> bool {
    accuracy >= MIN_PASS_PERCENTAGE
}

/// The question bank and its level partition. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct LevelCatalog {
    questions: Arc<Vec<Question>>,
    levels: Arc<Vec<Level>>,
}

impl LevelCatalog {
    pub fn new(questions: Vec<Question>) -> Self {
        let levels = generate_levels(questions.len());
        Self {
            questions: Arc::new(questions),
            levels: Arc::new(levels),
        }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, level_id: u32) -> Option<&Level> {
        let index = usize::try_from(level_id).ok()?.checked_sub(1)?;
        self.levels.get(index)
    }

    pub fn total_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Questions of one level in bank order. Empty for an unknown id.
    pub fn level_questions(&self, level_id: u32) -> &[Question] {
        match self.level(level_id) {
            Some(level) => &self.questions[level.start_index..level.end_index],
            None => &[],
        }
    }
}
