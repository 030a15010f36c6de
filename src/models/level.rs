// src/models/level.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A contiguous slice of the question bank. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub start_index: usize,
    pub end_index: usize,
    pub question_count: usize,
}

/// Per-level progress as held in the local cache.
///
/// `best_score`, `best_accuracy` and `stars` only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub is_unlocked: bool,
    pub completed: bool,
    pub attempts: u32,
    pub best_score: i64,
    pub best_accuracy: f64,
    pub stars: u8,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl LevelProgress {
    /// Fresh record; only level 1 starts unlocked.
    pub fn initial(level_id: u32) -> Self {
        Self {
            is_unlocked: level_id == 1,
            completed: false,
            attempts: 0,
            best_score: 0,
            best_accuracy: 0.0,
            stars: 0,
            last_played_at: None,
        }
    }

    pub fn locked() -> Self {
        Self::initial(0)
    }
}

/// Level id -> progress. Ordered so menus and pushes iterate by level.
pub type ProgressMap = BTreeMap<u32, LevelProgress>;

/// Represents the 'user_level_progress' table in the remote store.
/// Keyed by `(user_id, level_id)`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ProgressRow {
    pub user_id: String,
    pub level_id: i32,
    pub unlocked: bool,
    pub completed: bool,
    pub attempts: i32,
    pub best_score: i64,
    pub best_accuracy: f64,
    pub stars: i16,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl ProgressRow {
    pub fn from_progress(user_id: &str, level_id: u32, progress: &LevelProgress) -> Self {
        Self {
            user_id: user_id.to_string(),
            level_id: i32::try_from(level_id).unwrap_or(i32::MAX),
            unlocked: progress.is_unlocked,
            completed: progress.completed,
            attempts: i32::try_from(progress.attempts).unwrap_or(i32::MAX),
            best_score: progress.best_score,
            best_accuracy: progress.best_accuracy,
            stars: i16::from(progress.stars),
            last_played_at: progress.last_played_at,
        }
    }

    pub fn level_id(&self) -> Option<u32> {
        u32::try_from(self.level_id).ok().filter(|id| *id > 0)
    }
}

impl From<&ProgressRow> for LevelProgress {
    fn from(row: &ProgressRow) -> Self {
        Self {
            is_unlocked: row.unlocked,
            completed: row.completed,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            best_score: row.best_score.max(0),
            best_accuracy: row.best_accuracy.clamp(0.0, 100.0),
            stars: u8::try_from(row.stars.clamp(0, 5)).unwrap_or(0),
            last_played_at: row.last_played_at,
        }
    }
}

/// One row of the level-select screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelMenuEntry {
    pub level: Level,
    pub progress: LevelProgress,
    pub is_locked: bool,
}

/// Aggregate over every level in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalStats {
    pub total_stars: u32,
    pub levels_with_stars: u32,
    pub completed_levels: u32,
    pub total_levels: u32,
    pub levels_unlocked: u32,
    pub total_attempts: u32,
    pub completion_percentage: u32,
}
