// src/models/score.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'game_scores' table in the remote store.
/// Append-only: one row per completed game session.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub id: i64,

    /// Idempotency key. The ledger holds at most one row per game session.
    pub session_id: String,

    /// `None` for guest players.
    pub user_id: Option<String>,
    pub player_name: String,
    pub level_id: i32,
    pub score: i64,
    pub percentage: f64,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub difficulty: String,
    pub stars: i16,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry before the remote store has assigned an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScoreRow {
    pub session_id: String,
    pub user_id: Option<String>,
    pub player_name: String,
    pub level_id: i32,
    pub score: i64,
    pub percentage: f64,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub difficulty: String,
    pub stars: i16,
    pub created_at: DateTime<Utc>,
}

/// What a finished game hands to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScore {
    pub session_id: String,
    pub player_name: String,
    pub level_id: u32,
    pub score: i64,
    pub percentage: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub difficulty: String,
}

/// Entry in the local fallback leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalScoreEntry {
    #[serde(default)]
    pub session_id: Option<String>,
    pub name: String,
    pub score: i64,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub percentage: f64,
    pub difficulty: String,
    pub level_id: u32,
    pub date: DateTime<Utc>,
}

/// Server-side ordering of ledger reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// score desc, then percentage desc
    Ranked,
    /// created_at desc
    Recent,
}

/// Filter for ledger reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreQuery {
    pub level_id: Option<i32>,
    pub user_id: Option<String>,
    pub order: ScoreOrder,
    pub limit: Option<i64>,
}

impl ScoreQuery {
    pub fn ranked() -> Self {
        Self {
            level_id: None,
            user_id: None,
            order: ScoreOrder::Ranked,
            limit: None,
        }
    }

    pub fn recent() -> Self {
        Self {
            order: ScoreOrder::Recent,
            ..Self::ranked()
        }
    }

    pub fn level(mut self, level_id: i32) -> Self {
        self.level_id = Some(level_id);
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of `save_score`. A remote failure is reported here, not raised.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveScoreOutcome {
    pub success: bool,
    pub data: Option<ScoreRecord>,
    pub error: Option<String>,
}

/// Query string for leaderboard endpoints.
#[derive(Debug, Deserialize)]
pub struct ScoreListParams {
    pub limit: Option<i64>,
}

/// Where a leaderboard response was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardSource {
    Remote,
    Local,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse<T> {
    pub source: LeaderboardSource,
    pub entries: Vec<T>,
}
