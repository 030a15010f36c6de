// src/models/game.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::scoring::{AccuracyReport, GameStats, ScoreBreakdown, StreakState},
    models::{
        level::{Level, LevelProgress},
        question::PublicQuestion,
        score::SaveScoreOutcome,
    },
};

/// DTO for starting a level.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    #[validate(range(min = 1))]
    pub level_id: u32,
    #[validate(length(min = 1, max = 20))]
    pub difficulty: String,
    #[validate(length(min = 1, max = 50, message = "Player name must be between 1 and 50 characters."))]
    pub player_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    pub session_id: Uuid,
    pub level: Level,
    pub difficulty: String,
    pub time_limit: Option<u32>,
    pub questions: Vec<PublicQuestion>,
    pub current_question: Option<PublicQuestion>,
}

/// DTO for answering the current question.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub selected_index: usize,
    /// Seconds left on the client's timer. Ignored for untimed games.
    #[serde(default)]
    pub time_remaining: u32,
}

/// Result of one answer (or timeout), for the answer-result display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub question_index: usize,
    pub is_correct: bool,
    pub timed_out: bool,
    pub correct_index: usize,
    pub points_awarded: i64,
    pub breakdown: ScoreBreakdown,
    pub streak: StreakState,
    pub score: i64,
    pub is_last_question: bool,
}

/// Everything the ledger and progress store need from a finished game.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGame {
    pub session_id: String,
    pub level_id: u32,
    pub difficulty: String,
    pub player_name: String,
    pub correct_count: u32,
    pub total_questions: u32,
    pub final_score: i64,
    pub longest_streak: u32,
}

/// Outcome of `complete_game`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub session_id: String,
    pub level_id: u32,
    pub passed: bool,
    /// Level-completion stars earned by this attempt.
    pub stars: u8,
    pub accuracy: AccuracyReport,
    pub stats: GameStats,
    pub updated_progress: LevelProgress,
    pub next_level_unlocked: bool,
    pub remote_synced: bool,
    pub ledger: SaveScoreOutcome,
}
