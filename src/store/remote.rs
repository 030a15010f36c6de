// src/store/remote.rs

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        level::ProgressRow,
        score::{NewScoreRow, ScoreQuery, ScoreRecord},
        user::{NewProfile, Profile, UserStats},
    },
};

/// The remote store as the game sees it: per-user per-level progress rows,
/// append-only score rows, and player profiles.
///
/// Every failure surfaces as an `AppError`; callers decide whether to degrade.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select_progress(&self, user_id: &str) -> Result<Vec<ProgressRow>, AppError>;

    async fn count_progress(&self, user_id: &str) -> Result<i64, AppError>;

    async fn insert_progress(&self, row: &ProgressRow) -> Result<(), AppError>;

    /// Inserts or overwrites the row keyed by `(user_id, level_id)`.
    async fn upsert_progress(&self, row: &ProgressRow) -> Result<(), AppError>;

    async fn delete_progress(&self, user_id: &str) -> Result<u64, AppError>;

    /// Appends a score. A second insert for the same `session_id` returns the
    /// existing row instead of creating another.
    async fn insert_score(&self, row: &NewScoreRow) -> Result<ScoreRecord, AppError>;

    async fn select_scores(&self, query: &ScoreQuery) -> Result<Vec<ScoreRecord>, AppError>;

    async fn delete_scores(&self, user_id: &str) -> Result<u64, AppError>;

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError>;

    /// Applies `UserStats::record_game` to the stored profile.
    /// Returns `None` when the profile does not exist.
    async fn record_game(&self, user_id: &str, score: i64)
    -> Result<Option<UserStats>, AppError>;
}
