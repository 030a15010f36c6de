// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Who is playing. Absent means guest mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Profile aggregate updated after every completed game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub games_played: i64,
    pub total_score: i64,
    pub highest_score: i64,
}

impl UserStats {
    pub fn record_game(&mut self, score: i64) {
        self.games_played += 1;
        self.total_score += score;
        self.highest_score = self.highest_score.max(score);
    }
}

/// Represents the 'profiles' table in the remote store.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,

    /// Stored lowercased.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    pub games_played: i64,
    pub total_score: i64,
    pub highest_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            games_played: self.games_played,
            total_score: self.total_score,
            highest_score: self.highest_score,
        }
    }
}

/// A profile row before insertion.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// DTO for creating a new account (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Name must be between 1 and 50 characters."
    ))]
    pub name: String,
    #[validate(email(message = "Email address is malformed."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email address is malformed."))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Profile data for the current user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub identity: Option<Identity>,
    pub stats: Option<UserStats>,
}
