// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

use crate::error::AppError;

/// Number of questions in every level except possibly the last.
pub const QUESTIONS_PER_LEVEL: usize = 20;

/// Minimum accuracy (percent) to pass a level and unlock the next one.
pub const MIN_PASS_PERCENTAGE: f64 = 60.0;

/// How many entries the local fallback leaderboard keeps.
pub const LOCAL_SCORE_CAP: usize = 50;

pub const DEFAULT_ALL_SCORES_LIMIT: i64 = 50;
pub const DEFAULT_LEVEL_SCORES_LIMIT: i64 = 10;
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 20;
pub const MAX_SCORES_LIMIT: i64 = 100;

/// Completed games whose result is kept for replaying a repeated completion.
pub const FINISHED_GAMES_KEPT: usize = 256;
/// A game left untouched this long is dropped when the next one starts.
pub const GAME_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Local persistence keys. Stable across releases.
pub const PROGRESS_KEY: &str = "trivia_level_progress";
pub const SCORES_KEY: &str = "trivia_high_scores";
pub const SESSION_KEY: &str = "trivia_current_user";

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` runs against the in-process store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub questions_path: PathBuf,
    pub local_data_dir: PathBuf,
    /// Points deducted for a wrong answer. Zero unless explicitly configured.
    pub wrong_penalty: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::InternalServerError("JWT_SECRET must be set".to_string()))?;

        let jwt_expiration = parse_var("JWT_EXPIRATION", 86_400)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let questions_path = env::var("QUESTIONS_PATH")
            .unwrap_or_else(|_| "data/questions.json".to_string())
            .into();

        let local_data_dir = env::var("LOCAL_DATA_DIR")
            .unwrap_or_else(|_| "data/local".to_string())
            .into();

        let wrong_penalty = parse_var("WRONG_PENALTY", 0)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            questions_path,
            local_data_dir,
            wrong_penalty,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{} is not a valid number", name))),
        Err(_) => Ok(default),
    }
}
