// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        level::ProgressRow,
        score::{NewScoreRow, ScoreOrder, ScoreQuery, ScoreRecord},
        user::{NewProfile, Profile, UserStats},
    },
    store::remote::RemoteStore,
};

const SCORE_COLUMNS: &str = "id, session_id, user_id, player_name, level_id, score, percentage, \
     correct_answers, total_questions, difficulty, stars, created_at";

/// Remote store backed by Postgres. Schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn select_progress(&self, user_id: &str) -> Result<Vec<ProgressRow>, AppError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT user_id, level_id, unlocked, completed, attempts,
                   best_score, best_accuracy, stars, last_played_at
            FROM user_level_progress
            WHERE user_id = $1
            ORDER BY level_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load progress for {}: {:?}", user_id, e);
            AppError::from(e)
        })?;

        Ok(rows)
    }

    async fn count_progress(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_level_progress WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn insert_progress(&self, row: &ProgressRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_level_progress
                (user_id, level_id, unlocked, completed, attempts,
                 best_score, best_accuracy, stars, last_played_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&row.user_id)
        .bind(row.level_id)
        .bind(row.unlocked)
        .bind(row.completed)
        .bind(row.attempts)
        .bind(row.best_score)
        .bind(row.best_accuracy)
        .bind(row.stars)
        .bind(row.last_played_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("progress for level {} already exists", row.level_id))
            } else {
                tracing::error!("Failed to insert progress: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(())
    }

    async fn upsert_progress(&self, row: &ProgressRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_level_progress
                (user_id, level_id, unlocked, completed, attempts,
                 best_score, best_accuracy, stars, last_played_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, level_id) DO UPDATE SET
                unlocked = EXCLUDED.unlocked,
                completed = EXCLUDED.completed,
                attempts = EXCLUDED.attempts,
                best_score = EXCLUDED.best_score,
                best_accuracy = EXCLUDED.best_accuracy,
                stars = EXCLUDED.stars,
                last_played_at = EXCLUDED.last_played_at,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&row.user_id)
        .bind(row.level_id)
        .bind(row.unlocked)
        .bind(row.completed)
        .bind(row.attempts)
        .bind(row.best_score)
        .bind(row.best_accuracy)
        .bind(row.stars)
        .bind(row.last_played_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert progress for level {}: {:?}", row.level_id, e);
            AppError::from(e)
        })?;

        Ok(())
    }

    async fn delete_progress(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM user_level_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_score(&self, row: &NewScoreRow) -> Result<ScoreRecord, AppError> {
        let inserted = sqlx::query_as::<_, ScoreRecord>(&format!(
            r#"
            INSERT INTO game_scores
                (session_id, user_id, player_name, level_id, score, percentage,
                 correct_answers, total_questions, difficulty, stars, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (session_id) DO NOTHING
            RETURNING {}
            "#,
            SCORE_COLUMNS
        ))
        .bind(&row.session_id)
        .bind(&row.user_id)
        .bind(&row.player_name)
        .bind(row.level_id)
        .bind(row.score)
        .bind(row.percentage)
        .bind(row.correct_answers)
        .bind(row.total_questions)
        .bind(&row.difficulty)
        .bind(row.stars)
        .bind(row.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert score: {:?}", e);
            AppError::from(e)
        })?;

        if let Some(record) = inserted {
            return Ok(record);
        }

        // Same session delivered twice: hand back the original row.
        let existing = sqlx::query_as::<_, ScoreRecord>(&format!(
            "SELECT {} FROM game_scores WHERE session_id = $1",
            SCORE_COLUMNS
        ))
        .bind(&row.session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing)
    }

    async fn select_scores(&self, query: &ScoreQuery) -> Result<Vec<ScoreRecord>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM game_scores WHERE TRUE",
            SCORE_COLUMNS
        ));

        if let Some(level_id) = query.level_id {
            builder.push(" AND level_id = ").push_bind(level_id);
        }
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }

        builder.push(match query.order {
            ScoreOrder::Ranked => " ORDER BY score DESC, percentage DESC, id ASC",
            ScoreOrder::Recent => " ORDER BY created_at DESC, id DESC",
        });

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder
            .build_query_as::<ScoreRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch scores: {:?}", e);
                AppError::from(e)
            })?;

        Ok(rows)
    }

    async fn delete_scores(&self, user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM game_scores WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError> {
        let created = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, games_played, total_score,
                      highest_score, created_at, updated_at
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Email '{}' is already registered", profile.email))
            } else {
                tracing::error!("Failed to create profile: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(created)
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, name, email, password_hash, games_played, total_score,
                   highest_score, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, name, email, password_hash, games_played, total_score,
                   highest_score, created_at, updated_at
            FROM profiles
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn record_game(
        &self,
        user_id: &str,
        score: i64,
    ) -> Result<Option<UserStats>, AppError> {
        // Single statement so concurrent games cannot lose an increment.
        let stats = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            UPDATE profiles SET
                games_played = games_played + 1,
                total_score = total_score + $2,
                highest_score = GREATEST(highest_score, $2),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING games_played, total_score, highest_score
            "#,
        )
        .bind(user_id)
        .bind(score)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update stats for {}: {:?}", user_id, e);
            AppError::from(e)
        })?;

        Ok(stats.map(|(games_played, total_score, highest_score)| UserStats {
            games_played,
            total_score,
            highest_score,
        }))
    }
}
