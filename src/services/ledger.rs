// src/services/ledger.rs

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::{
        DEFAULT_ALL_SCORES_LIMIT, DEFAULT_LEADERBOARD_LIMIT, DEFAULT_LEVEL_SCORES_LIMIT,
        LOCAL_SCORE_CAP, MAX_SCORES_LIMIT, SCORES_KEY,
    },
    engine::levels::calculate_stars,
    error::AppError,
    models::{
        score::{LocalScoreEntry, NewScore, NewScoreRow, SaveScoreOutcome, ScoreQuery, ScoreRecord},
        user::Identity,
    },
    store::{
        local::{LocalStore, LocalStoreExt},
        remote::RemoteStore,
    },
};

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_SCORES_LIMIT)
}

fn by_score_then_percentage(a: &LocalScoreEntry, b: &LocalScoreEntry) -> Ordering {
    b.score.cmp(&a.score).then_with(|| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
    })
}

/// Adds `entry` to the local leaderboard, keeping it sorted and at most `cap`
/// long. An entry for a session already present replaces nothing.
pub fn insert_capped(entries: &mut Vec<LocalScoreEntry>, entry: LocalScoreEntry, cap: usize) {
    let duplicate = entry.session_id.is_some()
        && entries.iter().any(|e| e.session_id == entry.session_id);
    if !duplicate {
        entries.push(entry);
    }
    entries.sort_by(by_score_then_percentage);
    entries.truncate(cap);
}

/// Keeps the highest-scoring record per level, ordered by level.
pub fn best_per_level(scores: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    let mut best: BTreeMap<i32, ScoreRecord> = BTreeMap::new();

    for record in scores {
        match best.get(&record.level_id) {
            Some(current) if current.score >= record.score => {}
            _ => {
                best.insert(record.level_id, record);
            }
        }
    }

    best.into_values().collect()
}

/// Append-only record of finished games, with a capped local copy that
/// serves as the offline leaderboard.
#[derive(Clone)]
pub struct ScoreLedger {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl ScoreLedger {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Records a finished game.
    ///
    /// The local copy is written first and its failure is returned as an
    /// error. The remote insert is attributed to `identity` when present and
    /// its failure is reported in the outcome instead.
    pub async fn save_score(
        &self,
        score: &NewScore,
        identity: Option<&Identity>,
    ) -> Result<SaveScoreOutcome, AppError> {
        let now = Utc::now();
        let stars = calculate_stars(score.percentage);

        self.append_local(LocalScoreEntry {
            session_id: Some(score.session_id.clone()),
            name: score.player_name.clone(),
            score: score.score,
            total_questions: score.total_questions,
            correct_answers: score.correct_answers,
            percentage: score.percentage,
            difficulty: score.difficulty.clone(),
            level_id: score.level_id,
            date: now,
        })?;

        let row = NewScoreRow {
            session_id: score.session_id.clone(),
            user_id: identity.map(|i| i.id.clone()),
            player_name: score.player_name.clone(),
            level_id: i32::try_from(score.level_id).unwrap_or(i32::MAX),
            score: score.score,
            percentage: score.percentage,
            correct_answers: i32::try_from(score.correct_answers).unwrap_or(i32::MAX),
            total_questions: i32::try_from(score.total_questions).unwrap_or(i32::MAX),
            difficulty: score.difficulty.clone(),
            stars: i16::from(stars),
            created_at: now,
        };

        match self.remote.insert_score(&row).await {
            Ok(record) => {
                tracing::info!(
                    "Score {} saved for session {} (level {})",
                    record.score,
                    record.session_id,
                    record.level_id
                );
                Ok(SaveScoreOutcome {
                    success: true,
                    data: Some(record),
                    error: None,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "Score for session {} kept locally only: {}",
                    score.session_id,
                    e
                );
                Ok(SaveScoreOutcome {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    fn append_local(&self, entry: LocalScoreEntry) -> Result<(), AppError> {
        let mut entries = self.local_scores()?;
        insert_capped(&mut entries, entry, LOCAL_SCORE_CAP);
        self.local.save(SCORES_KEY, &entries)
    }

    /// The local fallback leaderboard, best first.
    pub fn local_scores(&self) -> Result<Vec<LocalScoreEntry>, AppError> {
        Ok(self
            .local
            .load::<Vec<LocalScoreEntry>>(SCORES_KEY)?
            .unwrap_or_default())
    }

    pub async fn all_scores(&self, limit: Option<i64>) -> Result<Vec<ScoreRecord>, AppError> {
        let query = ScoreQuery::ranked().limit(clamp_limit(limit, DEFAULT_ALL_SCORES_LIMIT));
        self.remote.select_scores(&query).await
    }

    pub async fn recent_scores(&self, limit: Option<i64>) -> Result<Vec<ScoreRecord>, AppError> {
        let query = ScoreQuery::recent().limit(clamp_limit(limit, DEFAULT_ALL_SCORES_LIMIT));
        self.remote.select_scores(&query).await
    }

    pub async fn level_scores(
        &self,
        level_id: u32,
        limit: Option<i64>,
    ) -> Result<Vec<ScoreRecord>, AppError> {
        let level_id = i32::try_from(level_id)
            .map_err(|_| AppError::BadRequest(format!("invalid level id {}", level_id)))?;
        let query = ScoreQuery::ranked()
            .level(level_id)
            .limit(clamp_limit(limit, DEFAULT_LEVEL_SCORES_LIMIT));
        self.remote.select_scores(&query).await
    }

    /// The player's best record on each level they have played.
    pub async fn user_best_scores(&self, user_id: &str) -> Result<Vec<ScoreRecord>, AppError> {
        let scores = self
            .remote
            .select_scores(&ScoreQuery::ranked().user(user_id))
            .await?;
        Ok(best_per_level(scores))
    }

    pub async fn global_leaderboard(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<ScoreRecord>, AppError> {
        let query = ScoreQuery::ranked().limit(clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT));
        self.remote.select_scores(&query).await
    }

    /// Local leaderboard truncated to `limit`, used when the remote store is down.
    pub fn local_leaderboard(&self, limit: Option<i64>) -> Result<Vec<LocalScoreEntry>, AppError> {
        let mut entries = self.local_scores()?;
        let limit = clamp_limit(limit, DEFAULT_LEADERBOARD_LIMIT);
        entries.truncate(usize::try_from(limit).unwrap_or(LOCAL_SCORE_CAP));
        Ok(entries)
    }

    pub async fn delete_user_scores(&self, user_id: &str) -> Result<u64, AppError> {
        let deleted = self.remote.delete_scores(user_id).await?;
        tracing::info!("Deleted {} scores for {}", deleted, user_id);
        Ok(deleted)
    }
}
