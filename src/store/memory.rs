// src/store/memory.rs

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        level::ProgressRow,
        score::{NewScoreRow, ScoreOrder, ScoreQuery, ScoreRecord},
        user::{NewProfile, Profile, UserStats},
    },
    store::remote::RemoteStore,
};

#[derive(Debug, Default)]
struct Tables {
    progress: BTreeMap<(String, i32), ProgressRow>,
    scores: Vec<ScoreRecord>,
    next_score_id: i64,
    profiles: HashMap<String, Profile>,
}

/// In-process remote store. Used when no database is configured and in tests,
/// where outages and per-level write failures can be simulated.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    failing_levels: Mutex<HashSet<i32>>,
    progress_writes: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes progress writes for one level fail.
    pub fn fail_level_writes(&self, level_id: i32) {
        if let Ok(mut levels) = self.failing_levels.lock() {
            levels.insert(level_id);
        }
    }

    /// Number of successful progress inserts and upserts so far.
    pub fn progress_writes(&self) -> usize {
        self.progress_writes.load(Ordering::SeqCst)
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        self.tables
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }

    fn check_level_write(&self, level_id: i32) -> Result<(), AppError> {
        let failing = self
            .failing_levels
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))?;
        if failing.contains(&level_id) {
            return Err(AppError::RemoteUnavailable(format!(
                "write rejected for level {}",
                level_id
            )));
        }
        Ok(())
    }
}

fn ranked(a: &ScoreRecord, b: &ScoreRecord) -> CmpOrdering {
    b.score
        .cmp(&a.score)
        .then_with(|| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(CmpOrdering::Equal)
        })
        .then_with(|| a.id.cmp(&b.id))
}

fn recent(a: &ScoreRecord, b: &ScoreRecord) -> CmpOrdering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn select_progress(&self, user_id: &str) -> Result<Vec<ProgressRow>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .progress
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_progress(&self, user_id: &str) -> Result<i64, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .progress
            .values()
            .filter(|row| row.user_id == user_id)
            .count() as i64)
    }

    async fn insert_progress(&self, row: &ProgressRow) -> Result<(), AppError> {
        self.check_level_write(row.level_id)?;
        let mut tables = self.tables()?;

        let key = (row.user_id.clone(), row.level_id);
        if tables.progress.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "progress for level {} already exists",
                row.level_id
            )));
        }
        tables.progress.insert(key, row.clone());
        self.progress_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_progress(&self, row: &ProgressRow) -> Result<(), AppError> {
        self.check_level_write(row.level_id)?;
        let mut tables = self.tables()?;

        tables
            .progress
            .insert((row.user_id.clone(), row.level_id), row.clone());
        self.progress_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_progress(&self, user_id: &str) -> Result<u64, AppError> {
        let mut tables = self.tables()?;
        let before = tables.progress.len();
        tables.progress.retain(|(owner, _), _| owner != user_id);
        Ok((before - tables.progress.len()) as u64)
    }

    async fn insert_score(&self, row: &NewScoreRow) -> Result<ScoreRecord, AppError> {
        let mut tables = self.tables()?;

        if let Some(existing) = tables
            .scores
            .iter()
            .find(|score| score.session_id == row.session_id)
        {
            return Ok(existing.clone());
        }

        tables.next_score_id += 1;
        let record = ScoreRecord {
            id: tables.next_score_id,
            session_id: row.session_id.clone(),
            user_id: row.user_id.clone(),
            player_name: row.player_name.clone(),
            level_id: row.level_id,
            score: row.score,
            percentage: row.percentage,
            correct_answers: row.correct_answers,
            total_questions: row.total_questions,
            difficulty: row.difficulty.clone(),
            stars: row.stars,
            created_at: row.created_at,
        };
        tables.scores.push(record.clone());
        Ok(record)
    }

    async fn select_scores(&self, query: &ScoreQuery) -> Result<Vec<ScoreRecord>, AppError> {
        let tables = self.tables()?;

        let mut rows: Vec<ScoreRecord> = tables
            .scores
            .iter()
            .filter(|s| query.level_id.is_none_or(|level| s.level_id == level))
            .filter(|s| {
                query
                    .user_id
                    .as_deref()
                    .is_none_or(|user| s.user_id.as_deref() == Some(user))
            })
            .cloned()
            .collect();

        match query.order {
            ScoreOrder::Ranked => rows.sort_by(ranked),
            ScoreOrder::Recent => rows.sort_by(recent),
        }
        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(rows)
    }

    async fn delete_scores(&self, user_id: &str) -> Result<u64, AppError> {
        let mut tables = self.tables()?;
        let before = tables.scores.len();
        tables
            .scores
            .retain(|score| score.user_id.as_deref() != Some(user_id));
        Ok((before - tables.scores.len()) as u64)
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError> {
        let mut tables = self.tables()?;

        if tables.profiles.values().any(|p| p.email == profile.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                profile.email
            )));
        }

        let now = Utc::now();
        let created = Profile {
            id: profile.id.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            password_hash: profile.password_hash.clone(),
            games_played: 0,
            total_score: 0,
            highest_score: 0,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let tables = self.tables()?;
        Ok(tables.profiles.get(user_id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .profiles
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn record_game(
        &self,
        user_id: &str,
        score: i64,
    ) -> Result<Option<UserStats>, AppError> {
        let mut tables = self.tables()?;

        let Some(profile) = tables.profiles.get_mut(user_id) else {
            return Ok(None);
        };

        let mut stats = profile.stats();
        stats.record_game(score);
        profile.games_played = stats.games_played;
        profile.total_score = stats.total_score;
        profile.highest_score = stats.highest_score;
        profile.updated_at = Utc::now();

        Ok(Some(stats))
    }
}
