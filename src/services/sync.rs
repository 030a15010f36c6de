// src/services/sync.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::{
    error::AppError,
    models::level::{LevelProgress, ProgressMap, ProgressRow},
    services::progress::ProgressStore,
    store::remote::RemoteStore,
};

/// What a full sync ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Remote was empty or unreachable; local progress was pushed up.
    Uploaded,
    /// Both sides were empty; remote got a fresh level-1 record.
    InitializedRemote,
    /// Both sides were merged and the result written to both.
    Merged,
    /// Both sides were empty and nothing was written.
    Skipped,
}

/// Per-level outcome of a bulk push.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub pushed: Vec<u32>,
    pub failed: Vec<u32>,
}

impl PushReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub action: SyncAction,
    pub progress: ProgressMap,
    pub push: PushReport,
    /// Set when reading the remote store failed.
    pub remote_error: Option<String>,
}

/// Writes one level's progress to the remote store.
pub async fn push_level(
    remote: &dyn RemoteStore,
    user_id: &str,
    level_id: u32,
    progress: &LevelProgress,
) -> Result<(), AppError> {
    let row = ProgressRow::from_progress(user_id, level_id, progress);
    remote.upsert_progress(&row).await
}

fn most_recent(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn merge_level(local: &LevelProgress, remote: &LevelProgress) -> LevelProgress {
    LevelProgress {
        is_unlocked: local.is_unlocked || remote.is_unlocked,
        completed: local.completed || remote.completed,
        attempts: local.attempts.max(remote.attempts),
        best_score: local.best_score.max(remote.best_score),
        best_accuracy: local.best_accuracy.max(remote.best_accuracy),
        stars: local.stars.max(remote.stars),
        last_played_at: most_recent(local.last_played_at, remote.last_played_at),
    }
}

/// Combines local progress with remote rows, field by field in favor of
/// the more advanced value. Levels only one side knows are kept as-is.
/// Rows with a non-positive level id are ignored.
pub fn merge_progress(local: &ProgressMap, remote: &[ProgressRow]) -> ProgressMap {
    let mut merged = local.clone();

    for row in remote {
        let Some(level_id) = row.level_id() else {
            tracing::warn!("Ignoring remote progress row with level id {}", row.level_id);
            continue;
        };
        let remote_level = LevelProgress::from(row);

        merged
            .entry(level_id)
            .and_modify(|current| *current = merge_level(current, &remote_level))
            .or_insert(remote_level);
    }

    merged
}

/// Reconciles the local cache with the remote store for a signed-in player.
#[derive(Clone)]
pub struct ProgressSync {
    progress: ProgressStore,
    remote: Arc<dyn RemoteStore>,
}

impl ProgressSync {
    pub fn new(progress: ProgressStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self { progress, remote }
    }

    pub fn load_local(&self) -> Result<ProgressMap, AppError> {
        self.progress.load_local()
    }

    pub async fn load_remote(&self, user_id: &str) -> Result<Vec<ProgressRow>, AppError> {
        self.remote.select_progress(user_id).await
    }

    /// Pushes every level concurrently. One failing level does not stop the rest.
    pub async fn push_all(&self, user_id: &str, progress: &ProgressMap) -> PushReport {
        let mut tasks = JoinSet::new();

        for (&level_id, level) in progress {
            let remote = self.remote.clone();
            let user_id = user_id.to_string();
            let level = level.clone();
            tasks.spawn(async move {
                let result = push_level(remote.as_ref(), &user_id, level_id, &level).await;
                (level_id, result)
            });
        }

        let mut report = PushReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((level_id, Ok(()))) => report.pushed.push(level_id),
                Ok((level_id, Err(e))) => {
                    tracing::warn!("Failed to push progress for level {}: {}", level_id, e);
                    report.failed.push(level_id);
                }
                Err(e) => tracing::error!("Progress push task failed: {:?}", e),
            }
        }

        report.pushed.sort_unstable();
        report.failed.sort_unstable();
        report
    }

    /// Seeds the remote store with an unlocked level 1 when the player has no
    /// rows yet. Returns whether a row was written.
    pub async fn initialize_remote(&self, user_id: &str) -> Result<bool, AppError> {
        if self.remote.count_progress(user_id).await? > 0 {
            return Ok(false);
        }

        let row = ProgressRow::from_progress(user_id, 1, &LevelProgress::initial(1));
        match self.remote.insert_progress(&row).await {
            Ok(()) => Ok(true),
            // Lost a race with another initializer.
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Reconciles both sides after sign-in.
    ///
    /// Local is always authoritative for what gets returned. Only a local
    /// read or write failure is an error; remote trouble is logged and
    /// reported in the outcome.
    pub async fn perform_full_sync(&self, user_id: &str) -> Result<SyncOutcome, AppError> {
        let local = self.load_local()?;

        let (remote_rows, remote_error) = match self.load_remote(user_id).await {
            Ok(rows) => (rows, None),
            Err(e) => {
                tracing::warn!("Could not read remote progress for {}: {}", user_id, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        if remote_rows.is_empty() {
            if !local.is_empty() {
                let push = self.push_all(user_id, &local).await;
                tracing::info!(
                    "Uploaded {} levels for {} ({} failed)",
                    push.pushed.len(),
                    user_id,
                    push.failed.len()
                );
                return Ok(SyncOutcome {
                    action: SyncAction::Uploaded,
                    progress: local,
                    push,
                    remote_error,
                });
            }

            let initialized = match remote_error {
                Some(_) => false,
                None => self.initialize_remote(user_id).await.unwrap_or_else(|e| {
                    tracing::warn!("Could not initialize remote progress for {}: {}", user_id, e);
                    false
                }),
            };
            let action = if initialized {
                SyncAction::InitializedRemote
            } else {
                SyncAction::Skipped
            };
            return Ok(SyncOutcome {
                action,
                progress: local,
                push: PushReport::default(),
                remote_error,
            });
        }

        let mut merged = merge_progress(&local, &remote_rows);
        self.progress.normalize(&mut merged);
        self.progress.save_local(&merged)?;
        let push = self.push_all(user_id, &merged).await;

        tracing::info!(
            "Merged progress for {}: {} local, {} remote, {} total",
            user_id,
            local.len(),
            remote_rows.len(),
            merged.len()
        );

        Ok(SyncOutcome {
            action: SyncAction::Merged,
            progress: merged,
            push,
            remote_error,
        })
    }

    /// Deletes every remote progress row of a player.
    pub async fn delete_remote(&self, user_id: &str) -> Result<u64, AppError> {
        let deleted = self.remote.delete_progress(user_id).await?;
        tracing::info!("Deleted {} remote progress rows for {}", deleted, user_id);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        engine::{levels::LevelCatalog, sample_bank},
        store::{local::MemoryStore, memory::MemoryRemoteStore},
    };

    fn level(unlocked: bool, completed: bool, attempts: u32, score: i64, acc: f64, stars: u8) -> LevelProgress {
        LevelProgress {
            is_unlocked: unlocked,
            completed,
            attempts,
            best_score: score,
            best_accuracy: acc,
            stars,
            last_played_at: None,
        }
    }

    fn rows(user_id: &str, map: &ProgressMap) -> Vec<ProgressRow> {
        map.iter()
            .map(|(id, p)| ProgressRow::from_progress(user_id, *id, p))
            .collect()
    }

    fn setup(questions: usize) -> (ProgressSync, ProgressStore, Arc<MemoryRemoteStore>) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let store = ProgressStore::new(
            LevelCatalog::new(sample_bank(questions)),
            Arc::new(MemoryStore::new()),
            remote.clone(),
        );
        (ProgressSync::new(store.clone(), remote.clone()), store, remote)
    }

    #[test]
    fn test_merge_takes_most_advanced_fields() {
        let earlier = Utc::now() - Duration::hours(2);
        let later = Utc::now();

        let mut local = ProgressMap::new();
        local.insert(1, LevelProgress { last_played_at: Some(earlier), ..level(true, true, 3, 1200, 70.0, 2) });
        local.insert(2, level(true, false, 1, 300, 40.0, 0));

        let mut remote = ProgressMap::new();
        remote.insert(1, LevelProgress { last_played_at: Some(later), ..level(true, false, 5, 900, 90.0, 4) });
        remote.insert(3, level(true, true, 1, 1500, 80.0, 3));

        let merged = merge_progress(&local, &rows("u", &remote));

        let first = &merged[&1];
        assert!(first.completed);
        assert_eq!(first.attempts, 5);
        assert_eq!(first.best_score, 1200);
        assert_eq!(first.best_accuracy, 90.0);
        assert_eq!(first.stars, 4);
        assert_eq!(first.last_played_at, Some(later));

        assert_eq!(merged[&2], local[&2]);
        assert_eq!(merged[&3].best_score, 1500);
    }

    #[test]
    fn test_merge_is_idempotent_and_commutative() {
        let mut a = ProgressMap::new();
        a.insert(1, level(true, true, 2, 1000, 75.0, 3));
        a.insert(2, level(true, false, 4, 200, 30.0, 0));

        let mut b = ProgressMap::new();
        b.insert(1, level(true, false, 6, 700, 80.0, 3));
        b.insert(2, level(false, false, 1, 900, 55.0, 0));
        b.insert(4, level(false, false, 0, 0, 0.0, 0));

        let ab = merge_progress(&a, &rows("u", &b));
        let ba = merge_progress(&b, &rows("u", &a));
        assert_eq!(ab, ba);

        let twice = merge_progress(&ab, &rows("u", &b));
        assert_eq!(twice, ab);
        assert_eq!(merge_progress(&a, &rows("u", &a)), a);
    }

    #[test]
    fn test_missing_timestamp_loses() {
        let now = Utc::now();
        assert_eq!(most_recent(None, Some(now)), Some(now));
        assert_eq!(most_recent(Some(now), None), Some(now));
        assert_eq!(most_recent(None, None), None);
    }

    #[tokio::test]
    async fn test_sync_uploads_when_remote_empty() {
        let (sync, store, remote) = setup(60);
        store.update_level_progress(1, 1500, 85.0, 17, 20, None).await.unwrap();

        let outcome = sync.perform_full_sync("u1").await.unwrap();

        assert_eq!(outcome.action, SyncAction::Uploaded);
        assert_eq!(outcome.push.pushed, vec![1, 2, 3]);
        assert!(outcome.push.all_succeeded());
        assert_eq!(remote.select_progress("u1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_initializes_remote_when_both_empty() {
        let (sync, _, remote) = setup(40);

        let outcome = sync.perform_full_sync("u1").await.unwrap();
        assert_eq!(outcome.action, SyncAction::InitializedRemote);
        assert!(outcome.progress.is_empty());

        let rows = remote.select_progress("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level_id, 1);
        assert!(rows[0].unlocked);

        // Second call finds a row and does not insert again.
        assert!(!sync.initialize_remote("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_merges_and_writes_both_sides() {
        let (sync, store, remote) = setup(60);
        store.update_level_progress(1, 800, 65.0, 13, 20, None).await.unwrap();

        remote
            .upsert_progress(&ProgressRow::from_progress("u1", 2, &level(true, true, 2, 1900, 95.0, 5)))
            .await
            .unwrap();

        let outcome = sync.perform_full_sync("u1").await.unwrap();
        assert_eq!(outcome.action, SyncAction::Merged);
        assert!(outcome.progress[&2].completed);
        assert_eq!(outcome.progress[&2].stars, 5);
        assert_eq!(outcome.progress[&1].best_score, 800);

        assert_eq!(store.load_local().unwrap(), outcome.progress);
        let remote_rows = remote.select_progress("u1").await.unwrap();
        assert_eq!(remote_rows.len(), outcome.progress.len());
    }

    #[tokio::test]
    async fn test_partial_push_failure_is_reported() {
        let (sync, store, remote) = setup(60);
        store.get_or_init_progress().unwrap();
        remote.fail_level_writes(2);

        let outcome = sync.perform_full_sync("u1").await.unwrap();

        assert_eq!(outcome.push.pushed, vec![1, 3]);
        assert_eq!(outcome.push.failed, vec![2]);
        assert!(!outcome.push.all_succeeded());
    }

    #[tokio::test]
    async fn test_offline_sync_returns_local() {
        let (sync, store, remote) = setup(40);
        let local = store.get_or_init_progress().unwrap();
        remote.set_offline(true);

        let outcome = sync.perform_full_sync("u1").await.unwrap();

        assert_eq!(outcome.progress, local);
        assert!(outcome.remote_error.is_some());
        assert_eq!(outcome.push.failed.len(), local.len());
        assert_eq!(store.load_local().unwrap(), local);
    }

    #[tokio::test]
    async fn test_offline_sync_with_nothing_local_writes_nothing() {
        let (sync, _, remote) = setup(40);
        remote.set_offline(true);

        let outcome = sync.perform_full_sync("u1").await.unwrap();
        assert_eq!(outcome.action, SyncAction::Skipped);
        assert!(outcome.remote_error.is_some());
        assert!(outcome.push.pushed.is_empty());

        remote.set_offline(false);
        assert!(remote.select_progress("u1").await.unwrap().is_empty());
    }
}
