// src/services/progress.rs

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::PROGRESS_KEY,
    engine::levels::{LevelCatalog, calculate_stars, is_level_passed},
    error::AppError,
    models::level::{LevelMenuEntry, LevelProgress, ProgressMap, TotalStats},
    services::sync::push_level,
    store::{
        local::{LocalStore, LocalStoreExt},
        remote::RemoteStore,
    },
};

/// Result of recording one completed attempt.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub progress: ProgressMap,
    pub level: LevelProgress,
    pub passed: bool,
    pub stars: u8,
    pub next_level_unlocked: bool,
    /// False for guests and when the remote push failed.
    pub remote_synced: bool,
}

/// Durable per-level progress, cached locally and pushed to the remote store
/// for signed-in players.
#[derive(Clone)]
pub struct ProgressStore {
    catalog: LevelCatalog,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl ProgressStore {
    pub fn new(
        catalog: LevelCatalog,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            catalog,
            local,
            remote,
        }
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    /// The persisted map as-is; empty when nothing has been stored.
    pub fn load_local(&self) -> Result<ProgressMap, AppError> {
        Ok(self.local.load::<ProgressMap>(PROGRESS_KEY)?.unwrap_or_default())
    }

    pub fn save_local(&self, progress: &ProgressMap) -> Result<(), AppError> {
        self.local.save(PROGRESS_KEY, progress)
    }

    fn initialize(&self) -> Result<ProgressMap, AppError> {
        let progress: ProgressMap = self
            .catalog
            .levels()
            .iter()
            .map(|level| (level.id, LevelProgress::initial(level.id)))
            .collect();

        self.save_local(&progress)?;
        tracing::info!("Initialized progress for {} levels", progress.len());
        Ok(progress)
    }

    /// Fills in levels the map does not know yet and unlocks level 1 plus any
    /// level whose predecessor is completed. Returns whether anything changed.
    pub(crate) fn normalize(&self, progress: &mut ProgressMap) -> bool {
        let mut changed = false;

        for level in self.catalog.levels() {
            let previous_completed = level.id > 1
                && progress
                    .get(&(level.id - 1))
                    .is_some_and(|prev| prev.completed);

            let entry = progress.entry(level.id).or_insert_with(|| {
                changed = true;
                LevelProgress::initial(level.id)
            });
            if (level.id == 1 || previous_completed) && !entry.is_unlocked {
                entry.is_unlocked = true;
                changed = true;
            }
        }

        changed
    }

    /// Loads persisted progress, initializing it on first use.
    pub fn get_or_init_progress(&self) -> Result<ProgressMap, AppError> {
        let Some(mut progress) = self.local.load::<ProgressMap>(PROGRESS_KEY)? else {
            return self.initialize();
        };

        if self.normalize(&mut progress) {
            self.save_local(&progress)?;
        }
        Ok(progress)
    }

    pub fn is_unlocked(&self, level_id: u32) -> Result<bool, AppError> {
        let progress = self.get_or_init_progress()?;
        Ok(progress.get(&level_id).is_some_and(|p| p.is_unlocked))
    }

    /// Records one completed attempt.
    ///
    /// Best score, accuracy and stars only ever rise. Passing marks the level
    /// completed and unlocks the next one. The local write must succeed; the
    /// remote push for signed-in players is best-effort and never rolls back.
    pub async fn update_level_progress(
        &self,
        level_id: u32,
        score: i64,
        accuracy: f64,
        correct_answers: u32,
        total_questions: u32,
        user_id: Option<&str>,
    ) -> Result<ProgressUpdate, AppError> {
        let mut progress = self.get_or_init_progress()?;

        let stars = calculate_stars(accuracy);
        let passed = is_level_passed(accuracy);

        let level = progress.entry(level_id).or_insert_with(|| LevelProgress {
            is_unlocked: true,
            ..LevelProgress::initial(level_id)
        });
        level.attempts += 1;
        level.last_played_at = Some(Utc::now());
        level.best_score = level.best_score.max(score);
        level.best_accuracy = level.best_accuracy.max(accuracy);
        level.stars = level.stars.max(stars);
        if passed {
            level.completed = true;
        }
        let level = level.clone();

        let mut next_level_unlocked = false;
        let next_id = level_id + 1;
        if passed && next_id <= self.catalog.total_levels() {
            let next = progress
                .entry(next_id)
                .or_insert_with(|| LevelProgress::initial(next_id));
            next_level_unlocked = !next.is_unlocked;
            next.is_unlocked = true;
        }

        self.save_local(&progress)?;

        tracing::info!(
            "Level {} attempt {}: {}/{} correct, {:.1}%, score {}, stars {}, passed {}",
            level_id,
            level.attempts,
            correct_answers,
            total_questions,
            accuracy,
            score,
            stars,
            passed
        );

        let remote_synced = match user_id {
            Some(user_id) => {
                match push_level(self.remote.as_ref(), user_id, level_id, &level).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            "Progress for level {} kept locally; remote push failed: {}",
                            level_id,
                            e
                        );
                        false
                    }
                }
            }
            None => false,
        };

        Ok(ProgressUpdate {
            progress,
            level,
            passed,
            stars,
            next_level_unlocked,
            remote_synced,
        })
    }

    /// Wipes local progress back to "only level 1 unlocked". Irreversible.
    pub fn reset_all_progress(&self) -> Result<ProgressMap, AppError> {
        self.local.remove(PROGRESS_KEY)?;
        tracing::info!("Local progress reset");
        self.initialize()
    }

    pub fn total_stats(&self) -> Result<TotalStats, AppError> {
        let progress = self.get_or_init_progress()?;
        let total_levels = self.catalog.total_levels();

        let mut stats = TotalStats {
            total_stars: 0,
            levels_with_stars: 0,
            completed_levels: 0,
            total_levels,
            levels_unlocked: 0,
            total_attempts: 0,
            completion_percentage: 0,
        };

        for level in self.catalog.levels() {
            let Some(p) = progress.get(&level.id) else {
                continue;
            };
            stats.total_stars += u32::from(p.stars);
            if p.stars > 0 {
                stats.levels_with_stars += 1;
            }
            if p.completed {
                stats.completed_levels += 1;
            }
            if p.is_unlocked {
                stats.levels_unlocked += 1;
            }
            stats.total_attempts += p.attempts;
        }

        if total_levels > 0 {
            stats.completion_percentage =
                (f64::from(stats.completed_levels) / f64::from(total_levels) * 100.0).round() as u32;
        }

        Ok(stats)
    }

    /// Every level with its progress, for the level-select screen.
    pub fn level_menu(&self) -> Result<Vec<LevelMenuEntry>, AppError> {
        let progress = self.get_or_init_progress()?;

        Ok(self
            .catalog
            .levels()
            .iter()
            .map(|level| {
                let progress = progress
                    .get(&level.id)
                    .cloned()
                    .unwrap_or_else(LevelProgress::locked);
                LevelMenuEntry {
                    is_locked: !progress.is_unlocked,
                    level: level.clone(),
                    progress,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::sample_bank,
        store::{local::MemoryStore, memory::MemoryRemoteStore},
    };

    fn store_with(questions: usize) -> (ProgressStore, Arc<MemoryStore>, Arc<MemoryRemoteStore>) {
        let local = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let store = ProgressStore::new(
            LevelCatalog::new(sample_bank(questions)),
            local.clone(),
            remote.clone(),
        );
        (store, local, remote)
    }

    #[test]
    fn test_initializes_with_only_level_one_unlocked() {
        let (store, _, _) = store_with(60);
        let progress = store.get_or_init_progress().unwrap();

        assert_eq!(progress.len(), 3);
        assert!(progress[&1].is_unlocked);
        assert!(!progress[&2].is_unlocked);
        assert!(!progress[&3].is_unlocked);
        assert!(progress.values().all(|p| p.attempts == 0 && p.stars == 0));
    }

    #[tokio::test]
    async fn test_pass_unlocks_next_level() {
        let (store, _, _) = store_with(60);

        let update = store
            .update_level_progress(1, 1500, 75.0, 15, 20, None)
            .await
            .unwrap();

        assert!(update.passed);
        assert_eq!(update.stars, 3);
        assert!(update.next_level_unlocked);
        assert!(update.progress[&1].completed);
        assert!(update.progress[&2].is_unlocked);
        assert!(!update.progress[&3].is_unlocked);
        assert!(!update.remote_synced);

        // Persisted, not just returned.
        assert!(store.get_or_init_progress().unwrap()[&2].is_unlocked);
    }

    #[tokio::test]
    async fn test_fail_leaves_next_level_locked() {
        let (store, _, _) = store_with(60);

        let update = store
            .update_level_progress(1, 400, 55.0, 11, 20, None)
            .await
            .unwrap();

        assert!(!update.passed);
        assert_eq!(update.stars, 0);
        assert!(!update.progress[&1].completed);
        assert!(!update.progress[&2].is_unlocked);
        assert_eq!(update.progress[&1].attempts, 1);
    }

    #[tokio::test]
    async fn test_best_values_never_decrease() {
        let (store, _, _) = store_with(40);
        let attempts = [(900, 70.0), (1800, 95.0), (300, 40.0), (1200, 85.0)];

        let mut previous = LevelProgress::initial(1);
        for (score, accuracy) in attempts {
            let update = store
                .update_level_progress(1, score, accuracy, 0, 20, None)
                .await
                .unwrap();
            let current = update.level;

            assert!(current.best_score >= previous.best_score);
            assert!(current.best_accuracy >= previous.best_accuracy);
            assert!(current.stars >= previous.stars);
            previous = current;
        }

        assert_eq!(previous.best_score, 1800);
        assert_eq!(previous.best_accuracy, 95.0);
        assert_eq!(previous.stars, 5);
        assert_eq!(previous.attempts, 4);
        assert!(previous.completed);
    }

    #[tokio::test]
    async fn test_last_level_has_no_successor() {
        let (store, _, _) = store_with(40);
        let update = store
            .update_level_progress(2, 2000, 100.0, 20, 20, None)
            .await
            .unwrap();

        assert!(!update.next_level_unlocked);
        assert!(!update.progress.contains_key(&3));
    }

    #[tokio::test]
    async fn test_signed_in_update_pushes_level() {
        let (store, _, remote) = store_with(40);

        let update = store
            .update_level_progress(1, 1500, 80.0, 16, 20, Some("user-1"))
            .await
            .unwrap();
        assert!(update.remote_synced);

        let rows = remote.select_progress("user-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level_id, 1);
        assert_eq!(rows[0].best_score, 1500);
        assert!(rows[0].completed);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_update() {
        let (store, _, remote) = store_with(40);
        remote.set_offline(true);

        let update = store
            .update_level_progress(1, 1500, 80.0, 16, 20, Some("user-1"))
            .await
            .unwrap();

        assert!(!update.remote_synced);
        let saved = store.get_or_init_progress().unwrap();
        assert_eq!(saved[&1].attempts, 1);
        assert!(saved[&2].is_unlocked);
    }

    #[tokio::test]
    async fn test_reset_and_stats() {
        let (store, _, _) = store_with(50);
        store.update_level_progress(1, 1500, 90.0, 18, 20, None).await.unwrap();
        store.update_level_progress(2, 900, 65.0, 13, 20, None).await.unwrap();
        store.update_level_progress(2, 100, 20.0, 4, 20, None).await.unwrap();

        let stats = store.total_stats().unwrap();
        assert_eq!(stats.total_levels, 3);
        assert_eq!(stats.total_stars, 4 + 2);
        assert_eq!(stats.levels_with_stars, 2);
        assert_eq!(stats.completed_levels, 2);
        assert_eq!(stats.levels_unlocked, 3);
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.completion_percentage, 67);

        let reset = store.reset_all_progress().unwrap();
        assert!(reset[&1].is_unlocked);
        assert!(!reset[&2].is_unlocked);
        assert_eq!(store.total_stats().unwrap().total_attempts, 0);
    }

    #[test]
    fn test_normalize_adds_new_levels() {
        let (store, local, _) = store_with(60);

        let mut stored = ProgressMap::new();
        stored.insert(1, LevelProgress { completed: true, ..LevelProgress::initial(1) });
        stored.insert(2, LevelProgress::locked());
        local.save(PROGRESS_KEY, &stored).unwrap();

        let progress = store.get_or_init_progress().unwrap();
        assert_eq!(progress.len(), 3);
        assert!(!progress[&3].is_unlocked);

        let mut stored = ProgressMap::new();
        stored.insert(1, LevelProgress { is_unlocked: false, completed: true, ..LevelProgress::initial(1) });
        local.save(PROGRESS_KEY, &stored).unwrap();

        let progress = store.get_or_init_progress().unwrap();
        assert!(progress[&1].is_unlocked);
        assert!(progress[&2].is_unlocked);
    }

    #[test]
    fn test_level_menu_marks_locks() {
        let (store, _, _) = store_with(45);
        let menu = store.level_menu().unwrap();

        assert_eq!(menu.len(), 3);
        assert!(!menu[0].is_locked);
        assert!(menu[1].is_locked);
        assert_eq!(menu[2].level.question_count, 5);
    }
}
