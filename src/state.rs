// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    engine::{levels::LevelCatalog, scoring::ScoringRules},
    models::question::Question,
    services::{
        game::GameService, ledger::ScoreLedger, progress::ProgressStore, sync::ProgressSync,
    },
    store::{local::LocalStore, remote::RemoteStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: LevelCatalog,
    pub local: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub progress: ProgressStore,
    pub sync: ProgressSync,
    pub ledger: ScoreLedger,
    pub game: GameService,
}

impl AppState {
    /// Wires every service over one local store and one remote store.
    pub fn new(
        config: Config,
        questions: Vec<Question>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let catalog = LevelCatalog::new(questions);
        let rules = ScoringRules {
            wrong_penalty: config.wrong_penalty,
        };

        let progress = ProgressStore::new(catalog.clone(), local.clone(), remote.clone());
        let sync = ProgressSync::new(progress.clone(), remote.clone());
        let ledger = ScoreLedger::new(local.clone(), remote.clone());
        let game = GameService::new(
            catalog.clone(),
            progress.clone(),
            ledger.clone(),
            remote.clone(),
            rules,
        );

        Self {
            config,
            catalog,
            local,
            remote,
            progress,
            sync,
            ledger,
            game,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ProgressStore {
    fn from_ref(state: &AppState) -> Self {
        state.progress.clone()
    }
}

impl FromRef<AppState> for ProgressSync {
    fn from_ref(state: &AppState) -> Self {
        state.sync.clone()
    }
}

impl FromRef<AppState> for ScoreLedger {
    fn from_ref(state: &AppState) -> Self {
        state.ledger.clone()
    }
}

impl FromRef<AppState> for GameService {
    fn from_ref(state: &AppState) -> Self {
        state.game.clone()
    }
}
