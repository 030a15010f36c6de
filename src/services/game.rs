// src/services/game.rs

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    config::{FINISHED_GAMES_KEPT, GAME_IDLE_TIMEOUT_SECS},
    engine::{
        levels::LevelCatalog,
        scoring::{Difficulty, ScoringRules, calculate_game_stats},
        session::{CompletionTicket, GameSession},
    },
    error::AppError,
    models::{
        game::{AnswerOutcome, CompletedGame, GameResult, StartGameResponse},
        level::LevelMenuEntry,
        question::{PublicQuestion, Question},
        score::NewScore,
        user::Identity,
    },
    services::{ledger::ScoreLedger, progress::ProgressStore},
    store::remote::RemoteStore,
};

const GUEST_NAME: &str = "Guest";

struct LiveGame {
    session: GameSession,
    last_touched: Instant,
}

/// Games in play, plus the results of the most recently finished ones.
#[derive(Default)]
struct Sessions {
    live: HashMap<Uuid, LiveGame>,
    finished: HashMap<Uuid, GameResult>,
    finished_order: VecDeque<Uuid>,
}

impl Sessions {
    fn live_mut(&mut self, session_id: Uuid) -> Result<&mut GameSession, AppError> {
        let game = self
            .live
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("Game {} not found", session_id)))?;
        game.last_touched = Instant::now();
        Ok(&mut game.session)
    }

    /// Drops games nobody has touched within the idle timeout.
    fn sweep_idle(&mut self) -> usize {
        let idle = Duration::from_secs(GAME_IDLE_TIMEOUT_SECS);
        let before = self.live.len();
        self.live.retain(|_, game| game.last_touched.elapsed() < idle);
        before - self.live.len()
    }

    /// Moves a recorded game out of play, keeping only its result.
    fn retire(&mut self, session_id: Uuid, result: GameResult) {
        self.live.remove(&session_id);
        if self.finished.insert(session_id, result).is_none() {
            self.finished_order.push_back(session_id);
        }
        while self.finished_order.len() > FINISHED_GAMES_KEPT {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }
}

/// Drives play-throughs: starts sessions on unlocked levels, scores answers,
/// and records finished games into progress, the ledger and player stats.
#[derive(Clone)]
pub struct GameService {
    catalog: LevelCatalog,
    progress: ProgressStore,
    ledger: ScoreLedger,
    remote: Arc<dyn RemoteStore>,
    rules: ScoringRules,
    sessions: Arc<Mutex<Sessions>>,
}

impl GameService {
    pub fn new(
        catalog: LevelCatalog,
        progress: ProgressStore,
        ledger: ScoreLedger,
        remote: Arc<dyn RemoteStore>,
        rules: ScoringRules,
    ) -> Self {
        Self {
            catalog,
            progress,
            ledger,
            remote,
            rules,
            sessions: Arc::new(Mutex::new(Sessions::default())),
        }
    }

    fn sessions(&self) -> Result<MutexGuard<'_, Sessions>, AppError> {
        self.sessions
            .lock()
            .map_err(|_| AppError::InternalServerError("session table lock poisoned".to_string()))
    }

    fn with_session<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut GameSession) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut sessions = self.sessions()?;
        f(sessions.live_mut(session_id)?)
    }

    /// Questions of a level in bank order. Empty for an unknown level.
    pub fn start_level(&self, level_id: u32) -> Vec<Question> {
        self.catalog.level_questions(level_id).to_vec()
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    pub fn level_menu(&self) -> Result<Vec<LevelMenuEntry>, AppError> {
        self.progress.level_menu()
    }

    /// Opens a session on an unlocked level.
    pub fn start_game(
        &self,
        level_id: u32,
        difficulty: &str,
        player_name: Option<String>,
    ) -> Result<StartGameResponse, AppError> {
        let difficulty = Difficulty::from_key(difficulty).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown difficulty '{}'", difficulty))
        })?;
        let level = self
            .catalog
            .level(level_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Level {} not found", level_id)))?;

        if !self.progress.is_unlocked(level_id)? {
            return Err(AppError::Forbidden(format!("Level {} is locked", level_id)));
        }

        let player_name = player_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| GUEST_NAME.to_string());

        let session = GameSession::start(
            level_id,
            difficulty,
            player_name,
            self.start_level(level_id),
            self.rules,
        )?;

        let response = StartGameResponse {
            session_id: session.id(),
            level,
            difficulty: difficulty.key().to_string(),
            time_limit: session.time_limit(),
            questions: session.public_questions(),
            current_question: session.current_question(),
        };

        tracing::info!(
            "Started game {} on level {} ({})",
            response.session_id,
            level_id,
            response.difficulty
        );
        let mut sessions = self.sessions()?;
        let swept = sessions.sweep_idle();
        if swept > 0 {
            tracing::info!("Dropped {} idle games", swept);
        }
        sessions.live.insert(
            session.id(),
            LiveGame {
                session,
                last_touched: Instant::now(),
            },
        );

        Ok(response)
    }

    pub fn submit_answer(
        &self,
        session_id: Uuid,
        selected_index: usize,
        time_remaining: u32,
    ) -> Result<AnswerOutcome, AppError> {
        self.with_session(session_id, |s| s.submit_answer(selected_index, time_remaining))
    }

    pub fn record_timeout(&self, session_id: Uuid) -> Result<AnswerOutcome, AppError> {
        self.with_session(session_id, GameSession::record_timeout)
    }

    pub fn next_question(&self, session_id: Uuid) -> Result<PublicQuestion, AppError> {
        self.with_session(session_id, GameSession::next_question)
    }

    /// Drops a session without recording anything.
    pub fn abandon(&self, session_id: Uuid) -> Result<(), AppError> {
        match self.sessions()?.live.remove(&session_id) {
            Some(_) => {
                tracing::info!("Game {} abandoned", session_id);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Game {} not found", session_id))),
        }
    }

    /// Completes a finished session. A repeated call replays the first result.
    pub async fn complete_session(
        &self,
        session_id: Uuid,
        identity: Option<&Identity>,
    ) -> Result<GameResult, AppError> {
        let ticket = {
            let mut sessions = self.sessions()?;
            if let Some(result) = sessions.finished.get(&session_id) {
                return Ok(result.clone());
            }
            sessions.live_mut(session_id)?.begin_completion()?
        };

        let game = match ticket {
            CompletionTicket::Recorded(result) => return Ok(*result),
            CompletionTicket::Record(game) => game,
        };

        let outcome = self.complete_game(&game, identity).await;

        let mut sessions = self.sessions()?;
        match &outcome {
            Ok(result) => sessions.retire(session_id, result.clone()),
            Err(_) => {
                if let Some(game) = sessions.live.get_mut(&session_id) {
                    game.session.abort_completion();
                }
            }
        }

        outcome
    }

    /// Records a finished game: the ledger first, then progress, then the
    /// player's lifetime stats. Only local failures abort.
    /// Ledger writes are keyed by session id, so retrying after a failed
    /// progress write records the score once.
    pub async fn complete_game(
        &self,
        game: &CompletedGame,
        identity: Option<&Identity>,
    ) -> Result<GameResult, AppError> {
        let stats = calculate_game_stats(
            game.correct_count,
            game.total_questions,
            game.final_score,
            &game.difficulty,
            game.longest_streak,
        );
        let accuracy = stats.accuracy.clone();

        let ledger = self
            .ledger
            .save_score(
                &NewScore {
                    session_id: game.session_id.clone(),
                    player_name: game.player_name.clone(),
                    level_id: game.level_id,
                    score: stats.final_score,
                    percentage: accuracy.percentage,
                    correct_answers: accuracy.correct_answers,
                    total_questions: accuracy.total_questions,
                    difficulty: game.difficulty.clone(),
                },
                identity,
            )
            .await?;

        let update = self
            .progress
            .update_level_progress(
                game.level_id,
                stats.final_score,
                accuracy.percentage,
                accuracy.correct_answers,
                accuracy.total_questions,
                identity.map(|i| i.id.as_str()),
            )
            .await?;

        if let Some(identity) = identity {
            match self.remote.record_game(&identity.id, stats.final_score).await {
                Ok(Some(_)) => {}
                Ok(None) => tracing::warn!("No profile for {}; stats not recorded", identity.id),
                Err(e) => tracing::warn!("Could not record stats for {}: {}", identity.id, e),
            }
        }

        tracing::info!(
            "Game {} complete: level {}, score {}, {:.1}% ({})",
            game.session_id,
            game.level_id,
            stats.final_score,
            accuracy.percentage,
            accuracy.grade.as_str()
        );

        Ok(GameResult {
            session_id: game.session_id.clone(),
            level_id: game.level_id,
            passed: update.passed,
            stars: update.stars,
            accuracy,
            stats,
            updated_progress: update.level,
            next_level_unlocked: update.next_level_unlocked,
            remote_synced: update.remote_synced,
            ledger,
        })
    }
}
