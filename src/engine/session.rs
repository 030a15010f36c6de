// src/engine/session.rs

use uuid::Uuid;

use crate::{
    engine::{
        countdown::Countdown,
        scoring::{AnswerEvent, Difficulty, ScoringRules, StreakState},
    },
    error::AppError,
    models::{
        game::{AnswerOutcome, CompletedGame, GameResult},
        question::{PublicQuestion, Question},
    },
};

/// Where a session stands with respect to `complete_game`.
#[derive(Debug, Clone)]
enum Completion {
    Open,
    InFlight,
    Done(Box<GameResult>),
}

/// What the caller should do with a completion request.
#[derive(Debug)]
pub enum CompletionTicket {
    /// First delivery: record this game.
    Record(CompletedGame),
    /// Already recorded; replay the stored result.
    Recorded(Box<GameResult>),
}

/// One play-through of a level. Single logical thread of control.
#[derive(Debug)]
pub struct GameSession {
    id: Uuid,
    level_id: u32,
    difficulty: Difficulty,
    player_name: String,
    questions: Vec<Question>,
    rules: ScoringRules,
    current: usize,
    answered: bool,
    score: i64,
    correct_count: u32,
    streak: StreakState,
    countdown: Option<Countdown>,
    completion: Completion,
}

impl GameSession {
    /// Starts the first question's countdown for timed difficulties, so this
    /// must run inside a tokio runtime.
    pub fn start(
        level_id: u32,
        difficulty: Difficulty,
        player_name: String,
        questions: Vec<Question>,
        rules: ScoringRules,
    ) -> Result<Self, AppError> {
        if questions.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Level {} has no questions",
                level_id
            )));
        }

        let countdown = difficulty.time_limit().map(Countdown::start);

        Ok(Self {
            id: Uuid::new_v4(),
            level_id,
            difficulty,
            player_name,
            questions,
            rules,
            current: 0,
            answered: false,
            score: 0,
            correct_count: 0,
            streak: StreakState::default(),
            countdown,
            completion: Completion::Open,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn level_id(&self) -> u32 {
        self.level_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn time_limit(&self) -> Option<u32> {
        self.difficulty.time_limit()
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn streak(&self) -> StreakState {
        self.streak
    }

    pub fn total_questions(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn public_questions(&self) -> Vec<PublicQuestion> {
        self.questions
            .iter()
            .enumerate()
            .map(|(index, q)| PublicQuestion::from_question(index, q))
            .collect()
    }

    pub fn current_question(&self) -> Option<PublicQuestion> {
        self.questions
            .get(self.current)
            .map(|q| PublicQuestion::from_question(self.current, q))
    }

    /// Seconds left on the current question's timer, if timed.
    pub fn time_remaining(&self) -> Option<u32> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    fn is_last_question(&self) -> bool {
        self.current + 1 >= self.questions.len()
    }

    /// True once the last question has been answered or timed out.
    pub fn is_finished(&self) -> bool {
        self.answered && self.is_last_question()
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        match self.completion {
            Completion::Open => Ok(()),
            _ => Err(AppError::Conflict("Game already completed".to_string())),
        }
    }

    /// Scores the selected option for the current question.
    ///
    /// The time used for the speed bonus is the smaller of the client's value and
    /// the server countdown; an expired countdown scores as a timeout.
    pub fn submit_answer(
        &mut self,
        selected_index: usize,
        client_time_remaining: u32,
    ) -> Result<AnswerOutcome, AppError> {
        self.ensure_open()?;
        if self.answered {
            return Err(AppError::Conflict("Question already answered".to_string()));
        }

        let question = &self.questions[self.current];
        if selected_index >= question.options.len() {
            return Err(AppError::BadRequest(format!(
                "Selected option {} is out of range",
                selected_index
            )));
        }

        let is_correct = question.is_correct(selected_index);
        Ok(self.resolve(Some(is_correct), client_time_remaining))
    }

    /// Records the current question as unanswered when its timer ran out.
    pub fn record_timeout(&mut self) -> Result<AnswerOutcome, AppError> {
        self.ensure_open()?;
        if self.answered {
            return Err(AppError::Conflict("Question already answered".to_string()));
        }

        Ok(self.resolve(None, 0))
    }

    /// `answer` is `None` for a timeout.
    fn resolve(&mut self, answer: Option<bool>, client_time_remaining: u32) -> AnswerOutcome {
        let server_remaining = self.countdown.as_mut().map(|countdown| {
            countdown.cancel();
            countdown.remaining()
        });

        let timed_out = answer.is_none() || server_remaining == Some(0);
        let is_correct = answer.unwrap_or(false) && !timed_out;
        let time_remaining = match server_remaining {
            Some(server) => client_time_remaining.min(server),
            None => 0,
        };

        let scored = self.rules.question_score(AnswerEvent {
            is_correct,
            time_remaining,
            time_limit: self.time_limit(),
            current_streak: self.streak.current_streak,
            difficulty: self.difficulty.key(),
        });

        if is_correct {
            self.correct_count += 1;
            self.streak.record_correct();
        } else {
            self.streak.reset();
        }
        self.score += scored.points;
        self.answered = true;

        tracing::debug!(
            "Session {} question {}: correct={} timed_out={} points={}",
            self.id,
            self.current,
            is_correct,
            timed_out,
            scored.points
        );

        AnswerOutcome {
            question_index: self.current,
            is_correct,
            timed_out,
            correct_index: self.questions[self.current].correct_answer,
            points_awarded: scored.points,
            breakdown: scored.breakdown,
            streak: self.streak,
            score: self.score,
            is_last_question: self.is_last_question(),
        }
    }

    /// Moves to the next question and restarts the timer.
    pub fn next_question(&mut self) -> Result<PublicQuestion, AppError> {
        self.ensure_open()?;
        if !self.answered {
            return Err(AppError::BadRequest(
                "Answer the current question first".to_string(),
            ));
        }
        if self.is_last_question() {
            return Err(AppError::BadRequest(
                "No more questions; complete the game".to_string(),
            ));
        }

        // Dropping the previous countdown aborts its task.
        self.countdown = self.time_limit().map(Countdown::start);
        self.current += 1;
        self.answered = false;

        Ok(PublicQuestion::from_question(
            self.current,
            &self.questions[self.current],
        ))
    }

    pub fn summary(&self) -> CompletedGame {
        CompletedGame {
            session_id: self.id.to_string(),
            level_id: self.level_id,
            difficulty: self.difficulty.key().to_string(),
            player_name: self.player_name.clone(),
            correct_count: self.correct_count,
            total_questions: self.total_questions(),
            final_score: self.score,
            longest_streak: self.streak.longest_streak,
        }
    }

    /// First delivery wins; later deliveries replay the stored result.
    pub fn begin_completion(&mut self) -> Result<CompletionTicket, AppError> {
        match &self.completion {
            Completion::Done(result) => return Ok(CompletionTicket::Recorded(result.clone())),
            Completion::InFlight => {
                return Err(AppError::Conflict(
                    "Game completion already in progress".to_string(),
                ));
            }
            Completion::Open => {}
        }

        if !self.is_finished() {
            return Err(AppError::BadRequest(
                "Game still has unanswered questions".to_string(),
            ));
        }

        self.completion = Completion::InFlight;
        Ok(CompletionTicket::Record(self.summary()))
    }

    pub fn finish_completion(&mut self, result: GameResult) {
        self.completion = Completion::Done(Box::new(result));
    }

    /// Re-opens completion after a failed attempt so the client can retry.
    pub fn abort_completion(&mut self) {
        if matches!(self.completion, Completion::InFlight) {
            self.completion = Completion::Open;
        }
    }
}
