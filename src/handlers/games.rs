// src/handlers/games.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::game::{StartGameRequest, SubmitAnswerRequest},
    services::game::GameService,
    utils::jwt::CurrentIdentity,
};

/// Starts a game on an unlocked level.
/// Returns 201 Created with the session id and the level's questions.
pub async fn start_game(
    State(game): State<GameService>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Json(payload): Json<StartGameRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Signed-in players default to their profile name.
    let player_name = payload
        .player_name
        .or_else(|| identity.map(|i| i.name));

    let started = game.start_game(payload.level_id, &payload.difficulty, player_name)?;
    Ok((StatusCode::CREATED, Json(started)))
}

pub async fn submit_answer(
    State(game): State<GameService>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = game.submit_answer(session_id, payload.selected_index, payload.time_remaining)?;
    Ok(Json(outcome))
}

pub async fn record_timeout(
    State(game): State<GameService>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(game.record_timeout(session_id)?))
}

pub async fn next_question(
    State(game): State<GameService>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(game.next_question(session_id)?))
}

/// Records the finished game. Safe to retry: a repeated call returns the
/// first result without recording again.
pub async fn complete_game(
    State(game): State<GameService>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = game.complete_session(session_id, identity.as_ref()).await?;
    Ok(Json(result))
}

pub async fn abandon_game(
    State(game): State<GameService>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    game.abandon(session_id)?;
    Ok(StatusCode::NO_CONTENT)
}
