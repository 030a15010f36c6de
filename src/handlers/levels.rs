// src/handlers/levels.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::question::PublicQuestion,
    services::{game::GameService, progress::ProgressStore},
};

/// Level-select screen: every level with its progress.
pub async fn list_levels(State(game): State<GameService>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(game.level_menu()?))
}

pub async fn get_stats(
    State(progress): State<ProgressStore>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(progress.total_stats()?))
}

/// Questions of one level, without their answers.
pub async fn get_level_questions(
    State(game): State<GameService>,
    Path(level_id): Path<u32>,
) -> Result<impl IntoResponse, AppError> {
    if game.catalog().level(level_id).is_none() {
        return Err(AppError::NotFound(format!("Level {} not found", level_id)));
    }

    let questions: Vec<PublicQuestion> = game
        .start_level(level_id)
        .iter()
        .enumerate()
        .map(|(index, q)| PublicQuestion::from_question(index, q))
        .collect();

    Ok(Json(questions))
}
