// src/handlers/scores.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::score::{LeaderboardResponse, LeaderboardSource, ScoreListParams},
    services::ledger::ScoreLedger,
    utils::jwt::CurrentIdentity,
};

/// All scores, best first.
pub async fn list_scores(
    State(ledger): State<ScoreLedger>,
    Query(params): Query<ScoreListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ledger.all_scores(params.limit).await?))
}

/// Most recent scores first.
pub async fn recent_scores(
    State(ledger): State<ScoreLedger>,
    Query(params): Query<ScoreListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ledger.recent_scores(params.limit).await?))
}

pub async fn level_scores(
    State(ledger): State<ScoreLedger>,
    Path(level_id): Path<u32>,
    Query(params): Query<ScoreListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ledger.level_scores(level_id, params.limit).await?))
}

/// Global leaderboard. Served from the local cache when the remote store is
/// unreachable.
pub async fn get_leaderboard(
    State(ledger): State<ScoreLedger>,
    Query(params): Query<ScoreListParams>,
) -> Result<impl IntoResponse, AppError> {
    match ledger.global_leaderboard(params.limit).await {
        Ok(entries) => Ok(Json(json!(LeaderboardResponse {
            source: LeaderboardSource::Remote,
            entries,
        }))),
        Err(e) if e.is_remote() => {
            tracing::warn!("Leaderboard served from local cache: {}", e);
            Ok(Json(json!(LeaderboardResponse {
                source: LeaderboardSource::Local,
                entries: ledger.local_leaderboard(params.limit)?,
            })))
        }
        Err(e) => Err(e),
    }
}

pub async fn local_scores(State(ledger): State<ScoreLedger>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ledger.local_scores()?))
}

/// The signed-in player's best score per level.
pub async fn my_scores(
    State(ledger): State<ScoreLedger>,
    Extension(current): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let identity = current.require()?;
    Ok(Json(ledger.user_best_scores(&identity.id).await?))
}

pub async fn delete_my_scores(
    State(ledger): State<ScoreLedger>,
    Extension(current): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let identity = current.require()?;
    let deleted = ledger.delete_user_scores(&identity.id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
