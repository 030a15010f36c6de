// src/handlers/progress.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    error::AppError,
    services::{progress::ProgressStore, sync::ProgressSync},
    utils::jwt::CurrentIdentity,
};

pub async fn get_progress(
    State(progress): State<ProgressStore>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(progress.get_or_init_progress()?))
}

/// Full two-way sync for the signed-in player.
pub async fn sync_progress(
    State(sync): State<ProgressSync>,
    Extension(current): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let identity = current.require()?;
    Ok(Json(sync.perform_full_sync(&identity.id).await?))
}

/// Wipes local progress. For a signed-in player the remote rows go too, so
/// the next sync cannot bring the old progress back.
pub async fn reset_progress(
    State(progress): State<ProgressStore>,
    State(sync): State<ProgressSync>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let reset = progress.reset_all_progress()?;

    if let Some(identity) = identity {
        if let Err(e) = sync.delete_remote(&identity.id).await {
            tracing::warn!("Remote progress for {} not deleted: {}", identity.id, e);
        }
    }

    Ok(Json(reset))
}
