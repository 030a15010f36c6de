// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::SESSION_KEY,
    error::AppError,
    models::user::{Identity, LoginRequest, MeResponse, NewProfile, RegisterRequest},
    state::AppState,
    store::local::LocalStoreExt,
    utils::{
        hash::{hash_password, verify_password},
        jwt::{CurrentIdentity, sign_jwt},
    },
};

/// Persists the identity, signs a token and reconciles progress.
/// A failed sync is logged and reported, never fatal.
async fn open_session(state: &AppState, identity: &Identity) -> Result<serde_json::Value, AppError> {
    let token = sign_jwt(identity, &state.config.jwt_secret, state.config.jwt_expiration)?;
    state.local.save(SESSION_KEY, identity)?;

    let sync = match state.sync.perform_full_sync(&identity.id).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!("Progress sync after sign-in failed for {}: {}", identity.id, e);
            None
        }
    };

    Ok(json!({
        "token": token,
        "type": "Bearer",
        "identity": identity,
        "sync": sync,
    }))
}

/// Registers a new player.
///
/// Hashes the password using Argon2 before storing it. Progress played as a
/// guest on this device is carried into the new account.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let profile = state
        .remote
        .insert_profile(&NewProfile {
            id: Uuid::new_v4().to_string(),
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
            password_hash: hashed_password,
        })
        .await?;

    tracing::info!("Registered profile {}", profile.id);
    let body = open_session(&state, &profile.identity()).await?;

    Ok((StatusCode::CREATED, Json(body)))
}

/// Authenticates a player and returns a JWT token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let profile = state
        .remote
        .find_profile_by_email(&payload.email.trim().to_lowercase())
        .await?
        .ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &profile.password_hash)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let mut body = open_session(&state, &profile.identity()).await?;
    body["stats"] = json!(profile.stats());

    Ok(Json(body))
}

/// Forgets the persisted session identity. Local progress stays on the device.
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.local.remove(SESSION_KEY)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current identity and lifetime stats. Stats are omitted for guests and when
/// the remote store cannot be reached.
pub async fn me(
    State(state): State<AppState>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let stats = match &identity {
        Some(identity) => match state.remote.find_profile(&identity.id).await {
            Ok(profile) => profile.map(|p| p.stats()),
            Err(e) => {
                tracing::warn!("Could not load stats for {}: {}", identity.id, e);
                None
            }
        },
        None => None,
    };

    Ok(Json(MeResponse { identity, stats }))
}
