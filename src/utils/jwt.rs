// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::user::Identity, state::AppState};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the profile id.
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// The identity a request runs under. `None` is guest mode.
#[derive(Debug, Clone, Default)]
pub struct CurrentIdentity(pub Option<Identity>);

impl CurrentIdentity {
    /// The identity, or 401 for guests.
    pub fn require(&self) -> Result<&Identity, AppError> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::AuthError("Sign in required".to_string()))
    }
}

/// Signs a new JWT for the player.
pub fn sign_jwt(
    identity: &Identity,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: identity.id.clone(),
        email: identity.email.clone(),
        name: identity.name.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: identity resolution.
///
/// A valid `Authorization: Bearer <token>` wins; an invalid one is rejected
/// with 401. Anything else runs as a guest.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let identity = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => match verify_jwt(token, &state.config.jwt_secret) {
            Ok(claims) => Some(claims.identity()),
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    req.extensions_mut().insert(CurrentIdentity(identity));
    next.run(req).await
}
