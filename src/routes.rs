// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, games, levels, progress, scores},
    state::AppState,
    utils::jwt::identity_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, levels, games, progress, scores).
/// * Resolves the caller's identity on every request; guests pass through.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let level_routes = Router::new()
        .route("/", get(levels::list_levels))
        .route("/stats", get(levels::get_stats))
        .route("/{id}/questions", get(levels::get_level_questions));

    let game_routes = Router::new()
        .route("/", post(games::start_game))
        .route("/{id}", delete(games::abandon_game))
        .route("/{id}/answer", post(games::submit_answer))
        .route("/{id}/timeout", post(games::record_timeout))
        .route("/{id}/next", post(games::next_question))
        .route("/{id}/complete", post(games::complete_game));

    let progress_routes = Router::new()
        .route("/", get(progress::get_progress))
        .route("/sync", post(progress::sync_progress))
        .route("/reset", post(progress::reset_progress));

    let score_routes = Router::new()
        .route("/", get(scores::list_scores))
        .route("/recent", get(scores::recent_scores))
        .route("/leaderboard", get(scores::get_leaderboard))
        .route("/local", get(scores::local_scores))
        .route("/me", get(scores::my_scores).delete(scores::delete_my_scores))
        .route("/level/{id}", get(scores::level_scores));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/levels", level_routes)
        .nest("/api/games", game_routes)
        .nest("/api/progress", progress_routes)
        .nest("/api/scores", score_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
