//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS,
//! and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/eligibility", post(http::http_post_eligibility))
        .route("/api/v1/round", post(http::http_post_round))
        .route("/api/v1/round/begin", post(http::http_post_begin_turn))
        .route("/api/v1/round/answer", post(http::http_post_answer))
        .route("/api/v1/round/turn", post(http::http_post_confirm_turn))
        .route("/api/v1/round/state", get(http::http_get_round_state))
        .route("/api/v1/questions", get(http::http_get_questions))
        .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
        .route("/api/v1/editorial", get(http::http_get_editorial))
        .route("/api/v1/players", get(http::http_get_players))
        .route(
            "/api/v1/config/start_date",
            get(http::http_get_start_date).post(http::http_post_start_date),
        )
        .route("/api/v1/config/start_date/reset", post(http::http_post_reset_start_date))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
