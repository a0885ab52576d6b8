pub mod dto;
pub mod middleware;
pub mod rest;
pub mod session;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_session;
pub use rest::ApiDoc;
pub use state::AppState;

/// Uploaded transcripts can be long; this caps a single request body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the API router over the shared state. CORS and the Swagger UI are
/// layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/session", get(session::session_status_handler))
        .route("/session/login", post(session::login_handler))
        .route("/session/logout", post(session::logout_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route(
            "/resources",
            post(rest::create_resource_handler).get(rest::list_resources_handler),
        )
        .route("/resources/recent", get(rest::recent_resources_handler))
        .route("/resources/search", get(rest::search_resources_handler))
        .route(
            "/resources/{id}",
            get(rest::get_resource_handler)
                .patch(rest::update_resource_handler)
                .delete(rest::delete_resource_handler),
        )
        .route(
            "/resources/{id}/reprocess",
            post(rest::reprocess_resource_handler),
        )
        .route(
            "/resources/{id}/flashcards/{card_id}",
            put(rest::review_flashcard_handler),
        )
        .route(
            "/resources/{id}/quiz/attempts",
            post(rest::quiz_attempt_handler),
        )
        .route(
            "/resources/{id}/chat",
            get(rest::chat_history_handler).post(rest::ask_handler),
        )
        .route(
            "/activity/sessions",
            post(rest::record_study_session_handler),
        )
        .route("/stats", get(rest::stats_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
