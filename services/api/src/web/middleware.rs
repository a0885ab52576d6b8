//! services/api/src/web/middleware.rs
//!
//! Session middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::AppState;

/// Middleware that lets a request through only while the session flag is set.
///
/// If the flag is absent, returns 401 Unauthorized.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authenticated = state.session.is_authenticated().await.map_err(|e| {
        error!("Failed to read the session flag: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if !authenticated {
        debug!("Rejecting {} {}: no active session", req.method(), req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}
