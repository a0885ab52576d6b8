//! services/api/src/web/session.rs
//!
//! Endpoints for the session flag that gates the study routes.

use crate::web::dto::SessionDto;
use crate::web::rest::{port_error, HandlerError};
use crate::web::state::AppState;
use axum::{extract::State, response::Json};
use std::sync::Arc;

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /session - Whether a session is active
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session state", body = SessionDto)
    )
)]
pub async fn session_status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionDto>, HandlerError> {
    let authenticated = state.session.is_authenticated().await.map_err(port_error)?;
    Ok(Json(SessionDto { authenticated }))
}

/// POST /session/login - Start a session
#[utoipa::path(
    post,
    path = "/session/login",
    responses(
        (status = 200, description = "Session started", body = SessionDto),
        (status = 500, description = "The flag could not be written")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionDto>, HandlerError> {
    state.session.login().await.map_err(port_error)?;
    Ok(Json(SessionDto {
        authenticated: true,
    }))
}

/// POST /session/logout - End the session
#[utoipa::path(
    post,
    path = "/session/logout",
    responses(
        (status = 200, description = "Session ended", body = SessionDto),
        (status = 500, description = "The flag could not be cleared")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionDto>, HandlerError> {
    state.session.logout().await.map_err(port_error)?;
    Ok(Json(SessionDto {
        authenticated: false,
    }))
}
