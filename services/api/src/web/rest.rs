//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::dto::{
    AskRequest, ChatMessageDto, CreateResourceRequest, FlashcardDto, ListQuery,
    QuizAttemptRequest, QuizQuestionDto, QuizScoreDto, ResourceDto, ReviewFlashcardRequest,
    SearchQuery, SessionDto, StudySessionRequest, UpdateResourceRequest, UserStatsDto,
};
use crate::web::session;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use study_assistant_core::{
    stats::grade_quiz, FlashcardStatus, PortError, ResourceType, StudyEvent, StudyEventKind,
    ValidationError,
};
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_resource_handler,
        list_resources_handler,
        recent_resources_handler,
        search_resources_handler,
        get_resource_handler,
        update_resource_handler,
        delete_resource_handler,
        reprocess_resource_handler,
        review_flashcard_handler,
        quiz_attempt_handler,
        chat_history_handler,
        ask_handler,
        record_study_session_handler,
        stats_handler,
        session::session_status_handler,
        session::login_handler,
        session::logout_handler,
    ),
    components(
        schemas(
            ResourceDto, FlashcardDto, QuizQuestionDto, ChatMessageDto, QuizScoreDto,
            UserStatsDto, SessionDto, CreateResourceRequest, UpdateResourceRequest,
            ReviewFlashcardRequest, QuizAttemptRequest, AskRequest, StudySessionRequest
        )
    ),
    tags(
        (name = "Study Assistant API", description = "Study resources with generated summaries, flashcards and quizzes.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The error half of every handler's result.
pub type HandlerError = (StatusCode, String);

/// Maps a core error onto the HTTP status the client sees.
pub fn port_error(e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Validation(v) => (StatusCode::UNPROCESSABLE_ENTITY, v.to_string()),
        PortError::GenerationFailure(msg) => {
            warn!("Generation failure surfaced to a request: {}", msg);
            (StatusCode::BAD_GATEWAY, msg)
        }
        PortError::Unexpected(msg) => {
            error!("Request failed: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            )
        }
    }
}

fn invalid(e: ValidationError) -> HandlerError {
    port_error(e.into())
}

//=========================================================================================
// Resource Handlers
//=========================================================================================

/// Create a resource and start generating its study material.
///
/// Returns immediately with the resource in `processing`; poll it until the
/// status becomes `ready` or `error`.
#[utoipa::path(
    post,
    path = "/resources",
    request_body = CreateResourceRequest,
    responses(
        (status = 202, description = "Resource created; generation started", body = ResourceDto),
        (status = 401, description = "No active session"),
        (status = 422, description = "Unknown type or blank title")
    )
)]
pub async fn create_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let resource_type: ResourceType = req.resource_type.parse().map_err(invalid)?;
    let resource = app_state
        .store
        .create(resource_type, &req.title, &req.raw_input)
        .await
        .map_err(port_error)?;
    Ok((StatusCode::ACCEPTED, Json(ResourceDto::from(resource))))
}

/// List resources, newest first.
#[utoipa::path(
    get,
    path = "/resources",
    params(ListQuery),
    responses(
        (status = 200, description = "Resources, newest first", body = [ResourceDto]),
        (status = 401, description = "No active session")
    )
)]
pub async fn list_resources_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ResourceDto>>, HandlerError> {
    let mut resources = match &query.tag {
        Some(tag) => app_state.view.with_tag(tag).await,
        None => app_state.view.recent(usize::MAX).await,
    }
    .map_err(port_error)?;
    if let Some(limit) = query.limit {
        resources.truncate(limit);
    }
    Ok(Json(resources.into_iter().map(ResourceDto::from).collect()))
}

/// The most recently created resources shown in the sidebar.
#[utoipa::path(
    get,
    path = "/resources/recent",
    responses(
        (status = 200, description = "The newest resources", body = [ResourceDto]),
        (status = 401, description = "No active session")
    )
)]
pub async fn recent_resources_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ResourceDto>>, HandlerError> {
    let resources = app_state
        .view
        .recent(app_state.config.recent_limit)
        .await
        .map_err(port_error)?;
    Ok(Json(resources.into_iter().map(ResourceDto::from).collect()))
}

/// Search resources by title and tag.
#[utoipa::path(
    get,
    path = "/resources/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matches, best first", body = [ResourceDto]),
        (status = 401, description = "No active session")
    )
)]
pub async fn search_resources_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ResourceDto>>, HandlerError> {
    let resources = app_state.view.search(&query.q).await.map_err(port_error)?;
    Ok(Json(resources.into_iter().map(ResourceDto::from).collect()))
}

/// Open a resource. Opening it marks it as accessed now.
#[utoipa::path(
    get,
    path = "/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "The resource", body = ResourceDto),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource")
    )
)]
pub async fn get_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceDto>, HandlerError> {
    app_state.store.touch(id).await.map_err(port_error)?;
    let resource = app_state.view.by_id(id).await.map_err(port_error)?;
    Ok(Json(ResourceDto::from(resource)))
}

/// Rename, retag or edit the summary of a resource.
#[utoipa::path(
    patch,
    path = "/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource id")),
    request_body = UpdateResourceRequest,
    responses(
        (status = 200, description = "The updated resource", body = ResourceDto),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource"),
        (status = 422, description = "Rejected update")
    )
)]
pub async fn update_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResourceRequest>,
) -> Result<Json<ResourceDto>, HandlerError> {
    let resource = app_state
        .store
        .update(id, req.into())
        .await
        .map_err(port_error)?;
    Ok(Json(ResourceDto::from(resource)))
}

/// Delete a resource and its conversation.
#[utoipa::path(
    delete,
    path = "/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource")
    )
)]
pub async fn delete_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    app_state.store.delete(id).await.map_err(port_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Regenerate the study material of a `ready` or `error` resource.
#[utoipa::path(
    post,
    path = "/resources/{id}/reprocess",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 202, description = "Generation restarted", body = ResourceDto),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource"),
        (status = 422, description = "Resource is still processing")
    )
)]
pub async fn reprocess_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state.store.reprocess(id).await.map_err(port_error)?;
    let resource = app_state.store.get(id).await.map_err(port_error)?;
    info!("Reprocessing resource {}", id);
    Ok((StatusCode::ACCEPTED, Json(ResourceDto::from(resource))))
}

//=========================================================================================
// Study Handlers
//=========================================================================================

/// Record how well a flashcard is known.
#[utoipa::path(
    put,
    path = "/resources/{id}/flashcards/{card_id}",
    params(
        ("id" = Uuid, Path, description = "Resource id"),
        ("card_id" = Uuid, Path, description = "Flashcard id")
    ),
    request_body = ReviewFlashcardRequest,
    responses(
        (status = 200, description = "The reviewed flashcard", body = FlashcardDto),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource or flashcard"),
        (status = 422, description = "Unknown status or resource not ready")
    )
)]
pub async fn review_flashcard_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, card_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ReviewFlashcardRequest>,
) -> Result<Json<FlashcardDto>, HandlerError> {
    let status: FlashcardStatus = req.status.parse().map_err(invalid)?;
    let card = app_state
        .store
        .review_flashcard(id, card_id, status)
        .await
        .map_err(port_error)?;
    Ok(Json(FlashcardDto::from(card)))
}

/// Grade a full quiz attempt and record it for the stats.
#[utoipa::path(
    post,
    path = "/resources/{id}/quiz/attempts",
    params(("id" = Uuid, Path, description = "Resource id")),
    request_body = QuizAttemptRequest,
    responses(
        (status = 200, description = "The score", body = QuizScoreDto),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource"),
        (status = 422, description = "Wrong number of answers or no quiz")
    )
)]
pub async fn quiz_attempt_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuizAttemptRequest>,
) -> Result<Json<QuizScoreDto>, HandlerError> {
    let resource = app_state.store.get(id).await.map_err(port_error)?;
    let score = grade_quiz(&resource, &req.answers).map_err(port_error)?;
    app_state
        .activity
        .record(StudyEvent {
            at: app_state.store.clock().now_millis(),
            kind: StudyEventKind::QuizAttempt {
                resource_id: id,
                percent: score.percent,
            },
        })
        .await;
    Ok(Json(QuizScoreDto::from(score)))
}

/// The tutoring conversation for a resource, oldest first.
#[utoipa::path(
    get,
    path = "/resources/{id}/chat",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "The conversation", body = [ChatMessageDto]),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource")
    )
)]
pub async fn chat_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessageDto>>, HandlerError> {
    let history = app_state.chat.history(id).await.map_err(port_error)?;
    Ok(Json(history.into_iter().map(ChatMessageDto::from).collect()))
}

/// Ask the tutor a question about a ready resource.
#[utoipa::path(
    post,
    path = "/resources/{id}/chat",
    params(("id" = Uuid, Path, description = "Resource id")),
    request_body = AskRequest,
    responses(
        (status = 200, description = "The tutor's reply", body = ChatMessageDto),
        (status = 401, description = "No active session"),
        (status = 404, description = "Unknown resource"),
        (status = 422, description = "Blank question or resource not ready"),
        (status = 500, description = "The tutor could not answer")
    )
)]
pub async fn ask_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<ChatMessageDto>, HandlerError> {
    let reply = app_state
        .chat
        .ask(id, &req.question)
        .await
        .map_err(port_error)?;
    Ok(Json(ChatMessageDto::from(reply)))
}

/// Record a finished study session.
#[utoipa::path(
    post,
    path = "/activity/sessions",
    request_body = StudySessionRequest,
    responses(
        (status = 204, description = "Recorded"),
        (status = 401, description = "No active session"),
        (status = 422, description = "Zero-length session")
    )
)]
pub async fn record_study_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<StudySessionRequest>,
) -> Result<StatusCode, HandlerError> {
    if req.minutes == 0 {
        return Err(invalid(ValidationError::Rejected(
            "A study session must last at least one minute".to_string(),
        )));
    }
    app_state
        .activity
        .record(StudyEvent {
            at: app_state.store.clock().now_millis(),
            kind: StudyEventKind::StudySession {
                minutes: req.minutes,
            },
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Aggregate learning statistics for the dashboard.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Current statistics", body = UserStatsDto),
        (status = 401, description = "No active session")
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserStatsDto>, HandlerError> {
    let resources = app_state.store.list().await.map_err(port_error)?;
    let stats = app_state
        .activity
        .summarize(&resources, app_state.store.clock().now_millis())
        .await;
    Ok(Json(UserStatsDto::from(stats)))
}
