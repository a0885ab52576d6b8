//! End-to-end tests of the REST surface over in-memory adapters.

use api_lib::{config::Config, web};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use study_assistant_core::{
    memory::{InMemoryChatRepository, InMemoryResourceRepository, InMemorySessionFlag},
    ArtifactBundle, ArtifactGenerator, ChatMessage, FlashcardDraft, GenerationFailure,
    ManualClock, PortResult, QuizQuestionDraft, Resource, ResourceType, TutorService,
};
use tower::ServiceExt;

const NOW: i64 = 1_700_000_000_000;

//=========================================================================================
// Fakes
//=========================================================================================

struct ScriptedGenerator {
    fail: bool,
}

#[async_trait]
impl ArtifactGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        raw_input: &str,
        _resource_type: ResourceType,
    ) -> Result<ArtifactBundle, GenerationFailure> {
        if self.fail {
            return Err(GenerationFailure::new("model unavailable"));
        }
        Ok(ArtifactBundle {
            summary: format!("# Notes\n\n{}", raw_input),
            flashcards: vec![
                FlashcardDraft {
                    front: "Powerhouse of the cell".to_string(),
                    back: "Mitochondria".to_string(),
                },
                FlashcardDraft {
                    front: "Control center".to_string(),
                    back: "Nucleus".to_string(),
                },
            ],
            quiz: vec![
                QuizQuestionDraft {
                    question: "Which organelle makes ATP?".to_string(),
                    options: vec!["Nucleus".to_string(), "Mitochondria".to_string()],
                    correct_answer: 1,
                    explanation: "Cellular respiration.".to_string(),
                },
                QuizQuestionDraft {
                    question: "Where is DNA stored?".to_string(),
                    options: vec!["Nucleus".to_string(), "Ribosome".to_string()],
                    correct_answer: 0,
                    explanation: "Chromosomes live in the nucleus.".to_string(),
                },
            ],
        })
    }
}

struct CannedTutor;

#[async_trait]
impl TutorService for CannedTutor {
    async fn reply(
        &self,
        resource: &Resource,
        history: &[ChatMessage],
        question: &str,
    ) -> PortResult<String> {
        Ok(format!(
            "About {}: {} ({} earlier)",
            resource.title,
            question,
            history.len()
        ))
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn app_with(authenticated: bool, failing_generator: bool) -> Router {
    let state = Arc::new(web::AppState::new(
        Arc::new(Config::default()),
        Arc::new(InMemoryResourceRepository::new()),
        Arc::new(InMemoryChatRepository::new()),
        Arc::new(ScriptedGenerator {
            fail: failing_generator,
        }),
        Arc::new(CannedTutor),
        Arc::new(InMemorySessionFlag::new(authenticated)),
        Arc::new(ManualClock::starting_at(NOW)),
    ));
    web::router(state)
}

fn app() -> Router {
    app_with(true, false)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create(app: &Router, title: &str, raw_input: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/resources",
        Some(json!({ "type": "text", "title": title, "rawInput": raw_input })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    body
}

async fn wait_for_status(app: &Router, id: &str, wanted: &str) -> Value {
    for _ in 0..100 {
        let (status, body) = send(app, Method::GET, &format!("/resources/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == wanted {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("resource {} never reached {}", id, wanted);
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn study_routes_require_a_session() {
    let app = app_with(false, false);

    let (status, _) = send(&app, Method::GET, "/resources", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = send(&app, Method::GET, "/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);

    let (status, _) = send(&app, Method::POST, "/session/login", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::GET, "/resources", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    send(&app, Method::POST, "/session/logout", None).await;
    let (status, _) = send(&app, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_resource_starts_processing_then_becomes_ready() {
    let app = app();
    let created = create(&app, "Cell biology", "Cells are the unit of life.").await;
    assert_eq!(created["status"], "processing");
    assert_eq!(created["type"], "TEXT");
    assert_eq!(created["summary"], "");
    assert_eq!(created["createdAt"], NOW);

    let id = created["id"].as_str().unwrap();
    let ready = wait_for_status(&app, id, "ready").await;
    assert!(ready["summary"].as_str().unwrap().starts_with("# Notes"));
    assert_eq!(ready["flashcards"].as_array().unwrap().len(), 2);
    assert_eq!(ready["flashcards"][0]["status"], "new");
    assert_eq!(ready["quiz"][0]["correctAnswer"], 1);
    assert_eq!(ready["originalContent"], "Cells are the unit of life.");
}

#[tokio::test]
async fn failed_generation_leaves_the_resource_in_error() {
    let app = app_with(true, true);
    let created = create(&app, "Doomed", "raw").await;
    let failed = wait_for_status(&app, created["id"].as_str().unwrap(), "error").await;
    assert_eq!(failed["flashcards"], json!([]));
    assert_eq!(failed["quiz"], json!([]));
}

#[tokio::test]
async fn bad_requests_map_to_client_errors() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/resources",
        Some(json!({ "type": "VIDEO", "title": "Clip", "rawInput": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/resources",
        Some(json!({ "type": "PDF", "title": "   ", "rawInput": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, Method::GET, &format!("/resources/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &format!("/resources/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tags_drive_search_and_the_tag_filter() {
    let app = app();
    let bio = create(&app, "Mitosis", "cells dividing").await;
    let history = create(&app, "French revolution", "1789").await;
    let bio_id = bio["id"].as_str().unwrap();
    wait_for_status(&app, bio_id, "ready").await;
    wait_for_status(&app, history["id"].as_str().unwrap(), "ready").await;

    let (status, patched) = send(
        &app,
        Method::PATCH,
        &format!("/resources/{}", bio_id),
        Some(json!({ "tags": ["Biology", "exam"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["tags"], json!(["Biology", "exam"]));

    let (_, hits) = send(&app, Method::GET, "/resources/search?q=biol", None).await;
    let titles: Vec<&str> = hits
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Mitosis"]);

    let (_, tagged) = send(&app, Method::GET, "/resources?tag=EXAM", None).await;
    assert_eq!(tagged.as_array().unwrap().len(), 1);

    let (_, limited) = send(&app, Method::GET, "/resources?limit=1", None).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
    let (_, recent) = send(&app, Method::GET, "/resources/recent", None).await;
    assert_eq!(recent.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn reviews_quizzes_and_sessions_feed_the_stats() {
    let app = app();
    let created = create(&app, "Organelles", "mitochondria and nuclei").await;
    let id = created["id"].as_str().unwrap();
    let ready = wait_for_status(&app, id, "ready").await;
    let card_id = ready["flashcards"][0]["id"].as_str().unwrap();

    let (status, card) = send(
        &app,
        Method::PUT,
        &format!("/resources/{}/flashcards/{}", id, card_id),
        Some(json!({ "status": "mastered" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["status"], "mastered");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/resources/{}/flashcards/{}", id, card_id),
        Some(json!({ "status": "expert" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, score) = send(
        &app,
        Method::POST,
        &format!("/resources/{}/quiz/attempts", id),
        Some(json!({ "answers": [1, 1] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(score, json!({ "correct": 1, "total": 2, "percent": 50.0 }));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/resources/{}/quiz/attempts", id),
        Some(json!({ "answers": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/activity/sessions",
        Some(json!({ "minutes": 90 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, stats) = send(&app, Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({ "streak": 1, "cardsLearned": 1, "quizScoreAvg": 50.0, "hoursLearned": 1.5 })
    );
}

#[tokio::test]
async fn chat_appends_to_the_resource_conversation() {
    let app = app();
    let created = create(&app, "Photosynthesis", "light to sugar").await;
    let id = created["id"].as_str().unwrap();
    wait_for_status(&app, id, "ready").await;

    let (status, reply) = send(
        &app,
        Method::POST,
        &format!("/resources/{}/chat", id),
        Some(json!({ "question": "Where does it happen?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["role"], "model");
    assert_eq!(
        reply["content"],
        "About Photosynthesis: Where does it happen? (0 earlier)"
    );

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/resources/{}/chat", id),
        Some(json!({ "question": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, log) = send(&app, Method::GET, &format!("/resources/{}/chat", id), None).await;
    let roles: Vec<&str> = log
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "model"]);
}

#[tokio::test]
async fn deleting_removes_the_resource_and_reprocess_restarts_generation() {
    let app = app();
    let created = create(&app, "Thermodynamics", "heat and work").await;
    let id = created["id"].as_str().unwrap();
    wait_for_status(&app, id, "ready").await;

    let (status, restarted) = send(
        &app,
        Method::POST,
        &format!("/resources/{}/reprocess", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(restarted["originalContent"], "heat and work");
    wait_for_status(&app, id, "ready").await;

    let (status, _) = send(&app, Method::DELETE, &format!("/resources/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/resources/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, remaining) = send(&app, Method::GET, "/resources", None).await;
    assert_eq!(remaining, json!([]));
}
