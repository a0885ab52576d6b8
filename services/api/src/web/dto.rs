//! services/api/src/web/dto.rs
//!
//! Request and response payloads for the REST API. Field names are camelCase on
//! the wire; enum values use the same strings as the stored records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use study_assistant_core::{
    ChatMessage, Flashcard, QuizQuestion, QuizScore, Resource, ResourcePatch, UserStats,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardDto {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    /// One of `new`, `learning`, `mastered`.
    pub status: String,
}

impl From<Flashcard> for FlashcardDto {
    fn from(card: Flashcard) -> Self {
        Self {
            id: card.id,
            front: card.front,
            back: card.back,
            status: card.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionDto {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_answer: usize,
    pub explanation: String,
}

impl From<QuizQuestion> for QuizQuestionDto {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
        }
    }
}

/// A resource as shown to the client.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDto {
    pub id: Uuid,
    pub title: String,
    /// One of `YOUTUBE`, `PDF`, `TEXT`, `AUDIO`.
    #[serde(rename = "type")]
    pub resource_type: String,
    pub original_content: String,
    pub summary: String,
    pub flashcards: Vec<FlashcardDto>,
    pub quiz: Vec<QuizQuestionDto>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub last_accessed: i64,
    /// One of `processing`, `ready`, `error`.
    pub status: String,
    pub tags: Vec<String>,
}

impl From<Resource> for ResourceDto {
    fn from(r: Resource) -> Self {
        Self {
            id: r.id,
            title: r.title,
            resource_type: r.resource_type.as_str().to_string(),
            original_content: r.original_content,
            summary: r.summary,
            flashcards: r.flashcards.into_iter().map(FlashcardDto::from).collect(),
            quiz: r.quiz.into_iter().map(QuizQuestionDto::from).collect(),
            created_at: r.created_at,
            last_accessed: r.last_accessed,
            status: r.status.as_str().to_string(),
            tags: r.tags.into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDto {
    pub id: Uuid,
    /// `user` or `model`.
    pub role: String,
    pub content: String,
    pub timestamp: i64,
}

impl From<ChatMessage> for ChatMessageDto {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            role: m.role.as_str().to_string(),
            content: m.content,
            timestamp: m.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizScoreDto {
    pub correct: usize,
    pub total: usize,
    pub percent: f64,
}

impl From<QuizScore> for QuizScoreDto {
    fn from(s: QuizScore) -> Self {
        Self {
            correct: s.correct,
            total: s.total,
            percent: s.percent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsDto {
    pub streak: u32,
    pub cards_learned: u32,
    pub quiz_score_avg: f64,
    pub hours_learned: f64,
}

impl From<UserStats> for UserStatsDto {
    fn from(s: UserStats) -> Self {
        Self {
            streak: s.streak,
            cards_learned: s.cards_learned,
            quiz_score_avg: s.quiz_score_avg,
            hours_learned: s.hours_learned,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionDto {
    pub authenticated: bool,
}

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    /// One of `YOUTUBE`, `PDF`, `TEXT`, `AUDIO` (case-insensitive).
    #[serde(rename = "type")]
    pub resource_type: String,
    pub title: String,
    /// Extracted text or transcript to study.
    pub raw_input: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Only accepted once the resource is ready.
    pub summary: Option<String>,
}

impl From<UpdateResourceRequest> for ResourcePatch {
    fn from(req: UpdateResourceRequest) -> Self {
        ResourcePatch {
            title: req.title,
            tags: req
                .tags
                .map(|tags| tags.into_iter().collect::<BTreeSet<String>>()),
            summary: req.summary,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewFlashcardRequest {
    /// One of `new`, `learning`, `mastered`.
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuizAttemptRequest {
    /// One chosen option index per quiz question, in quiz order.
    pub answers: Vec<usize>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudySessionRequest {
    pub minutes: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Return at most this many of the newest resources.
    pub limit: Option<usize>,
    /// Only resources carrying this tag.
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Matched case-insensitively against titles and tags.
    #[serde(default)]
    pub q: String,
}
