//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ResourceRepository` and `ChatRepository` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use study_assistant_core::domain::{
    ChatMessage, DerivedArtifacts, EpochMillis, Flashcard, FlashcardStatus, QuizQuestion,
    Resource, ResourcePatch, ResourceStatus,
};
use study_assistant_core::ports::{ChatRepository, PortError, PortResult, ResourceRepository};
use uuid::Uuid;

const RESOURCE_COLUMNS: &str = "id, title, resource_type, original_content, summary, flashcards, \
     quiz, created_at, last_accessed, status, tags";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize)]
struct StoredFlashcard {
    id: Uuid,
    front: String,
    back: String,
    status: String,
}

impl StoredFlashcard {
    fn from_domain(card: &Flashcard) -> Self {
        Self {
            id: card.id,
            front: card.front.clone(),
            back: card.back.clone(),
            status: card.status.as_str().to_string(),
        }
    }

    fn to_domain(self) -> PortResult<Flashcard> {
        Ok(Flashcard {
            id: self.id,
            front: self.front,
            back: self.back,
            status: self.status.parse()?,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredQuizQuestion {
    id: Uuid,
    question: String,
    options: Vec<String>,
    correct_answer: usize,
    explanation: String,
}

impl StoredQuizQuestion {
    fn from_domain(q: &QuizQuestion) -> Self {
        Self {
            id: q.id,
            question: q.question.clone(),
            options: q.options.clone(),
            correct_answer: q.correct_answer,
            explanation: q.explanation.clone(),
        }
    }

    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id,
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
    }
}

fn stored_flashcards(cards: &[Flashcard]) -> Json<Vec<StoredFlashcard>> {
    Json(cards.iter().map(StoredFlashcard::from_domain).collect())
}

fn stored_quiz(quiz: &[QuizQuestion]) -> Json<Vec<StoredQuizQuestion>> {
    Json(quiz.iter().map(StoredQuizQuestion::from_domain).collect())
}

#[derive(FromRow)]
struct ResourceRecord {
    id: Uuid,
    title: String,
    resource_type: String,
    original_content: String,
    summary: String,
    flashcards: Json<Vec<StoredFlashcard>>,
    quiz: Json<Vec<StoredQuizQuestion>>,
    created_at: i64,
    last_accessed: i64,
    status: String,
    tags: Vec<String>,
}

impl ResourceRecord {
    fn to_domain(self) -> PortResult<Resource> {
        Ok(Resource {
            id: self.id,
            title: self.title,
            resource_type: self.resource_type.parse()?,
            original_content: self.original_content,
            summary: self.summary,
            flashcards: self
                .flashcards
                .0
                .into_iter()
                .map(StoredFlashcard::to_domain)
                .collect::<PortResult<Vec<_>>>()?,
            quiz: self
                .quiz
                .0
                .into_iter()
                .map(StoredQuizQuestion::to_domain)
                .collect(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
            status: self.status.parse()?,
            tags: self.tags.into_iter().collect(),
        })
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    role: String,
    content: String,
    timestamp_ms: i64,
}

impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        Ok(ChatMessage {
            id: self.id,
            role: self.role.parse()?,
            content: self.content,
            timestamp: self.timestamp_ms,
        })
    }
}

//=========================================================================================
// `ResourceRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResourceRepository for DbAdapter {
    async fn insert(&self, resource: Resource) -> PortResult<()> {
        let tags: Vec<String> = resource.tags.iter().cloned().collect();
        sqlx::query(
            "INSERT INTO resources (id, title, resource_type, original_content, summary, \
             flashcards, quiz, created_at, last_accessed, status, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(resource.id)
        .bind(&resource.title)
        .bind(resource.resource_type.as_str())
        .bind(&resource.original_content)
        .bind(&resource.summary)
        .bind(stored_flashcards(&resource.flashcards))
        .bind(stored_quiz(&resource.quiz))
        .bind(resource.created_at)
        .bind(resource.last_accessed)
        .bind(resource.status.as_str())
        .bind(tags)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> PortResult<Resource> {
        let record = sqlx::query_as::<_, ResourceRecord>(&format!(
            "SELECT {} FROM resources WHERE id = $1",
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Resource {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }

    async fn list(&self) -> PortResult<Vec<Resource>> {
        let records = sqlx::query_as::<_, ResourceRecord>(&format!(
            "SELECT {} FROM resources ORDER BY created_at DESC",
            RESOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn patch_if_status(
        &self,
        id: Uuid,
        patch: ResourcePatch,
        expected: Option<ResourceStatus>,
    ) -> PortResult<Option<Resource>> {
        let tags: Option<Vec<String>> = patch.tags.map(|tags| tags.into_iter().collect());
        let record = sqlx::query_as::<_, ResourceRecord>(&format!(
            "UPDATE resources SET title = COALESCE($2, title), tags = COALESCE($3, tags), \
             summary = COALESCE($4, summary), flashcards = COALESCE($5, flashcards), \
             quiz = COALESCE($6, quiz) \
             WHERE id = $1 AND ($7::text IS NULL OR status = $7) \
             RETURNING {}",
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .bind(patch.title)
        .bind(tags)
        .bind(patch.summary)
        .bind(patch.flashcards.as_deref().map(stored_flashcards))
        .bind(patch.quiz.as_deref().map(stored_quiz))
        .bind(expected.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn set_derived_if_status(
        &self,
        id: Uuid,
        derived: DerivedArtifacts,
        status: ResourceStatus,
        expected: ResourceStatus,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE resources SET summary = $2, flashcards = $3, quiz = $4, status = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(id)
        .bind(&derived.summary)
        .bind(stored_flashcards(&derived.flashcards))
        .bind(stored_quiz(&derived.quiz))
        .bind(status.as_str())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_flashcard_status(
        &self,
        id: Uuid,
        card_id: Uuid,
        status: FlashcardStatus,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE resources SET flashcards = ( \
                 SELECT jsonb_agg( \
                     CASE WHEN card->>'id' = $2::text \
                          THEN jsonb_set(card, '{status}', to_jsonb($3::text)) \
                          ELSE card END \
                     ORDER BY ord) \
                 FROM jsonb_array_elements(flashcards) WITH ORDINALITY AS cards(card, ord)) \
             WHERE id = $1 AND status = 'ready' \
               AND flashcards @> jsonb_build_array(jsonb_build_object('id', $2::text))",
        )
        .bind(id)
        .bind(card_id.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_last_accessed(&self, id: Uuid, at: EpochMillis) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE resources SET last_accessed = GREATEST($2, created_at) WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }
}

//=========================================================================================
// `ChatRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatRepository for DbAdapter {
    async fn append(&self, resource_id: Uuid, message: ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, resource_id, role, content, timestamp_ms) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(resource_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn history(&self, resource_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, role, content, timestamp_ms FROM chat_messages \
             WHERE resource_id = $1 ORDER BY seq ASC",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn clear(&self, resource_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM chat_messages WHERE resource_id = $1")
            .bind(resource_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
