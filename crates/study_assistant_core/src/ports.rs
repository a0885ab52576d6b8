//! crates/study_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    ArtifactBundle, ChatMessage, DerivedArtifacts, EpochMillis, FlashcardStatus, Resource,
    ResourcePatch, ResourceStatus, ResourceType,
};
use crate::validation::ValidationError;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Generation failed: {0}")]
    GenerationFailure(String),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failure reported by an `ArtifactGenerator`.
///
/// `partial` carries whatever content the generator managed to produce before
/// failing, if anything.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct GenerationFailure {
    pub reason: String,
    pub partial: Option<ArtifactBundle>,
}

impl GenerationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            partial: None,
        }
    }

    pub fn with_partial(reason: impl Into<String>, partial: ArtifactBundle) -> Self {
        Self {
            reason: reason.into(),
            partial: Some(partial),
        }
    }
}

impl From<GenerationFailure> for PortError {
    fn from(failure: GenerationFailure) -> Self {
        PortError::GenerationFailure(failure.reason)
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for the resource collection, keyed by id.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn insert(&self, resource: Resource) -> PortResult<()>;

    async fn get(&self, id: Uuid) -> PortResult<Resource>;

    async fn list(&self) -> PortResult<Vec<Resource>>;

    /// Merges `patch` into the stored resource in one step. Fields the patch
    /// leaves as `None` keep their stored values. When `expected` is given the
    /// write happens only if the stored status equals it. Returns the resource
    /// as written, or `None` when nothing was written.
    async fn patch_if_status(
        &self,
        id: Uuid,
        patch: ResourcePatch,
        expected: Option<ResourceStatus>,
    ) -> PortResult<Option<Resource>>;

    /// Writes the derived fields and a new status in one step, only if the
    /// resource still exists and is in `expected`. Other fields are left alone.
    /// Returns whether the write happened.
    async fn set_derived_if_status(
        &self,
        id: Uuid,
        derived: DerivedArtifacts,
        status: ResourceStatus,
        expected: ResourceStatus,
    ) -> PortResult<bool>;

    /// Sets the review status of one flashcard in place, only if the resource
    /// exists, is `ready` and still holds that card. Other cards and fields are
    /// left alone. Returns whether the write happened.
    async fn set_flashcard_status(
        &self,
        id: Uuid,
        card_id: Uuid,
        status: FlashcardStatus,
    ) -> PortResult<bool>;

    /// Sets `last_accessed` if the resource exists. Returns whether it did.
    async fn set_last_accessed(&self, id: Uuid, at: EpochMillis) -> PortResult<bool>;

    /// Removes a resource. Returns whether anything was removed.
    async fn remove(&self, id: Uuid) -> PortResult<bool>;
}

/// Append-only conversation logs, one per resource.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append(&self, resource_id: Uuid, message: ChatMessage) -> PortResult<()>;

    /// Messages in the order they were appended.
    async fn history(&self, resource_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    async fn clear(&self, resource_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Turns raw content into a summary, flashcards and a quiz.
    /// May take tens of seconds; callers must not await it on a request path.
    async fn generate(
        &self,
        raw_input: &str,
        resource_type: ResourceType,
    ) -> Result<ArtifactBundle, GenerationFailure>;
}

#[async_trait]
pub trait TutorService: Send + Sync {
    /// Answers a question about a resource, given the conversation so far.
    async fn reply(
        &self,
        resource: &Resource,
        history: &[ChatMessage],
        question: &str,
    ) -> PortResult<String>;
}

/// The "authenticated" UI gate. Not a security boundary.
#[async_trait]
pub trait SessionFlag: Send + Sync {
    async fn is_authenticated(&self) -> PortResult<bool>;

    async fn login(&self) -> PortResult<()>;

    async fn logout(&self) -> PortResult<()>;
}
