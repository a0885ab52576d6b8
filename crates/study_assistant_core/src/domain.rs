//! crates/study_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::validation::ValidationError;

/// Timestamps are stored as milliseconds since the Unix epoch.
pub type EpochMillis = i64;

//=========================================================================================
// Enumerations
//=========================================================================================

/// The kind of study material a resource was created from. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Youtube,
    Pdf,
    Text,
    Audio,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Youtube => "YOUTUBE",
            ResourceType::Pdf => "PDF",
            ResourceType::Text => "TEXT",
            ResourceType::Audio => "AUDIO",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YOUTUBE" => Ok(ResourceType::Youtube),
            "PDF" => Ok(ResourceType::Pdf),
            "TEXT" => Ok(ResourceType::Text),
            "AUDIO" => Ok(ResourceType::Audio),
            _ => Err(ValidationError::UnknownValue {
                field: "type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    Processing,
    Ready,
    Error,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Processing => "processing",
            ResourceStatus::Ready => "ready",
            ResourceStatus::Error => "error",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ResourceStatus::Processing),
            "ready" => Ok(ResourceStatus::Ready),
            "error" => Ok(ResourceStatus::Error),
            _ => Err(ValidationError::UnknownValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlashcardStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl FlashcardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashcardStatus::New => "new",
            FlashcardStatus::Learning => "learning",
            FlashcardStatus::Mastered => "mastered",
        }
    }
}

impl FromStr for FlashcardStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(FlashcardStatus::New),
            "learning" => Ok(FlashcardStatus::Learning),
            "mastered" => Ok(FlashcardStatus::Mastered),
            _ => Err(ValidationError::UnknownValue {
                field: "flashcard status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

impl FromStr for ChatRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "model" => Ok(ChatRole::Model),
            _ => Err(ValidationError::UnknownValue {
                field: "role",
                value: s.to_string(),
            }),
        }
    }
}

//=========================================================================================
// Entities
//=========================================================================================

/// A unit of uploaded study material together with its derived artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub resource_type: ResourceType,
    /// Full extracted text or transcript. Never rewritten after creation.
    pub original_content: String,
    /// Markdown summary, empty until generation completes.
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
    pub created_at: EpochMillis,
    pub last_accessed: EpochMillis,
    pub status: ResourceStatus,
    pub tags: BTreeSet<String>,
}

impl Resource {
    /// Builds a freshly ingested resource in the `processing` state.
    pub fn new_processing(
        resource_type: ResourceType,
        title: impl Into<String>,
        original_content: impl Into<String>,
        now: EpochMillis,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            resource_type,
            original_content: original_content.into(),
            summary: String::new(),
            flashcards: Vec::new(),
            quiz: Vec::new(),
            created_at: now,
            last_accessed: now,
            status: ResourceStatus::Processing,
            tags: BTreeSet::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ResourceStatus::Ready
    }

    /// Overwrites summary, flashcards and quiz in one step.
    pub fn set_derived(&mut self, derived: DerivedArtifacts) {
        self.summary = derived.summary;
        self.flashcards = derived.flashcards;
        self.quiz = derived.quiz;
    }

    pub fn flashcard(&self, card_id: Uuid) -> Option<&Flashcard> {
        self.flashcards.iter().find(|c| c.id == card_id)
    }

    pub fn flashcard_mut(&mut self, card_id: Uuid) -> Option<&mut Flashcard> {
        self.flashcards.iter_mut().find(|c| c.id == card_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    pub status: FlashcardStatus,
}

impl From<FlashcardDraft> for Flashcard {
    fn from(draft: FlashcardDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            front: draft.front,
            back: draft.back,
            status: FlashcardStatus::New,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_answer: usize,
    pub explanation: String,
}

impl From<QuizQuestionDraft> for QuizQuestion {
    fn from(draft: QuizQuestionDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: draft.question,
            options: draft.options,
            correct_answer: draft.correct_answer,
            explanation: draft.explanation,
        }
    }
}

/// One entry of a resource's conversation log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: EpochMillis,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>, timestamp: EpochMillis) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// Aggregate learning statistics, derived on demand and never persisted per resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub streak: u32,
    pub cards_learned: u32,
    pub quiz_score_avg: f64,
    pub hours_learned: f64,
}

//=========================================================================================
// Generator Payloads
//=========================================================================================

/// A flashcard as returned by the generator, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardDraft {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

/// Summary, flashcards and quiz produced from a resource's raw content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtifactBundle {
    pub summary: String,
    pub flashcards: Vec<FlashcardDraft>,
    pub quiz: Vec<QuizQuestionDraft>,
}

/// The derived fields of a resource, written together by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedArtifacts {
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
}

impl From<ArtifactBundle> for DerivedArtifacts {
    fn from(bundle: ArtifactBundle) -> Self {
        Self {
            summary: bundle.summary,
            flashcards: bundle.flashcards.into_iter().map(Flashcard::from).collect(),
            quiz: bundle.quiz.into_iter().map(QuizQuestion::from).collect(),
        }
    }
}

//=========================================================================================
// Partial Updates
//=========================================================================================

/// A partial update merged into an existing resource by `ResourceStore::update`.
/// Fields left as `None` are untouched.
#[derive(Debug, Clone, Default)]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub summary: Option<String>,
    pub flashcards: Option<Vec<Flashcard>>,
    pub quiz: Option<Vec<QuizQuestion>>,
}

impl ResourcePatch {
    pub fn touches_derived_fields(&self) -> bool {
        self.summary.is_some() || self.flashcards.is_some() || self.quiz.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none() && !self.touches_derived_fields()
    }

    pub(crate) fn apply_to(self, resource: &mut Resource) {
        if let Some(title) = self.title {
            resource.title = title;
        }
        if let Some(tags) = self.tags {
            resource.tags = tags;
        }
        if let Some(summary) = self.summary {
            resource.summary = summary;
        }
        if let Some(flashcards) = self.flashcards {
            resource.flashcards = flashcards;
        }
        if let Some(quiz) = self.quiz {
            resource.quiz = quiz;
        }
    }
}
