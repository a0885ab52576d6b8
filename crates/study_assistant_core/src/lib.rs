pub mod chat;
pub mod clock;
pub mod domain;
pub mod events;
pub mod lifecycle;
pub mod memory;
pub mod ports;
pub mod projection;
pub mod stats;
pub mod store;
pub mod validation;

pub use chat::ChatService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    ArtifactBundle, ChatMessage, ChatRole, DerivedArtifacts, EpochMillis, Flashcard,
    FlashcardDraft, FlashcardStatus, QuizQuestion, QuizQuestionDraft, Resource, ResourcePatch,
    ResourceStatus, ResourceType, UserStats,
};
pub use events::StoreEvent;
pub use lifecycle::{GenerationOutcome, LifecycleController};
pub use ports::{
    ArtifactGenerator, ChatRepository, GenerationFailure, PortError, PortResult,
    ResourceRepository, SessionFlag, TutorService,
};
pub use projection::ResourceView;
pub use stats::{ActivityLog, QuizScore, StudyEvent, StudyEventKind};
pub use store::{GenerationHandle, ResourceStore};
pub use validation::ValidationError;
