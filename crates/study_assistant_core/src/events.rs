//! crates/study_assistant_core/src/events.rs
//!
//! Mutation notifications published by the resource store.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::EpochMillis;

/// Capacity of the store's event channel. Subscribers that fall further
/// behind than this see `Lagged` and must drop whatever they cached.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Created(Uuid),
    Updated(Uuid),
    Deleted(Uuid),
    /// Only `last_accessed` changed, to `at` or the creation time if later.
    Accessed { id: Uuid, at: EpochMillis },
}

impl StoreEvent {
    pub fn resource_id(&self) -> Uuid {
        match self {
            StoreEvent::Created(id)
            | StoreEvent::Updated(id)
            | StoreEvent::Deleted(id)
            | StoreEvent::Accessed { id, .. } => *id,
        }
    }
}

/// Sending half shared by the store and the lifecycle controller.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
