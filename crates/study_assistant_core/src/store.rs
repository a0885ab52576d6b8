//! crates/study_assistant_core/src/store.rs
//!
//! The resource store: the single owner of every `Resource`. Views receive
//! clones; all mutation goes through the methods here or through the
//! lifecycle controller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{
    Flashcard, FlashcardStatus, Resource, ResourcePatch, ResourceStatus, ResourceType,
};
use crate::events::{EventBus, StoreEvent};
use crate::lifecycle::{GenerationOutcome, LifecycleController};
use crate::ports::{
    ArtifactGenerator, ChatRepository, GenerationFailure, PortError, PortResult,
    ResourceRepository,
};
use crate::validation::ValidationError;

/// A running generation for one resource.
pub struct GenerationHandle {
    pub resource_id: Uuid,
    token: CancellationToken,
    join: JoinHandle<GenerationOutcome>,
}

impl GenerationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the generation task to finish and reports what it did.
    pub async fn wait(self) -> PortResult<GenerationOutcome> {
        self.join
            .await
            .map_err(|e| PortError::Unexpected(format!("Generation task failed: {}", e)))
    }
}

type InFlight = Arc<Mutex<HashMap<Uuid, (u64, CancellationToken)>>>;

pub struct ResourceStore {
    repo: Arc<dyn ResourceRepository>,
    chats: Arc<dyn ChatRepository>,
    generator: Arc<dyn ArtifactGenerator>,
    clock: Arc<dyn Clock>,
    controller: LifecycleController,
    events: EventBus,
    in_flight: InFlight,
    next_ticket: AtomicU64,
}

impl ResourceStore {
    pub fn new(
        repo: Arc<dyn ResourceRepository>,
        chats: Arc<dyn ChatRepository>,
        generator: Arc<dyn ArtifactGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::new();
        let controller = LifecycleController::new(repo.clone(), events.clone());
        Self {
            repo,
            chats,
            generator,
            clock,
            controller,
            events,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    //=====================================================================================
    // Create / Read
    //=====================================================================================

    /// Creates a resource in `processing` and starts generating its artifacts
    /// in the background. Returns without waiting for generation.
    pub async fn create(
        &self,
        resource_type: ResourceType,
        title: &str,
        raw_input: &str,
    ) -> PortResult<Resource> {
        let (resource, _handle) = self.create_tracked(resource_type, title, raw_input).await?;
        Ok(resource)
    }

    /// Like [`ResourceStore::create`] but also hands back the generation handle.
    pub async fn create_tracked(
        &self,
        resource_type: ResourceType,
        title: &str,
        raw_input: &str,
    ) -> PortResult<(Resource, GenerationHandle)> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::Rejected("Title must not be empty".to_string()).into());
        }
        let resource =
            Resource::new_processing(resource_type, title, raw_input, self.clock.now_millis());
        self.repo.insert(resource.clone()).await?;
        info!(
            "Created {} resource {} ('{}')",
            resource.resource_type, resource.id, resource.title
        );
        self.events.publish(StoreEvent::Created(resource.id));

        let handle = self.spawn_generation(&resource).await;
        Ok((resource, handle))
    }

    pub async fn get(&self, id: Uuid) -> PortResult<Resource> {
        self.repo.get(id).await
    }

    /// Every resource, in no guaranteed order.
    pub async fn list(&self) -> PortResult<Vec<Resource>> {
        self.repo.list().await
    }

    //=====================================================================================
    // Mutation
    //=====================================================================================

    /// Marks a resource as opened now. Unknown ids are ignored.
    pub async fn touch(&self, id: Uuid) -> PortResult<()> {
        let at = self.clock.now_millis();
        if self.repo.set_last_accessed(id, at).await? {
            self.events.publish(StoreEvent::Accessed { id, at });
        } else {
            debug!("Ignoring touch for unknown resource {}", id);
        }
        Ok(())
    }

    /// Merges a partial update into an existing resource.
    ///
    /// Summary, flashcards and quiz may only be replaced on a `ready`
    /// resource, and the result must still satisfy the ready invariants.
    pub async fn update(&self, id: Uuid, patch: ResourcePatch) -> PortResult<Resource> {
        check_patch(&patch)?;
        let expected = patch
            .touches_derived_fields()
            .then_some(ResourceStatus::Ready);
        if let Some(resource) = self.repo.patch_if_status(id, patch, expected).await? {
            self.events.publish(StoreEvent::Updated(id));
            return Ok(resource);
        }
        // Nothing written: either the resource is gone or it is not ready.
        self.repo.get(id).await?;
        Err(ValidationError::Rejected(format!(
            "Derived fields of resource {} can only change once it is ready",
            id
        ))
        .into())
    }

    /// Sets the review status of one flashcard on a `ready` resource. Only that
    /// card is written.
    pub async fn review_flashcard(
        &self,
        id: Uuid,
        card_id: Uuid,
        status: FlashcardStatus,
    ) -> PortResult<Flashcard> {
        if self.repo.set_flashcard_status(id, card_id, status).await? {
            self.events.publish(StoreEvent::Updated(id));
            let resource = self.repo.get(id).await?;
            let mut card = resource
                .flashcard(card_id)
                .cloned()
                .ok_or_else(|| card_not_found(id, card_id))?;
            // A later review may already have landed; report this one.
            card.status = status;
            return Ok(card);
        }

        let resource = self.repo.get(id).await?;
        if resource.status != ResourceStatus::Ready {
            return Err(ValidationError::Rejected(format!(
                "Flashcards of resource {} can only be reviewed once it is ready",
                id
            ))
            .into());
        }
        Err(card_not_found(id, card_id))
    }

    /// Deletes a resource and its conversation log. A generation still in
    /// flight for it is cancelled; if its result arrives anyway it is dropped.
    pub async fn delete(&self, id: Uuid) -> PortResult<()> {
        if let Some((_, token)) = self.in_flight.lock().await.remove(&id) {
            token.cancel();
            info!("Cancelled in-flight generation for resource {}", id);
        }
        if !self.repo.remove(id).await? {
            return Err(PortError::NotFound(format!("Resource {} not found", id)));
        }
        self.chats.clear(id).await?;
        info!("Deleted resource {}", id);
        self.events.publish(StoreEvent::Deleted(id));
        Ok(())
    }

    /// Regenerates the artifacts of a `ready` or `error` resource from its
    /// original content.
    pub async fn reprocess(&self, id: Uuid) -> PortResult<GenerationHandle> {
        let resource = self.controller.restart(id).await?;
        Ok(self.spawn_generation(&resource).await)
    }

    //=====================================================================================
    // Background Generation
    //=====================================================================================

    async fn spawn_generation(&self, resource: &Resource) -> GenerationHandle {
        let id = resource.id;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.in_flight.lock().await.insert(id, (ticket, token.clone()));

        let generator = self.generator.clone();
        let controller = self.controller.clone();
        let in_flight = self.in_flight.clone();
        let raw_input = resource.original_content.clone();
        let resource_type = resource.resource_type;
        let task_token = token.clone();

        let join = tokio::spawn(async move {
            let result = tokio::select! {
                _ = task_token.cancelled() => None,
                result = generator.generate(&raw_input, resource_type) => Some(result),
            };

            let cancelled = result.is_none();
            let result = result
                .unwrap_or_else(|| Err(GenerationFailure::new("Generation was cancelled")));
            if cancelled {
                info!("Generation for resource {} was cancelled", id);
            }

            let outcome = match controller.complete(id, result).await {
                Ok(GenerationOutcome::Discarded) if cancelled => GenerationOutcome::Cancelled,
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Failed to apply generation result for {}: {:?}", id, e);
                    GenerationOutcome::Failed(e.to_string())
                }
            };

            let mut in_flight = in_flight.lock().await;
            if matches!(in_flight.get(&id), Some((t, _)) if *t == ticket) {
                in_flight.remove(&id);
            }
            outcome
        });

        GenerationHandle {
            resource_id: id,
            token,
            join,
        }
    }

    /// Number of generations that have not finished yet.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

fn card_not_found(id: Uuid, card_id: Uuid) -> PortError {
    PortError::NotFound(format!("Flashcard {} not found in resource {}", card_id, id))
}

fn check_patch(patch: &ResourcePatch) -> PortResult<()> {
    if let Some(title) = &patch.title {
        if title.trim().is_empty() {
            return Err(ValidationError::Rejected("Title must not be empty".to_string()).into());
        }
    }
    if let Some(summary) = &patch.summary {
        if summary.trim().is_empty() {
            return Err(ValidationError::EmptySummary.into());
        }
    }
    if let Some(flashcards) = &patch.flashcards {
        if flashcards.is_empty() {
            return Err(ValidationError::NoFlashcards.into());
        }
        if let Some(i) = flashcards
            .iter()
            .position(|c| c.front.trim().is_empty() || c.back.trim().is_empty())
        {
            return Err(ValidationError::BlankFlashcard { index: i }.into());
        }
    }
    if let Some(quiz) = &patch.quiz {
        for (i, q) in quiz.iter().enumerate() {
            q.validate(i)?;
        }
    }
    Ok(())
}
