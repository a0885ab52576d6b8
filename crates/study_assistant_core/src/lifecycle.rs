//! crates/study_assistant_core/src/lifecycle.rs
//!
//! The resource lifecycle state machine.
//!
//! ```text
//!   processing ──(valid bundle)──▶ ready
//!        │
//!        └──(failure / invalid)──▶ error
//! ```
//!
//! `ready` and `error` are terminal for a generation cycle. Only an explicit
//! [`LifecycleController::restart`] puts a resource back into `processing`.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ArtifactBundle, DerivedArtifacts, Resource, ResourceStatus};
use crate::events::{EventBus, StoreEvent};
use crate::ports::{GenerationFailure, PortError, PortResult, ResourceRepository};
use crate::validation::ValidationError;

/// What became of a generation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The bundle was valid and the resource is now `ready`.
    Ready,
    /// The generator failed or returned an invalid bundle; the resource is now `error`.
    Failed(String),
    /// The resource was deleted or left `processing` before the result arrived.
    Discarded,
    /// The generation was cancelled before it produced a result.
    Cancelled,
}

#[derive(Clone)]
pub struct LifecycleController {
    repo: Arc<dyn ResourceRepository>,
    events: EventBus,
}

impl LifecycleController {
    pub fn new(repo: Arc<dyn ResourceRepository>, events: EventBus) -> Self {
        Self { repo, events }
    }

    /// Applies a generator result to the resource it was requested for.
    ///
    /// The write is a compare-and-update on `processing`: a result for a
    /// resource that no longer exists, or that has already left `processing`,
    /// is dropped. Summary, flashcards, quiz and status land in one write.
    pub async fn complete(
        &self,
        id: Uuid,
        result: Result<ArtifactBundle, GenerationFailure>,
    ) -> PortResult<GenerationOutcome> {
        let (derived, status, outcome) = match result {
            Ok(bundle) => match bundle.validate() {
                Ok(()) => (
                    DerivedArtifacts::from(bundle),
                    ResourceStatus::Ready,
                    GenerationOutcome::Ready,
                ),
                Err(e) => {
                    warn!("Rejecting generated artifacts for resource {}: {}", id, e);
                    (
                        DerivedArtifacts::default(),
                        ResourceStatus::Error,
                        GenerationOutcome::Failed(e.to_string()),
                    )
                }
            },
            Err(failure) => {
                warn!("Generation failed for resource {}: {}", id, failure.reason);
                let kept = failure
                    .partial
                    .map(|partial| DerivedArtifacts::from(partial.salvage()))
                    .unwrap_or_default();
                (kept, ResourceStatus::Error, GenerationOutcome::Failed(failure.reason))
            }
        };

        let applied = self
            .repo
            .set_derived_if_status(id, derived, status, ResourceStatus::Processing)
            .await?;
        if !applied {
            info!(
                "Discarding generation result for resource {}: deleted or no longer processing",
                id
            );
            return Ok(GenerationOutcome::Discarded);
        }

        info!("Resource {} transitioned to {}", id, status);
        self.events.publish(StoreEvent::Updated(id));
        Ok(outcome)
    }

    /// Starts a fresh processing cycle: derived fields are cleared and the
    /// status goes back to `processing`. `original_content` is kept.
    pub async fn restart(&self, id: Uuid) -> PortResult<Resource> {
        let resource = self.repo.get(id).await?;
        let prior = resource.status;
        if prior == ResourceStatus::Processing {
            return Err(ValidationError::Rejected(format!(
                "Resource {} is already processing",
                id
            ))
            .into());
        }
        let applied = self
            .repo
            .set_derived_if_status(
                id,
                DerivedArtifacts::default(),
                ResourceStatus::Processing,
                prior,
            )
            .await?;
        if !applied {
            return Err(PortError::Unexpected(format!(
                "Resource {} changed while restarting",
                id
            )));
        }
        info!("Resource {} moved from {} back to processing", id, prior);
        self.events.publish(StoreEvent::Updated(id));
        self.repo.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlashcardDraft, QuizQuestionDraft, ResourcePatch, ResourceType};
    use crate::memory::InMemoryResourceRepository;
    use tracing_test::traced_test;

    fn bundle(correct_answer: usize) -> ArtifactBundle {
        ArtifactBundle {
            summary: "# Photosynthesis\nPlants turn light into sugar.".to_string(),
            flashcards: vec![FlashcardDraft {
                front: "What is chlorophyll?".to_string(),
                back: "A pigment that absorbs light.".to_string(),
            }],
            quiz: vec![QuizQuestionDraft {
                question: "Where does photosynthesis happen?".to_string(),
                options: vec!["A", "B", "C", "D"].into_iter().map(String::from).collect(),
                correct_answer,
                explanation: "Chloroplasts.".to_string(),
            }],
        }
    }

    async fn setup() -> (LifecycleController, Arc<InMemoryResourceRepository>, Resource) {
        let repo = Arc::new(InMemoryResourceRepository::new());
        let controller = LifecycleController::new(repo.clone(), EventBus::new());
        let resource =
            Resource::new_processing(ResourceType::Text, "Bio", "photosynthesis notes", 1);
        repo.insert(resource.clone()).await.unwrap();
        (controller, repo, resource)
    }

    #[tokio::test]
    async fn valid_bundle_makes_resource_ready() {
        let (controller, repo, resource) = setup().await;
        let outcome = controller.complete(resource.id, Ok(bundle(2))).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::Ready);

        let stored = repo.get(resource.id).await.unwrap();
        assert_eq!(stored.status, ResourceStatus::Ready);
        assert_eq!(stored.flashcards.len(), 1);
        assert_eq!(stored.quiz[0].correct_answer, 2);
        assert_eq!(stored.created_at, resource.created_at);
    }

    #[tokio::test]
    #[traced_test]
    async fn out_of_range_answer_routes_to_error_without_storing_bundle() {
        let (controller, repo, resource) = setup().await;
        let outcome = controller.complete(resource.id, Ok(bundle(7))).await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Failed(_)));

        let stored = repo.get(resource.id).await.unwrap();
        assert_eq!(stored.status, ResourceStatus::Error);
        assert!(stored.summary.is_empty());
        assert!(stored.quiz.is_empty());
        assert_eq!(stored.original_content, "photosynthesis notes");
        assert!(logs_contain("Rejecting generated artifacts"));
    }

    #[tokio::test]
    async fn failure_keeps_original_content_and_salvaged_partial() {
        let (controller, repo, resource) = setup().await;
        let mut partial = bundle(9);
        partial.summary = "# Partial".to_string();
        let failure = GenerationFailure::with_partial("upstream timeout", partial);

        let outcome = controller.complete(resource.id, Err(failure)).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::Failed("upstream timeout".to_string()));

        let stored = repo.get(resource.id).await.unwrap();
        assert_eq!(stored.status, ResourceStatus::Error);
        assert_eq!(stored.original_content, "photosynthesis notes");
        assert_eq!(stored.summary, "# Partial");
        assert_eq!(stored.flashcards.len(), 1);
        assert!(stored.quiz.is_empty());
    }

    #[tokio::test]
    async fn completion_leaves_user_fields_alone() {
        let (controller, repo, resource) = setup().await;
        let tags = ["biology".to_string()].into_iter().collect();
        repo.patch_if_status(
            resource.id,
            ResourcePatch {
                tags: Some(tags),
                ..Default::default()
            },
            Some(ResourceStatus::Processing),
        )
        .await
        .unwrap();

        controller.complete(resource.id, Ok(bundle(1))).await.unwrap();
        let stored = repo.get(resource.id).await.unwrap();
        assert!(stored.tags.contains("biology"));
        assert!(stored.is_ready());
    }

    #[tokio::test]
    async fn result_for_deleted_resource_is_discarded() {
        let (controller, repo, resource) = setup().await;
        repo.remove(resource.id).await.unwrap();
        let outcome = controller.complete(resource.id, Ok(bundle(0))).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::Discarded);
        assert!(matches!(
            repo.get(resource.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn terminal_states_are_not_left_by_late_results() {
        let (controller, repo, resource) = setup().await;
        controller
            .complete(resource.id, Err(GenerationFailure::new("boom")))
            .await
            .unwrap();
        let outcome = controller.complete(resource.id, Ok(bundle(1))).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::Discarded);
        assert_eq!(
            repo.get(resource.id).await.unwrap().status,
            ResourceStatus::Error
        );
    }

    #[tokio::test]
    async fn restart_clears_derived_fields_and_refuses_double_start() {
        let (controller, repo, resource) = setup().await;
        assert!(controller.restart(resource.id).await.is_err());

        controller.complete(resource.id, Ok(bundle(0))).await.unwrap();
        let restarted = controller.restart(resource.id).await.unwrap();
        assert_eq!(restarted.status, ResourceStatus::Processing);
        assert!(restarted.summary.is_empty());
        assert!(restarted.flashcards.is_empty());
        assert_eq!(
            repo.get(resource.id).await.unwrap().original_content,
            "photosynthesis notes"
        );
    }
}
