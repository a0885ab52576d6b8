//! crates/study_assistant_core/src/chat.rs
//!
//! Per-resource tutoring conversations. Each exchange appends the user's
//! question and the tutor's reply to the resource's append-only log.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{ChatMessage, ChatRole};
use crate::ports::{ChatRepository, PortResult, TutorService};
use crate::store::ResourceStore;
use crate::validation::ValidationError;

pub struct ChatService {
    store: Arc<ResourceStore>,
    chats: Arc<dyn ChatRepository>,
    tutor: Arc<dyn TutorService>,
}

impl ChatService {
    pub fn new(
        store: Arc<ResourceStore>,
        chats: Arc<dyn ChatRepository>,
        tutor: Arc<dyn TutorService>,
    ) -> Self {
        Self {
            store,
            chats,
            tutor,
        }
    }

    /// The conversation log for a resource, oldest first.
    pub async fn history(&self, resource_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        self.store.get(resource_id).await?;
        self.chats.history(resource_id).await
    }

    /// Asks the tutor a question about a ready resource and returns its reply.
    ///
    /// The question is logged before the tutor is called, so a failed call
    /// leaves the question in the log without an answer.
    pub async fn ask(&self, resource_id: Uuid, question: &str) -> PortResult<ChatMessage> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::Rejected("Question must not be empty".to_string()).into());
        }
        let resource = self.store.get(resource_id).await?;
        if !resource.is_ready() {
            return Err(ValidationError::Rejected(format!(
                "Resource {} is {}; chat needs a ready resource",
                resource_id, resource.status
            ))
            .into());
        }

        let history = self.chats.history(resource_id).await?;
        let clock = self.store.clock();
        self.chats
            .append(
                resource_id,
                ChatMessage::new(ChatRole::User, question, clock.now_millis()),
            )
            .await?;

        let answer = self
            .tutor
            .reply(&resource, &history, question)
            .await
            .map_err(|e| {
                error!("Tutor failed to answer for resource {}: {:?}", resource_id, e);
                e
            })?;

        let reply = ChatMessage::new(ChatRole::Model, answer, clock.now_millis());
        self.chats.append(resource_id, reply.clone()).await?;
        info!(
            "Answered question for resource {} ({} prior messages)",
            resource_id,
            history.len()
        );
        Ok(reply)
    }
}
