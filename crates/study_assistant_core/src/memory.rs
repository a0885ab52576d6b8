//! crates/study_assistant_core/src/memory.rs
//!
//! In-process implementations of the persistence ports. Used when no database
//! is configured and as isolated stores in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    ChatMessage, DerivedArtifacts, EpochMillis, FlashcardStatus, Resource, ResourcePatch,
    ResourceStatus,
};
use crate::ports::{ChatRepository, PortError, PortResult, ResourceRepository, SessionFlag};

//=========================================================================================
// Resources
//=========================================================================================

/// Resources kept in a map behind a single lock. Every write happens under the
/// write guard, so readers never see a half-applied update.
#[derive(Default)]
pub struct InMemoryResourceRepository {
    resources: RwLock<HashMap<Uuid, Resource>>,
}

impl InMemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Resource {} not found", id))
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn insert(&self, resource: Resource) -> PortResult<()> {
        let mut resources = self.resources.write().await;
        if resources.contains_key(&resource.id) {
            return Err(PortError::Unexpected(format!(
                "Resource {} already exists",
                resource.id
            )));
        }
        resources.insert(resource.id, resource);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> PortResult<Resource> {
        self.resources
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self) -> PortResult<Vec<Resource>> {
        let mut all: Vec<Resource> = self.resources.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn patch_if_status(
        &self,
        id: Uuid,
        patch: ResourcePatch,
        expected: Option<ResourceStatus>,
    ) -> PortResult<Option<Resource>> {
        let mut resources = self.resources.write().await;
        match resources.get_mut(&id) {
            Some(resource) if expected.map_or(true, |s| resource.status == s) => {
                patch.apply_to(resource);
                Ok(Some(resource.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_derived_if_status(
        &self,
        id: Uuid,
        derived: DerivedArtifacts,
        status: ResourceStatus,
        expected: ResourceStatus,
    ) -> PortResult<bool> {
        let mut resources = self.resources.write().await;
        match resources.get_mut(&id) {
            Some(resource) if resource.status == expected => {
                resource.set_derived(derived);
                resource.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_flashcard_status(
        &self,
        id: Uuid,
        card_id: Uuid,
        status: FlashcardStatus,
    ) -> PortResult<bool> {
        let mut resources = self.resources.write().await;
        let card = resources
            .get_mut(&id)
            .filter(|r| r.status == ResourceStatus::Ready)
            .and_then(|r| r.flashcard_mut(card_id));
        match card {
            Some(card) => {
                card.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_last_accessed(&self, id: Uuid, at: EpochMillis) -> PortResult<bool> {
        let mut resources = self.resources.write().await;
        match resources.get_mut(&id) {
            Some(resource) => {
                resource.last_accessed = at.max(resource.created_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: Uuid) -> PortResult<bool> {
        Ok(self.resources.write().await.remove(&id).is_some())
    }
}

//=========================================================================================
// Chat Logs
//=========================================================================================

#[derive(Default)]
pub struct InMemoryChatRepository {
    logs: RwLock<HashMap<Uuid, Vec<ChatMessage>>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn append(&self, resource_id: Uuid, message: ChatMessage) -> PortResult<()> {
        self.logs
            .write()
            .await
            .entry(resource_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn history(&self, resource_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        Ok(self
            .logs
            .read()
            .await
            .get(&resource_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, resource_id: Uuid) -> PortResult<()> {
        self.logs.write().await.remove(&resource_id);
        Ok(())
    }
}

//=========================================================================================
// Session Flag
//=========================================================================================

#[derive(Debug, Default)]
pub struct InMemorySessionFlag {
    authenticated: AtomicBool,
}

impl InMemorySessionFlag {
    pub fn new(authenticated: bool) -> Self {
        Self {
            authenticated: AtomicBool::new(authenticated),
        }
    }
}

#[async_trait]
impl SessionFlag for InMemorySessionFlag {
    async fn is_authenticated(&self) -> PortResult<bool> {
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    async fn login(&self) -> PortResult<()> {
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> PortResult<()> {
        self.authenticated.store(false, Ordering::SeqCst);
        Ok(())
    }
}
