//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_assistant_core::{
    ports::{ArtifactGenerator, ChatRepository, ResourceRepository, SessionFlag, TutorService},
    ActivityLog, ChatService, Clock, ResourceStore, ResourceView,
};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ResourceStore>,
    pub view: Arc<ResourceView>,
    pub chat: Arc<ChatService>,
    pub activity: Arc<ActivityLog>,
    pub session: Arc<dyn SessionFlag>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the core services together over the given adapters.
    pub fn new(
        config: Arc<Config>,
        repo: Arc<dyn ResourceRepository>,
        chats: Arc<dyn ChatRepository>,
        generator: Arc<dyn ArtifactGenerator>,
        tutor: Arc<dyn TutorService>,
        session: Arc<dyn SessionFlag>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(ResourceStore::new(repo, chats.clone(), generator, clock));
        let view = Arc::new(ResourceView::new(store.clone()));
        let chat = Arc::new(ChatService::new(store.clone(), chats, tutor));
        Self {
            store,
            view,
            chat,
            activity: Arc::new(ActivityLog::new()),
            session,
            config,
        }
    }
}
