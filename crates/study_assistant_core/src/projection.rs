//! crates/study_assistant_core/src/projection.rs
//!
//! Read-only views over the resource store used by the dashboard, the
//! sidebar, the tag filter and the search box.
//!
//! Search ranking, best first:
//!   0. title equals the query
//!   1. title starts with the query
//!   2. title contains the query
//!   3. only a tag contains the query
//! Ties are broken by `created_at` descending, then by id. All comparisons
//! are case-insensitive.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::Resource;
use crate::events::StoreEvent;
use crate::ports::PortResult;
use crate::store::ResourceStore;

//=========================================================================================
// Pure Projections
//=========================================================================================

/// The `n` most recently created resources, newest first.
pub fn recent(mut resources: Vec<Resource>, n: usize) -> Vec<Resource> {
    resources.sort_by_key(|r| (Reverse(r.created_at), r.id));
    resources.truncate(n);
    resources
}

fn rank(resource: &Resource, needle: &str) -> Option<u8> {
    let title = resource.title.to_lowercase();
    if title == needle {
        Some(0)
    } else if title.starts_with(needle) {
        Some(1)
    } else if title.contains(needle) {
        Some(2)
    } else if resource
        .tags
        .iter()
        .any(|tag| tag.to_lowercase().contains(needle))
    {
        Some(3)
    } else {
        None
    }
}

/// Case-insensitive substring search over titles and tags.
/// A blank query matches everything, newest first.
pub fn search(resources: Vec<Resource>, query: &str) -> Vec<Resource> {
    let needle = query.trim().to_lowercase();
    let mut hits: Vec<(u8, Resource)> = resources
        .into_iter()
        .filter_map(|r| {
            if needle.is_empty() {
                Some((0, r))
            } else {
                rank(&r, &needle).map(|score| (score, r))
            }
        })
        .collect();
    hits.sort_by_key(|(score, r)| (*score, Reverse(r.created_at), r.id));
    hits.into_iter().map(|(_, r)| r).collect()
}

/// Resources carrying `tag` (case-insensitive, exact), newest first.
pub fn with_tag(resources: Vec<Resource>, tag: &str) -> Vec<Resource> {
    let wanted = tag.trim().to_lowercase();
    let mut hits: Vec<Resource> = resources
        .into_iter()
        .filter(|r| r.tags.iter().any(|t| t.to_lowercase() == wanted))
        .collect();
    hits.sort_by_key(|r| (Reverse(r.created_at), r.id));
    hits
}

//=========================================================================================
// Store-backed View
//=========================================================================================

struct ProjectionCache {
    entries: HashMap<Uuid, Resource>,
    events: broadcast::Receiver<StoreEvent>,
}

impl ProjectionCache {
    /// Drops every entry the store has reported as changed since the last call.
    /// Access-time changes are applied to the cached entry instead.
    fn invalidate(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(StoreEvent::Accessed { id, at }) => {
                    if let Some(entry) = self.entries.get_mut(&id) {
                        entry.last_accessed = at.max(entry.created_at);
                    }
                }
                Ok(event) => {
                    self.entries.remove(&event.resource_id());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!("Projection cache lagged by {} events; clearing", skipped);
                    self.entries.clear();
                }
                Err(TryRecvError::Closed) => {
                    self.entries.clear();
                    break;
                }
            }
        }
    }
}

/// Projections over a live store, with a per-resource cache for `by_id`.
pub struct ResourceView {
    store: Arc<ResourceStore>,
    cache: Mutex<ProjectionCache>,
}

impl ResourceView {
    pub fn new(store: Arc<ResourceStore>) -> Self {
        let events = store.subscribe();
        Self {
            store,
            cache: Mutex::new(ProjectionCache {
                entries: HashMap::new(),
                events,
            }),
        }
    }

    pub async fn recent(&self, n: usize) -> PortResult<Vec<Resource>> {
        Ok(recent(self.store.list().await?, n))
    }

    pub async fn search(&self, query: &str) -> PortResult<Vec<Resource>> {
        Ok(search(self.store.list().await?, query))
    }

    pub async fn with_tag(&self, tag: &str) -> PortResult<Vec<Resource>> {
        Ok(with_tag(self.store.list().await?, tag))
    }

    /// Single-resource lookup, served from the cache when the store has not
    /// reported a change to that resource since it was cached.
    pub async fn by_id(&self, id: Uuid) -> PortResult<Resource> {
        let mut cache = self.cache.lock().await;
        cache.invalidate();
        if let Some(hit) = cache.entries.get(&id) {
            return Ok(hit.clone());
        }
        let resource = self.store.get(id).await?;
        cache.entries.insert(id, resource.clone());
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::domain::{
        ArtifactBundle, DerivedArtifacts, EpochMillis, FlashcardStatus, ResourcePatch,
        ResourceStatus, ResourceType,
    };
    use crate::memory::{InMemoryChatRepository, InMemoryResourceRepository};
    use crate::ports::{ArtifactGenerator, GenerationFailure, ResourceRepository};
    use async_trait::async_trait;

    struct NeverGenerator;

    #[async_trait]
    impl ArtifactGenerator for NeverGenerator {
        async fn generate(
            &self,
            _raw_input: &str,
            _resource_type: ResourceType,
        ) -> Result<ArtifactBundle, GenerationFailure> {
            futures::future::pending().await
        }
    }

    fn resource(title: &str, created_at: i64, tags: &[&str]) -> Resource {
        let mut r = Resource::new_processing(ResourceType::Text, title, "", created_at);
        r.tags = tags.iter().map(|t| t.to_string()).collect();
        r
    }

    #[test]
    fn recent_returns_newest_first_and_truncates() {
        let all: Vec<Resource> = [30, 10, 80, 50, 20, 70, 60, 40]
            .iter()
            .map(|t| resource(&format!("R{}", t), *t, &[]))
            .collect();
        let top = recent(all, 5);
        let times: Vec<i64> = top.iter().map(|r| r.created_at).collect();
        assert_eq!(times, vec![80, 70, 60, 50, 40]);
    }

    #[test]
    fn search_ranks_title_matches_above_tag_matches() {
        let all = vec![
            resource("Cell biology", 1, &[]),
            resource("Organic chemistry", 2, &["Biology-adjacent"]),
            resource("Biology", 3, &[]),
            resource("Biology midterm", 4, &[]),
            resource("History", 5, &["europe"]),
        ];
        let titles: Vec<String> = search(all, "BIOLOGY")
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Biology",
                "Biology midterm",
                "Cell biology",
                "Organic chemistry"
            ]
        );
    }

    #[test]
    fn blank_search_returns_everything_newest_first() {
        let all = vec![resource("A", 1, &[]), resource("B", 2, &[])];
        let titles: Vec<String> = search(all, "  ").into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn tag_filter_matches_whole_tags_only() {
        let all = vec![
            resource("Mitosis", 1, &["Biology", "exam"]),
            resource("Enzymes", 2, &["biology"]),
            resource("Ecology", 3, &["biology-2"]),
        ];
        let titles: Vec<String> = with_tag(all, " BIOLOGY ")
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Enzymes", "Mitosis"]);
    }

    #[tokio::test]
    async fn recent_over_store_with_eight_resources() {
        let clock = Arc::new(ManualClock::starting_at(0));
        let store = Arc::new(ResourceStore::new(
            Arc::new(InMemoryResourceRepository::new()),
            Arc::new(InMemoryChatRepository::new()),
            Arc::new(NeverGenerator),
            clock.clone(),
        ));
        let mut created = Vec::new();
        for i in 0..8 {
            clock.advance(1_000);
            created.push(
                store
                    .create(ResourceType::Text, &format!("Doc {}", i), "raw")
                    .await
                    .unwrap(),
            );
        }
        let view = ResourceView::new(store);
        let top = view.recent(5).await.unwrap();
        let expected: Vec<Uuid> = created.iter().rev().take(5).map(|r| r.id).collect();
        assert_eq!(top.iter().map(|r| r.id).collect::<Vec<_>>(), expected);
        assert!(top.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }

    #[tokio::test]
    async fn by_id_cache_is_invalidated_by_store_mutations() {
        let store = Arc::new(ResourceStore::new(
            Arc::new(InMemoryResourceRepository::new()),
            Arc::new(InMemoryChatRepository::new()),
            Arc::new(NeverGenerator),
            Arc::new(ManualClock::starting_at(10)),
        ));
        let view = ResourceView::new(store.clone());
        let created = store.create(ResourceType::Pdf, "Old title", "raw").await.unwrap();

        assert_eq!(view.by_id(created.id).await.unwrap().title, "Old title");

        store
            .update(
                created.id,
                ResourcePatch {
                    title: Some("New title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.by_id(created.id).await.unwrap().title, "New title");

        store.delete(created.id).await.unwrap();
        assert!(view.by_id(created.id).await.is_err());
    }

    /// Counts reads so a test can tell a cache hit from a store read.
    struct CountingRepository {
        inner: InMemoryResourceRepository,
        gets: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ResourceRepository for CountingRepository {
        async fn insert(&self, resource: Resource) -> PortResult<()> {
            self.inner.insert(resource).await
        }
        async fn get(&self, id: Uuid) -> PortResult<Resource> {
            self.gets.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.get(id).await
        }
        async fn list(&self) -> PortResult<Vec<Resource>> {
            self.inner.list().await
        }
        async fn patch_if_status(
            &self,
            id: Uuid,
            patch: ResourcePatch,
            expected: Option<ResourceStatus>,
        ) -> PortResult<Option<Resource>> {
            self.inner.patch_if_status(id, patch, expected).await
        }
        async fn set_derived_if_status(
            &self,
            id: Uuid,
            derived: DerivedArtifacts,
            status: ResourceStatus,
            expected: ResourceStatus,
        ) -> PortResult<bool> {
            self.inner
                .set_derived_if_status(id, derived, status, expected)
                .await
        }
        async fn set_flashcard_status(
            &self,
            id: Uuid,
            card_id: Uuid,
            status: FlashcardStatus,
        ) -> PortResult<bool> {
            self.inner.set_flashcard_status(id, card_id, status).await
        }
        async fn set_last_accessed(&self, id: Uuid, at: EpochMillis) -> PortResult<bool> {
            self.inner.set_last_accessed(id, at).await
        }
        async fn remove(&self, id: Uuid) -> PortResult<bool> {
            self.inner.remove(id).await
        }
    }

    #[tokio::test]
    async fn opening_a_resource_keeps_it_cached_with_fresh_access_time() {
        let repo = Arc::new(CountingRepository {
            inner: InMemoryResourceRepository::new(),
            gets: Default::default(),
        });
        let clock = Arc::new(ManualClock::starting_at(100));
        let store = Arc::new(ResourceStore::new(
            repo.clone(),
            Arc::new(InMemoryChatRepository::new()),
            Arc::new(NeverGenerator),
            clock.clone(),
        ));
        let view = ResourceView::new(store.clone());
        let created = store.create(ResourceType::Text, "Notes", "raw").await.unwrap();

        view.by_id(created.id).await.unwrap();
        let reads = repo.gets.load(std::sync::atomic::Ordering::SeqCst);

        for _ in 0..3 {
            clock.advance(50);
            store.touch(created.id).await.unwrap();
            let opened = view.by_id(created.id).await.unwrap();
            assert_eq!(opened.last_accessed, clock.now_millis());
        }
        assert_eq!(repo.gets.load(std::sync::atomic::Ordering::SeqCst), reads);
        assert_eq!(
            store.get(created.id).await.unwrap().last_accessed,
            clock.now_millis()
        );
    }
}
