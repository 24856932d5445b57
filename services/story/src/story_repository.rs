use crate::story::{
    resolve_segments, CreateStory, InvalidStoryId, Story, StoryChanges, StoryId, UpdateStory,
};
use crate::story_store::StoryStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors surfaced by the story repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    InvalidId(#[from] InvalidStoryId),

    #[error("story {0} not found")]
    NotFound(StoryId),

    #[error("document store failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// Owns the story aggregate: create, update and delete whole documents.
///
/// Segment identities are assigned here, on first sight of a segment without
/// one, and never regenerated afterwards.
pub struct StoryRepository {
    store: Arc<dyn StoryStore>,
}

impl StoryRepository {
    pub fn new(store: Arc<dyn StoryStore>) -> Self {
        Self { store }
    }

    /// Persist a new story with a fresh identity and creation time
    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateStory) -> Result<Story, RepositoryError> {
        let segments = resolve_segments(request.segments.unwrap_or_default());
        let story = Story::new(request.title, segments, request.is_published);

        self.store.insert(&story).await?;

        metrics::counter!("stories.created").increment(1);
        info!(story_id = %story.id, segment_count = story.segments.len(), "Story created");

        Ok(story)
    }

    /// Replace title, segments and publication flag, then return what was stored
    #[instrument(skip(self, request))]
    pub async fn update(&self, id: &str, request: UpdateStory) -> Result<Story, RepositoryError> {
        let id = StoryId::parse(id)?;

        let changes = StoryChanges {
            title: request.title,
            segments: resolve_segments(request.segments.unwrap_or_default()),
            is_published: request.is_published,
        };

        let matched = self.store.update(id, &changes).await?;
        if matched == 0 {
            debug!(story_id = %id, "Update matched no story");
        }

        let story = self.store.find(id).await?.ok_or_else(|| {
            warn!(story_id = %id, "Story missing after update");
            RepositoryError::NotFound(id)
        })?;

        metrics::counter!("stories.updated").increment(1);
        info!(story_id = %id, segment_count = story.segments.len(), "Story updated");

        Ok(story)
    }

    /// Remove a story; removing an unknown story is not an error
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let id = StoryId::parse(id)?;

        let removed = self.store.delete(id).await?;

        metrics::counter!("stories.deleted").increment(1);
        info!(story_id = %id, removed, "Story deleted");

        Ok(())
    }

    /// Check the backing store is reachable
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.store.ping().await.map_err(RepositoryError::from)
    }
}
