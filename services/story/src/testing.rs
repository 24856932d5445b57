//! Test doubles shared by unit tests across modules.

use crate::config::S3Config;
use crate::media_upload::MediaUploadCoordinator;
use crate::object_store;
use crate::story::{Story, StoryChanges, StoryId};
use crate::story_store::StoryStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Story store kept in a map, last write wins like the real one
#[derive(Default)]
pub struct InMemoryStoryStore {
    stories: Mutex<HashMap<StoryId, Story>>,
}

impl InMemoryStoryStore {
    pub fn story_count(&self) -> usize {
        self.stories.lock().unwrap().len()
    }
}

#[async_trait]
impl StoryStore for InMemoryStoryStore {
    async fn insert(&self, story: &Story) -> Result<()> {
        self.stories.lock().unwrap().insert(story.id, story.clone());
        Ok(())
    }

    async fn update(&self, id: StoryId, changes: &StoryChanges) -> Result<u64> {
        let mut stories = self.stories.lock().unwrap();
        match stories.get_mut(&id) {
            Some(story) => {
                story.title = changes.title.clone();
                story.segments = changes.segments.clone();
                story.is_published = changes.is_published;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find(&self, id: StoryId) -> Result<Option<Story>> {
        Ok(self.stories.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: StoryId) -> Result<u64> {
        Ok(self.stories.lock().unwrap().remove(&id).map_or(0, |_| 1))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// S3 settings pointing at a LocalStack-style endpoint with static credentials
pub fn s3_config() -> S3Config {
    S3Config {
        bucket: "rosetta".to_string(),
        region: "us-east-1".to_string(),
        endpoint_url: Some("http://localstack:4566".to_string()),
        public_url: "http://localhost:4566".to_string(),
        access_key_id: Some("test".to_string()),
        secret_access_key: Some("test".to_string()),
        presigned_url_expiry_secs: 900,
        create_bucket: false,
    }
}

/// Coordinator that presigns offline against [`s3_config`]
pub fn upload_coordinator() -> MediaUploadCoordinator {
    let config = s3_config();
    let client = object_store::client_from_parts(&config);
    MediaUploadCoordinator::new(client, &config, Duration::from_secs(900))
}
