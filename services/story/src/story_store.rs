use crate::config::DatabaseConfig;
use crate::story::{Segment, Story, StoryChanges, StoryId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Document store holding one document per story.
///
/// Each call is a single round trip; atomicity is whatever the store gives a
/// single-document write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Insert a complete story document
    async fn insert(&self, story: &Story) -> Result<()>;

    /// Overwrite the mutable fields of a story, returning the number of matched documents
    async fn update(&self, id: StoryId, changes: &StoryChanges) -> Result<u64>;

    /// Fetch a story document
    async fn find(&self, id: StoryId) -> Result<Option<Story>>;

    /// Remove a story document, returning the number of removed documents
    async fn delete(&self, id: StoryId) -> Result<u64>;

    /// Cheap round trip used by readiness checks
    async fn ping(&self) -> Result<()>;
}

/// Row shape of the `stories` table
#[derive(Debug, FromRow)]
struct StoryRecord {
    id: Uuid,
    title: String,
    segments: Json<Vec<Segment>>,
    created_at: DateTime<Utc>,
    is_published: bool,
}

impl StoryRecord {
    fn into_story(self) -> Story {
        Story {
            id: StoryId::from(self.id),
            title: self.title,
            segments: self.segments.0,
            created_at: self.created_at,
            is_published: self.is_published,
        }
    }
}

/// PostgreSQL-backed story store; segments live in a JSONB document column
pub struct PgStoryStore {
    pool: PgPool,
}

impl PgStoryStore {
    /// Connect with a bounded connect timeout
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl StoryStore for PgStoryStore {
    #[instrument(skip(self, story), fields(story_id = %story.id))]
    async fn insert(&self, story: &Story) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stories (id, title, segments, created_at, is_published)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(story.id.as_uuid())
        .bind(&story.title)
        .bind(Json(&story.segments))
        .bind(story.created_at)
        .bind(story.is_published)
        .execute(&self.pool)
        .await
        .context("Failed to insert story")?;

        debug!(segment_count = story.segments.len(), "Story inserted");
        Ok(())
    }

    #[instrument(skip(self, changes), fields(story_id = %id))]
    async fn update(&self, id: StoryId, changes: &StoryChanges) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE stories
            SET title = $2, segments = $3, is_published = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&changes.title)
        .bind(Json(&changes.segments))
        .bind(changes.is_published)
        .execute(&self.pool)
        .await
        .context("Failed to update story")?;

        Ok(result.rows_affected())
    }

    async fn find(&self, id: StoryId) -> Result<Option<Story>> {
        let record = sqlx::query_as::<_, StoryRecord>(
            r#"
            SELECT id, title, segments, created_at, is_published
            FROM stories
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query story")?;

        Ok(record.map(StoryRecord::into_story))
    }

    #[instrument(skip(self), fields(story_id = %id))]
    async fn delete(&self, id: StoryId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .context("Failed to delete story")?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;

        Ok(())
    }
}
