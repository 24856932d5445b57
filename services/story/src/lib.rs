//! Story Service
//!
//! Persists multimedia stories, ordered segments each carrying optional script
//! text, an image reference and an audio reference, and hands clients
//! short-lived presigned URLs for uploading segment audio straight to object
//! storage.
//!
//! ## Features
//!
//! - **Story documents**: create, replace and delete a story as one document;
//!   segment identities are assigned once and kept across edits
//! - **Read-after-write**: updates return the document as persisted
//! - **Presigned uploads**: PUT URLs for `{storyId}/{segmentId}/audio`, rewritten
//!   to the public storage host, paired with the stable public read URL
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!   HTTP ─────────────▶│ Story API    │
//!                      └──────────────┘
//!                         │        │
//!                         ▼        ▼
//!              ┌──────────────┐  ┌──────────────┐
//!              │ Story        │  │ Media Upload │
//!              │ Repository   │  │ Coordinator  │
//!              └──────────────┘  └──────────────┘
//!                     │                 │
//!                     ▼                 ▼
//!              ┌──────────────┐  ┌──────────────┐
//!              │ PostgreSQL   │  │ S3 presigner │
//!              │ stories      │  │ {bucket}/... │
//!              └──────────────┘  └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod media_upload;
pub mod object_store;
pub mod story;
pub mod story_repository;
pub mod story_store;

#[cfg(test)]
mod testing;

pub use api::{create_router, start_api_server, AppState};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use media_upload::{MediaUploadCoordinator, UploadError, UploadGrant};
pub use story::{CreateStory, Segment, SegmentId, Story, StoryChanges, StoryId, UpdateStory};
pub use story_repository::{RepositoryError, StoryRepository};
pub use story_store::{PgStoryStore, StoryStore};
