use chrono::{DateTime, SubsecRound, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Returned when a story identifier is not a valid hex identity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid story id: {0:?}")]
pub struct InvalidStoryId(pub String);

/// Story identity, rendered as 32 lowercase hex characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoryId(Uuid);

impl StoryId {
    /// Generate a fresh, globally unique story identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a story identity from its textual form
    pub fn parse(value: &str) -> Result<Self, InvalidStoryId> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| InvalidStoryId(value.to_string()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for StoryId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for StoryId {
    type Err = InvalidStoryId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl Serialize for StoryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StoryId::parse(&raw).map_err(de::Error::custom)
    }
}

/// Segment identity, unique within its story.
///
/// Opaque to the service: a value echoed back by a client is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    /// Generate a fresh segment identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SegmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to an uploaded audio asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audio {
    #[serde(default)]
    pub url: String,
}

/// Reference to an image asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub url: String,
}

/// Script text for a segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub text: String,
}

/// One ordered unit of a story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
}

/// A persisted story document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    pub created_at: DateTime<Utc>,
    pub is_published: bool,
}

impl Story {
    /// Build a new story with a fresh identity and creation time
    pub fn new(title: String, segments: Vec<Segment>, is_published: bool) -> Self {
        Self {
            id: StoryId::generate(),
            title,
            segments,
            // Postgres keeps microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
            is_published,
        }
    }
}

/// Segment as received from a client; the identity may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SegmentInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub audio: Option<Audio>,
    #[serde(default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub script: Option<Script>,
}

impl SegmentInput {
    /// Resolve into a stored segment, generating an identity only when unset or empty
    pub fn into_segment(self) -> Segment {
        let id = match self.id {
            Some(id) if !id.is_empty() => SegmentId::from(id),
            _ => SegmentId::generate(),
        };

        Segment {
            id,
            audio: self.audio,
            image: self.image,
            script: self.script,
        }
    }
}

/// Request body for creating a story. `id` and `created_at` are ignored if sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub segments: Option<Vec<SegmentInput>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_published: bool,
}

/// Request body for replacing a story's mutable fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub segments: Option<Vec<SegmentInput>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_published: bool,
}

/// An explicit JSON `null` reads the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Typed partial update: the only fields an update may touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryChanges {
    pub title: String,
    pub segments: Vec<Segment>,
    pub is_published: bool,
}

/// Resolve segment inputs in order, assigning identities where absent
pub fn resolve_segments(inputs: Vec<SegmentInput>) -> Vec<Segment> {
    inputs.into_iter().map(SegmentInput::into_segment).collect()
}
