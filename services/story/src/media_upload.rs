use crate::config::S3Config;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use axum::http::Uri;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// Object name of a segment's audio asset under its story/segment prefix
const AUDIO_OBJECT_NAME: &str = "audio";

/// Errors raised while issuing an upload grant
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid {field} for object path: {value:?}")]
    InvalidPathComponent { field: &'static str, value: String },

    #[error("failed to presign upload for {path}: {message}")]
    Presign { path: String, message: String },
}

/// Short-lived write URL plus the stable read URL of the same object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadGrant {
    pub upload_url: String,
    pub public_url: String,
}

/// Mints presigned PUT URLs for segment media.
///
/// Stateless apart from the S3 client: it never consults the story store. Both
/// URLs it returns are cut from one signed request path, so whatever the write
/// URL targets is exactly what the read URL resolves to.
pub struct MediaUploadCoordinator {
    client: S3Client,
    bucket: String,
    public_url: String,
    endpoint_prefix: String,
    expiry: Duration,
}

impl MediaUploadCoordinator {
    pub fn new(client: S3Client, config: &S3Config, expiry: Duration) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            endpoint_prefix: endpoint_path_prefix(config.endpoint_url.as_deref()),
            expiry,
        }
    }

    /// Canonical object path of a segment's audio: `{storyId}/{segmentId}/audio`
    pub fn audio_object_path(story_id: &str, segment_id: &str) -> Result<String, UploadError> {
        validate_path_component("story id", story_id)?;
        validate_path_component("segment id", segment_id)?;

        Ok(format!("{story_id}/{segment_id}/{AUDIO_OBJECT_NAME}"))
    }

    /// Presign a PUT for the segment's audio object and pair it with its public URL
    #[instrument(skip(self))]
    pub async fn issue_audio_upload_url(
        &self,
        story_id: &str,
        segment_id: &str,
    ) -> Result<UploadGrant, UploadError> {
        let object_path = Self::audio_object_path(story_id, segment_id)?;

        let result = self.presign_put(&object_path).await;
        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                metrics::counter!("media.upload_grants.failed").increment(1);
                error!(error = %e, "Failed to presign audio upload");
                return Err(e);
            }
        };

        metrics::counter!("media.upload_grants.issued").increment(1);
        debug!(
            object_path = %object_path,
            expiry_secs = self.expiry.as_secs(),
            "Issued audio upload grant"
        );

        Ok(grant)
    }

    /// Sign against the service endpoint, then move the URL onto the public host
    async fn presign_put(&self, object_path: &str) -> Result<UploadGrant, UploadError> {
        let presign_error = |message: String| UploadError::Presign {
            path: object_path.to_string(),
            message,
        };

        let presigning_config =
            PresigningConfig::expires_in(self.expiry).map_err(|e| presign_error(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(object_path)
            .presigned(presigning_config)
            .await
            .map_err(|e| presign_error(e.to_string()))?;

        let uri: Uri = presigned
            .uri()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| presign_error(e.to_string()))?;

        // signed path is `{endpoint prefix}/{bucket}/{key}`, public host serves `/{bucket}/{key}`
        let path = uri.path();
        let path = path.strip_prefix(self.endpoint_prefix.as_str()).unwrap_or(path);
        let upload_url = match uri.query() {
            Some(query) => format!("{}{}?{}", self.public_url, path, query),
            None => format!("{}{}", self.public_url, path),
        };

        Ok(UploadGrant {
            upload_url,
            public_url: format!("{}{}", self.public_url, path),
        })
    }
}

/// Path of a custom endpoint without its trailing slash, empty when it has none
fn endpoint_path_prefix(endpoint_url: Option<&str>) -> String {
    endpoint_url
        .and_then(|url| url.parse::<Uri>().ok())
        .map(|uri| uri.path().trim_end_matches('/').to_string())
        .unwrap_or_default()
}

/// Object paths are built from caller-supplied identities; reject only what
/// would change the path's shape
fn validate_path_component(field: &'static str, value: &str) -> Result<(), UploadError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control());

    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidPathComponent {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store;
    use crate::testing;

    #[test]
    fn test_audio_object_path() {
        let path = MediaUploadCoordinator::audio_object_path("abc123", "seg_1").unwrap();
        assert_eq!(path, "abc123/seg_1/audio");
    }

    #[test]
    fn test_audio_object_path_keeps_opaque_segment_ids() {
        for segment in ["seg.1", "intro~v2", "a..b", "take 2"] {
            let path = MediaUploadCoordinator::audio_object_path("abc", segment).unwrap();
            assert_eq!(path, format!("abc/{segment}/audio"));
        }
    }

    #[test]
    fn test_audio_object_path_rejects_path_tricks() {
        let cases = [
            ("..", "s"),
            (".", "s"),
            ("a/b", "s"),
            ("a", ""),
            ("a", "s?x=1"),
            ("a", "s#frag"),
            ("a", "s%2F"),
            ("a", "s\\t"),
            ("a", "s\n"),
        ];

        for (story, segment) in cases {
            let result = MediaUploadCoordinator::audio_object_path(story, segment);
            assert!(
                matches!(result, Err(UploadError::InvalidPathComponent { .. })),
                "accepted {story:?}/{segment:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_public_url_trims_trailing_slash() {
        let mut config = testing::s3_config();
        config.public_url = "http://localhost:4566/".to_string();
        let coordinator = MediaUploadCoordinator::new(
            object_store::client_from_parts(&config),
            &config,
            Duration::from_secs(900),
        );

        let grant = coordinator.issue_audio_upload_url("s", "g").await.unwrap();
        assert_eq!(grant.public_url, "http://localhost:4566/rosetta/s/g/audio");
        assert!(grant
            .upload_url
            .starts_with("http://localhost:4566/rosetta/s/g/audio?"));
    }

    #[tokio::test]
    async fn test_dotted_segment_id_keeps_paths_aligned() {
        let coordinator = testing::upload_coordinator();

        let grant = coordinator
            .issue_audio_upload_url("story1", "seg.1")
            .await
            .unwrap();

        assert_eq!(
            grant.public_url,
            "http://localhost:4566/rosetta/story1/seg.1/audio"
        );
        let upload: Uri = grant.upload_url.parse().unwrap();
        let public: Uri = grant.public_url.parse().unwrap();
        assert_eq!(upload.path(), public.path());
    }

    #[tokio::test]
    async fn test_endpoint_path_prefix_is_not_published() {
        let mut config = testing::s3_config();
        config.endpoint_url = Some("http://gateway:8080/s3/".to_string());
        let coordinator = MediaUploadCoordinator::new(
            object_store::client_from_parts(&config),
            &config,
            Duration::from_secs(900),
        );

        let grant = coordinator.issue_audio_upload_url("s", "g").await.unwrap();

        assert_eq!(grant.public_url, "http://localhost:4566/rosetta/s/g/audio");
        let upload: Uri = grant.upload_url.parse().unwrap();
        assert_eq!(upload.path(), "/rosetta/s/g/audio");
        assert!(upload.query().unwrap().contains("X-Amz-Signature="));
    }

    #[test]
    fn test_endpoint_path_prefix() {
        assert_eq!(endpoint_path_prefix(None), "");
        assert_eq!(endpoint_path_prefix(Some("http://localstack:4566")), "");
        assert_eq!(endpoint_path_prefix(Some("http://localstack:4566/")), "");
        assert_eq!(endpoint_path_prefix(Some("http://gw/s3/")), "/s3");
    }

    #[tokio::test]
    async fn test_issue_audio_upload_url() {
        let coordinator = testing::upload_coordinator();

        let grant = coordinator
            .issue_audio_upload_url("story1", "segment1")
            .await
            .unwrap();

        assert_eq!(
            grant.public_url,
            "http://localhost:4566/rosetta/story1/segment1/audio"
        );
        assert!(grant
            .upload_url
            .starts_with("http://localhost:4566/rosetta/story1/segment1/audio?"));
        assert!(!grant.upload_url.contains("localstack"));
        assert!(grant.upload_url.contains("X-Amz-Signature="));
        assert!(grant.upload_url.contains("X-Amz-Expires=900"));
    }

    #[tokio::test]
    async fn test_upload_and_public_url_share_object_path() {
        let coordinator = testing::upload_coordinator();

        let grant = coordinator
            .issue_audio_upload_url("story1", "segment1")
            .await
            .unwrap();

        let upload: Uri = grant.upload_url.parse().unwrap();
        let public: Uri = grant.public_url.parse().unwrap();

        assert_eq!(upload.path(), public.path());
        assert_eq!(upload.authority(), public.authority());
        assert!(upload.path().ends_with("story1/segment1/audio"));
    }

    #[tokio::test]
    async fn test_repeated_grants_share_public_url() {
        let coordinator = testing::upload_coordinator();

        let first = coordinator.issue_audio_upload_url("s", "g").await.unwrap();
        let second = coordinator.issue_audio_upload_url("s", "g").await.unwrap();

        assert_eq!(first.public_url, second.public_url);

        let first_uri: Uri = first.upload_url.parse().unwrap();
        let second_uri: Uri = second.upload_url.parse().unwrap();
        assert_eq!(first_uri.path(), second_uri.path());
    }

    #[tokio::test]
    async fn test_grant_json_keeps_ampersands() {
        let coordinator = testing::upload_coordinator();
        let grant = coordinator.issue_audio_upload_url("s", "g").await.unwrap();

        let json = serde_json::to_string(&grant).unwrap();
        assert!(json.contains("&X-Amz-"));
        assert!(!json.contains("\\u0026"));
    }

    #[tokio::test]
    async fn test_invalid_ids_never_reach_presigner() {
        let coordinator = testing::upload_coordinator();

        let result = coordinator.issue_audio_upload_url("../etc", "g").await;
        assert!(matches!(
            result,
            Err(UploadError::InvalidPathComponent { field: "story id", .. })
        ));
    }
}
