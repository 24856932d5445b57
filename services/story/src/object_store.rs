use crate::config::S3Config;
use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info, instrument};

/// Region that rejects an explicit location constraint on bucket creation
const DEFAULT_REGION: &str = "us-east-1";

/// Build the S3 client from configuration, resolving credentials from the
/// default provider chain when no static keys are configured
pub async fn connect(config: &S3Config) -> Result<S3Client> {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let Some(credentials) = static_credentials(config) {
        loader = loader.credentials_provider(credentials);
    }

    let aws_config = loader.load().await;
    let client = S3Client::from_conf(apply_endpoint(S3ConfigBuilder::from(&aws_config), config));

    info!(
        bucket = %config.bucket,
        region = %config.region,
        endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
        "S3 client initialized"
    );

    Ok(client)
}

/// Build a client without touching the environment; needs static credentials
pub fn client_from_parts(config: &S3Config) -> S3Client {
    let mut builder = S3ConfigBuilder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let Some(credentials) = static_credentials(config) {
        builder = builder.credentials_provider(credentials);
    }

    S3Client::from_conf(apply_endpoint(builder, config))
}

/// Create the bucket unless it already exists
#[instrument(skip(client, config), fields(bucket = %config.bucket))]
pub async fn ensure_bucket(client: &S3Client, config: &S3Config) -> Result<()> {
    match client.head_bucket().bucket(&config.bucket).send().await {
        Ok(_) => {
            debug!("Bucket already exists");
            return Ok(());
        }
        Err(e) => {
            let missing = e
                .as_service_error()
                .map(|e| e.is_not_found())
                .unwrap_or(false);
            if !missing {
                return Err(e).context("Failed to check bucket");
            }
        }
    }

    let mut request = client.create_bucket().bucket(&config.bucket);
    if config.region != DEFAULT_REGION {
        request = request.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(config.region.as_str()))
                .build(),
        );
    }

    match request.send().await {
        Ok(_) => {
            info!("Bucket created");
            Ok(())
        }
        Err(e)
            if e.as_service_error()
                .map(|e| e.is_bucket_already_owned_by_you())
                .unwrap_or(false) =>
        {
            debug!("Bucket created concurrently");
            Ok(())
        }
        Err(e) => Err(e).context("Failed to create bucket"),
    }
}

fn static_credentials(config: &S3Config) -> Option<Credentials> {
    match (&config.access_key_id, &config.secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Some(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "story-service-static",
        )),
        _ => None,
    }
}

/// Point the client at a custom endpoint. Path-style addressing is always on,
/// public URLs are built as `{host}/{bucket}/{key}`.
fn apply_endpoint(builder: S3ConfigBuilder, config: &S3Config) -> aws_sdk_s3::Config {
    let builder = match config.endpoint_url {
        Some(ref endpoint_url) => builder.endpoint_url(endpoint_url),
        None => builder,
    };

    builder.force_path_style(true).build()
}
