use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Longest expiry S3 accepts for a presigned URL (7 days)
const MAX_PRESIGNED_URL_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Flat environment variables used by earlier deployments, mapped onto config keys
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("AWS_REGION", "s3.region"),
    ("AWS_ACCESS_KEY_ID", "s3.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "s3.secret_access_key"),
    ("S3_BUCKET", "s3.bucket"),
    ("S3_ENDPOINT", "s3.endpoint_url"),
    ("S3_PUBLIC_URL", "s3.public_url"),
];

/// Errors that can occur during configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// Main configuration for the story service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Object storage configuration
    pub s3: S3Config,
    /// Document store configuration
    pub database: DatabaseConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding story media
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Service endpoint the presigner signs against (LocalStack, MinIO, ...)
    pub endpoint_url: Option<String>,
    /// Externally reachable storage host handed to clients
    pub public_url: String,
    /// Static access key; the default credential chain is used when unset
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Presigned upload URL expiration in seconds
    #[serde(default = "default_presigned_url_expiry_secs")]
    pub presigned_url_expiry_secs: u64,
    /// Create the bucket at startup if it is missing
    #[serde(default = "default_true")]
    pub create_bucket: bool,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// Default value functions
fn default_service_name() -> String {
    "story-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presigned_url_expiry_secs() -> u64 {
    15 * 60
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        for (var, key) in LEGACY_ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_default(*key, value)?;
            }
        }

        let config = builder
            .add_source(config::File::with_name("config/story").required(false))
            .add_source(config::File::with_name("/etc/story/story").required(false))
            // STORY__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("STORY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the deserializer cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::MissingRequired("database.url".to_string()));
        }

        if self.s3.bucket.is_empty() {
            return Err(ConfigError::MissingRequired("s3.bucket".to_string()));
        }

        if self.s3.public_url.is_empty() {
            return Err(ConfigError::MissingRequired("s3.public_url".to_string()));
        }

        if self.s3.presigned_url_expiry_secs == 0
            || self.s3.presigned_url_expiry_secs > MAX_PRESIGNED_URL_EXPIRY_SECS
        {
            return Err(ConfigError::InvalidValue {
                key: "s3.presigned_url_expiry_secs".to_string(),
                message: format!("must be between 1 and {MAX_PRESIGNED_URL_EXPIRY_SECS}"),
            });
        }

        if self.s3.access_key_id.is_some() != self.s3.secret_access_key.is_some() {
            return Err(ConfigError::InvalidValue {
                key: "s3.access_key_id".to_string(),
                message: "access key and secret key must be set together".to_string(),
            });
        }

        Ok(())
    }

    /// Get presigned URL expiry as Duration
    pub fn presigned_url_expiry(&self) -> Duration {
        Duration::from_secs(self.s3.presigned_url_expiry_secs)
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            s3: S3Config {
                bucket: "rosetta".to_string(),
                region: default_region(),
                endpoint_url: Some("http://localstack:4566".to_string()),
                public_url: "http://localhost:4566".to_string(),
                access_key_id: Some("test".to_string()),
                secret_access_key: Some("test".to_string()),
                presigned_url_expiry_secs: default_presigned_url_expiry_secs(),
                create_bucket: true,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/rosetta".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout_secs(),
                idle_timeout_secs: default_idle_timeout_secs(),
                run_migrations: true,
            },
            api: ApiConfig::default(),
        }
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_presigned_url_expiry_secs(), 900);
        assert_eq!(default_connect_timeout_secs(), 10);
        assert_eq!(default_api_port(), 8080);
    }

    #[test]
    fn test_valid_config() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.presigned_url_expiry(), Duration::from_secs(900));
        assert_eq!(config.database.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_missing_public_url() {
        let mut config = test_config();
        config.s3.public_url.clear();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "s3.public_url"
        ));
    }

    #[test]
    fn test_rejects_out_of_range_expiry() {
        let mut config = test_config();
        config.s3.presigned_url_expiry_secs = 0;
        assert!(config.validate().is_err());

        config.s3.presigned_url_expiry_secs = MAX_PRESIGNED_URL_EXPIRY_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_half_configured_credentials() {
        let mut config = test_config();
        config.s3.secret_access_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_minimal_sections() {
        let config: Config = config::Config::builder()
            .set_override("database.url", "postgres://db/rosetta")
            .unwrap()
            .set_override("s3.bucket", "rosetta")
            .unwrap()
            .set_override("s3.public_url", "http://localhost:4566")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.s3.region, "us-east-1");
        assert!(config.s3.endpoint_url.is_none());
        assert!(config.s3.create_bucket);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.service.name, "story-service");
        assert!(config.validate().is_ok());
    }
}
