//! Configuration module
//!
//! Configuration for the API process: server, database, object storage, the upload policy
//! (TTLs, attempt ceiling, size and MIME limits) and the expiry reaper.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{DocumentCategory, DocumentType};

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

const PRESIGNED_URL_TTL_SECS: u64 = 15 * 60;
const CONFIRM_WINDOW_SECS: u64 = 24 * 60 * 60;
const MAX_CONFIRM_ATTEMPTS: u32 = 5;
const STORAGE_TIMEOUT_SECS: u64 = 5;
const DOCUMENT_MAX_SIZE_MB: u64 = 10;
const PHOTO_MAX_SIZE_MB: u64 = 5;
const DOCUMENT_ALLOWED_CONTENT_TYPES: &str = "application/pdf,image/jpeg,image/png";
const PHOTO_ALLOWED_CONTENT_TYPES: &str = "image/jpeg,image/png,image/webp";

const REAPER_INTERVAL_SECS: u64 = 5 * 60;
const REAPER_BATCH_SIZE: u32 = 500;

/// Object storage settings (S3 or any S3-compatible provider)
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Rules applied to every upload intent and confirmation
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    /// Lifetime of the presigned PUT URL
    pub presigned_url_ttl: Duration,
    /// Lifetime of the upload record; governs `expires_at`
    pub confirm_window: Duration,
    pub max_confirm_attempts: u32,
    /// Upper bound on every object storage call
    pub storage_timeout: Duration,
    pub document_max_size_bytes: u64,
    pub photo_max_size_bytes: u64,
    pub document_allowed_content_types: Vec<String>,
    pub photo_allowed_content_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            presigned_url_ttl: Duration::from_secs(PRESIGNED_URL_TTL_SECS),
            confirm_window: Duration::from_secs(CONFIRM_WINDOW_SECS),
            max_confirm_attempts: MAX_CONFIRM_ATTEMPTS,
            storage_timeout: Duration::from_secs(STORAGE_TIMEOUT_SECS),
            document_max_size_bytes: DOCUMENT_MAX_SIZE_MB * 1024 * 1024,
            photo_max_size_bytes: PHOTO_MAX_SIZE_MB * 1024 * 1024,
            document_allowed_content_types: split_list(DOCUMENT_ALLOWED_CONTENT_TYPES),
            photo_allowed_content_types: split_list(PHOTO_ALLOWED_CONTENT_TYPES),
        }
    }
}

impl UploadPolicy {
    fn from_env() -> Self {
        Self {
            presigned_url_ttl: Duration::from_secs(parse_env(
                "PRESIGNED_URL_TTL_SECS",
                PRESIGNED_URL_TTL_SECS,
            )),
            confirm_window: Duration::from_secs(parse_env(
                "CONFIRM_WINDOW_SECS",
                CONFIRM_WINDOW_SECS,
            )),
            max_confirm_attempts: parse_env("MAX_CONFIRM_ATTEMPTS", MAX_CONFIRM_ATTEMPTS),
            storage_timeout: Duration::from_secs(parse_env(
                "STORAGE_TIMEOUT_SECS",
                STORAGE_TIMEOUT_SECS,
            )),
            document_max_size_bytes: parse_env("DOCUMENT_MAX_SIZE_MB", DOCUMENT_MAX_SIZE_MB)
                * 1024
                * 1024,
            photo_max_size_bytes: parse_env("PHOTO_MAX_SIZE_MB", PHOTO_MAX_SIZE_MB) * 1024 * 1024,
            document_allowed_content_types: split_list(
                &env::var("DOCUMENT_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| DOCUMENT_ALLOWED_CONTENT_TYPES.to_string()),
            ),
            photo_allowed_content_types: split_list(
                &env::var("PHOTO_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| PHOTO_ALLOWED_CONTENT_TYPES.to_string()),
            ),
        }
    }

    pub fn max_size_for(&self, document_type: DocumentType) -> u64 {
        match document_type.category() {
            DocumentCategory::Document => self.document_max_size_bytes,
            DocumentCategory::Photo => self.photo_max_size_bytes,
        }
    }

    pub fn allowed_content_types_for(&self, document_type: DocumentType) -> &[String] {
        match document_type.category() {
            DocumentCategory::Document => &self.document_allowed_content_types,
            DocumentCategory::Photo => &self.photo_allowed_content_types,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_confirm_attempts < 1 {
            return Err(anyhow::anyhow!("MAX_CONFIRM_ATTEMPTS must be at least 1"));
        }
        if i32::try_from(self.max_confirm_attempts).is_err() {
            return Err(anyhow::anyhow!(
                "MAX_CONFIRM_ATTEMPTS must not exceed {}",
                i32::MAX
            ));
        }
        if self.presigned_url_ttl.is_zero() || self.confirm_window.is_zero() {
            return Err(anyhow::anyhow!(
                "PRESIGNED_URL_TTL_SECS and CONFIRM_WINDOW_SECS must be greater than 0"
            ));
        }
        if self.presigned_url_ttl > self.confirm_window {
            return Err(anyhow::anyhow!(
                "PRESIGNED_URL_TTL_SECS ({}) must not exceed CONFIRM_WINDOW_SECS ({})",
                self.presigned_url_ttl.as_secs(),
                self.confirm_window.as_secs()
            ));
        }
        if self.storage_timeout.is_zero() {
            return Err(anyhow::anyhow!("STORAGE_TIMEOUT_SECS must be greater than 0"));
        }
        if self.document_max_size_bytes == 0 || self.photo_max_size_bytes == 0 {
            return Err(anyhow::anyhow!("Maximum upload sizes must be greater than 0"));
        }
        if self.document_allowed_content_types.is_empty()
            || self.photo_allowed_content_types.is_empty()
        {
            return Err(anyhow::anyhow!("Allowed content type lists must not be empty"));
        }
        Ok(())
    }
}

/// Expiry reaper schedule
#[derive(Clone, Debug)]
pub struct ReaperConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Maximum rows claimed per batch
    pub batch_size: u32,
    /// Best-effort delete of orphaned objects after claiming them
    pub delete_objects: bool,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(REAPER_INTERVAL_SECS),
            batch_size: REAPER_BATCH_SIZE,
            delete_objects: true,
        }
    }
}

impl ReaperConfig {
    fn from_env() -> Self {
        Self {
            enabled: parse_bool_env("REAPER_ENABLED", true),
            interval: Duration::from_secs(parse_env("REAPER_INTERVAL_SECS", REAPER_INTERVAL_SECS)),
            batch_size: parse_env("REAPER_BATCH_SIZE", REAPER_BATCH_SIZE),
            delete_objects: parse_bool_env("REAPER_DELETE_OBJECTS", true),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub max_request_body_bytes: usize,
    pub storage: StorageConfig,
    pub upload: UploadPolicy,
    pub reaper: ReaperConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage = StorageConfig {
            bucket: env::var("S3_BUCKET")
                .map_err(|_| anyhow::anyhow!("S3_BUCKET must be set"))?,
            region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .map_err(|_| anyhow::anyhow!("S3_REGION or AWS_REGION must be set"))?,
            endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
        };

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            max_request_body_bytes: parse_env("MAX_REQUEST_BODY_BYTES", MAX_REQUEST_BODY_BYTES),
            storage,
            upload: UploadPolicy::from_env(),
            reaper: ReaperConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("S3_BUCKET must not be empty"));
        }

        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.reaper.enabled && (self.reaper.interval.is_zero() || self.reaper.batch_size == 0)
        {
            return Err(anyhow::anyhow!(
                "REAPER_INTERVAL_SECS and REAPER_BATCH_SIZE must be greater than 0 when the reaper is enabled"
            ));
        }

        self.upload.validate()
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

fn parse_env<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            database_url: "postgresql://localhost/vitrina".to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            max_request_body_bytes: MAX_REQUEST_BODY_BYTES,
            storage: StorageConfig {
                bucket: "vitrina-documents".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                access_key_id: None,
                secret_access_key: None,
            },
            upload: UploadPolicy::default(),
            reaper: ReaperConfig::default(),
        }
    }

    #[test]
    fn test_default_policy_values() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.presigned_url_ttl, Duration::from_secs(900));
        assert_eq!(policy.confirm_window, Duration::from_secs(86_400));
        assert_eq!(policy.max_confirm_attempts, 5);
        assert_eq!(policy.max_size_for(DocumentType::IdCard), 10 * 1024 * 1024);
        assert_eq!(policy.max_size_for(DocumentType::ProductPhoto), 5 * 1024 * 1024);
        assert!(policy
            .allowed_content_types_for(DocumentType::IdCard)
            .contains(&"application/pdf".to_string()));
        assert!(!policy
            .allowed_content_types_for(DocumentType::BranchPhoto)
            .contains(&"application/pdf".to_string()));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_presign_ttl_must_not_exceed_confirm_window() {
        let mut policy = UploadPolicy::default();
        policy.presigned_url_ttl = Duration::from_secs(7200);
        policy.confirm_window = Duration::from_secs(3600);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut policy = UploadPolicy::default();
        policy.max_confirm_attempts = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_attempt_ceiling_must_fit_the_counter_column() {
        let mut policy = UploadPolicy::default();
        policy.max_confirm_attempts = i32::MAX as u32 + 1;
        assert!(policy.validate().is_err());

        policy.max_confirm_attempts = i32::MAX as u32;
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut config = sample_config();
        assert!(config.validate().is_ok());
        config.environment = "production".to_string();
        assert!(config.is_production());
        assert!(config.validate().is_err());
        config.cors_origins = vec!["https://admin.vitrina.example".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let mut config = sample_config();
        config.database_url = "mysql://localhost/vitrina".to_string();
        assert!(config.validate().is_err());
    }
}
