use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration for the photo-journal service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpConfig,
    /// Object storage configuration
    pub s3: S3Config,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Birthday album configuration
    #[serde(default)]
    pub birthday: BirthdayConfig,
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
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_http_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Maximum multipart body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

/// S3-compatible object storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket name for photo storage
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for R2, MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Presigned URL expiration in seconds (7 days default)
    #[serde(default = "default_presigned_url_expiry_secs")]
    pub presigned_url_expiry_secs: u64,
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
    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Birthday album configuration
///
/// The birth-date map drives age derivation: "MM-DD" tag to the birth year
/// of the person whose birthday that is. A photo tagged with an unknown date
/// is rejected at upload time.
#[derive(Debug, Clone, Deserialize)]
pub struct BirthdayConfig {
    /// MM-DD tag -> birth year
    #[serde(default = "default_birth_dates")]
    pub birth_dates: HashMap<String, i32>,
}

// Default value functions
fn default_service_name() -> String {
    "memoir".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    50 * 1024 * 1024 // 50MB per multipart request
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_presigned_url_expiry_secs() -> u64 {
    7 * 24 * 3600
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_birth_dates() -> HashMap<String, i32> {
    HashMap::from([("01-01".to_string(), 2003), ("06-26".to_string(), 2003)])
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "memoir")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/memoir").required(false))
            .add_source(config::File::with_name("/etc/memoir/memoir").required(false))
            // Override with environment variables
            // MEMOIR__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("MEMOIR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Get database connection timeout as Duration
    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.database.connect_timeout_secs)
    }

    /// Get presigned URL expiry as Duration
    pub fn presigned_url_expiry(&self) -> Duration {
        Duration::from_secs(self.s3.presigned_url_expiry_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            body_limit_bytes: default_body_limit(),
            cors_enabled: default_true(),
        }
    }
}

impl Default for BirthdayConfig {
    fn default() -> Self {
        Self {
            birth_dates: default_birth_dates(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_presigned_url_expiry_secs(), 604800);
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_body_limit(), 50 * 1024 * 1024);
    }

    #[test]
    fn test_default_birth_dates() {
        let dates = default_birth_dates();
        assert_eq!(dates.get("01-01"), Some(&2003));
        assert_eq!(dates.get("06-26"), Some(&2003));
        assert_eq!(dates.len(), 2);
    }
}
