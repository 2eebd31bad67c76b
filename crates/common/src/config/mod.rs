//! Configuration management for the journal portal
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Identity provider configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Transactional email configuration
    #[serde(default)]
    pub email: EmailConfig,

    /// Authorization bootstrap configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Notification fan-out configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Publication compiler configuration
    #[serde(default)]
    pub publication: PublicationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (postgres:// in production, sqlite:// for local runs)
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables and indexes at startup
    #[serde(default)]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Identity provider: http, jwt, static
    #[serde(default = "default_identity_provider")]
    pub provider: String,

    /// Base URL of the hosted auth service
    pub base_url: Option<String>,

    /// Project API key sent alongside bearer tokens
    pub api_key: Option<String>,

    /// Shared secret for locally verified HS256 tokens
    pub jwt_secret: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Storage provider: http, memory
    #[serde(default = "default_storage_provider")]
    pub provider: String,

    /// Base URL of the storage service
    pub base_url: Option<String>,

    /// Service role key used for uploads and signing
    pub service_key: Option<String>,

    /// Bucket holding manuscript files
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Lifetime of signed download URLs in seconds
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Email provider: http, log
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// API base URL of the email service
    pub api_base: Option<String>,

    /// API key of the email service
    pub api_key: Option<String>,

    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Email whose profile is created (or promoted) as the first approved admin
    pub seed_admin_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Capacity of the in-process event queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Public portal URL used in email bodies
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PublicationConfig {
    /// Refuse to publish manuscripts that are not `accepted`
    #[serde(default)]
    pub require_accepted: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_identity_provider() -> String { "http".to_string() }
fn default_upstream_timeout() -> u64 { 15 }
fn default_storage_provider() -> String { "http".to_string() }
fn default_bucket() -> String { "manuscripts".to_string() }
fn default_signed_url_ttl() -> u64 { 3600 }
fn default_max_upload() -> usize { 25 * 1024 * 1024 }
fn default_email_provider() -> String { "log".to_string() }
fn default_from_address() -> String { "editorial@journal.local".to_string() }
fn default_queue_capacity() -> usize { 1024 }
fn default_portal_url() -> String { "http://localhost:3000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "journal-portal".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: default_identity_provider(),
            base_url: None,
            api_key: None,
            jwt_secret: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            base_url: None,
            service_key: None,
            bucket: default_bucket(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            max_upload_bytes: default_max_upload(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_email_provider(),
            api_base: None,
            api_key: None,
            from_address: default_from_address(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            portal_url: default_portal_url(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__DATABASE__URL=postgres://...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get signed URL lifetime as Duration
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.signed_url_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/journal".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                auto_migrate: false,
            },
            identity: IdentityConfig::default(),
            storage: StorageConfig::default(),
            email: EmailConfig::default(),
            auth: AuthConfig::default(),
            notifications: NotificationConfig::default(),
            publication: PublicationConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
