//! Journal Portal Common Library
//!
//! Shared code for the journal portal gateway including:
//! - Database models and repository patterns
//! - Error types and handling
//! - Configuration management
//! - Identity gate and authorization policy
//! - Object storage and email clients
//! - Notification fan-out
//! - Editorial workflow services
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod mail;
pub mod metrics;
pub mod notify;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use auth::{Access, Caller, IdentityGate};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use services::Services;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
