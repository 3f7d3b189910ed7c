//! Application error types.

use thiserror::Error;

/// Fallback shown inline when a failed creation carries no message of its own.
pub const GENERIC_CREATE_FAILURE: &str = "Failed to create item";

/// Application-level errors for Flowchain.
#[derive(Error, Debug)]
pub enum AppError {
    // Domain errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parent: {node_type} nodes cannot have children")]
    InvalidParent { node_type: String },

    #[error(
        "Canvas version conflict: expected {expected}, server has {}",
        display_version(.actual)
    )]
    VersionConflict { expected: i64, actual: Option<i64> },

    // Backend errors
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("No backend configured. Set [postgres] uri or [api] base_url.")]
    NotConfigured,

    #[error("Internal error: {0}")]
    Internal(String),
}

fn display_version(actual: &Option<i64>) -> String {
    match actual {
        Some(version) => version.to_string(),
        None => "an unknown version".to_string(),
    }
}

impl AppError {
    /// True for a rejected canvas save. Recovery is a reload, never a blind retry.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, AppError::VersionConflict { .. })
    }

    /// Message shown at the point of action (modal or draft node).
    ///
    /// Errors that carry a human-readable message surface it as-is. Transport
    /// and storage errors (`Http`, `Postgres`, `Pool`, `Internal`, ...) only
    /// carry driver text, which is logged at the call site and replaced by
    /// [`GENERIC_CREATE_FAILURE`] in the UI.
    pub fn user_message(&self) -> String {
        let message = match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Backend(msg) => {
                msg.trim()
            }
            AppError::InvalidParent { .. } | AppError::VersionConflict { .. } => {
                return self.to_string()
            }
            _ => "",
        };

        if message.is_empty() {
            GENERIC_CREATE_FAILURE.to_string()
        } else {
            message.to_string()
        }
    }
}
