//! Error types for the promptforge registry

use thiserror::Error;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Version {version_id} not found for template {template_key}")]
    VersionNotFound {
        template_key: String,
        version_id: String,
    },

    #[error("No versions available for template {0}")]
    NoVersionsAvailable(String),

    /// A store call exceeded its deadline. Safe to retry.
    #[error("Operation timed out")]
    Timeout,

    #[error("Engine error: {0}")]
    Engine(#[from] promptforge::EngineError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Time error: {0}")]
    Time(#[from] time::error::ComponentRange),
}

impl RegistryError {
    /// Transient failures may be retried; caller errors and missing data
    /// must not be.
    pub fn is_transient(&self) -> bool {
        matches!(self, RegistryError::Timeout | RegistryError::Storage(_))
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
