//! Server configuration management

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// SQLite connection string; the in-memory store is used when unset
    pub database_url: Option<String>,

    /// TTL for cached resolved templates, in seconds
    pub cache_ttl_seconds: u64,

    /// Deadline for each template store call, in milliseconds
    pub store_timeout_ms: u64,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,

    /// Whether to enable debug logging
    pub debug: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid PORT value".to_string()))?,
            database_url: std::env::var("DATABASE_URL").ok(),
            cache_ttl_seconds: std::env::var("CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid CACHE_TTL_SECONDS value".to_string()))?,
            store_timeout_ms: std::env::var("STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid STORE_TIMEOUT_MS value".to_string()))?,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            debug: std::env::var("DEBUG")
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(false),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            cache_ttl_seconds: 60,
            store_timeout_ms: 5000,
            cors_origins: vec!["*".to_string()],
            debug: false,
        }
    }
}
