//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid host address: {0}")]
    InvalidHost(String),

    #[error("Static directory does not exist: {}", .0.display())]
    MissingStaticDir(PathBuf),

    #[error("Invalid upstream API URL (expected http:// or https://)")]
    InvalidApiUrl,

    #[error("Invalid upstream stream URL (expected ws:// or wss://)")]
    InvalidStreamUrl,

    #[error("Upstream connect timeout must be positive")]
    InvalidConnectTimeout,

    #[error("Upstream watchdog must be positive")]
    InvalidWatchdog,
}
