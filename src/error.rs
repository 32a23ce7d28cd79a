//! Error types for Stevedore

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Stevedore operations
pub type Result<T> = std::result::Result<T, StevedoreError>;

/// Stevedore error types
#[derive(Error, Debug)]
pub enum StevedoreError {
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Deployment directory not found: {}", .0.display())]
    MissingDeployment(PathBuf),

    #[error("No compose manifest found in {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("Invalid compose manifest: {0}")]
    InvalidManifest(String),

    #[error("Failed to start deployment: {0}")]
    StartFailed(String),

    #[error("Crash detected: {0}")]
    CrashDetected(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
