//! Error types for the application.
//!
//! Core rejections (rate limits, invalid state, moderation gates) live in
//! [`crate::core::Rejection`]; this module holds the infrastructure errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors related to configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Errors from the optional state mirror. Always logged, never surfaced to
/// users: the in-memory state already reflects the change.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
