//! Error types for orderbell-alert
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for orderbell-alert
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors surfaced by shared OrderBell code
    #[error(transparent)]
    Common(#[from] orderbell_common::Error),

    /// Output device primitive failed (play, effect, level, vibrate)
    #[error("Device error: {0}")]
    Device(String),

    /// Playback pass failed
    #[error("Playback error: {0}")]
    Playback(String),

    /// Sound profile could not be resolved to a playable resource
    #[error("Sound resolution error: {0}")]
    Resolution(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience Result type using orderbell-alert Error
pub type Result<T> = std::result::Result<T, Error>;
