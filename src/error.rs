// src/error.rs

//! Unified error handling for the listing engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Pattern compilation failed
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Image bytes could not be decoded
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Raw post is corrupt or unreadable
    #[error("Invalid input for {context}: {message}")]
    InvalidInput { context: String, message: String },

    /// Gazetteer has no districts or metro stations loaded
    #[error("Gazetteer unavailable: {0}")]
    GazetteerUnavailable(String),

    /// Media bytes missing or unreachable
    #[error("Media error for {reference}: {message}")]
    Media { reference: String, message: String },

    /// Storage collaborator failed in a way that may succeed on retry
    #[error("Transient storage error: {0}")]
    Transient(String),

    /// Storage collaborator rejected a write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resolver shard actor is gone
    #[error("Resolver shard {shard} unavailable")]
    ResolverClosed { shard: usize },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid-input error with context.
    pub fn invalid_input(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidInput {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a media error for a storage reference.
    pub fn media(reference: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Media {
            reference: reference.into(),
            message: message.to_string(),
        }
    }

    /// Create a transient storage error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Whether the failed post should be retried.
    ///
    /// Missing media, HTTP failures and storage timeouts are per-post and may
    /// clear up; everything else rejects the post.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Transient(_) | AppError::Media { .. } | AppError::Http(_) => true,
            AppError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::transient("timeout").is_transient());
        assert!(AppError::media("a.jpg", "missing").is_transient());
        assert!(!AppError::invalid_input("msg:1:2", "bad").is_transient());
        assert!(!AppError::GazetteerUnavailable("empty".into()).is_transient());
    }

    #[test]
    fn test_io_timeout_is_transient() {
        let err = AppError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_transient());
        let err = AppError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!err.is_transient());
    }
}
