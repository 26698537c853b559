// src/error.rs

//! Error types for bundle caching, reconciliation and installation

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the bundle engine
#[derive(Error, Debug)]
pub enum Error {
    /// Release host unreachable, timed out, or returned a non-success status
    #[error("network error: {0}")]
    Network(String),

    /// Release host answered with an unexpected shape (no usable tag)
    #[error("release resolution failed: {0}")]
    Resolution(String),

    /// Cached release is structurally incomplete
    #[error("bundle verification failed: {0}")]
    Verification(String),

    /// Manifest missing or not valid JSON
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Copying a package into the project failed
    #[error("install failed: {0}")]
    Install(String),

    /// Archive could not be opened or extracted
    #[error("archive error: {0}")]
    Archive(String),

    /// Invalid configuration or settings file
    #[error("configuration error: {0}")]
    Config(String),

    /// Another bundle update is running in this session
    #[error("a bundle update is already in progress")]
    Busy,

    /// No verified release is cached yet
    #[error("no verified bundle release is available; run `cpbundle fetch`")]
    NoRelease,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that a later re-fetch can fix
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Verification(_) | Self::Busy)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Network(format!("request timed out: {e}"))
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Archive(e.to_string())
    }
}
