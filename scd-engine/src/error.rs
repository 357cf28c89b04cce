//! Error types for scd-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Very few of these ever escape the engine loop: lookup and resource failures
//! are logged where they happen and the last valid display is kept.

use thiserror::Error;

/// Main error type for scd-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Errors bubbled up from scd-common
    #[error(transparent)]
    Common(#[from] scd_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration or preferences errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event folder watching errors
    #[error("Event source error: {0}")]
    Source(String),

    /// Widget persistence errors
    #[error("Widget store error: {0}")]
    WidgetStore(String),

    /// Game metadata parsing errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Engine loop no longer accepting messages
    #[error("Engine channel closed")]
    ChannelClosed,
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Source(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Metadata(e.to_string())
    }
}

/// Convenience Result type using scd-engine Error
pub type Result<T> = std::result::Result<T, Error>;
