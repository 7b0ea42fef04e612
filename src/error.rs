//! Error handling for busdecode-rs
//!
//! Decoding itself never fails: a decoder that cannot run produces an empty
//! event list, and protocol violations are reported as events. The errors
//! here cover the configuration side only (settings strings, session files
//! and capture files).

use std::path::Path;
use thiserror::Error;

/// Main error type for busdecode-rs operations
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A decoder settings string could not be parsed
    #[error("Settings error: {0}")]
    Settings(String),

    /// Errors related to session/configuration loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// A capture file row could not be parsed
    #[error("Capture error at line {line}: {message}")]
    Capture { line: usize, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DecodeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for busdecode-rs operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Context for the fallible steps of session and capture loading
pub trait ResultExt<T> {
    /// Describe the failed step, built only on error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Prefix the error with the file it came from
    fn in_file(self, path: &Path) -> Result<T>;
}

impl<T, E: Into<DecodeError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Into::<DecodeError>::into(e).with_context(f()))
    }

    fn in_file(self, path: &Path) -> Result<T> {
        self.map_err(|e| Into::<DecodeError>::into(e).with_context(path.display().to_string()))
    }
}
