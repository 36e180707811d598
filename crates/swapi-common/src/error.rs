//! Error types for the archive pipeline

use thiserror::Error;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, SwapiError>;

/// Main error type for the archive pipeline
///
/// A not-found primary resource is not represented here: the record fetcher
/// reports it as an absent result.
#[derive(Error, Debug)]
pub enum SwapiError {
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Attribute '{attribute}' missing from {url}")]
    MissingAttribute { url: String, attribute: String },

    #[error("Malformed record {id}: {message}")]
    MalformedRecord { id: u32, message: String },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SwapiError {
    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        SwapiError::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_attribute(url: impl Into<String>, attribute: impl Into<String>) -> Self {
        SwapiError::MissingAttribute {
            url: url.into(),
            attribute: attribute.into(),
        }
    }

    pub fn malformed(id: u32, message: impl Into<String>) -> Self {
        SwapiError::MalformedRecord {
            id,
            message: message.into(),
        }
    }

    pub fn sink(message: impl ToString) -> Self {
        SwapiError::Sink(message.to_string())
    }

    /// Whether this failure is scoped to a single identifier.
    ///
    /// Only these may be downgraded to "skip and log"; sink and configuration
    /// failures always abort the run.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            SwapiError::Transport { .. }
                | SwapiError::MissingAttribute { .. }
                | SwapiError::MalformedRecord { .. }
        )
    }
}
