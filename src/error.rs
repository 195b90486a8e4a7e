//! Error types for a3s-pii-gate

use thiserror::Error;

/// Errors that can occur while detecting, tokenising, or gating text
#[derive(Debug, Error)]
pub enum GateError {
    /// Entity span is inverted or falls outside the text
    #[error("Invalid span for {entity_type}: [{start}, {end}) over text of length {len}")]
    InvalidSpan {
        entity_type: String,
        start: usize,
        end: usize,
        len: usize,
    },

    /// Matcher pattern failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Configuration error (missing or degenerate key, bad rules document)
    #[error("Configuration error: {0}")]
    Config(String),

    /// External assessor returned an unusable reply
    #[error("Assessor error: {0}")]
    Assessor(String),

    /// External detector returned an unusable reply
    #[error("Detector error: {0}")]
    Detector(String),

    /// Completion endpoint rejected or failed the request
    #[error("Completion error: {0}")]
    Completion(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
