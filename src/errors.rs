//! Error types for rapid_counterfactual
//!
//! This module defines the error types used throughout the library.
//! Row-level failures inside a batch are wrapped separately by
//! [`SentenceError`](crate::pipeline::errors::SentenceError) so one bad
//! sentence never aborts the batch.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CounterfactualError>;

/// Main error type for rapid_counterfactual
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CounterfactualError {
    /// Configuration validation failed
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A required model, lexicon or data file is missing
    #[error("Missing resource: {path}")]
    MissingResource { path: String },

    /// The GNN or the classifier could not produce an output
    #[error("Inference failed: {message}")]
    Inference { message: String },

    /// A tensor shape did not match what the model expects
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Filesystem error while reading or writing an artifact
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Internal error (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CounterfactualError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a missing resource error
    pub fn missing_resource(path: impl Into<String>) -> Self {
        Self::MissingResource { path: path.into() }
    }

    /// Create an inference error
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Configuration problems are fatal for the whole run; everything else
    /// only affects the sentence being processed.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::MissingResource { .. }
        )
    }

    /// Check if this error came out of model inference
    pub fn is_inference_failure(&self) -> bool {
        matches!(self, Self::Inference { .. } | Self::DimensionMismatch { .. })
    }
}

impl From<serde_json::Error> for CounterfactualError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for CounterfactualError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
