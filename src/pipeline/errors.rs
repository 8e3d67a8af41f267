//! Row-level error type for batch runs.
//!
//! A [`SentenceError`] records which row failed, in which stage, and why. It
//! is attached to the row's output instead of aborting the batch, and it
//! serializes alongside the rest of the report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::CounterfactualError;

// ─── Row (execution-time) errors ────────────────────────────────────────────

/// A failure that occurred while editing one sentence.
///
/// # Display format
///
/// ```text
/// row 12 (stage: score_edges): Inference failed: model offline
/// ```
///
/// # JSON format
///
/// ```json
/// {
///   "row": 12,
///   "stage": "score_edges",
///   "message": "Inference failed: model offline"
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("row {row} (stage: {stage}): {message}")]
pub struct SentenceError {
    /// Row index of the failing sentence.
    pub row: usize,

    /// Name of the stage that failed (e.g., `"build_graph"`, `"search"`).
    pub stage: String,

    /// Human-readable description of the failure.
    pub message: String,
}

impl SentenceError {
    /// Create a new row error.
    pub fn new(row: usize, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Wrap a library error raised by `stage` while processing `row`.
    pub fn from_error(row: usize, stage: impl Into<String>, err: &CounterfactualError) -> Self {
        Self::new(row, stage, err.to_string())
    }
}
