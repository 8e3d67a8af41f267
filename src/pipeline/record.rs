//! Substitution record accumulated across a batch.
//!
//! Maps each original word to the substitutes the search considered and the
//! ones that ended up in an accepted counterfactual, and keeps the applied
//! edits of every flipped row. Written once per batch as JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::Result;
use crate::pipeline::artifacts::AppliedEdit;

/// Edits applied to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowEdits {
    pub row: usize,
    pub edits: Vec<AppliedEdit>,
}

/// Append-only dictionary of substitutions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRecord {
    /// Original word -> substitutes used in accepted counterfactuals.
    pub accepted: BTreeMap<String, BTreeSet<String>>,
    /// Original word -> substitutes the search tried.
    pub considered: BTreeMap<String, BTreeSet<String>>,
    /// Accepted edits, in row order.
    pub edits: Vec<RowEdits>,
}

impl SubstitutionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `substitute` was tried in place of `original`.
    pub fn record_considered(&mut self, original: &str, substitute: &str) {
        self.considered
            .entry(original.to_lowercase())
            .or_default()
            .insert(substitute.to_lowercase());
    }

    /// Note the edits of an accepted counterfactual for `row`.
    pub fn record_accepted(&mut self, row: usize, edits: &[AppliedEdit]) {
        if edits.is_empty() {
            return;
        }
        for edit in edits {
            self.accepted
                .entry(edit.original.to_lowercase())
                .or_default()
                .insert(edit.substitute.to_lowercase());
        }
        self.edits.push(RowEdits {
            row,
            edits: edits.to_vec(),
        });
    }

    /// Fold another record into this one.
    ///
    /// Maps are unioned and edits appended, so merging per-row records in row
    /// order yields the same record as accumulating sequentially.
    pub fn merge(&mut self, other: SubstitutionRecord) {
        for (word, subs) in other.accepted {
            self.accepted.entry(word).or_default().extend(subs);
        }
        for (word, subs) in other.considered {
            self.considered.entry(word).or_default().extend(subs);
        }
        self.edits.extend(other.edits);
    }

    /// Number of rows with accepted edits.
    pub fn accepted_rows(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.considered.is_empty() && self.edits.is_empty()
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record previously written with [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the record to `path`, replacing any existing file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!(
            path = %path.display(),
            words = self.accepted.len(),
            rows = self.edits.len(),
            "wrote substitution record"
        );
        Ok(())
    }
}
