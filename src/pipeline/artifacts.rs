//! Typed artifacts produced while editing sentences.
//!
//! Classifier outputs, applied edits, the accepted counterfactual, and the
//! per-row and per-batch output tables. Everything that leaves the crate
//! serializes with serde.

use serde::{Deserialize, Serialize};

use crate::errors::{CounterfactualError, Result};
use crate::pipeline::errors::SentenceError;
use crate::pipeline::record::SubstitutionRecord;
use crate::types::LexicalRelation;

// ============================================================================
// Prediction: classifier output
// ============================================================================

/// A classifier decision: the predicted label and the full distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index of the predicted class.
    pub label: usize,
    /// One probability per class.
    pub probabilities: Vec<f64>,
}

impl Prediction {
    /// Build from a probability vector; the label is its argmax.
    ///
    /// Ties go to the lowest class index. Empty or non-finite vectors are
    /// inference errors.
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(CounterfactualError::inference(
                "classifier returned no probabilities",
            ));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(CounterfactualError::inference(
                "classifier returned a non-finite probability",
            ));
        }

        let mut label = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[label] {
                label = i;
            }
        }
        Ok(Self {
            label,
            probabilities,
        })
    }

    /// Build with an explicit label.
    pub fn new(label: usize, probabilities: Vec<f64>) -> Result<Self> {
        if label >= probabilities.len() {
            return Err(CounterfactualError::dimension_mismatch(
                "prediction label",
                probabilities.len(),
                label,
            ));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(CounterfactualError::inference(
                "classifier returned a non-finite probability",
            ));
        }
        Ok(Self {
            label,
            probabilities,
        })
    }

    /// Probability of the predicted label.
    pub fn confidence(&self) -> f64 {
        self.probability(self.label)
    }

    /// Probability of `label` (0 for unknown classes).
    pub fn probability(&self, label: usize) -> f64 {
        self.probabilities.get(label).copied().unwrap_or(0.0)
    }

    /// `p(original) - max p(other)`.
    ///
    /// Positive while the original label still wins, negative once another
    /// label overtakes it.
    pub fn contrastive_margin(&self, original_label: usize) -> f64 {
        let best_other = self
            .probabilities
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != original_label)
            .map(|(_, &p)| p)
            .fold(0.0f64, f64::max);
        self.probability(original_label) - best_other
    }

    /// Whether this prediction disagrees with `original`.
    pub fn flips(&self, original: &Prediction) -> bool {
        self.label != original.label
    }
}

// ============================================================================
// Edits & counterfactuals
// ============================================================================

/// One substitution committed to a candidate sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEdit {
    /// Token index in the sentence.
    pub token_idx: usize,
    /// The word that was replaced.
    pub original: String,
    /// The word put in its place.
    pub substitute: String,
    pub relation: LexicalRelation,
    /// GNN score of the substitution edge.
    pub score: f64,
}

/// An accepted counterfactual: the edited text and why it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterfactual {
    pub text: String,
    /// Edits in token order.
    pub edits: Vec<AppliedEdit>,
    /// The classifier's decision on `text`; its label differs from the
    /// original's.
    pub prediction: Prediction,
    /// Aggregated GNN score of the edits.
    pub gnn_score: f64,
}

impl Counterfactual {
    pub fn num_edits(&self) -> usize {
        self.edits.len()
    }
}

// ============================================================================
// Output tables
// ============================================================================

/// Outcome of editing one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    /// A label-flipping edit was found.
    Flipped,
    /// No token passed the POS filter.
    NoEligiblePositions,
    /// Eligible tokens exist but none has a substitute.
    NoSubstitutes,
    /// The search ran out of budget or successors without a flip.
    BudgetExhausted,
    /// A model failed; see the row's error.
    Failed,
}

impl EditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditStatus::Flipped => "flipped",
            EditStatus::NoEligiblePositions => "no_eligible_positions",
            EditStatus::NoSubstitutes => "no_substitutes",
            EditStatus::BudgetExhausted => "budget_exhausted",
            EditStatus::Failed => "failed",
        }
    }

    pub fn is_flipped(&self) -> bool {
        matches!(self, EditStatus::Flipped)
    }
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRow {
    pub row: usize,
    pub original: String,
    /// The edited sentence, present only when the label flipped.
    pub counterfactual: Option<String>,
    pub status: EditStatus,
    #[serde(default)]
    pub edits: Vec<AppliedEdit>,
    /// Classifier label of the original sentence, when it was classified.
    #[serde(default)]
    pub original_label: Option<usize>,
    /// Classifier label of the counterfactual.
    #[serde(default)]
    pub counterfactual_label: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SentenceError>,
}

impl EditRow {
    /// A row with no counterfactual.
    pub fn unchanged(row: usize, original: impl Into<String>, status: EditStatus) -> Self {
        Self {
            row,
            original: original.into(),
            counterfactual: None,
            status,
            edits: Vec::new(),
            original_label: None,
            counterfactual_label: None,
            error: None,
        }
    }

    /// A row whose processing failed.
    pub fn failed(row: usize, original: impl Into<String>, error: SentenceError) -> Self {
        Self {
            error: Some(error),
            ..Self::unchanged(row, original, EditStatus::Failed)
        }
    }

    /// A row with an accepted counterfactual.
    pub fn flipped(
        row: usize,
        original: impl Into<String>,
        original_label: usize,
        counterfactual: Counterfactual,
    ) -> Self {
        Self {
            row,
            original: original.into(),
            counterfactual_label: Some(counterfactual.prediction.label),
            counterfactual: Some(counterfactual.text),
            status: EditStatus::Flipped,
            edits: counterfactual.edits,
            original_label: Some(original_label),
            error: None,
        }
    }

    /// Number of edits in the counterfactual.
    pub fn num_edits(&self) -> usize {
        self.edits.len()
    }
}

/// Output of a batch: one row per input plus the substitution record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub rows: Vec<EditRow>,
    pub record: SubstitutionRecord,
}

impl BatchReport {
    /// Rows whose label flipped.
    pub fn flipped_count(&self) -> usize {
        self.rows.iter().filter(|r| r.status.is_flipped()).count()
    }

    /// Rows that failed with an error.
    pub fn failed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == EditStatus::Failed)
            .count()
    }

    /// Fraction of rows with a counterfactual (0 for an empty batch).
    pub fn flip_rate(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.flipped_count() as f64 / self.rows.len() as f64
    }

    /// Mean number of edits over flipped rows (0 when nothing flipped).
    pub fn mean_edits(&self) -> f64 {
        let flipped: Vec<&EditRow> = self.rows.iter().filter(|r| r.status.is_flipped()).collect();
        if flipped.is_empty() {
            return 0.0;
        }
        flipped.iter().map(|r| r.num_edits()).sum::<usize>() as f64 / flipped.len() as f64
    }

    /// Serialize the output table to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
