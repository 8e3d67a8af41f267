//! Collaborator trait definitions for the pipeline.
//!
//! Each trait is one seam between the editor and an external model or
//! resource. Implementations are injected into
//! [`CounterfactualEditor`](crate::pipeline::runner::CounterfactualEditor) at
//! construction and statically dispatched; `&T` and `Box<T>` forward, so trait
//! objects work too.

use crate::errors::Result;
use crate::graph::bipartite::BipartiteGraph;
use crate::pipeline::artifacts::Prediction;
use crate::types::{LexicalRelation, PosTag};
use serde::{Deserialize, Serialize};

// ============================================================================
// SubstitutionProvider: word to candidate substitutes
// ============================================================================

/// A candidate replacement word with its POS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Substitute {
    pub word: String,
    pub pos: PosTag,
}

impl Substitute {
    pub fn new(word: impl Into<String>, pos: PosTag) -> Self {
        Self {
            word: word.into(),
            pos,
        }
    }
}

/// Source of lexical substitutes.
///
/// # Contract
///
/// - **Input**: a non-empty word, an optional POS constraint and the
///   relation the substitutes must hold.
/// - **Output**: the finite set of substitutes. Empty means the word has no
///   valid substitutes; callers skip the position.
/// - **Strict**: a word related to `word` by both relations is never
///   returned, and `word` itself is never returned.
/// - **Deterministic**: identical inputs give identical outputs, sorted by
///   word then POS.
pub trait SubstitutionProvider {
    /// Candidate substitutes for `word`.
    fn candidates(
        &self,
        word: &str,
        pos: Option<PosTag>,
        relation: LexicalRelation,
    ) -> Vec<Substitute>;
}

/// Provider that never offers a substitute.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProvider;

impl SubstitutionProvider for EmptyProvider {
    #[inline]
    fn candidates(
        &self,
        _word: &str,
        _pos: Option<PosTag>,
        _relation: LexicalRelation,
    ) -> Vec<Substitute> {
        Vec::new()
    }
}

impl<T: SubstitutionProvider + ?Sized> SubstitutionProvider for &T {
    fn candidates(
        &self,
        word: &str,
        pos: Option<PosTag>,
        relation: LexicalRelation,
    ) -> Vec<Substitute> {
        (**self).candidates(word, pos, relation)
    }
}

impl<T: SubstitutionProvider + ?Sized> SubstitutionProvider for Box<T> {
    fn candidates(
        &self,
        word: &str,
        pos: Option<PosTag>,
        relation: LexicalRelation,
    ) -> Vec<Substitute> {
        (**self).candidates(word, pos, relation)
    }
}

// ============================================================================
// EdgeScorer: graph to per-edge scores
// ============================================================================

/// Scores every substitution edge of a graph in one pass.
///
/// # Contract
///
/// - **Output**: exactly one finite score per edge, in edge order. Higher
///   means the substitution is more likely to move the classifier.
/// - **Frozen**: scoring the same graph twice gives the same scores.
pub trait EdgeScorer {
    /// Score all edges of `graph`.
    fn score(&self, graph: &BipartiteGraph) -> Result<Vec<f64>>;
}

/// Scorer that assigns every edge the same score.
///
/// With uniform scores the beam falls back to edge order.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEdgeScorer;

impl EdgeScorer for UniformEdgeScorer {
    #[inline]
    fn score(&self, graph: &BipartiteGraph) -> Result<Vec<f64>> {
        Ok(vec![0.5; graph.num_edges()])
    }
}

impl<T: EdgeScorer + ?Sized> EdgeScorer for &T {
    fn score(&self, graph: &BipartiteGraph) -> Result<Vec<f64>> {
        (**self).score(graph)
    }
}

impl<T: EdgeScorer + ?Sized> EdgeScorer for Box<T> {
    fn score(&self, graph: &BipartiteGraph) -> Result<Vec<f64>> {
        (**self).score(graph)
    }
}

// ============================================================================
// ClassifierOracle: text to label
// ============================================================================

/// The classifier whose decision the editor tries to flip.
///
/// # Contract
///
/// - **Output**: a [`Prediction`] with a label and a probability vector.
/// - **Deterministic**: the same text gives the same prediction.
/// - **Errors**: inference failures are returned, never panicked; the
///   editor marks the row as failed and moves on.
pub trait ClassifierOracle {
    /// Classify one text.
    fn predict(&self, text: &str) -> Result<Prediction>;

    /// Classify many texts, in order.
    ///
    /// The default calls [`predict`](Self::predict) once per text; models
    /// with real batching should override it.
    fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>> {
        texts.iter().map(|t| self.predict(t)).collect()
    }
}

/// Adapter turning a closure into a [`ClassifierOracle`].
#[derive(Clone, Copy)]
pub struct FnOracle<F>(pub F);

impl<F> std::fmt::Debug for FnOracle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FnOracle").finish_non_exhaustive()
    }
}

impl<F> ClassifierOracle for FnOracle<F>
where
    F: Fn(&str) -> Result<Prediction>,
{
    fn predict(&self, text: &str) -> Result<Prediction> {
        (self.0)(text)
    }
}

impl<T: ClassifierOracle + ?Sized> ClassifierOracle for &T {
    fn predict(&self, text: &str) -> Result<Prediction> {
        (**self).predict(text)
    }

    fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>> {
        (**self).predict_batch(texts)
    }
}

impl<T: ClassifierOracle + ?Sized> ClassifierOracle for Box<T> {
    fn predict(&self, text: &str) -> Result<Prediction> {
        (**self).predict(text)
    }

    fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Prediction>> {
        (**self).predict_batch(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CounterfactualError;
    use crate::graph::bipartite::{CandidateNode, PositionNode, SubstitutionEdge};
    use std::cell::Cell;

    fn tiny_graph() -> BipartiteGraph {
        BipartiteGraph::new(
            vec![PositionNode::new(0, "good", PosTag::Adjective)],
            vec![
                CandidateNode::new("bad", PosTag::Adjective, LexicalRelation::Antonym),
                CandidateNode::new("poor", PosTag::Adjective, LexicalRelation::Antonym),
            ],
            vec![
                SubstitutionEdge::new(0, 0, true, LexicalRelation::Antonym),
                SubstitutionEdge::new(0, 1, true, LexicalRelation::Antonym),
            ],
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_provider() {
        let p = EmptyProvider;
        assert!(p
            .candidates("good", Some(PosTag::Adjective), LexicalRelation::Antonym)
            .is_empty());
    }

    #[test]
    fn test_provider_trait_object() {
        let boxed: Box<dyn SubstitutionProvider> = Box::new(EmptyProvider);
        assert!(boxed.candidates("x", None, LexicalRelation::Synonym).is_empty());
        let by_ref: &dyn SubstitutionProvider = &EmptyProvider;
        assert!(by_ref.candidates("x", None, LexicalRelation::Synonym).is_empty());
    }

    #[test]
    fn test_uniform_scorer() {
        let scores = UniformEdgeScorer.score(&tiny_graph()).unwrap();
        assert_eq!(scores, vec![0.5, 0.5]);

        let dyn_scorer: &dyn EdgeScorer = &UniformEdgeScorer;
        assert_eq!(dyn_scorer.score(&tiny_graph()).unwrap().len(), 2);
    }

    #[test]
    fn test_fn_oracle_and_default_batch() {
        let calls = Cell::new(0usize);
        let oracle = FnOracle(|text: &str| {
            calls.set(calls.get() + 1);
            if text.contains("bad") {
                Prediction::from_probabilities(vec![0.9, 0.1])
            } else {
                Prediction::from_probabilities(vec![0.2, 0.8])
            }
        });

        let preds = oracle.predict_batch(&["a bad film", "a good film"]).unwrap();
        assert_eq!(preds[0].label, 0);
        assert_eq!(preds[1].label, 1);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_oracle_errors_propagate() {
        let oracle = FnOracle(|_: &str| Err(CounterfactualError::inference("model offline")));
        let boxed: Box<dyn ClassifierOracle> = Box::new(oracle);
        assert!(boxed.predict("x").unwrap_err().is_inference_failure());
        assert!(boxed.predict_batch(&["x", "y"]).is_err());
    }
}
