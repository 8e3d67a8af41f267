//! Beam states and their ordering

use std::cmp::Ordering;

use crate::gnn::ScoredGraph;
use crate::pipeline::artifacts::{AppliedEdit, Counterfactual, Prediction};
use crate::types::{cmp_score_desc, RankingCriterion, ScoreAggregation, Sentence};

/// One partial edit sequence in the beam
#[derive(Debug, Clone, PartialEq)]
pub struct BeamState {
    /// Applied edge ids, ascending
    edges: Vec<u32>,
    /// Position ids already edited, ascending
    positions: Vec<u32>,
    /// Aggregated GNN score of `edges`
    pub gnn_score: f64,
    /// The sentence with `edges` applied
    pub text: String,
    /// Classifier output on `text`, once evaluated
    pub prediction: Option<Prediction>,
    /// Negated contrastive margin against the original label, once evaluated
    pub contrastive: Option<f64>,
}

impl BeamState {
    /// The unedited sentence
    pub fn root(text: impl Into<String>) -> Self {
        Self {
            edges: Vec::new(),
            positions: Vec::new(),
            gnn_score: 0.0,
            text: text.into(),
            prediction: None,
            contrastive: None,
        }
    }

    pub fn edges(&self) -> &[u32] {
        &self.edges
    }

    pub fn num_edits(&self) -> usize {
        self.edges.len()
    }

    /// Check if the position already carries an edit
    pub fn has_position(&self, position: u32) -> bool {
        self.positions.binary_search(&position).is_ok()
    }

    /// Apply one more edge, unless its position is already edited
    pub fn extend(
        &self,
        edge_id: u32,
        scored: &ScoredGraph,
        sentence: &Sentence,
        aggregation: ScoreAggregation,
    ) -> Option<Self> {
        let edge = scored.graph().edge(edge_id)?;
        if self.has_position(edge.position) {
            return None;
        }

        let mut edges = self.edges.clone();
        let at = edges.binary_search(&edge_id).err()?;
        edges.insert(at, edge_id);

        let mut positions = self.positions.clone();
        let at = positions.binary_search(&edge.position).err()?;
        positions.insert(at, edge.position);

        let scores: Vec<f64> = edges.iter().map(|&id| scored.edge_score(id)).collect();
        let text = render(&edges, scored, sentence);

        Some(Self {
            edges,
            positions,
            gnn_score: aggregation.aggregate(&scores),
            text,
            prediction: None,
            contrastive: None,
        })
    }

    /// Attach the classifier's output
    pub fn set_prediction(&mut self, prediction: Prediction, original_label: usize) {
        self.contrastive = Some(-prediction.contrastive_margin(original_label));
        self.prediction = Some(prediction);
    }

    /// Whether the evaluated label differs from `original`
    pub fn flips(&self, original: &Prediction) -> bool {
        self.prediction
            .as_ref()
            .map(|p| p.flips(original))
            .unwrap_or(false)
    }

    /// Deterministic ranking, best first
    ///
    /// Contrastive ranking compares the contrastive score first (unevaluated
    /// states last). Then: higher GNN aggregate, fewer edits, and finally the
    /// lexicographically smaller edge id list.
    pub fn stable_cmp(&self, other: &Self, criterion: RankingCriterion) -> Ordering {
        if criterion == RankingCriterion::Contrastive {
            let ord = match (self.contrastive, other.contrastive) {
                (Some(a), Some(b)) => cmp_score_desc(a, b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        cmp_score_desc(self.gnn_score, other.gnn_score)
            .then_with(|| self.edges.len().cmp(&other.edges.len()))
            .then_with(|| self.edges.cmp(&other.edges))
    }

    /// Edits in token order
    pub fn applied_edits(&self, scored: &ScoredGraph) -> Vec<AppliedEdit> {
        let graph = scored.graph();
        let mut edits: Vec<AppliedEdit> = self
            .edges
            .iter()
            .filter_map(|&id| {
                let edge = graph.edge(id)?;
                let position = graph.position(edge.position)?;
                let candidate = graph.candidate(edge.candidate)?;
                Some(AppliedEdit {
                    token_idx: position.token_idx,
                    original: position.word.clone(),
                    substitute: candidate.word.clone(),
                    relation: edge.relation,
                    score: scored.edge_score(id),
                })
            })
            .collect();
        edits.sort_by_key(|e| e.token_idx);
        edits
    }

    /// Convert an evaluated state into a counterfactual
    pub fn into_counterfactual(self, scored: &ScoredGraph) -> Option<Counterfactual> {
        let edits = self.applied_edits(scored);
        Some(Counterfactual {
            text: self.text,
            edits,
            prediction: self.prediction?,
            gnn_score: self.gnn_score,
        })
    }
}

fn render(edges: &[u32], scored: &ScoredGraph, sentence: &Sentence) -> String {
    let graph = scored.graph();
    let replacements: Vec<(usize, &str)> = edges
        .iter()
        .filter_map(|&id| {
            let edge = graph.edge(id)?;
            let position = graph.position(edge.position)?;
            let candidate = graph.candidate(edge.candidate)?;
            Some((position.token_idx, candidate.word.as_str()))
        })
        .collect();
    sentence.apply_edits(&replacements)
}
