//! A graph paired with its edge scores
//!
//! Scores live beside the graph rather than inside it, so a scored graph is
//! immutable and the same graph can be rescored by another model.

use crate::errors::{CounterfactualError, Result};
use crate::graph::bipartite::BipartiteGraph;
use crate::pipeline::traits::EdgeScorer;
use crate::types::{cmp_score_desc, SCORE_EPSILON};

/// A substitution graph with one score per edge
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGraph {
    graph: BipartiteGraph,
    scores: Vec<f64>,
}

impl ScoredGraph {
    /// Score a graph; an edgeless graph never reaches the scorer
    pub fn score<S>(graph: BipartiteGraph, scorer: &S) -> Result<Self>
    where
        S: EdgeScorer + ?Sized,
    {
        if graph.is_empty() {
            return Ok(Self {
                graph,
                scores: Vec::new(),
            });
        }
        graph.validate()?;
        let scores = scorer.score(&graph)?;
        Self::from_parts(graph, scores)
    }

    /// Pair a graph with precomputed scores
    pub fn from_parts(graph: BipartiteGraph, scores: Vec<f64>) -> Result<Self> {
        graph.validate()?;
        if scores.len() != graph.num_edges() {
            return Err(CounterfactualError::dimension_mismatch(
                "edge scores",
                graph.num_edges(),
                scores.len(),
            ));
        }
        if let Some(id) = scores.iter().position(|s| !s.is_finite()) {
            return Err(CounterfactualError::inference(format!(
                "non-finite score for edge {id}"
            )));
        }
        Ok(Self { graph, scores })
    }

    pub fn graph(&self) -> &BipartiteGraph {
        &self.graph
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Score of one edge (0 for unknown ids)
    pub fn edge_score(&self, id: u32) -> f64 {
        self.scores.get(id as usize).copied().unwrap_or(0.0)
    }

    fn by_score_then_id(&self, a: u32, b: u32) -> std::cmp::Ordering {
        cmp_score_desc(self.edge_score(a), self.edge_score(b)).then(a.cmp(&b))
    }

    /// All edge ids, best first (ties: lower id)
    pub fn ranked_edges(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = (0..self.scores.len() as u32).collect();
        ids.sort_by(|&a, &b| self.by_score_then_id(a, b));
        ids
    }

    /// The search pool: each position's best `k` edges, best first
    ///
    /// `k == 0` keeps every edge.
    pub fn top_edges_per_position(&self, k: usize) -> Vec<u32> {
        let mut per_position = vec![0usize; self.graph.num_positions()];
        let mut pool = Vec::new();
        for id in self.ranked_edges() {
            let Some(count) = self
                .graph
                .edge(id)
                .and_then(|e| per_position.get_mut(e.position as usize))
            else {
                continue;
            };
            if k == 0 || *count < k {
                *count += 1;
                pool.push(id);
            }
        }
        pool
    }

    /// Best edge score of each position (None for positions without edges)
    pub fn best_score_per_position(&self) -> Vec<Option<f64>> {
        let mut best: Vec<Option<f64>> = vec![None; self.graph.num_positions()];
        for (edge, &score) in self.graph.edges().iter().zip(&self.scores) {
            if let Some(slot) = best.get_mut(edge.position as usize) {
                *slot = Some(slot.map_or(score, |b: f64| b.max(score)));
            }
        }
        best
    }

    /// Mean edge score, 0 for an edgeless graph
    pub fn mean_score(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    /// Positions whose best edge reaches the mean edge score (at least 1)
    pub fn promising_positions(&self) -> usize {
        let mean = self.mean_score();
        let count = self
            .best_score_per_position()
            .into_iter()
            .flatten()
            .filter(|&best| best >= mean - SCORE_EPSILON)
            .count();
        count.max(1)
    }
}
