//! Frozen GNN edge scorer
//!
//! Runs the pretrained message-passing network over one substitution graph
//! and reads a score in (0, 1) off every edge.

use crate::errors::{CounterfactualError, Result};
use crate::gnn::layers::{sigmoid, GnBlock, Linear};
use crate::graph::bipartite::{BipartiteGraph, EDGE_FEATURE_DIM, NODE_FEATURE_DIM};
use crate::json::read_resource;
use crate::pipeline::traits::EdgeScorer;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Serialized weights of the edge scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnnWeights {
    pub node_dim: usize,
    pub edge_dim: usize,
    pub blocks: Vec<GnBlock>,
    /// Maps a final edge embedding to one logit
    pub readout: Linear,
}

impl GnnWeights {
    /// Parse weights from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load weights from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&read_resource(path.as_ref())?)
    }

    /// Check every layer against the feature widths the graph produces
    pub fn validate(&self) -> Result<()> {
        if self.node_dim != NODE_FEATURE_DIM {
            return Err(CounterfactualError::dimension_mismatch(
                "node features",
                NODE_FEATURE_DIM,
                self.node_dim,
            ));
        }
        if self.edge_dim != EDGE_FEATURE_DIM {
            return Err(CounterfactualError::dimension_mismatch(
                "edge features",
                EDGE_FEATURE_DIM,
                self.edge_dim,
            ));
        }
        for (i, block) in self.blocks.iter().enumerate() {
            block.validate(i, self.node_dim, self.edge_dim)?;
        }
        self.readout.expect_shape("readout", self.edge_dim, 1)
    }

    /// Reproducible pseudo-random weights, for tests and benchmarks
    ///
    /// Values are drawn uniformly from `[-0.5, 0.5)` with a ChaCha8 stream,
    /// so the same `(layers, seed)` always gives the same model.
    pub fn seeded(layers: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut dense = |in_dim: usize, out_dim: usize| Linear {
            weight: (0..out_dim)
                .map(|_| (0..in_dim).map(|_| rng.gen_range(-0.5f32..0.5)).collect())
                .collect(),
            bias: (0..out_dim).map(|_| rng.gen_range(-0.5f32..0.5)).collect(),
        };

        let (n, e) = (NODE_FEATURE_DIM, EDGE_FEATURE_DIM);
        let blocks = (0..layers)
            .map(|_| GnBlock {
                edge_mlp: dense(e + 2 * n, e),
                node_mlp: dense(n + e, n),
            })
            .collect();
        let readout = dense(e, 1);

        Self {
            node_dim: n,
            edge_dim: e,
            blocks,
            readout,
        }
    }
}

/// Message-passing edge scorer with frozen weights
#[derive(Debug, Clone)]
pub struct GnnScorer {
    weights: GnnWeights,
}

impl GnnScorer {
    /// Number of message-passing blocks in the pretrained model
    pub const DEFAULT_LAYERS: usize = 5;

    /// Wrap validated weights
    pub fn new(weights: GnnWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Load and validate weights from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(GnnWeights::from_path(path)?)
    }

    pub fn weights(&self) -> &GnnWeights {
        &self.weights
    }

    pub fn num_layers(&self) -> usize {
        self.weights.blocks.len()
    }

    /// One forward pass over the whole graph
    pub fn forward(&self, graph: &BipartiteGraph) -> Result<Vec<f64>> {
        if graph.is_empty() {
            return Ok(Vec::new());
        }
        graph.validate()?;

        let mut nodes: Vec<Vec<f32>> = graph.node_features().iter().map(|f| f.to_vec()).collect();
        let mut edges: Vec<Vec<f32>> = graph.edge_features()?.iter().map(|f| f.to_vec()).collect();
        let endpoints = graph.edge_endpoints();

        for block in &self.weights.blocks {
            let (n, e) = block.forward(&nodes, &edges, &endpoints)?;
            nodes = n;
            edges = e;
        }

        let mut scores = Vec::with_capacity(edges.len());
        for (id, edge) in edges.iter().enumerate() {
            let logit = self
                .weights
                .readout
                .forward(edge)?
                .first()
                .copied()
                .ok_or_else(|| CounterfactualError::internal("readout produced no output"))?;
            let score = sigmoid(logit) as f64;
            if !score.is_finite() {
                return Err(CounterfactualError::inference(format!(
                    "non-finite score for edge {id}"
                )));
            }
            scores.push(score);
        }

        debug!(
            edges = scores.len(),
            layers = self.num_layers(),
            "scored substitution edges"
        );
        Ok(scores)
    }
}

impl EdgeScorer for GnnScorer {
    fn score(&self, graph: &BipartiteGraph) -> Result<Vec<f64>> {
        self.forward(graph)
    }
}
