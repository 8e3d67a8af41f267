//! Dense layers and message-passing blocks
//!
//! Plain `f32` row-major weights, loaded once and never updated. Every
//! forward call checks input widths and reports mismatches as errors.

use crate::errors::{CounterfactualError, Result};
use serde::{Deserialize, Serialize};

#[inline]
pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// A fully connected layer: `y = W x + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// `out × in`, one row per output unit
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl Linear {
    /// Create a layer, checking that the shapes agree
    pub fn new(weight: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self> {
        let layer = Self { weight, bias };
        layer.validate("linear")?;
        Ok(layer)
    }

    /// A layer whose output is always zero
    pub fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self {
            weight: vec![vec![0.0; in_dim]; out_dim],
            bias: vec![0.0; out_dim],
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.first().map_or(0, |row| row.len())
    }

    pub fn out_dim(&self) -> usize {
        self.weight.len()
    }

    /// Check internal consistency; `context` names the layer in errors
    pub fn validate(&self, context: &str) -> Result<()> {
        if self.weight.is_empty() {
            return Err(CounterfactualError::invalid_config(format!(
                "{context}: weight matrix is empty"
            )));
        }
        if self.bias.len() != self.out_dim() {
            return Err(CounterfactualError::dimension_mismatch(
                format!("{context} bias"),
                self.out_dim(),
                self.bias.len(),
            ));
        }
        let in_dim = self.in_dim();
        if let Some(row) = self.weight.iter().find(|row| row.len() != in_dim) {
            return Err(CounterfactualError::dimension_mismatch(
                format!("{context} weight row"),
                in_dim,
                row.len(),
            ));
        }
        let finite = self
            .weight
            .iter()
            .flatten()
            .chain(self.bias.iter())
            .all(|w| w.is_finite());
        if !finite {
            return Err(CounterfactualError::invalid_config(format!(
                "{context}: non-finite weight"
            )));
        }
        Ok(())
    }

    /// Check the layer maps `in_dim` to `out_dim`
    pub fn expect_shape(&self, context: &str, in_dim: usize, out_dim: usize) -> Result<()> {
        self.validate(context)?;
        if self.in_dim() != in_dim {
            return Err(CounterfactualError::dimension_mismatch(
                format!("{context} input"),
                in_dim,
                self.in_dim(),
            ));
        }
        if self.out_dim() != out_dim {
            return Err(CounterfactualError::dimension_mismatch(
                format!("{context} output"),
                out_dim,
                self.out_dim(),
            ));
        }
        Ok(())
    }

    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.in_dim() {
            return Err(CounterfactualError::dimension_mismatch(
                "linear forward",
                self.in_dim(),
                input.len(),
            ));
        }
        Ok(self
            .weight
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect())
    }
}

/// One message-passing block
///
/// Edges are updated from `[edge, source node, target node]`, then nodes
/// from `[node, mean of incident updated edges]`. Both updates use ReLU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnBlock {
    pub edge_mlp: Linear,
    pub node_mlp: Linear,
}

impl GnBlock {
    /// Check the block maps `(node_dim, edge_dim)` onto itself
    pub fn validate(&self, index: usize, node_dim: usize, edge_dim: usize) -> Result<()> {
        self.edge_mlp.expect_shape(
            &format!("block {index} edge_mlp"),
            edge_dim + 2 * node_dim,
            edge_dim,
        )?;
        self.node_mlp.expect_shape(
            &format!("block {index} node_mlp"),
            node_dim + edge_dim,
            node_dim,
        )
    }

    /// Run the block over the whole graph
    ///
    /// `endpoints[i]` holds the `(source, target)` node indices of edge `i`.
    pub fn forward(
        &self,
        nodes: &[Vec<f32>],
        edges: &[Vec<f32>],
        endpoints: &[(usize, usize)],
    ) -> Result<(Vec<Vec<f32>>, Vec<Vec<f32>>)> {
        if edges.len() != endpoints.len() {
            return Err(CounterfactualError::dimension_mismatch(
                "edge endpoints",
                edges.len(),
                endpoints.len(),
            ));
        }

        let edge_dim = self.edge_mlp.out_dim();
        let mut new_edges = Vec::with_capacity(edges.len());
        let mut incoming = vec![vec![0.0f32; edge_dim]; nodes.len()];
        let mut counts = vec![0usize; nodes.len()];

        for (edge, &(src, dst)) in edges.iter().zip(endpoints) {
            let (Some(h_src), Some(h_dst)) = (nodes.get(src), nodes.get(dst)) else {
                return Err(CounterfactualError::internal(format!(
                    "edge endpoint ({src}, {dst}) out of range for {} nodes",
                    nodes.len()
                )));
            };

            let mut input = Vec::with_capacity(self.edge_mlp.in_dim());
            input.extend_from_slice(edge);
            input.extend_from_slice(h_src);
            input.extend_from_slice(h_dst);
            let updated: Vec<f32> = self.edge_mlp.forward(&input)?.into_iter().map(relu).collect();

            for node in [src, dst] {
                for (acc, v) in incoming[node].iter_mut().zip(&updated) {
                    *acc += v;
                }
                counts[node] += 1;
            }
            new_edges.push(updated);
        }

        let mut new_nodes = Vec::with_capacity(nodes.len());
        for ((h, agg), count) in nodes.iter().zip(incoming).zip(counts) {
            let scale = if count > 0 { 1.0 / count as f32 } else { 0.0 };
            let mut input = Vec::with_capacity(self.node_mlp.in_dim());
            input.extend_from_slice(h);
            input.extend(agg.into_iter().map(|v| v * scale));
            new_nodes.push(self.node_mlp.forward(&input)?.into_iter().map(relu).collect());
        }

        Ok((new_nodes, new_edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activations() {
        assert_eq!(relu(-1.0), 0.0);
        assert_eq!(relu(2.5), 2.5);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_linear_forward() {
        let layer = Linear::new(vec![vec![1.0, 2.0], vec![0.0, -1.0]], vec![0.5, 0.0]).unwrap();
        assert_eq!(layer.in_dim(), 2);
        assert_eq!(layer.out_dim(), 2);
        assert_eq!(layer.forward(&[1.0, 1.0]).unwrap(), vec![3.5, -1.0]);
    }

    #[test]
    fn test_linear_rejects_bad_shapes() {
        assert!(Linear::new(vec![vec![1.0, 2.0], vec![1.0]], vec![0.0, 0.0]).is_err());
        assert!(Linear::new(vec![vec![1.0]], vec![0.0, 0.0]).is_err());
        assert!(Linear::new(vec![], vec![]).is_err());
        assert!(Linear::new(vec![vec![f32::NAN]], vec![0.0]).is_err());

        let layer = Linear::zeros(3, 1);
        let err = layer.forward(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            CounterfactualError::DimensionMismatch {
                expected: 3,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_block_shapes() {
        let block = GnBlock {
            edge_mlp: Linear::zeros(4, 2),
            node_mlp: Linear::zeros(3, 1),
        };
        assert!(block.validate(0, 1, 2).is_ok());
        assert!(block.validate(0, 2, 2).is_err());
    }

    #[test]
    fn test_block_forward_mean_aggregation() {
        // node_dim 1, edge_dim 1; edge update copies the edge feature,
        // node update copies the aggregated message.
        let block = GnBlock {
            edge_mlp: Linear::new(vec![vec![1.0, 0.0, 0.0]], vec![0.0]).unwrap(),
            node_mlp: Linear::new(vec![vec![0.0, 1.0]], vec![0.0]).unwrap(),
        };
        let nodes = vec![vec![0.0], vec![0.0], vec![0.0]];
        let edges = vec![vec![2.0], vec![4.0]];
        let endpoints = vec![(0, 1), (0, 2)];

        let (new_nodes, new_edges) = block.forward(&nodes, &edges, &endpoints).unwrap();
        assert_eq!(new_edges, vec![vec![2.0], vec![4.0]]);
        // node 0 sees both edges: mean 3
        assert_eq!(new_nodes[0], vec![3.0]);
        assert_eq!(new_nodes[1], vec![2.0]);
        assert_eq!(new_nodes[2], vec![4.0]);
    }

    #[test]
    fn test_block_forward_relu_and_isolated_nodes() {
        let block = GnBlock {
            edge_mlp: Linear::new(vec![vec![-1.0, 0.0, 0.0]], vec![0.0]).unwrap(),
            node_mlp: Linear::new(vec![vec![1.0, 1.0]], vec![0.0]).unwrap(),
        };
        let nodes = vec![vec![1.0], vec![1.0], vec![5.0]];
        let edges = vec![vec![3.0]];
        let (new_nodes, new_edges) = block.forward(&nodes, &edges, &[(0, 1)]).unwrap();
        assert_eq!(new_edges, vec![vec![0.0]]);
        // isolated node keeps only its own contribution
        assert_eq!(new_nodes[2], vec![5.0]);
    }

    #[test]
    fn test_block_forward_bad_endpoint() {
        let block = GnBlock {
            edge_mlp: Linear::zeros(3, 1),
            node_mlp: Linear::zeros(2, 1),
        };
        let result = block.forward(&[vec![0.0]], &[vec![0.0]], &[(0, 9)]);
        assert!(result.is_err());
    }
}
