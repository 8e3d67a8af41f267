//! Bipartite substitution graph
//!
//! One partition holds the sentence positions that may be edited, the other
//! the candidate substitute words. Nodes live in two `Vec`s and are addressed
//! by `u32` ids; an edge proposes replacing the word at a position with a
//! candidate. The GNN sees a single node list: positions first, then
//! candidates offset by the number of positions.

use crate::errors::{CounterfactualError, Result};
use crate::types::{LexicalRelation, PosTag};
use serde::{Deserialize, Serialize};

/// Width of the node feature vector the pretrained scorer expects
pub const NODE_FEATURE_DIM: usize = 8;
/// Width of the edge feature vector the pretrained scorer expects
pub const EDGE_FEATURE_DIM: usize = 16;

/// An editable position in the sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionNode {
    /// Index of the token in the sentence
    pub token_idx: usize,
    /// Original surface form
    pub word: String,
    pub pos: PosTag,
}

impl PositionNode {
    pub fn new(token_idx: usize, word: impl Into<String>, pos: PosTag) -> Self {
        Self {
            token_idx,
            word: word.into(),
            pos,
        }
    }
}

/// A candidate substitute, shared by every position that proposes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateNode {
    pub word: String,
    pub pos: PosTag,
    /// Relation to the words it replaces
    pub relation: LexicalRelation,
}

impl CandidateNode {
    pub fn new(word: impl Into<String>, pos: PosTag, relation: LexicalRelation) -> Self {
        Self {
            word: word.into(),
            pos,
            relation,
        }
    }
}

/// Proposal to put `candidate` at `position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionEdge {
    /// Position node id
    pub position: u32,
    /// Candidate node id (within the candidate partition)
    pub candidate: u32,
    /// Candidate POS is compatible with the position POS
    pub pos_match: bool,
    pub relation: LexicalRelation,
}

impl SubstitutionEdge {
    pub fn new(position: u32, candidate: u32, pos_match: bool, relation: LexicalRelation) -> Self {
        Self {
            position,
            candidate,
            pos_match,
            relation,
        }
    }
}

/// Positions × candidates for one sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BipartiteGraph {
    positions: Vec<PositionNode>,
    candidates: Vec<CandidateNode>,
    edges: Vec<SubstitutionEdge>,
    /// Token count of the sentence the graph was built from
    sentence_len: usize,
}

impl BipartiteGraph {
    /// Assemble a graph from its parts.
    ///
    /// Fails when an edge endpoint is not a valid id into `positions` or
    /// `candidates`.
    pub fn new(
        positions: Vec<PositionNode>,
        candidates: Vec<CandidateNode>,
        edges: Vec<SubstitutionEdge>,
        sentence_len: usize,
    ) -> Result<Self> {
        let graph = Self::from_checked_parts(positions, candidates, edges, sentence_len);
        graph.validate()?;
        Ok(graph)
    }

    /// Assemble a graph whose edge endpoints are known to be valid
    pub(crate) fn from_checked_parts(
        positions: Vec<PositionNode>,
        candidates: Vec<CandidateNode>,
        edges: Vec<SubstitutionEdge>,
        sentence_len: usize,
    ) -> Self {
        Self {
            positions,
            candidates,
            edges,
            sentence_len,
        }
    }

    /// Check every edge endpoint against the node lists.
    ///
    /// Graphs that arrive through serde skip [`BipartiteGraph::new`], so
    /// scoring re-checks them here.
    pub fn validate(&self) -> Result<()> {
        for (id, edge) in self.edges.iter().enumerate() {
            if self.position(edge.position).is_none() {
                return Err(CounterfactualError::inference(format!(
                    "edge {id} points at position {} but the graph has {}",
                    edge.position,
                    self.positions.len()
                )));
            }
            if self.candidate(edge.candidate).is_none() {
                return Err(CounterfactualError::inference(format!(
                    "edge {id} points at candidate {} but the graph has {}",
                    edge.candidate,
                    self.candidates.len()
                )));
            }
        }
        Ok(())
    }

    /// Graph with no nodes or edges
    pub fn empty(sentence_len: usize) -> Self {
        Self::from_checked_parts(Vec::new(), Vec::new(), Vec::new(), sentence_len)
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Total node count seen by the GNN
    pub fn num_nodes(&self) -> usize {
        self.positions.len() + self.candidates.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// True when there is nothing to substitute
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn sentence_len(&self) -> usize {
        self.sentence_len
    }

    pub fn positions(&self) -> &[PositionNode] {
        &self.positions
    }

    pub fn candidates(&self) -> &[CandidateNode] {
        &self.candidates
    }

    pub fn edges(&self) -> &[SubstitutionEdge] {
        &self.edges
    }

    pub fn position(&self, id: u32) -> Option<&PositionNode> {
        self.positions.get(id as usize)
    }

    pub fn candidate(&self, id: u32) -> Option<&CandidateNode> {
        self.candidates.get(id as usize)
    }

    pub fn edge(&self, id: u32) -> Option<&SubstitutionEdge> {
        self.edges.get(id as usize)
    }

    /// Edges leaving one position, with their ids
    pub fn edges_at(&self, position: u32) -> impl Iterator<Item = (u32, &SubstitutionEdge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.position == position)
            .map(|(id, e)| (id as u32, e))
    }

    /// Number of edges per position node (edges with unknown ids are skipped)
    pub fn position_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.positions.len()];
        for edge in &self.edges {
            if let Some(d) = degrees.get_mut(edge.position as usize) {
                *d += 1;
            }
        }
        degrees
    }

    /// Number of edges per candidate node (edges with unknown ids are skipped)
    pub fn candidate_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.candidates.len()];
        for edge in &self.edges {
            if let Some(d) = degrees.get_mut(edge.candidate as usize) {
                *d += 1;
            }
        }
        degrees
    }

    /// Positions with at least one edge
    pub fn active_position_count(&self) -> usize {
        self.position_degrees().iter().filter(|&&d| d > 0).count()
    }

    /// `(source, target)` in the unified node numbering
    pub fn edge_endpoints(&self) -> Vec<(usize, usize)> {
        let offset = self.positions.len();
        self.edges
            .iter()
            .map(|e| (e.position as usize, offset + e.candidate as usize))
            .collect()
    }

    /// Node features: `[is_position, is_candidate, noun, verb, adj, adv, other, scalar]`.
    ///
    /// `scalar` is the relative token index for positions and the fraction of
    /// positions a candidate attaches to for candidates.
    pub fn node_features(&self) -> Vec<[f32; NODE_FEATURE_DIM]> {
        let mut features = Vec::with_capacity(self.num_nodes());
        let len = self.sentence_len.max(1) as f32;

        for node in &self.positions {
            let mut f = [0.0f32; NODE_FEATURE_DIM];
            f[0] = 1.0;
            f[2 + node.pos.coarse_index()] = 1.0;
            f[7] = node.token_idx as f32 / len;
            features.push(f);
        }

        let positions = self.positions.len().max(1) as f32;
        for (node, degree) in self.candidates.iter().zip(self.candidate_degrees()) {
            let mut f = [0.0f32; NODE_FEATURE_DIM];
            f[1] = 1.0;
            f[2 + node.pos.coarse_index()] = 1.0;
            f[7] = degree as f32 / positions;
            features.push(f);
        }

        features
    }

    /// Edge features: `[pos_match, synonym, antonym, relative_index,
    /// position POS one-hot ×5, candidate POS one-hot ×5, length_ratio,
    /// shared_prefix]`.
    pub fn edge_features(&self) -> Result<Vec<[f32; EDGE_FEATURE_DIM]>> {
        let len = self.sentence_len.max(1) as f32;
        self.edges
            .iter()
            .enumerate()
            .map(|(id, e)| {
                let (Some(position), Some(candidate)) =
                    (self.position(e.position), self.candidate(e.candidate))
                else {
                    return Err(CounterfactualError::inference(format!(
                        "edge {id} has an unknown endpoint"
                    )));
                };

                let mut f = [0.0f32; EDGE_FEATURE_DIM];
                f[0] = if e.pos_match { 1.0 } else { 0.0 };
                match e.relation {
                    LexicalRelation::Synonym => f[1] = 1.0,
                    LexicalRelation::Antonym => f[2] = 1.0,
                }
                f[3] = position.token_idx as f32 / len;
                f[4 + position.pos.coarse_index()] = 1.0;
                f[9 + candidate.pos.coarse_index()] = 1.0;
                let (ratio, prefix) = surface_similarity(&position.word, &candidate.word);
                f[14] = ratio;
                f[15] = prefix;
                Ok(f)
            })
            .collect()
    }
}

/// Length ratio and shared-prefix fraction of two words, both in [0, 1]
fn surface_similarity(a: &str, b: &str) -> (f32, f32) {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let la = a.chars().count();
    let lb = b.chars().count();
    let longest = la.max(lb);
    if longest == 0 {
        return (0.0, 0.0);
    }
    let ratio = la.min(lb) as f32 / longest as f32;
    let shared = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    (ratio, shared as f32 / longest as f32)
}
