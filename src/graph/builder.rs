//! Substitution graph builder
//!
//! This module provides a mutable builder that uses FxHashMap lookups to
//! deduplicate candidate nodes and edges during construction, then freezes
//! into a [`BipartiteGraph`].

use crate::graph::bipartite::{BipartiteGraph, CandidateNode, PositionNode, SubstitutionEdge};
use crate::pipeline::traits::{Substitute, SubstitutionProvider};
use crate::types::{GeneratorConfig, LexicalRelation, PosTag, Sentence, Token};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// A mutable bipartite graph builder
#[derive(Debug, Default)]
pub struct BipartiteGraphBuilder {
    /// Maps token index -> position node ID
    position_ids: FxHashMap<usize, u32>,
    positions: Vec<PositionNode>,
    /// Maps (word, POS) -> candidate node ID
    candidate_ids: FxHashMap<(String, PosTag), u32>,
    candidates: Vec<CandidateNode>,
    edge_keys: FxHashSet<(u32, u32)>,
    edges: Vec<SubstitutionEdge>,
    sentence_len: usize,
}

impl BipartiteGraphBuilder {
    /// Create a new empty builder for a sentence of `sentence_len` tokens
    pub fn new(sentence_len: usize) -> Self {
        Self {
            sentence_len,
            ..Self::default()
        }
    }

    /// Get or create the position node for a token, returning its ID
    pub fn add_position(&mut self, token_idx: usize, word: &str, pos: PosTag) -> u32 {
        if let Some(&id) = self.position_ids.get(&token_idx) {
            return id;
        }

        let id = self.positions.len() as u32;
        self.position_ids.insert(token_idx, id);
        self.positions.push(PositionNode::new(token_idx, word, pos));
        id
    }

    /// Get or create a candidate node, returning its ID
    ///
    /// Candidates are shared across positions by `(word, POS)`.
    pub fn get_or_create_candidate(
        &mut self,
        word: &str,
        pos: PosTag,
        relation: LexicalRelation,
    ) -> u32 {
        let key = (word.to_string(), pos);
        if let Some(&id) = self.candidate_ids.get(&key) {
            return id;
        }

        let id = self.candidates.len() as u32;
        self.candidate_ids.insert(key, id);
        self.candidates.push(CandidateNode::new(word, pos, relation));
        id
    }

    /// Add a substitution edge
    ///
    /// Returns false when the edge already exists, an id is unknown, or the
    /// candidate is the position's own word.
    pub fn add_edge(&mut self, position: u32, candidate: u32, relation: LexicalRelation) -> bool {
        let (Some(p), Some(c)) = (
            self.positions.get(position as usize),
            self.candidates.get(candidate as usize),
        ) else {
            return false;
        };

        if p.word.to_lowercase() == c.word.to_lowercase() {
            return false; // No self-substitution
        }

        if !self.edge_keys.insert((position, candidate)) {
            return false;
        }

        let pos_match = p.pos.is_compatible(&c.pos);
        self.edges
            .push(SubstitutionEdge::new(position, candidate, pos_match, relation));
        true
    }

    /// Get the number of edges added so far
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if no edge has been added
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Freeze into an immutable graph
    pub fn build(self) -> BipartiteGraph {
        BipartiteGraph::from_checked_parts(
            self.positions,
            self.candidates,
            self.edges,
            self.sentence_len,
        )
    }

    /// Build the substitution graph of a sentence
    ///
    /// Every token passing the POS filter is looked up by its lowercased
    /// surface form, falling back to its lemma. Positions only enter the
    /// graph once they have at least one edge, so a sentence with nothing to
    /// substitute yields an empty graph.
    pub fn from_sentence<P>(
        sentence: &Sentence,
        provider: &P,
        cfg: &GeneratorConfig,
    ) -> BipartiteGraph
    where
        P: SubstitutionProvider + ?Sized,
    {
        let mut builder = Self::new(sentence.len());
        let mut truncated = false;

        'tokens: for token in sentence
            .tokens
            .iter()
            .filter(|t| t.is_substitution_site(cfg.pos_filter))
        {
            let surface = token.text.to_lowercase();
            for sub in lookup(token, provider, cfg) {
                if sub.word == surface || sub.word == token.lemma {
                    continue;
                }
                if cfg.edge_filter && !token.pos.is_compatible(&sub.pos) {
                    continue;
                }
                if let Some(limit) = cfg.max_edges {
                    if builder.edge_count() >= limit {
                        truncated = true;
                        break 'tokens;
                    }
                }

                let position = builder.add_position(token.index, &token.text, token.pos);
                let candidate = builder.get_or_create_candidate(&sub.word, sub.pos, cfg.relation);
                builder.add_edge(position, candidate, cfg.relation);
            }
        }

        if truncated {
            warn!(
                row = sentence.row,
                max_edges = cfg.max_edges.unwrap_or_default(),
                "substitution graph truncated at edge limit"
            );
        }

        let graph = builder.build();
        debug!(
            row = sentence.row,
            positions = graph.num_positions(),
            candidates = graph.num_candidates(),
            edges = graph.num_edges(),
            "built substitution graph"
        );
        graph
    }
}

/// Query the provider by surface form, then by lemma
fn lookup<P>(token: &Token, provider: &P, cfg: &GeneratorConfig) -> Vec<Substitute>
where
    P: SubstitutionProvider + ?Sized,
{
    let surface = token.text.to_lowercase();
    let found = provider.candidates(&surface, cfg.pos_filter, cfg.relation);
    if !found.is_empty() || token.lemma.is_empty() || token.lemma == surface {
        return found;
    }
    provider.candidates(&token.lemma, cfg.pos_filter, cfg.relation)
}

/// Build substitution graphs for many sentences in parallel
///
/// Output order follows input order.
pub fn build_graphs_parallel<P>(
    sentences: &[Sentence],
    provider: &P,
    cfg: &GeneratorConfig,
) -> Vec<BipartiteGraph>
where
    P: SubstitutionProvider + Sync + ?Sized,
{
    sentences
        .par_iter()
        .map(|s| BipartiteGraphBuilder::from_sentence(s, provider, cfg))
        .collect()
}
