//! Beam search over substitution edges
//!
//! The planner grows edit sets one edge at a time, keeps the best
//! `beam_width` states per depth, and stops at the first depth where the
//! classifier's label moves away from the original.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CounterfactualError, Result};
use crate::gnn::ScoredGraph;
use crate::pipeline::artifacts::{Counterfactual, Prediction};
use crate::pipeline::traits::ClassifierOracle;
use crate::search::budget::EditBudget;
use crate::search::state::BeamState;
use crate::types::{GeneratorConfig, RankingCriterion, ScoreAggregation, Sentence};

/// Counters describing one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Frozen edit budget of the search
    pub budget: usize,
    /// Deepest level expanded
    pub depth: usize,
    /// Successor states generated (after dedup)
    pub expanded: usize,
    /// Texts sent to the oracle
    pub oracle_calls: usize,
    /// Largest beam after pruning
    pub max_beam: usize,
}

/// Result of one search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// The accepted counterfactual, if the label flipped within budget
    pub result: Option<Counterfactual>,
    /// Edge ids that appeared in an evaluated state, ascending
    pub evaluated_edges: Vec<u32>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    fn empty(stats: SearchStats) -> Self {
        Self {
            result: None,
            evaluated_edges: Vec::new(),
            stats,
        }
    }

    pub fn is_flipped(&self) -> bool {
        self.result.is_some()
    }
}

/// Beam search edit planner
///
/// The oracle is injected at construction; the planner holds no other state
/// between searches.
#[derive(Debug, Clone)]
pub struct BeamSearchPlanner<O> {
    oracle: O,
    beam_width: usize,
    top_k_per_position: usize,
    criterion: RankingCriterion,
    aggregation: ScoreAggregation,
}

impl<O: ClassifierOracle> BeamSearchPlanner<O> {
    pub fn new(oracle: O, beam_width: usize) -> Result<Self> {
        if beam_width == 0 {
            return Err(CounterfactualError::invalid_config(
                "beam_width must be > 0",
            ));
        }
        Ok(Self {
            oracle,
            beam_width,
            top_k_per_position: 0,
            criterion: RankingCriterion::default(),
            aggregation: ScoreAggregation::default(),
        })
    }

    /// Planner with every search parameter taken from `cfg`
    pub fn from_config(oracle: O, cfg: &GeneratorConfig) -> Result<Self> {
        Ok(Self::new(oracle, cfg.beam_width)?
            .with_top_k_per_position(cfg.top_k_per_position)
            .with_criterion(cfg.criterion())
            .with_aggregation(cfg.score_aggregation))
    }

    pub fn with_top_k_per_position(mut self, k: usize) -> Self {
        self.top_k_per_position = k;
        self
    }

    pub fn with_criterion(mut self, criterion: RankingCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_aggregation(mut self, aggregation: ScoreAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn beam_width(&self) -> usize {
        self.beam_width
    }

    pub fn criterion(&self) -> RankingCriterion {
        self.criterion
    }

    /// Search for a label-flipping edit set of at most `budget` edits
    pub fn search(
        &self,
        sentence: &Sentence,
        scored: &ScoredGraph,
        original: &Prediction,
        budget: EditBudget,
    ) -> Result<SearchOutcome> {
        let mut stats = SearchStats {
            budget: budget.limit(),
            ..SearchStats::default()
        };
        if budget.is_zero() || scored.graph().is_empty() {
            return Ok(SearchOutcome::empty(stats));
        }

        let pool = scored.top_edges_per_position(self.top_k_per_position);
        let mut cache: FxHashMap<String, Prediction> = FxHashMap::default();
        let mut evaluated: FxHashSet<u32> = FxHashSet::default();
        let mut beam = vec![BeamState::root(sentence.text.as_str())];

        for depth in 1..=budget.limit() {
            let mut successors = self.expand(&beam, &pool, scored, sentence);
            if successors.is_empty() {
                debug!(row = sentence.row, depth, "no successors left");
                break;
            }
            stats.depth = depth;
            stats.expanded += successors.len();

            match self.criterion {
                RankingCriterion::GnnScore => {
                    self.rank(&mut successors);
                    successors.truncate(self.beam_width);
                    stats.oracle_calls += self.evaluate(&mut successors, original, &mut cache)?;
                }
                RankingCriterion::Contrastive => {
                    stats.oracle_calls += self.evaluate(&mut successors, original, &mut cache)?;
                    self.rank(&mut successors);
                }
            }
            evaluated.extend(successors.iter().flat_map(|s| s.edges().iter().copied()));
            stats.max_beam = stats.max_beam.max(successors.len().min(self.beam_width));

            // successors are ranked, so the first flip is the best one
            if let Some(idx) = successors.iter().position(|s| s.flips(original)) {
                let best = successors.swap_remove(idx);
                debug!(
                    row = sentence.row,
                    depth,
                    edits = best.num_edits(),
                    gnn_score = best.gnn_score,
                    oracle_calls = stats.oracle_calls,
                    "label flipped"
                );
                return Ok(SearchOutcome {
                    result: best.into_counterfactual(scored),
                    evaluated_edges: sorted(evaluated),
                    stats,
                });
            }

            successors.truncate(self.beam_width);
            debug!(
                row = sentence.row,
                depth,
                beam = successors.len(),
                expanded = stats.expanded,
                "beam pruned"
            );
            beam = successors;
        }

        Ok(SearchOutcome {
            result: None,
            evaluated_edges: sorted(evaluated),
            stats,
        })
    }

    /// Every one-edge extension of every beam state, deduplicated by edge set
    fn expand(
        &self,
        beam: &[BeamState],
        pool: &[u32],
        scored: &ScoredGraph,
        sentence: &Sentence,
    ) -> Vec<BeamState> {
        let mut seen: FxHashSet<Vec<u32>> = FxHashSet::default();
        let mut successors = Vec::new();
        for state in beam {
            for &edge in pool {
                if let Some(next) = state.extend(edge, scored, sentence, self.aggregation) {
                    if seen.insert(next.edges().to_vec()) {
                        successors.push(next);
                    }
                }
            }
        }
        successors
    }

    fn rank(&self, states: &mut [BeamState]) {
        states.sort_by(|a, b| a.stable_cmp(b, self.criterion));
    }

    /// Attach predictions, querying the oracle once per unseen text.
    /// Returns the number of texts sent to the oracle.
    fn evaluate(
        &self,
        states: &mut [BeamState],
        original: &Prediction,
        cache: &mut FxHashMap<String, Prediction>,
    ) -> Result<usize> {
        let mut pending: Vec<&str> = Vec::new();
        let mut queued: FxHashSet<&str> = FxHashSet::default();
        for state in states.iter() {
            let text = state.text.as_str();
            if !cache.contains_key(text) && queued.insert(text) {
                pending.push(text);
            }
        }

        let calls = pending.len();
        if !pending.is_empty() {
            let predictions = self.oracle.predict_batch(&pending)?;
            if predictions.len() != pending.len() {
                return Err(CounterfactualError::dimension_mismatch(
                    "oracle batch",
                    pending.len(),
                    predictions.len(),
                ));
            }
            let texts: Vec<String> = pending.into_iter().map(str::to_string).collect();
            cache.extend(texts.into_iter().zip(predictions));
        }

        for state in states.iter_mut() {
            let prediction = cache
                .get(&state.text)
                .cloned()
                .ok_or_else(|| CounterfactualError::internal("missing cached prediction"))?;
            state.set_prediction(prediction, original.label);
        }
        Ok(calls)
    }
}

fn sorted(edges: FxHashSet<u32>) -> Vec<u32> {
    let mut edges: Vec<u32> = edges.into_iter().collect();
    edges.sort_unstable();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::bipartite::{BipartiteGraph, CandidateNode, PositionNode, SubstitutionEdge};
    use crate::pipeline::traits::FnOracle;
    use crate::types::{LexicalRelation, PosTag, Token};
    use std::cell::Cell;

    fn sentence() -> Sentence {
        Sentence::new(
            "Great plot, fine cast",
            0,
            vec![
                Token::new("Great", "great", PosTag::Adjective, 0, 5, 0),
                Token::new("plot", "plot", PosTag::Noun, 6, 10, 1),
                Token::new("fine", "fine", PosTag::Adjective, 12, 16, 2),
                Token::new("cast", "cast", PosTag::Noun, 17, 21, 3),
            ],
        )
    }

    // e0: Great -> poor (0.9), e1: Great -> terrible (0.6), e2: fine -> coarse (0.7)
    fn scored() -> ScoredGraph {
        let ant = LexicalRelation::Antonym;
        let graph = BipartiteGraph::new(
            vec![
                PositionNode::new(0, "Great", PosTag::Adjective),
                PositionNode::new(2, "fine", PosTag::Adjective),
            ],
            vec![
                CandidateNode::new("poor", PosTag::Adjective, ant),
                CandidateNode::new("terrible", PosTag::Adjective, ant),
                CandidateNode::new("coarse", PosTag::Adjective, ant),
            ],
            vec![
                SubstitutionEdge::new(0, 0, true, ant),
                SubstitutionEdge::new(0, 1, true, ant),
                SubstitutionEdge::new(1, 2, true, ant),
            ],
            4,
        )
        .unwrap();
        ScoredGraph::from_parts(graph, vec![0.9, 0.6, 0.7]).unwrap()
    }

    fn original() -> Prediction {
        Prediction::from_probabilities(vec![0.1, 0.9]).unwrap()
    }

    fn probs(p: &[f64]) -> Result<Prediction> {
        Prediction::from_probabilities(p.to_vec())
    }

    #[test]
    fn test_flip_at_first_depth() {
        let calls = Cell::new(0usize);
        let oracle = FnOracle(|text: &str| {
            calls.set(calls.get() + 1);
            if text.starts_with("Poor") {
                probs(&[0.8, 0.2])
            } else {
                probs(&[0.1, 0.9])
            }
        });
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        let outcome = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap();

        let cf = outcome.result.unwrap();
        assert_eq!(cf.text, "Poor plot, fine cast");
        assert_eq!(cf.num_edits(), 1);
        assert_eq!(cf.prediction.label, 0);
        assert_eq!(outcome.stats.depth, 1);
        assert_eq!(outcome.stats.oracle_calls, 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_flip_needs_two_edits() {
        let oracle = FnOracle(|text: &str| {
            if text.contains("coarse") && !text.starts_with("Great") {
                probs(&[0.7, 0.3])
            } else {
                probs(&[0.2, 0.8])
            }
        });
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        let outcome = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap();

        let cf = outcome.result.unwrap();
        // {e0, e2} outranks {e1, e2}: 1.6 > 1.3
        assert_eq!(cf.text, "Poor plot, coarse cast");
        assert_eq!(cf.num_edits(), 2);
        assert_eq!(outcome.stats.depth, 2);
        assert_eq!(outcome.stats.expanded, 5);
        assert_eq!(outcome.stats.oracle_calls, 5);
        assert_eq!(outcome.evaluated_edges, vec![0, 1, 2]);
    }

    #[test]
    fn test_budget_exhausted() {
        let oracle = FnOracle(|_: &str| probs(&[0.1, 0.9]));
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        let outcome = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(1, 2))
            .unwrap();
        assert!(!outcome.is_flipped());
        assert_eq!(outcome.stats.budget, 1);
        assert_eq!(outcome.stats.depth, 1);
        assert_eq!(outcome.stats.oracle_calls, 3);
    }

    #[test]
    fn test_runs_out_of_successors() {
        let oracle = FnOracle(|_: &str| probs(&[0.1, 0.9]));
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        // budget above the two editable positions
        let budget = EditBudget::fixed(5, 5);
        let outcome = planner
            .search(&sentence(), &scored(), &original(), budget)
            .unwrap();
        assert!(outcome.result.is_none());
        assert_eq!(outcome.stats.depth, 2);
    }

    #[test]
    fn test_zero_budget_skips_oracle() {
        let calls = Cell::new(0usize);
        let oracle = FnOracle(|_: &str| {
            calls.set(calls.get() + 1);
            probs(&[0.9, 0.1])
        });
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        let outcome = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(0, 2))
            .unwrap();
        assert!(outcome.result.is_none());
        assert_eq!(calls.get(), 0);

        let empty = ScoredGraph::from_parts(BipartiteGraph::empty(4), vec![]).unwrap();
        let outcome = planner
            .search(&sentence(), &empty, &original(), EditBudget::fixed(2, 2))
            .unwrap();
        assert!(outcome.result.is_none());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_beam_width_respected() {
        let oracle = FnOracle(|text: &str| {
            if text.contains("coarse") && !text.starts_with("Great") {
                probs(&[0.7, 0.3])
            } else {
                probs(&[0.2, 0.8])
            }
        });
        let planner = BeamSearchPlanner::new(oracle, 1).unwrap();
        let outcome = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap();
        assert_eq!(outcome.result.unwrap().text, "Poor plot, coarse cast");
        assert_eq!(outcome.stats.max_beam, 1);
        // one survivor per depth reaches the oracle
        assert_eq!(outcome.stats.oracle_calls, 2);
    }

    fn destabilizing_oracle(text: &str) -> Result<Prediction> {
        if text.starts_with("Terrible") && text.contains("coarse") {
            probs(&[0.6, 0.4])
        } else if text.starts_with("Terrible") {
            probs(&[0.45, 0.55])
        } else if text.contains("coarse") {
            probs(&[0.3, 0.7])
        } else {
            probs(&[0.2, 0.8])
        }
    }

    #[test]
    fn test_contrastive_ranking_changes_path() {
        let budget = EditBudget::fixed(2, 2);

        let gnn = BeamSearchPlanner::new(FnOracle(destabilizing_oracle), 1).unwrap();
        let outcome = gnn
            .search(&sentence(), &scored(), &original(), budget)
            .unwrap();
        assert!(outcome.result.is_none());

        let contrastive = BeamSearchPlanner::new(FnOracle(destabilizing_oracle), 1)
            .unwrap()
            .with_criterion(RankingCriterion::Contrastive);
        let outcome = contrastive
            .search(&sentence(), &scored(), &original(), budget)
            .unwrap();
        let cf = outcome.result.unwrap();
        assert_eq!(cf.text, "Terrible plot, coarse cast");
        // every successor of depth 1 was evaluated, then one at depth 2
        assert_eq!(outcome.stats.oracle_calls, 4);
        assert_eq!(outcome.stats.max_beam, 1);
    }

    #[test]
    fn test_identical_texts_hit_cache() {
        let ant = LexicalRelation::Antonym;
        let graph = BipartiteGraph::new(
            vec![PositionNode::new(0, "Great", PosTag::Adjective)],
            vec![
                CandidateNode::new("poor", PosTag::Adjective, ant),
                CandidateNode::new("poor", PosTag::Noun, ant),
            ],
            vec![
                SubstitutionEdge::new(0, 0, true, ant),
                SubstitutionEdge::new(0, 1, false, ant),
            ],
            4,
        )
        .unwrap();
        let scored = ScoredGraph::from_parts(graph, vec![0.5, 0.4]).unwrap();

        let calls = Cell::new(0usize);
        let oracle = FnOracle(|_: &str| {
            calls.set(calls.get() + 1);
            probs(&[0.2, 0.8])
        });
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        let outcome = planner
            .search(&sentence(), &scored, &original(), EditBudget::fixed(1, 1))
            .unwrap();
        assert_eq!(outcome.stats.expanded, 2);
        assert_eq!(outcome.stats.oracle_calls, 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_top_k_limits_pool() {
        let oracle = FnOracle(|text: &str| {
            if text.starts_with("Terrible") {
                probs(&[0.8, 0.2])
            } else {
                probs(&[0.2, 0.8])
            }
        });
        let planner = BeamSearchPlanner::new(oracle, 3)
            .unwrap()
            .with_top_k_per_position(1);
        let outcome = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap();
        // "terrible" is the second-best edge at its position
        assert!(outcome.result.is_none());
        assert_eq!(outcome.evaluated_edges, vec![0, 2]);
    }

    #[test]
    fn test_oracle_error_propagates() {
        let oracle = FnOracle(|_: &str| Err(CounterfactualError::inference("offline")));
        let planner = BeamSearchPlanner::new(oracle, 3).unwrap();
        let err = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap_err();
        assert!(err.is_inference_failure());
    }

    #[test]
    fn test_deterministic() {
        let oracle = FnOracle(destabilizing_oracle);
        let planner = BeamSearchPlanner::new(oracle, 2)
            .unwrap()
            .with_criterion(RankingCriterion::Contrastive);
        let a = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap();
        let b = planner
            .search(&sentence(), &scored(), &original(), EditBudget::fixed(2, 2))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_beam_width_rejected() {
        let oracle = FnOracle(|_: &str| probs(&[0.5, 0.5]));
        assert!(BeamSearchPlanner::new(oracle, 0).is_err());
    }
}
