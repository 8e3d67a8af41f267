//! Edit budget: the maximum number of substitutions per sentence.
//!
//! Computed once before the search and frozen for its whole duration.

use serde::{Deserialize, Serialize};

use crate::gnn::ScoredGraph;
use crate::types::{GeneratorConfig, Sentence};

/// Upper bound on the number of edits in a counterfactual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditBudget {
    limit: usize,
    adaptive: bool,
}

impl EditBudget {
    /// `max_edits`, clamped to the positions that have edges
    pub fn fixed(max_edits: usize, active_positions: usize) -> Self {
        Self {
            limit: max_edits.min(active_positions),
            adaptive: false,
        }
    }

    /// `min(max_edits, ceil(edit_fraction × word_count), promising)`,
    /// clamped to the positions that have edges
    pub fn adaptive(
        max_edits: usize,
        edit_fraction: f64,
        word_count: usize,
        promising_positions: usize,
        active_positions: usize,
    ) -> Self {
        let by_length = (edit_fraction * word_count as f64).ceil().max(0.0) as usize;
        let limit = max_edits
            .min(by_length)
            .min(promising_positions)
            .min(active_positions);
        Self {
            limit,
            adaptive: true,
        }
    }

    /// Budget for one sentence under `cfg`
    ///
    /// The adaptive length term counts words only, so punctuation from an
    /// external tagger does not enlarge the budget.
    pub fn for_sentence(cfg: &GeneratorConfig, sentence: &Sentence, scored: &ScoredGraph) -> Self {
        let active = scored.graph().active_position_count();
        if cfg.optimal_threshold {
            Self::adaptive(
                cfg.max_edits,
                cfg.edit_fraction,
                sentence.word_count(),
                scored.promising_positions(),
                active,
            )
        } else {
            Self::fixed(cfg.max_edits, active)
        }
    }

    /// Maximum number of edits (the search depth)
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Check if no edit is allowed at all
    pub fn is_zero(&self) -> bool {
        self.limit == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_budget_clamped() {
        assert_eq!(EditBudget::fixed(3, 5).limit(), 3);
        assert_eq!(EditBudget::fixed(3, 2).limit(), 2);
        assert!(EditBudget::fixed(3, 0).is_zero());
        assert!(!EditBudget::fixed(3, 5).is_adaptive());
    }

    #[test]
    fn test_adaptive_budget() {
        // 9 words at 0.3 -> ceil(2.7) = 3
        assert_eq!(EditBudget::adaptive(5, 0.3, 9, 4, 4).limit(), 3);
        // promising positions bind first
        assert_eq!(EditBudget::adaptive(5, 0.3, 9, 1, 4).limit(), 1);
        // max_edits caps
        assert_eq!(EditBudget::adaptive(2, 1.0, 9, 4, 4).limit(), 2);
        // active positions clamp last
        assert_eq!(EditBudget::adaptive(5, 1.0, 9, 4, 2).limit(), 2);
        // a short sentence still gets one edit
        assert_eq!(EditBudget::adaptive(3, 0.3, 1, 1, 1).limit(), 1);
        assert!(EditBudget::adaptive(3, 0.3, 9, 1, 1).is_adaptive());
    }

    #[test]
    fn test_adaptive_budget_ignores_punctuation() {
        use crate::graph::bipartite::{BipartiteGraph, CandidateNode, PositionNode, SubstitutionEdge};
        use crate::json::TaggedToken;
        use crate::types::{LexicalRelation, PosTag};

        let tag = |text: &str, pos: &str, start: usize| TaggedToken {
            text: text.to_string(),
            lemma: String::new(),
            pos: pos.to_string(),
            start,
            end: start + text.len(),
        };
        // 3 words + 3 punctuation marks: ceil(0.5 × 3) = 2, not ceil(0.5 × 6) = 3
        let tagged = vec![
            tag("Great", "ADJ", 0),
            tag(",", "PUNCT", 5),
            tag("good", "ADJ", 7),
            tag(",", "PUNCT", 11),
            tag("fine", "ADJ", 13),
            tag("!", "PUNCT", 17),
        ];
        let sentence = Sentence::from_tagged("Great, good, fine!", 0, &tagged);

        let ant = LexicalRelation::Antonym;
        let graph = BipartiteGraph::new(
            vec![
                PositionNode::new(0, "Great", PosTag::Adjective),
                PositionNode::new(2, "good", PosTag::Adjective),
                PositionNode::new(4, "fine", PosTag::Adjective),
            ],
            vec![
                CandidateNode::new("poor", PosTag::Adjective, ant),
                CandidateNode::new("bad", PosTag::Adjective, ant),
            ],
            vec![
                SubstitutionEdge::new(0, 0, true, ant),
                SubstitutionEdge::new(1, 1, true, ant),
                SubstitutionEdge::new(2, 0, true, ant),
            ],
            sentence.len(),
        )
        .unwrap();
        let scored = ScoredGraph::from_parts(graph, vec![0.5, 0.5, 0.5]).unwrap();

        let cfg = GeneratorConfig::new()
            .with_max_edits(5)
            .with_optimal_threshold(true)
            .with_edit_fraction(0.5);
        let budget = EditBudget::for_sentence(&cfg, &sentence, &scored);
        assert!(budget.is_adaptive());
        assert_eq!(budget.limit(), 2);
    }
}
