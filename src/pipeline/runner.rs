//! Editor runner: orchestrates the per-sentence stages and the batch loop.
//!
//! [`CounterfactualEditor`] owns the injected collaborators (substitution
//! provider, edge scorer, classifier oracle) and runs each sentence through
//!
//! 1. graph construction,
//! 2. edge scoring,
//! 3. classification of the original sentence,
//! 4. budget computation and beam search,
//!
//! then records the substitutions it considered and accepted.
//!
//! # Static dispatch
//!
//! The editor is generic over its collaborators, so each combination is
//! monomorphized. `&T` and `Box<dyn Trait>` implement the traits too, so a
//! caller can still hand in trait objects.
//!
//! # Failure policy
//!
//! Nothing raised while editing one sentence aborts a batch. Empty graphs are
//! normal outcomes ([`EditStatus::NoEligiblePositions`],
//! [`EditStatus::NoSubstitutes`]) that never reach the oracle; model errors
//! mark the row [`EditStatus::Failed`] with a [`SentenceError`].

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::gnn::ScoredGraph;
use crate::graph::bipartite::BipartiteGraph;
use crate::graph::builder::BipartiteGraphBuilder;
use crate::nlp::tokenizer::Tokenizer;
use crate::pipeline::artifacts::{BatchReport, EditRow, EditStatus};
use crate::pipeline::errors::SentenceError;
use crate::pipeline::record::SubstitutionRecord;
use crate::pipeline::traits::{ClassifierOracle, EdgeScorer, SubstitutionProvider};
use crate::search::{BeamSearchPlanner, EditBudget, SearchOutcome};
use crate::types::{GeneratorConfig, Sentence};

/// Stage names, as they appear in spans and [`SentenceError::stage`].
pub const STAGE_BUILD_GRAPH: &str = "build_graph";
pub const STAGE_SCORE_EDGES: &str = "score_edges";
pub const STAGE_PREDICT_ORIGINAL: &str = "predict_original";
pub const STAGE_SEARCH: &str = "search";

// ---------------------------------------------------------------------------
// Tracing support
// ---------------------------------------------------------------------------

/// Enter a debug span for an editor stage until the end of the enclosing
/// block.
macro_rules! trace_stage {
    ($name:expr, $row:expr) => {
        let _span = tracing::debug_span!("editor_stage", stage = $name, row = $row).entered();
    };
}

// ============================================================================
// CounterfactualEditor
// ============================================================================

/// Sentence-level counterfactual generator.
///
/// | Param | Trait | In-crate impls |
/// |-------|-------|----------------|
/// | `P` | [`SubstitutionProvider`] | [`Lexicon`](crate::lexicon::Lexicon), [`EmptyProvider`](crate::pipeline::traits::EmptyProvider) |
/// | `S` | [`EdgeScorer`] | [`GnnScorer`](crate::gnn::GnnScorer), [`UniformEdgeScorer`](crate::pipeline::traits::UniformEdgeScorer) |
/// | `O` | [`ClassifierOracle`] | [`FnOracle`](crate::pipeline::traits::FnOracle) |
#[derive(Debug, Clone)]
pub struct CounterfactualEditor<P, S, O> {
    provider: P,
    scorer: S,
    planner: BeamSearchPlanner<O>,
    config: GeneratorConfig,
    tokenizer: Tokenizer,
}

impl<P, S, O> CounterfactualEditor<P, S, O>
where
    P: SubstitutionProvider,
    S: EdgeScorer,
    O: ClassifierOracle,
{
    /// Create an editor; fails if `config` is invalid.
    pub fn new(provider: P, scorer: S, oracle: O, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let planner = BeamSearchPlanner::from_config(oracle, &config)?;
        Ok(Self {
            provider,
            scorer,
            planner,
            config,
            tokenizer: Tokenizer::new(),
        })
    }

    /// Replace the tokenizer used by [`edit_text`](Self::edit_text).
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn planner(&self) -> &BeamSearchPlanner<O> {
        &self.planner
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Tokenize `text` and edit it as row `row`.
    pub fn edit_text(&self, text: &str, row: usize) -> (EditRow, SubstitutionRecord) {
        self.edit_sentence(&self.tokenizer.tokenize(text, row))
    }

    /// Edit one sentence.
    ///
    /// Returns the output row and the sentence's own substitution record,
    /// ready to be merged into a batch record.
    pub fn edit_sentence(&self, sentence: &Sentence) -> (EditRow, SubstitutionRecord) {
        let mut record = SubstitutionRecord::new();
        let row = sentence.row;

        let eligible = sentence
            .tokens
            .iter()
            .any(|t| t.is_substitution_site(self.config.pos_filter));
        if !eligible {
            debug!(row, "no eligible positions");
            let out = EditRow::unchanged(row, sentence.text.as_str(), EditStatus::NoEligiblePositions);
            return (out, record);
        }

        let graph = {
            trace_stage!(STAGE_BUILD_GRAPH, row);
            BipartiteGraphBuilder::from_sentence(sentence, &self.provider, &self.config)
        };
        if graph.is_empty() {
            debug!(row, "no substitutes for any eligible position");
            let out = EditRow::unchanged(row, sentence.text.as_str(), EditStatus::NoSubstitutes);
            return (out, record);
        }

        let out = match self.search_graph(sentence, graph, &mut record) {
            Ok(out) => out,
            Err(err) => {
                warn!(row, stage = %err.stage, error = %err.message, "sentence skipped");
                EditRow::failed(row, sentence.text.as_str(), err)
            }
        };
        (out, record)
    }

    fn search_graph(
        &self,
        sentence: &Sentence,
        graph: BipartiteGraph,
        record: &mut SubstitutionRecord,
    ) -> std::result::Result<EditRow, SentenceError> {
        let row = sentence.row;

        let scored = {
            trace_stage!(STAGE_SCORE_EDGES, row);
            ScoredGraph::score(graph, &self.scorer)
                .map_err(|e| SentenceError::from_error(row, STAGE_SCORE_EDGES, &e))?
        };

        let original = {
            trace_stage!(STAGE_PREDICT_ORIGINAL, row);
            self.planner
                .oracle()
                .predict(&sentence.text)
                .map_err(|e| SentenceError::from_error(row, STAGE_PREDICT_ORIGINAL, &e))?
        };

        let budget = EditBudget::for_sentence(&self.config, sentence, &scored);
        let outcome = {
            trace_stage!(STAGE_SEARCH, row);
            self.planner
                .search(sentence, &scored, &original, budget)
                .map_err(|e| SentenceError::from_error(row, STAGE_SEARCH, &e))?
        };
        debug!(
            row,
            budget = outcome.stats.budget,
            adaptive = budget.is_adaptive(),
            depth = outcome.stats.depth,
            oracle_calls = outcome.stats.oracle_calls,
            flipped = outcome.is_flipped(),
            "search finished"
        );

        record_considered(record, &scored, &outcome);
        let out = match outcome.result {
            Some(counterfactual) => {
                record.record_accepted(row, &counterfactual.edits);
                EditRow::flipped(row, sentence.text.as_str(), original.label, counterfactual)
            }
            None => EditRow {
                original_label: Some(original.label),
                ..EditRow::unchanged(row, sentence.text.as_str(), EditStatus::BudgetExhausted)
            },
        };
        Ok(out)
    }

    /// Edit sentences one after another.
    pub fn run_batch(&self, sentences: &[Sentence]) -> BatchReport {
        let edited: Vec<(EditRow, SubstitutionRecord)> =
            sentences.iter().map(|s| self.edit_sentence(s)).collect();
        finish_batch(edited)
    }

    /// Tokenize and edit raw texts; row indices follow input order.
    pub fn run_texts<'a, I>(&self, texts: I) -> BatchReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.run_batch(&self.tokenizer.tokenize_batch(texts))
    }

    /// Edit sentences in parallel with rayon.
    ///
    /// Per-sentence records are merged in row order, so the report equals the
    /// one [`run_batch`](Self::run_batch) produces.
    pub fn run_batch_parallel(&self, sentences: &[Sentence]) -> BatchReport
    where
        P: Sync,
        S: Sync,
        O: Sync,
    {
        let edited: Vec<(EditRow, SubstitutionRecord)> =
            sentences.par_iter().map(|s| self.edit_sentence(s)).collect();
        finish_batch(edited)
    }
}

fn record_considered(record: &mut SubstitutionRecord, scored: &ScoredGraph, outcome: &SearchOutcome) {
    let graph = scored.graph();
    for &id in &outcome.evaluated_edges {
        let Some(edge) = graph.edge(id) else { continue };
        if let (Some(position), Some(candidate)) =
            (graph.position(edge.position), graph.candidate(edge.candidate))
        {
            record.record_considered(&position.word, &candidate.word);
        }
    }
}

fn finish_batch(edited: Vec<(EditRow, SubstitutionRecord)>) -> BatchReport {
    let mut report = BatchReport::default();
    for (row, record) in edited {
        report.rows.push(row);
        report.record.merge(record);
    }
    info!(
        rows = report.rows.len(),
        flipped = report.flipped_count(),
        failed = report.failed_count(),
        flip_rate = report.flip_rate(),
        "batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CounterfactualError;
    use crate::lexicon::Lexicon;
    use crate::pipeline::artifacts::Prediction;
    use crate::pipeline::traits::{EmptyProvider, FnOracle, UniformEdgeScorer};
    use crate::types::{LexicalRelation, PosTag};
    use std::cell::Cell;

    fn lexicon() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.add_antonyms("beautiful", PosTag::Adjective, ["ugly"]);
        lex.add_antonyms("great", PosTag::Adjective, ["poor"]);
        lex.add_antonyms("interesting", PosTag::Adjective, ["boring", "dull"]);
        lex
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig::new()
            .with_pos_filter(PosTag::Adjective)
            .with_relation(LexicalRelation::Antonym)
            .with_beam_width(3)
            .with_max_edits(2)
    }

    fn sentiment(text: &str) -> Result<Prediction> {
        let lower = text.to_lowercase();
        let negatives = ["ugly", "poor", "boring", "dull"]
            .iter()
            .filter(|w| lower.contains(*w))
            .count();
        if negatives >= 2 {
            Prediction::from_probabilities(vec![0.8, 0.2])
        } else {
            Prediction::from_probabilities(vec![0.3, 0.7])
        }
    }

    const SCENARIO: &str = "A beautiful movie with great plot and interesting characters!";

    #[test]
    fn test_flip_found() {
        let editor =
            CounterfactualEditor::new(lexicon(), UniformEdgeScorer, FnOracle(sentiment), config())
                .unwrap();
        let (row, record) = editor.edit_text(SCENARIO, 0);

        assert_eq!(row.status, EditStatus::Flipped);
        assert_eq!(row.num_edits(), 2);
        assert_eq!(row.original_label, Some(1));
        assert_eq!(row.counterfactual_label, Some(0));
        let text = row.counterfactual.unwrap();
        assert!(text.starts_with("A "));
        assert!(text.ends_with(" characters!"));
        assert_eq!(record.accepted_rows(), 1);
        assert!(!record.considered.is_empty());
    }

    #[test]
    fn test_budget_exhausted_keeps_original_label() {
        let cfg = config().with_max_edits(1);
        let editor =
            CounterfactualEditor::new(lexicon(), UniformEdgeScorer, FnOracle(sentiment), cfg)
                .unwrap();
        let (row, record) = editor.edit_text(SCENARIO, 3);
        assert_eq!(row.status, EditStatus::BudgetExhausted);
        assert_eq!(row.row, 3);
        assert_eq!(row.original_label, Some(1));
        assert!(row.counterfactual.is_none());
        assert_eq!(record.accepted_rows(), 0);
    }

    #[test]
    fn test_no_eligible_positions_skips_oracle() {
        let calls = Cell::new(0usize);
        let oracle = FnOracle(|text: &str| {
            calls.set(calls.get() + 1);
            sentiment(text)
        });
        let editor = CounterfactualEditor::new(lexicon(), UniformEdgeScorer, oracle, config())
            .unwrap();
        let (row, _) = editor.edit_text("the of and", 0);
        assert_eq!(row.status, EditStatus::NoEligiblePositions);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_no_substitutes_skips_oracle() {
        let calls = Cell::new(0usize);
        let oracle = FnOracle(|text: &str| {
            calls.set(calls.get() + 1);
            sentiment(text)
        });
        let editor =
            CounterfactualEditor::new(EmptyProvider, UniformEdgeScorer, oracle, config()).unwrap();
        let (row, record) = editor.edit_text(SCENARIO, 0);
        assert_eq!(row.status, EditStatus::NoSubstitutes);
        assert!(record.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_oracle_failure_marks_row() {
        let oracle = FnOracle(|_: &str| Err(CounterfactualError::inference("model offline")));
        let editor =
            CounterfactualEditor::new(lexicon(), UniformEdgeScorer, oracle, config()).unwrap();
        let (row, _) = editor.edit_text(SCENARIO, 7);
        assert_eq!(row.status, EditStatus::Failed);
        let err = row.error.unwrap();
        assert_eq!(err.row, 7);
        assert_eq!(err.stage, STAGE_PREDICT_ORIGINAL);
        assert!(err.message.contains("model offline"));
    }

    struct BrokenScorer;

    impl EdgeScorer for BrokenScorer {
        fn score(&self, graph: &BipartiteGraph) -> Result<Vec<f64>> {
            Ok(vec![0.5; graph.num_edges() + 1])
        }
    }

    #[test]
    fn test_scorer_failure_marks_row() {
        let editor =
            CounterfactualEditor::new(lexicon(), BrokenScorer, FnOracle(sentiment), config())
                .unwrap();
        let (row, _) = editor.edit_text(SCENARIO, 0);
        assert_eq!(row.status, EditStatus::Failed);
        assert_eq!(row.error.unwrap().stage, STAGE_SCORE_EDGES);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = config().with_beam_width(0);
        let err = CounterfactualEditor::new(lexicon(), UniformEdgeScorer, FnOracle(sentiment), cfg)
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let oracle = FnOracle(|text: &str| {
            if text.contains("broken") {
                Err(CounterfactualError::inference("bad input"))
            } else {
                sentiment(text)
            }
        });
        let editor =
            CounterfactualEditor::new(lexicon(), UniformEdgeScorer, oracle, config()).unwrap();
        let report = editor.run_texts([
            SCENARIO,
            "A great but broken film",
            "the of and",
            SCENARIO,
        ]);

        let statuses: Vec<EditStatus> = report.rows.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                EditStatus::Flipped,
                EditStatus::Failed,
                EditStatus::NoEligiblePositions,
                EditStatus::Flipped,
            ]
        );
        assert_eq!(report.flipped_count(), 2);
        assert_eq!(report.record.accepted_rows(), 2);
        assert_eq!(report.record.edits[1].row, 3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let editor =
            CounterfactualEditor::new(lexicon(), UniformEdgeScorer, FnOracle(sentiment), config())
                .unwrap();
        let sentences = editor.tokenizer().tokenize_batch([
            SCENARIO,
            "An interesting and beautiful story",
            "the of and",
            "A great cast",
        ]);
        let sequential = editor.run_batch(&sentences);
        let parallel = editor.run_batch_parallel(&sentences);
        assert_eq!(sequential, parallel);
    }
}
