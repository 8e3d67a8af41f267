//! # rapid_counterfactual
//!
//! Counterfactual sentence generation: minimal word-level edits that flip a
//! text classifier's predicted label.
//!
//! Each sentence becomes a bipartite graph of substitution sites and
//! candidate words drawn from a lexicon under a synonym or antonym relation.
//! A frozen graph neural network scores every substitution edge, and a beam
//! search combines the best edges until the classifier changes its mind or
//! the edit budget runs out.
//!
//! ## Features
//!
//! - **Injected models**: the edge scorer and the classifier are traits, so
//!   real models, mocks and trait objects plug in the same way
//! - **Deterministic**: identical scores and classifier outputs always give
//!   identical edits
//! - **Batch friendly**: per-row failures never abort a batch, and batches
//!   run in parallel with rayon

pub mod errors;
pub mod gnn;
pub mod graph;
pub mod json;
pub mod lexicon;
pub mod nlp;
pub mod pipeline;
pub mod search;
pub mod types;

// Re-export commonly used types
pub use errors::{CounterfactualError, Result};
pub use types::{
    GeneratorConfig, LexicalRelation, PosTag, RankingCriterion, ScoreAggregation, Sentence, Token,
};

// Re-export main functionality
pub use gnn::{GnnScorer, GnnWeights, ScoredGraph};
pub use graph::{bipartite::BipartiteGraph, builder::BipartiteGraphBuilder};
pub use lexicon::Lexicon;
pub use nlp::tokenizer::Tokenizer;
pub use pipeline::{
    BatchReport, ClassifierOracle, CounterfactualEditor, EdgeScorer, EditRow, EditStatus, FnOracle,
    Prediction, SubstitutionProvider, SubstitutionRecord, UniformEdgeScorer,
};
pub use search::{BeamSearchPlanner, EditBudget};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
