//! Editor pipeline: collaborator traits, typed artifacts, and execution.
//!
//! ## Submodules
//!
//! - [`traits`]: Seams to the substitution provider, edge scorer and classifier
//! - [`artifacts`]: Predictions, applied edits, output rows and batch reports
//! - [`record`]: The substitution record accumulated across a batch
//! - [`errors`]: Row-level failures carried in the output table
//! - [`runner`]: Per-sentence orchestration and batch loops

pub mod artifacts;
pub mod errors;
pub mod record;
pub mod runner;
pub mod traits;

pub use artifacts::{
    AppliedEdit, BatchReport, Counterfactual, EditRow, EditStatus, Prediction,
};
pub use errors::SentenceError;
pub use record::{RowEdits, SubstitutionRecord};
pub use runner::CounterfactualEditor;
pub use traits::{
    ClassifierOracle, EdgeScorer, EmptyProvider, FnOracle, Substitute, SubstitutionProvider,
    UniformEdgeScorer,
};
