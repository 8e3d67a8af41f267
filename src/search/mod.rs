//! Edit search over a scored substitution graph
//!
//! ## Submodules
//!
//! - [`budget`]: The per-sentence edit budget, fixed or adaptive
//! - [`state`]: Beam states (edge sets with their rendered text and prediction)
//! - [`beam`]: The beam search planner that queries the classifier

pub mod beam;
pub mod budget;
pub mod state;

pub use beam::{BeamSearchPlanner, SearchOutcome, SearchStats};
pub use budget::EditBudget;
pub use state::BeamState;
