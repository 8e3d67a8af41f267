//! Frozen graph neural network that scores substitution edges

pub mod layers;
pub mod scored;
pub mod scorer;

pub use scored::ScoredGraph;
pub use scorer::{GnnScorer, GnnWeights};
