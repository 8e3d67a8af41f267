//! Lexical substitution sources

pub mod store;

pub use store::{LexEntry, Lexicon};
