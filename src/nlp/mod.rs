//! Text preprocessing: tokenization, heuristic tagging and lemmatization

pub mod tokenizer;
