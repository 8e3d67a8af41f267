//! Bipartite substitution graph and its builder

pub mod bipartite;
pub mod builder;
