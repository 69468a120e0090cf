//! Per-case vector stores, the corpus store builder, and the pool merger.

pub mod builder;
pub mod merge;
pub mod store;
