//! Case matching, weighted aggregation and result materialization.

pub mod aggregate;
pub mod materialize;
pub mod matcher;
pub mod similarity;
