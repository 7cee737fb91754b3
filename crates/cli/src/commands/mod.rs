//! CLI command implementations.

pub mod migrate;
pub mod retire;
pub mod sweep;
