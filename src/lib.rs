//! Plans and runs diagnostic collection against a TiDB cluster.

pub mod archive;
pub mod cli;
pub mod collectors;
pub mod executor;
pub mod output;
pub mod plan;
pub mod topology;
