pub mod cli;
pub mod collector;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod inspector;
pub mod model;
pub mod provider;
pub mod recovery;
pub mod snapshot;

pub use config::DescribeConfig;
pub use error::{EcsInfoError, Result};
pub use inspector::ClusterInspector;
pub use snapshot::{ClusterSnapshot, SnapshotSummary};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
