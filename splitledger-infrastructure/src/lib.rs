#![warn(clippy::uninlined_format_args)]

pub mod optimizer;
pub mod snapshot;

pub use optimizer::GreedySettlementOptimizer;
pub use snapshot::JsonSnapshotSource;
