//! Concurrent service-type discovery: per-query workers, the fan-out/fan-in
//! orchestrator, deduplication and run statistics

pub mod dedup;
pub mod orchestrator;
pub mod stats;
pub mod txt;
pub mod worker;

pub use orchestrator::{DiscoveryOptions, Orchestrator};
pub use stats::DiscoveryStats;
pub use worker::{run_query_isolated, Query};
