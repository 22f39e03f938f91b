//! # nca-results: Aggregation and Ranking
//!
//! Collects classified results across the scenario × contingency space,
//! deduplicates them by unique key, derives violation views, ranks
//! contingencies by severity-weighted score, and exposes a serializable
//! [`RunSnapshot`] for external report writers.

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{
    AggregateSummary, ContingencyScore, FailedContingency, ResultsAggregator,
};
pub use snapshot::{load_snapshot, write_snapshot, RunSnapshot};
