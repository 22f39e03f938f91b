//! # nca-engine: Contingency Execution
//!
//! Drives N-1 contingency analysis against a live engine session:
//!
//! - [`ContingencyEngine`]: the apply → analyze → restore state machine for
//!   single-element outages, with restore guaranteed on every exit path
//! - [`run_analysis`]: the sequential scenario × contingency pipeline with
//!   cooperative abort, feeding a [`nca_results::ResultsAggregator`]
//!
//! The engine session is exclusive and non-reentrant, so execution is
//! strictly sequential regardless of the configured parallelism request.

pub mod contingency;
pub mod runner;

pub use contingency::{Contingency, ContingencyEngine, ContingencyOutcome, OutagePhase};
pub use runner::{run_analysis, RunReport};
