//! # nca-core: Contingency Analysis Core Model
//!
//! Fundamental data structures for N-1 contingency and scenario-sweep
//! reliability analysis driven against an external load-flow engine.
//!
//! ## Design Philosophy
//!
//! The external simulator owns the authoritative network state; this crate
//! owns a typed mirror of it:
//!
//! - **[`NetworkModel`]**: element registry populated once per run via
//!   pattern queries, mutated only through the outage/scaling state machines
//! - **[`SimulationEngine`]**: object-safe seam to the external process, with
//!   a closed [`Attribute`] set instead of stringly-typed access
//! - **[`AnalysisResult`] / [`Violation`]**: classified measurements keyed by
//!   (scenario, contingency, element, analysis kind)
//! - **[`NcaError`]**: one error taxonomy carrying the propagation policy for
//!   every failure mode of the pipeline
//!
//! Configuration ([`AnalysisConfig`]) arrives validated before the first
//! engine call; [`test_utils::MockEngine`] backs the workspace's tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod result;
pub mod test_utils;

pub use config::{
    AnalysisConfig, AnalysisFilter, RunLimits, SeverityConfig, ThermalLimitsConfig,
    ThermalSeverityThresholds, VoltageBand, VoltageLimitsConfig, VoltageSeverityThresholds,
};
pub use engine::{Attribute, LoadFlowStatus, SimulationEngine};
pub use error::{NcaError, NcaResult};
pub use matcher::NamePattern;
pub use model::{ElementId, ElementKind, ModelFilter, NetworkElement, NetworkModel};
pub use result::{AnalysisKind, AnalysisResult, ResultKey, Severity, Violation};
