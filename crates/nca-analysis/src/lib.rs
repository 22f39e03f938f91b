//! # nca-analysis: Violation Classification
//!
//! Turns post-load-flow measurements into classified [`AnalysisResult`]s.
//! Two analyzers share one contract:
//!
//! - [`ThermalAnalyzer`]: loading percentage against per-kind limits
//! - [`VoltageAnalyzer`]: per-unit magnitude against regional voltage bands
//!
//! Both skip out-of-service elements and elements below the configured
//! minimum voltage level, and both derive severity tiers from the distance
//! beyond the violated limit as a percentage of that limit.

pub mod thermal;
pub mod voltage;

use nca_core::{AnalysisKind, AnalysisResult, NcaResult, NetworkModel, SimulationEngine};

pub use thermal::ThermalAnalyzer;
pub use voltage::VoltageAnalyzer;

/// Identifies the scenario/contingency a batch of measurements belongs to.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub scenario_id: &'a str,
    /// `None` for the base case.
    pub contingency_id: Option<&'a str>,
}

impl<'a> AnalysisContext<'a> {
    pub fn base_case(scenario_id: &'a str) -> Self {
        Self {
            scenario_id,
            contingency_id: None,
        }
    }

    pub fn contingency(scenario_id: &'a str, contingency_id: &'a str) -> Self {
        Self {
            scenario_id,
            contingency_id: Some(contingency_id),
        }
    }
}

/// Common analyzer contract.
///
/// Analyzers read measurements from the engine and metadata from the model;
/// they never mutate either. An element whose measurement cannot be read is
/// skipped and logged, not fatal.
pub trait Analyzer {
    fn kind(&self) -> AnalysisKind;

    fn analyze(
        &self,
        engine: &dyn SimulationEngine,
        model: &NetworkModel,
        ctx: &AnalysisContext<'_>,
    ) -> NcaResult<Vec<AnalysisResult>>;
}
