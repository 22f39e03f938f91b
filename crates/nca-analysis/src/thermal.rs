//! Thermal loading analysis.
//!
//! Each applicable element's measured loading percentage is compared to a
//! type-specific configured limit. Severity is derived from the percentage
//! *over* the limit: `over = (measured - limit) / limit * 100`, so a 90 %
//! limit with 100 % measured loading is 11.1 % over and classifies Medium
//! under the default tiers.

use chrono::Utc;
use tracing::debug;

use nca_core::{
    AnalysisConfig, AnalysisFilter, AnalysisKind, AnalysisResult, Attribute, NcaError, NcaResult,
    NetworkModel, Severity, SimulationEngine, ThermalLimitsConfig, ThermalSeverityThresholds,
};

use crate::{AnalysisContext, Analyzer};

#[derive(Debug, Clone)]
pub struct ThermalAnalyzer {
    limits: ThermalLimitsConfig,
    thresholds: ThermalSeverityThresholds,
    filter: AnalysisFilter,
}

impl ThermalAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            limits: config.thermal_limits.clone(),
            thresholds: config.severity.thermal,
            filter: config.filter.clone(),
        }
    }
}

/// Classify a loading measurement against its limit.
///
/// Returns the violation flag and severity tier. `over <= 0` is never a
/// violation; above the limit the tier is monotonic in the measurement.
pub fn classify_loading(
    value: f64,
    limit: f64,
    thresholds: &ThermalSeverityThresholds,
) -> (bool, Severity) {
    if limit <= 0.0 {
        return (false, Severity::None);
    }
    let over = (value - limit) / limit * 100.0;
    if over <= 0.0 {
        return (false, Severity::None);
    }
    let severity = if over >= thresholds.critical_over_pct {
        Severity::Critical
    } else if over >= thresholds.high_over_pct {
        Severity::High
    } else if over >= thresholds.medium_over_pct {
        Severity::Medium
    } else {
        Severity::Low
    };
    (true, severity)
}

impl Analyzer for ThermalAnalyzer {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Thermal
    }

    fn analyze(
        &self,
        engine: &dyn SimulationEngine,
        model: &NetworkModel,
        ctx: &AnalysisContext<'_>,
    ) -> NcaResult<Vec<AnalysisResult>> {
        let mut results = Vec::new();
        for element in model.thermal_elements() {
            if !element.in_service || !self.filter.accepts(element.voltage_kv, &element.region) {
                continue;
            }
            let loading = match engine.get_attribute(&element.id, Attribute::Loading) {
                Ok(value) => value,
                Err(NcaError::ElementNotFound(id)) => {
                    debug!(element = %id, "skipping thermal element missing from engine");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let limit = self.limits.limit_for(element.kind);
            let (violation, severity) = classify_loading(loading, limit, &self.thresholds);
            results.push(AnalysisResult {
                scenario_id: ctx.scenario_id.to_string(),
                contingency_id: ctx.contingency_id.map(str::to_string),
                element_id: element.id.clone(),
                element_name: element.name.clone(),
                element_kind: element.kind,
                region: element.region.clone(),
                voltage_kv: element.voltage_kv,
                kind: AnalysisKind::Thermal,
                value: loading,
                limit,
                violation,
                severity,
                timestamp: Utc::now(),
            });
        }
        Ok(results)
    }
}
