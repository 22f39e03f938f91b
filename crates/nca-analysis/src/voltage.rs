//! Voltage band analysis.
//!
//! Busbar per-unit magnitudes are checked against a [min, max] band selected
//! by (region, nominal voltage level). Severity uses the distance beyond the
//! violated bound as a percentage of that bound, mirrored for overvoltage and
//! undervoltage: 0.93 pu against a 0.95 floor is (0.95 - 0.93)/0.95 = 2.1 %
//! and classifies Low under the default tiers. A magnitude can sit outside
//! the band but under the Low threshold; it is recorded as a violation with
//! severity `None`.

use chrono::Utc;
use tracing::debug;

use nca_core::{
    AnalysisConfig, AnalysisFilter, AnalysisKind, AnalysisResult, Attribute, NcaError, NcaResult,
    NetworkModel, Severity, SimulationEngine, VoltageBand, VoltageLimitsConfig,
    VoltageSeverityThresholds,
};

use crate::{AnalysisContext, Analyzer};

#[derive(Debug, Clone)]
pub struct VoltageAnalyzer {
    limits: VoltageLimitsConfig,
    thresholds: VoltageSeverityThresholds,
    filter: AnalysisFilter,
}

impl VoltageAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            limits: config.voltage_limits.clone(),
            thresholds: config.severity.voltage,
            filter: config.filter.clone(),
        }
    }
}

/// Classify a per-unit magnitude against its band.
///
/// Returns (violation, severity, limit used for reporting). Inside the band
/// the reported limit is the nearer bound.
pub fn classify_voltage(
    value: f64,
    band: VoltageBand,
    thresholds: &VoltageSeverityThresholds,
) -> (bool, Severity, f64) {
    let (violated_bound, deviation_pct) = if value < band.min {
        (band.min, (band.min - value) / band.min * 100.0)
    } else if value > band.max {
        (band.max, (value - band.max) / band.max * 100.0)
    } else {
        let nearer = if value - band.min < band.max - value {
            band.min
        } else {
            band.max
        };
        return (false, Severity::None, nearer);
    };
    let severity = if deviation_pct >= thresholds.critical_pct {
        Severity::Critical
    } else if deviation_pct >= thresholds.high_pct {
        Severity::High
    } else if deviation_pct >= thresholds.medium_pct {
        Severity::Medium
    } else if deviation_pct >= thresholds.low_pct {
        Severity::Low
    } else {
        Severity::None
    };
    (true, severity, violated_bound)
}

impl Analyzer for VoltageAnalyzer {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Voltage
    }

    fn analyze(
        &self,
        engine: &dyn SimulationEngine,
        model: &NetworkModel,
        ctx: &AnalysisContext<'_>,
    ) -> NcaResult<Vec<AnalysisResult>> {
        let mut results = Vec::new();
        for element in model.voltage_elements() {
            if !element.in_service || !self.filter.accepts(element.voltage_kv, &element.region) {
                continue;
            }
            let magnitude = match engine.get_attribute(&element.id, Attribute::VoltagePu) {
                Ok(value) => value,
                Err(NcaError::ElementNotFound(id)) => {
                    debug!(element = %id, "skipping busbar missing from engine");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let band = self.limits.band_for(&element.region, element.voltage_kv);
            let (violation, severity, limit) = classify_voltage(magnitude, band, &self.thresholds);
            results.push(AnalysisResult {
                scenario_id: ctx.scenario_id.to_string(),
                contingency_id: ctx.contingency_id.map(str::to_string),
                element_id: element.id.clone(),
                element_name: element.name.clone(),
                element_kind: element.kind,
                region: element.region.clone(),
                voltage_kv: element.voltage_kv,
                kind: AnalysisKind::Voltage,
                value: magnitude,
                limit,
                violation,
                severity,
                timestamp: Utc::now(),
            });
        }
        Ok(results)
    }
}
