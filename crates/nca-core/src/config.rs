//! Validated configuration for the analysis pipeline.
//!
//! These structures arrive fully resolved from the configuration store before
//! any engine connection is attempted. `validate()` enforces the invariants;
//! anything invalid is `NcaError::Config` and fails fast.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{NcaError, NcaResult};
use crate::model::ElementKind;
use crate::result::Severity;

/// Thermal loading limits in percent, per element kind with a default
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalLimitsConfig {
    #[serde(default = "default_thermal_limit")]
    pub default: f64,
    #[serde(default)]
    pub by_kind: HashMap<ElementKind, f64>,
}

fn default_thermal_limit() -> f64 {
    90.0
}

impl Default for ThermalLimitsConfig {
    fn default() -> Self {
        Self {
            default: default_thermal_limit(),
            by_kind: HashMap::new(),
        }
    }
}

impl ThermalLimitsConfig {
    pub fn limit_for(&self, kind: ElementKind) -> f64 {
        self.by_kind.get(&kind).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> NcaResult<()> {
        for (kind, limit) in
            std::iter::once((&ElementKind::Line, &self.default)).chain(self.by_kind.iter())
        {
            if !limit.is_finite() || *limit <= 0.0 || *limit > 200.0 {
                return Err(NcaError::Config(format!(
                    "thermal limit {limit} for {} out of range (0, 200]",
                    kind.as_str()
                )));
            }
        }
        Ok(())
    }
}

/// Per-unit voltage band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoltageBand {
    pub min: f64,
    pub max: f64,
}

impl Default for VoltageBand {
    fn default() -> Self {
        Self { min: 0.95, max: 1.05 }
    }
}

/// Voltage bands selected by (region, nominal voltage level).
///
/// Voltage level keys are the kV value rendered with `f64::to_string`
/// ("132" for 132 kV, "33" for 33 kV).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoltageLimitsConfig {
    #[serde(default)]
    pub default_band: VoltageBand,
    #[serde(default)]
    pub regions: HashMap<String, HashMap<String, VoltageBand>>,
}

impl VoltageLimitsConfig {
    pub fn band_for(&self, region: &str, voltage_kv: f64) -> VoltageBand {
        self.regions
            .get(region)
            .and_then(|levels| levels.get(&voltage_kv.to_string()))
            .copied()
            .unwrap_or(self.default_band)
    }

    pub fn validate(&self) -> NcaResult<()> {
        let bands = std::iter::once(&self.default_band)
            .chain(self.regions.values().flat_map(|levels| levels.values()));
        for band in bands {
            if !band.min.is_finite() || !band.max.is_finite() || band.min <= 0.0 {
                return Err(NcaError::Config(format!(
                    "voltage band [{}, {}] has non-positive or non-finite bounds",
                    band.min, band.max
                )));
            }
            if band.min >= band.max {
                return Err(NcaError::Config(format!(
                    "voltage band [{}, {}] has min >= max",
                    band.min, band.max
                )));
            }
        }
        Ok(())
    }
}

/// Thermal severity tier thresholds, in percent over limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThermalSeverityThresholds {
    pub medium_over_pct: f64,
    pub high_over_pct: f64,
    pub critical_over_pct: f64,
}

impl Default for ThermalSeverityThresholds {
    fn default() -> Self {
        Self {
            medium_over_pct: 10.0,
            high_over_pct: 20.0,
            critical_over_pct: 50.0,
        }
    }
}

/// Voltage severity tier thresholds, in percent deviation beyond the
/// violated bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoltageSeverityThresholds {
    pub low_pct: f64,
    pub medium_pct: f64,
    pub high_pct: f64,
    pub critical_pct: f64,
}

impl Default for VoltageSeverityThresholds {
    fn default() -> Self {
        Self {
            low_pct: 2.0,
            medium_pct: 3.0,
            high_pct: 5.0,
            critical_pct: 10.0,
        }
    }
}

/// Severity classification thresholds and ranking weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityConfig {
    #[serde(default)]
    pub thermal: ThermalSeverityThresholds,
    #[serde(default)]
    pub voltage: VoltageSeverityThresholds,
    /// Overrides for the default 0/1/2/3/4 ranking weights.
    #[serde(default)]
    pub weights: HashMap<Severity, u32>,
}

impl SeverityConfig {
    pub fn weight_of(&self, severity: Severity) -> u32 {
        self.weights
            .get(&severity)
            .copied()
            .unwrap_or_else(|| severity.weight())
    }

    pub fn validate(&self) -> NcaResult<()> {
        let t = &self.thermal;
        if !(0.0 < t.medium_over_pct
            && t.medium_over_pct < t.high_over_pct
            && t.high_over_pct < t.critical_over_pct)
        {
            return Err(NcaError::Config(
                "thermal severity thresholds must be strictly increasing and positive".into(),
            ));
        }
        let v = &self.voltage;
        if !(0.0 < v.low_pct
            && v.low_pct < v.medium_pct
            && v.medium_pct < v.high_pct
            && v.high_pct < v.critical_pct)
        {
            return Err(NcaError::Config(
                "voltage severity thresholds must be strictly increasing and positive".into(),
            ));
        }
        Ok(())
    }
}

/// Shared analyzer applicability filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFilter {
    /// Elements below this nominal voltage are skipped by every analyzer.
    #[serde(default)]
    pub min_voltage_kv: f64,
    /// When present, only these regions are analyzed.
    #[serde(default)]
    pub regions: Option<Vec<String>>,
}

impl Default for AnalysisFilter {
    fn default() -> Self {
        Self {
            min_voltage_kv: 0.0,
            regions: None,
        }
    }
}

impl AnalysisFilter {
    pub fn accepts(&self, voltage_kv: f64, region: &str) -> bool {
        if voltage_kv < self.min_voltage_kv {
            return false;
        }
        match &self.regions {
            Some(allowed) => allowed.iter().any(|r| r == region),
            None => true,
        }
    }
}

/// Run-scoped execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLimits {
    /// Upper bound on a single load-flow execution. Enforced by the engine
    /// adapter behind [`SimulationEngine::execute_load_flow`]; the pipeline
    /// only validates and carries the value.
    ///
    /// [`SimulationEngine::execute_load_flow`]: crate::engine::SimulationEngine::execute_load_flow
    #[serde(default = "default_timeout_secs")]
    pub load_flow_timeout_secs: u64,
    /// Load-flow retry count on engine faults (not on divergence).
    #[serde(default)]
    pub retries: u32,
    /// Cap on the number of contingencies per scenario.
    #[serde(default)]
    pub max_contingencies: Option<usize>,
    /// Request parallel contingency execution. Honored only when independent
    /// engine sessions are available; otherwise the run stays sequential.
    #[serde(default)]
    pub parallel: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            load_flow_timeout_secs: default_timeout_secs(),
            retries: 0,
            max_contingencies: None,
            parallel: false,
        }
    }
}

impl RunLimits {
    pub fn validate(&self) -> NcaResult<()> {
        if self.load_flow_timeout_secs == 0 {
            return Err(NcaError::Config("load flow timeout must be non-zero".into()));
        }
        if self.max_contingencies == Some(0) {
            return Err(NcaError::Config(
                "max_contingencies of 0 would analyze nothing; omit the cap instead".into(),
            ));
        }
        Ok(())
    }
}

/// Complete analysis configuration bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub thermal_limits: ThermalLimitsConfig,
    #[serde(default)]
    pub voltage_limits: VoltageLimitsConfig,
    #[serde(default)]
    pub severity: SeverityConfig,
    #[serde(default)]
    pub filter: AnalysisFilter,
    #[serde(default)]
    pub run: RunLimits,
}

impl AnalysisConfig {
    pub fn validate(&self) -> NcaResult<()> {
        self.thermal_limits.validate()?;
        self.voltage_limits.validate()?;
        self.severity.validate()?;
        self.run.validate()?;
        Ok(())
    }
}
