//! Classified measurement records produced by the analyzers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ElementId, ElementKind};

/// Which analysis produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Thermal,
    Voltage,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Thermal => "thermal",
            AnalysisKind::Voltage => "voltage",
        }
    }
}

/// Ordered severity classification. Tier order follows declaration order, so
/// derived `Ord` gives `None < Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Default ranking weight; configuration may override the mapping.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::None => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Unique key of a result within a run. Re-recording the same key overwrites
/// with the most recent measurement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub scenario_id: String,
    /// `None` for the base case.
    pub contingency_id: Option<String>,
    pub element_id: ElementId,
    pub kind: AnalysisKind,
}

/// A single classified measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scenario_id: String,
    pub contingency_id: Option<String>,
    pub element_id: ElementId,
    pub element_name: String,
    pub element_kind: ElementKind,
    pub region: String,
    pub voltage_kv: f64,
    pub kind: AnalysisKind,
    pub value: f64,
    pub limit: f64,
    pub violation: bool,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn key(&self) -> ResultKey {
        ResultKey {
            scenario_id: self.scenario_id.clone(),
            contingency_id: self.contingency_id.clone(),
            element_id: self.element_id.clone(),
            kind: self.kind,
        }
    }

    pub fn is_base_case(&self) -> bool {
        self.contingency_id.is_none()
    }

    /// Percentage deviation of the measurement from its limit.
    pub fn deviation_percent(&self) -> f64 {
        if self.limit == 0.0 {
            return 0.0;
        }
        (self.value - self.limit) / self.limit * 100.0
    }
}

/// Read-only reporting view of a violating result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub scenario_id: String,
    pub contingency_id: Option<String>,
    pub element_id: ElementId,
    pub element_name: String,
    pub element_kind: ElementKind,
    pub region: String,
    pub voltage_kv: f64,
    pub kind: AnalysisKind,
    pub value: f64,
    pub limit: f64,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Violation {
    /// Project a violating result into its reporting view. Returns `None`
    /// when the result is not a violation.
    pub fn from_result(result: &AnalysisResult) -> Option<Self> {
        if !result.violation {
            return None;
        }
        Some(Self {
            scenario_id: result.scenario_id.clone(),
            contingency_id: result.contingency_id.clone(),
            element_id: result.element_id.clone(),
            element_name: result.element_name.clone(),
            element_kind: result.element_kind,
            region: result.region.clone(),
            voltage_kv: result.voltage_kv,
            kind: result.kind,
            value: result.value,
            limit: result.limit,
            severity: result.severity,
            timestamp: result.timestamp,
        })
    }
}
