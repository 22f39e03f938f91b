//! # nca-scenarios: Controllable-Generation Scaling Scenarios
//!
//! Builds and applies scaling combinations for controllable elements
//! (battery storage, static generation, PV) ahead of base-case and
//! contingency analysis. Scenarios come from a sweep generator
//! ([`generate_sweep`]) or a YAML/JSON spec file ([`load_spec_from_path`]);
//! [`ScenarioManager`] applies them against the engine and restores the
//! captured originals afterwards.

pub mod apply;
pub mod spec;
pub mod sweep;

pub use apply::ScenarioManager;
pub use spec::{load_spec_from_path, resolve_scenarios, ScenarioDefaults, ScenarioSet, ScenarioSpec};
pub use sweep::{generate_sweep, SweepFactors};

use nca_core::ElementId;
use serde::{Deserialize, Serialize};

/// One element's scaling assignment within a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingTarget {
    pub element: ElementId,
    /// Multiplier on the element's original setpoint; negative values flip
    /// export to import.
    pub factor: f64,
}

/// A named combination of controllable-element scaling factors, applied
/// before running base case and contingencies. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub targets: Vec<ScalingTarget>,
    /// Uniform multiplier on every load's P and Q, when not 1.0.
    #[serde(default)]
    pub load_scale: Option<f64>,
}

impl Scenario {
    /// The neutral scenario: no scaling at all.
    pub fn unscaled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "all setpoints at their original values".into(),
            targets: Vec::new(),
            load_scale: None,
        }
    }
}
