//! Abstraction over the external load-flow simulation engine.
//!
//! The engine is an exclusive, stateful, non-reentrant resource living in an
//! external process: the currently applied outage or scaling is global mutable
//! state over there, and exactly one caller may hold it applied at a time. That
//! invariant is enforced by the contingency/scenario state machines, not by
//! locks. Calls into the engine are synchronous and may block up to the
//! configured load-flow timeout.

use serde::{Deserialize, Serialize};

use crate::error::NcaResult;
use crate::matcher::NamePattern;
use crate::model::{ElementId, ElementKind, NetworkElement};

/// Closed set of engine attributes the pipeline reads or writes.
///
/// Keeping this enumerated (rather than passing raw attribute strings through)
/// means an invalid attribute name is unrepresentable past the adapter
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Thermal loading as a percentage of the element rating.
    Loading,
    /// Bus voltage magnitude in per unit.
    VoltagePu,
    /// Bus voltage magnitude in kV.
    VoltageKv,
    /// Bus voltage angle in degrees.
    VoltageAngleDeg,
    /// Branch current in kA.
    CurrentKa,
    /// Measured active power flow in MW.
    ActivePowerMw,
    /// Out-of-service flag (0 = in service, 1 = out).
    OutOfService,
    /// Active-power setpoint of a generator or storage unit, in MW.
    ActivePowerSetpoint,
    /// Load active-power demand in MW.
    LoadActivePower,
    /// Load reactive-power demand in Mvar.
    LoadReactivePower,
}

impl Attribute {
    /// Stable wire key understood by the engine adapter.
    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Loading => "loading",
            Attribute::VoltagePu => "voltage_pu",
            Attribute::VoltageKv => "voltage_kv",
            Attribute::VoltageAngleDeg => "voltage_angle_deg",
            Attribute::CurrentKa => "current_ka",
            Attribute::ActivePowerMw => "active_power_mw",
            Attribute::OutOfService => "out_of_service",
            Attribute::ActivePowerSetpoint => "p_setpoint_mw",
            Attribute::LoadActivePower => "load_p_mw",
            Attribute::LoadReactivePower => "load_q_mvar",
        }
    }
}

/// Outcome of a load-flow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadFlowStatus {
    Converged,
    Diverged,
}

impl LoadFlowStatus {
    pub fn converged(&self) -> bool {
        matches!(self, LoadFlowStatus::Converged)
    }
}

/// Contract the pipeline consumes from the external engine.
///
/// Implementations adapt a concrete simulator session. The trait is object
/// safe so the pipeline can hold it as `&mut dyn SimulationEngine`; callers
/// must never assume reentrancy.
pub trait SimulationEngine {
    /// Establish the session, optionally under a named simulation user.
    fn connect(&mut self, user: Option<&str>) -> NcaResult<()>;

    /// Tear the session down. Infallible by contract; adapters swallow
    /// disconnect noise.
    fn disconnect(&mut self);

    /// Elements of the given kind whose name matches the pattern, mirrored
    /// with their metadata.
    fn elements_by_pattern(
        &self,
        kind: ElementKind,
        pattern: &NamePattern,
    ) -> NcaResult<Vec<NetworkElement>>;

    /// Read a numeric attribute; `ElementNotFound` if the element is gone.
    fn get_attribute(&self, element: &ElementId, attribute: Attribute) -> NcaResult<f64>;

    /// Write a numeric attribute. All mutation failures surface as errors;
    /// there is no boolean success channel.
    fn set_attribute(
        &mut self,
        element: &ElementId,
        attribute: Attribute,
        value: f64,
    ) -> NcaResult<()>;

    /// Execute a load flow, blocking up to the configured timeout.
    fn execute_load_flow(&mut self) -> NcaResult<LoadFlowStatus>;
}
