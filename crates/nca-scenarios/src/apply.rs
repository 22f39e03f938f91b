//! Applying scenarios against the engine and restoring originals.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use nca_core::{
    Attribute, ElementId, ElementKind, NcaError, NcaResult, NetworkModel, SimulationEngine,
};

use crate::Scenario;

/// Applies scaling scenarios and restores captured original setpoints.
///
/// The first time an element's setpoint is touched across the manager's
/// lifetime its original value is captured; every later apply scales that
/// captured original, never a previously scaled value, so repeated applies
/// cannot compound drift. Restore writes every captured original back and
/// drops tracking only for writes that verifiably succeeded.
#[derive(Debug, Default)]
pub struct ScenarioManager {
    originals: BTreeMap<(ElementId, Attribute), f64>,
    active: Option<String>,
}

impl ScenarioManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the currently applied scenario, if any.
    pub fn active_scenario(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Number of (element, attribute) originals currently tracked.
    pub fn tracked_originals(&self) -> usize {
        self.originals.len()
    }

    /// Apply every element-factor pair of the scenario, then the uniform
    /// load scaling when present.
    ///
    /// On failure the already-applied writes are left in place and the error
    /// is returned; the caller must still invoke
    /// [`restore_original_values`](Self::restore_original_values).
    pub fn apply_scenario(
        &mut self,
        engine: &mut dyn SimulationEngine,
        model: &NetworkModel,
        scenario: &Scenario,
    ) -> NcaResult<()> {
        info!(scenario = %scenario.name, targets = scenario.targets.len(), "applying scenario");
        for target in &scenario.targets {
            let element = model
                .get(&target.element)
                .ok_or_else(|| NcaError::ElementNotFound(target.element.clone()))?;
            let attribute = setpoint_attribute(element.kind).ok_or_else(|| {
                NcaError::Config(format!(
                    "element '{}' ({}) has no scalable setpoint",
                    element.name,
                    element.kind.as_str()
                ))
            })?;
            let original = self.capture_original(engine, &target.element, attribute)?;
            let scaled = original * target.factor;
            engine.set_attribute(&target.element, attribute, scaled)?;
            debug!(element = %target.element, original, scaled, "scaled setpoint");
        }

        if let Some(load_scale) = scenario.load_scale {
            self.apply_load_scaling(engine, model, load_scale)?;
        }

        self.active = Some(scenario.name.clone());
        Ok(())
    }

    fn apply_load_scaling(
        &mut self,
        engine: &mut dyn SimulationEngine,
        model: &NetworkModel,
        load_scale: f64,
    ) -> NcaResult<()> {
        let loads: Vec<_> = model
            .elements()
            .filter(|e| e.kind == ElementKind::Load && e.in_service)
            .map(|e| e.id.clone())
            .collect();
        for id in loads {
            for attribute in [Attribute::LoadActivePower, Attribute::LoadReactivePower] {
                let original = self.capture_original(engine, &id, attribute)?;
                engine.set_attribute(&id, attribute, original * load_scale)?;
            }
        }
        debug!(load_scale, "applied uniform load scaling");
        Ok(())
    }

    /// Capture the baseline value exactly once per (element, attribute).
    fn capture_original(
        &mut self,
        engine: &dyn SimulationEngine,
        id: &ElementId,
        attribute: Attribute,
    ) -> NcaResult<f64> {
        if let Some(&original) = self.originals.get(&(id.clone(), attribute)) {
            return Ok(original);
        }
        let original = engine.get_attribute(id, attribute)?;
        self.originals.insert((id.clone(), attribute), original);
        Ok(original)
    }

    /// Write every tracked original back to the engine.
    ///
    /// Safe to call repeatedly; with nothing tracked it is a no-op success.
    /// Tracking is cleared per entry only after the write succeeds, so a
    /// partially failed restore can be retried.
    pub fn restore_original_values(
        &mut self,
        engine: &mut dyn SimulationEngine,
    ) -> NcaResult<()> {
        if self.originals.is_empty() {
            self.active = None;
            return Ok(());
        }
        let mut restored = Vec::new();
        let mut first_error = None;
        for (key, &original) in &self.originals {
            match engine.set_attribute(&key.0, key.1, original) {
                Ok(()) => restored.push(key.clone()),
                Err(err) => {
                    warn!(element = %key.0, error = %err, "restore write failed, keeping tracked");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        for key in restored {
            self.originals.remove(&key);
        }
        self.active = None;
        match first_error {
            None => {
                info!("restored all tracked setpoints");
                Ok(())
            }
            Some(err) => Err(err),
        }
    }
}

/// The engine attribute that holds an element's scalable setpoint.
fn setpoint_attribute(kind: ElementKind) -> Option<Attribute> {
    match kind {
        ElementKind::StaticGenerator | ElementKind::PvSystem => {
            Some(Attribute::ActivePowerSetpoint)
        }
        ElementKind::Load => Some(Attribute::LoadActivePower),
        _ => None,
    }
}
