//! In-memory engine double shared by the workspace's tests.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::engine::{Attribute, LoadFlowStatus, SimulationEngine};
use crate::error::{NcaError, NcaResult};
use crate::matcher::NamePattern;
use crate::model::{ElementId, ElementKind, NetworkElement};

/// Scripted outcome for one load-flow execution.
#[derive(Debug, Clone)]
pub enum ScriptedFlow {
    Converged,
    Diverged,
    Fault(String),
}

/// In-memory [`SimulationEngine`] with scripted load-flow outcomes and
/// per-element write-failure injection. Every mutation is recorded so tests
/// can assert on apply/restore ordering.
#[derive(Debug, Default)]
pub struct MockEngine {
    elements: Vec<NetworkElement>,
    attrs: HashMap<(ElementId, Attribute), f64>,
    flows: VecDeque<ScriptedFlow>,
    failing_writes: HashSet<ElementId>,
    pub connected: bool,
    pub flow_count: usize,
    pub writes: Vec<(ElementId, Attribute, f64)>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: NetworkElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_value(mut self, id: &str, attribute: Attribute, value: f64) -> Self {
        self.attrs.insert((ElementId::new(id), attribute), value);
        self
    }

    /// Queue the outcome of the next load-flow execution. With an empty
    /// queue every flow converges.
    pub fn script_flow(&mut self, outcome: ScriptedFlow) {
        self.flows.push_back(outcome);
    }

    /// Make every `set_attribute` on this element fail.
    pub fn fail_writes_on(&mut self, id: &str) {
        self.failing_writes.insert(ElementId::new(id));
    }

    pub fn allow_writes_on(&mut self, id: &str) {
        self.failing_writes.remove(&ElementId::new(id));
    }

    /// Current stored value, if any.
    pub fn value(&self, id: &str, attribute: Attribute) -> Option<f64> {
        self.attrs.get(&(ElementId::new(id), attribute)).copied()
    }

    fn knows(&self, id: &ElementId) -> bool {
        self.elements.iter().any(|e| &e.id == id)
    }
}

impl SimulationEngine for MockEngine {
    fn connect(&mut self, _user: Option<&str>) -> NcaResult<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn elements_by_pattern(
        &self,
        kind: ElementKind,
        pattern: &NamePattern,
    ) -> NcaResult<Vec<NetworkElement>> {
        Ok(self
            .elements
            .iter()
            .filter(|e| e.kind == kind && pattern.matches(&e.name))
            .cloned()
            .collect())
    }

    fn get_attribute(&self, element: &ElementId, attribute: Attribute) -> NcaResult<f64> {
        if !self.knows(element) {
            return Err(NcaError::ElementNotFound(element.clone()));
        }
        if let Some(value) = self.attrs.get(&(element.clone(), attribute)) {
            return Ok(*value);
        }
        // Elements start in service unless a test says otherwise.
        if attribute == Attribute::OutOfService {
            return Ok(0.0);
        }
        Err(NcaError::Engine(format!(
            "no scripted value for {} on '{element}'",
            attribute.key()
        )))
    }

    fn set_attribute(
        &mut self,
        element: &ElementId,
        attribute: Attribute,
        value: f64,
    ) -> NcaResult<()> {
        if !self.knows(element) {
            return Err(NcaError::ElementNotFound(element.clone()));
        }
        if self.failing_writes.contains(element) {
            return Err(NcaError::AttributeWrite {
                element: element.clone(),
                attribute,
                reason: "write rejected by test script".into(),
            });
        }
        self.attrs.insert((element.clone(), attribute), value);
        self.writes.push((element.clone(), attribute, value));
        Ok(())
    }

    fn execute_load_flow(&mut self) -> NcaResult<LoadFlowStatus> {
        self.flow_count += 1;
        match self.flows.pop_front() {
            None | Some(ScriptedFlow::Converged) => Ok(LoadFlowStatus::Converged),
            Some(ScriptedFlow::Diverged) => Ok(LoadFlowStatus::Diverged),
            Some(ScriptedFlow::Fault(reason)) => Err(NcaError::Engine(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_reports_unknown_elements() {
        let engine = MockEngine::new();
        let err = engine
            .get_attribute(&ElementId::new("ghost"), Attribute::Loading)
            .unwrap_err();
        assert!(matches!(err, NcaError::ElementNotFound(_)));
    }

    #[test]
    fn scripted_flows_then_default_convergence() {
        let mut engine = MockEngine::new();
        engine.script_flow(ScriptedFlow::Diverged);
        assert_eq!(engine.execute_load_flow().unwrap(), LoadFlowStatus::Diverged);
        assert_eq!(engine.execute_load_flow().unwrap(), LoadFlowStatus::Converged);
        assert_eq!(engine.flow_count, 2);
    }

    #[test]
    fn write_failure_injection() {
        let mut engine = MockEngine::new()
            .with_element(NetworkElement::new("G1", ElementKind::StaticGenerator, 33.0, "north"));
        engine.fail_writes_on("G1");
        let err = engine
            .set_attribute(&ElementId::new("G1"), Attribute::ActivePowerSetpoint, 5.0)
            .unwrap_err();
        assert!(matches!(err, NcaError::AttributeWrite { .. }));
        engine.allow_writes_on("G1");
        engine
            .set_attribute(&ElementId::new("G1"), Attribute::ActivePowerSetpoint, 5.0)
            .unwrap();
        assert_eq!(engine.value("G1", Attribute::ActivePowerSetpoint), Some(5.0));
    }
}
