//! The N-1 outage state machine.
//!
//! `Idle → Applying → Applied → Analyzing → Restoring → Idle`. The external
//! model's applied outage is global mutable state, so at most one contingency
//! may be applied at a time; a second apply is rejected rather than silently
//! overwriting. Restore runs on every exit path of
//! [`ContingencyEngine::execute_and_collect`], including analyzer errors, so
//! the model always leaves a contingency the way it entered it. A failed
//! restore escalates as [`NcaError::ContingencyRestore`]: the model is in an
//! unknown outaged state and further measurements would be invalid.

use tracing::{debug, warn};

use nca_analysis::{AnalysisContext, Analyzer};
use nca_core::{
    AnalysisResult, Attribute, ElementId, NcaError, NcaResult, NetworkModel, RunLimits,
    SimulationEngine,
};

/// A single-element outage to evaluate.
#[derive(Debug, Clone)]
pub struct Contingency {
    pub element: ElementId,
    pub description: String,
}

impl Contingency {
    pub fn single(element: &ElementId, name: &str) -> Self {
        Self {
            element: element.clone(),
            description: format!("{name} outage"),
        }
    }

    /// Identity carried into results and ranking.
    pub fn id(&self) -> &str {
        self.element.as_str()
    }
}

/// Phase of the outage state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutagePhase {
    Idle,
    Applying,
    Applied,
    Analyzing,
    Restoring,
}

#[derive(Debug, Clone)]
struct ActiveOutage {
    element: ElementId,
    was_in_service: bool,
}

/// What a completed contingency evaluation produced.
#[derive(Debug)]
pub struct ContingencyOutcome {
    pub contingency_id: String,
    pub converged: bool,
    pub results: Vec<AnalysisResult>,
}

/// Applies, analyzes, and restores single-element outages.
#[derive(Debug, Default)]
pub struct ContingencyEngine {
    phase: OutagePhase,
    active: Option<ActiveOutage>,
    limits: RunLimits,
}

impl Default for OutagePhase {
    fn default() -> Self {
        OutagePhase::Idle
    }
}

impl ContingencyEngine {
    pub fn new(limits: RunLimits) -> Self {
        Self {
            phase: OutagePhase::Idle,
            active: None,
            limits,
        }
    }

    pub fn phase(&self) -> OutagePhase {
        self.phase
    }

    /// Id of the currently applied outage, if any.
    pub fn active_contingency(&self) -> Option<&ElementId> {
        self.active.as_ref().map(|outage| &outage.element)
    }

    /// Take the target element out of service.
    ///
    /// Fails with [`NcaError::ContingencyApply`] when another outage is
    /// already applied or the engine rejects the mutation; a failed apply
    /// returns the machine straight to `Idle` (nothing to undo).
    pub fn apply_contingency(
        &mut self,
        engine: &mut dyn SimulationEngine,
        model: &mut NetworkModel,
        contingency: &Contingency,
    ) -> NcaResult<()> {
        if let Some(active) = &self.active {
            return Err(NcaError::ContingencyApply {
                element: contingency.element.clone(),
                reason: format!("contingency '{}' is still applied", active.element),
            });
        }
        self.phase = OutagePhase::Applying;
        let was_in_service = match model.get(&contingency.element) {
            Some(element) => element.in_service,
            None => {
                self.phase = OutagePhase::Idle;
                return Err(NcaError::ElementNotFound(contingency.element.clone()));
            }
        };
        if let Err(err) = engine.set_attribute(&contingency.element, Attribute::OutOfService, 1.0)
        {
            self.phase = OutagePhase::Idle;
            return Err(NcaError::ContingencyApply {
                element: contingency.element.clone(),
                reason: err.to_string(),
            });
        }
        if let Some(element) = model.get_mut(&contingency.element) {
            element.in_service = false;
        }
        self.active = Some(ActiveOutage {
            element: contingency.element.clone(),
            was_in_service,
        });
        self.phase = OutagePhase::Applied;
        debug!(contingency = contingency.id(), "applied outage");
        Ok(())
    }

    /// Put the active outage back in service.
    ///
    /// Idempotent: with nothing applied this is a no-op returning
    /// `Ok(false)`. A failed write keeps the outage tracked and escalates as
    /// [`NcaError::ContingencyRestore`].
    pub fn restore_contingency(
        &mut self,
        engine: &mut dyn SimulationEngine,
        model: &mut NetworkModel,
    ) -> NcaResult<bool> {
        let Some(active) = self.active.clone() else {
            self.phase = OutagePhase::Idle;
            return Ok(false);
        };
        self.phase = OutagePhase::Restoring;
        let target = if active.was_in_service { 0.0 } else { 1.0 };
        if let Err(err) = engine.set_attribute(&active.element, Attribute::OutOfService, target) {
            warn!(element = %active.element, error = %err, "outage restore failed");
            return Err(NcaError::ContingencyRestore {
                element: active.element.clone(),
                reason: err.to_string(),
            });
        }
        if let Some(element) = model.get_mut(&active.element) {
            element.in_service = active.was_in_service;
        }
        self.active = None;
        self.phase = OutagePhase::Idle;
        debug!(element = %active.element, "restored outage");
        Ok(true)
    }

    /// Apply the outage, execute the load flow, run every analyzer when the
    /// flow converges, and restore regardless of what happened in between.
    ///
    /// Non-convergence is not an error here: the outcome carries
    /// `converged = false` with no results, and the caller records the
    /// contingency as failed. Analyzer errors surface only after restore has
    /// been attempted; a restore failure takes precedence over them.
    pub fn execute_and_collect(
        &mut self,
        engine: &mut dyn SimulationEngine,
        model: &mut NetworkModel,
        analyzers: &[&dyn Analyzer],
        scenario_id: &str,
        contingency: &Contingency,
    ) -> NcaResult<ContingencyOutcome> {
        self.apply_contingency(engine, model, contingency)?;

        let analysis = self.run_flow_and_analyzers(engine, model, analyzers, scenario_id, contingency);

        // Restore on every exit path; its failure outranks analysis errors.
        let restore = self.restore_contingency(engine, model);
        match (restore, analysis) {
            (Err(restore_err), _) => Err(restore_err),
            (Ok(_), Err(analysis_err)) => Err(analysis_err),
            (Ok(_), Ok(outcome)) => Ok(outcome),
        }
    }

    fn run_flow_and_analyzers(
        &mut self,
        engine: &mut dyn SimulationEngine,
        model: &mut NetworkModel,
        analyzers: &[&dyn Analyzer],
        scenario_id: &str,
        contingency: &Contingency,
    ) -> NcaResult<ContingencyOutcome> {
        let status = self.execute_load_flow_with_retries(engine)?;
        if !status.converged() {
            debug!(contingency = contingency.id(), "load flow diverged");
            return Ok(ContingencyOutcome {
                contingency_id: contingency.id().to_string(),
                converged: false,
                results: Vec::new(),
            });
        }

        self.phase = OutagePhase::Analyzing;
        let ctx = AnalysisContext::contingency(scenario_id, contingency.id());
        let mut results = Vec::new();
        for analyzer in analyzers {
            results.extend(analyzer.analyze(engine, model, &ctx)?);
        }
        Ok(ContingencyOutcome {
            contingency_id: contingency.id().to_string(),
            converged: true,
            results,
        })
    }

    /// Execute the load flow, retrying engine faults (never divergence) up
    /// to the configured count.
    pub fn execute_load_flow_with_retries(
        &mut self,
        engine: &mut dyn SimulationEngine,
    ) -> NcaResult<nca_core::LoadFlowStatus> {
        let mut attempts = 0;
        loop {
            match engine.execute_load_flow() {
                Ok(status) => return Ok(status),
                Err(err) if attempts < self.limits.retries => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %err, "load flow fault, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nca_core::test_utils::{MockEngine, ScriptedFlow};
    use nca_core::{AnalysisKind, ElementKind, NetworkElement, NetworkModel};

    fn setup() -> (MockEngine, NetworkModel) {
        let elements = [
            NetworkElement::new("L1", ElementKind::Line, 132.0, "north"),
            NetworkElement::new("T1", ElementKind::Transformer2W, 132.0, "north"),
        ];
        let mut engine = MockEngine::new();
        for element in &elements {
            engine = engine.with_element(element.clone());
        }
        let engine = engine
            .with_value("L1", Attribute::Loading, 50.0)
            .with_value("T1", Attribute::Loading, 60.0);
        (engine, NetworkModel::from_elements(elements))
    }

    fn line_outage() -> Contingency {
        Contingency::single(&ElementId::new("L1"), "L1")
    }

    /// Analyzer double that counts invocations and can fail on demand.
    struct ProbeAnalyzer {
        fail: bool,
        calls: std::cell::Cell<usize>,
    }

    impl ProbeAnalyzer {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: std::cell::Cell::new(0),
            }
        }
    }

    impl Analyzer for ProbeAnalyzer {
        fn kind(&self) -> AnalysisKind {
            AnalysisKind::Thermal
        }

        fn analyze(
            &self,
            _engine: &dyn SimulationEngine,
            _model: &NetworkModel,
            _ctx: &AnalysisContext<'_>,
        ) -> NcaResult<Vec<AnalysisResult>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(NcaError::Engine("probe analyzer failure".into()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn apply_then_restore_round_trips_element_state() {
        let (mut engine, mut model) = setup();
        let mut outages = ContingencyEngine::default();
        outages
            .apply_contingency(&mut engine, &mut model, &line_outage())
            .unwrap();
        assert_eq!(engine.value("L1", Attribute::OutOfService), Some(1.0));
        assert!(!model.get(&ElementId::new("L1")).unwrap().in_service);
        assert_eq!(outages.phase(), OutagePhase::Applied);

        assert!(outages.restore_contingency(&mut engine, &mut model).unwrap());
        assert_eq!(engine.value("L1", Attribute::OutOfService), Some(0.0));
        assert!(model.get(&ElementId::new("L1")).unwrap().in_service);
        assert_eq!(outages.phase(), OutagePhase::Idle);
    }

    #[test]
    fn second_apply_is_rejected_not_overwritten() {
        let (mut engine, mut model) = setup();
        let mut outages = ContingencyEngine::default();
        outages
            .apply_contingency(&mut engine, &mut model, &line_outage())
            .unwrap();
        let second = Contingency::single(&ElementId::new("T1"), "T1");
        let err = outages
            .apply_contingency(&mut engine, &mut model, &second)
            .unwrap_err();
        assert!(matches!(err, NcaError::ContingencyApply { .. }));
        // The first outage is untouched.
        assert_eq!(outages.active_contingency(), Some(&ElementId::new("L1")));
        assert_eq!(engine.value("T1", Attribute::OutOfService), None);
    }

    #[test]
    fn restore_with_nothing_applied_is_noop_success() {
        let (mut engine, mut model) = setup();
        let mut outages = ContingencyEngine::default();
        assert!(!outages.restore_contingency(&mut engine, &mut model).unwrap());
        assert!(!outages.restore_contingency(&mut engine, &mut model).unwrap());
    }

    #[test]
    fn failed_apply_returns_to_idle() {
        let (mut engine, mut model) = setup();
        engine.fail_writes_on("L1");
        let mut outages = ContingencyEngine::default();
        let err = outages
            .apply_contingency(&mut engine, &mut model, &line_outage())
            .unwrap_err();
        assert!(matches!(err, NcaError::ContingencyApply { .. }));
        assert_eq!(outages.phase(), OutagePhase::Idle);
        assert!(outages.active_contingency().is_none());
    }

    #[test]
    fn failed_restore_escalates_and_keeps_tracking() {
        let (mut engine, mut model) = setup();
        let mut outages = ContingencyEngine::default();
        outages
            .apply_contingency(&mut engine, &mut model, &line_outage())
            .unwrap();
        engine.fail_writes_on("L1");
        let err = outages
            .restore_contingency(&mut engine, &mut model)
            .unwrap_err();
        assert!(matches!(err, NcaError::ContingencyRestore { .. }));
        assert!(outages.active_contingency().is_some());
        // Once the engine accepts writes again the retry succeeds.
        engine.allow_writes_on("L1");
        assert!(outages.restore_contingency(&mut engine, &mut model).unwrap());
    }

    #[test]
    fn divergence_skips_analyzers_and_still_restores() {
        let (mut engine, mut model) = setup();
        engine.script_flow(ScriptedFlow::Diverged);
        let probe = ProbeAnalyzer::new(false);
        let mut outages = ContingencyEngine::default();
        let outcome = outages
            .execute_and_collect(
                &mut engine,
                &mut model,
                &[&probe],
                "base",
                &line_outage(),
            )
            .unwrap();
        assert!(!outcome.converged);
        assert!(outcome.results.is_empty());
        assert_eq!(probe.calls.get(), 0);
        assert!(model.get(&ElementId::new("L1")).unwrap().in_service);
    }

    #[test]
    fn analyzer_failure_still_restores_the_element() {
        let (mut engine, mut model) = setup();
        let probe = ProbeAnalyzer::new(true);
        let mut outages = ContingencyEngine::default();
        let err = outages
            .execute_and_collect(
                &mut engine,
                &mut model,
                &[&probe],
                "base",
                &line_outage(),
            )
            .unwrap_err();
        assert!(matches!(err, NcaError::Engine(_)));
        assert_eq!(probe.calls.get(), 1);
        // Post-condition: the element is back in service despite the error.
        assert!(model.get(&ElementId::new("L1")).unwrap().in_service);
        assert_eq!(engine.value("L1", Attribute::OutOfService), Some(0.0));
        assert_eq!(outages.phase(), OutagePhase::Idle);
    }

    #[test]
    fn engine_faults_are_retried_up_to_the_limit() {
        let (mut engine, _model) = setup();
        engine.script_flow(ScriptedFlow::Fault("transient".into()));
        engine.script_flow(ScriptedFlow::Converged);
        let mut outages = ContingencyEngine::new(RunLimits {
            retries: 1,
            ..RunLimits::default()
        });
        let status = outages.execute_load_flow_with_retries(&mut engine).unwrap();
        assert!(status.converged());
        assert_eq!(engine.flow_count, 2);

        engine.script_flow(ScriptedFlow::Fault("persistent".into()));
        engine.script_flow(ScriptedFlow::Fault("persistent".into()));
        let mut no_retries = ContingencyEngine::default();
        assert!(no_retries.execute_load_flow_with_retries(&mut engine).is_err());
    }
}
