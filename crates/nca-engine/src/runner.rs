//! Sequential scenario × contingency pipeline.
//!
//! The external engine is one exclusive session, so the sweep is strictly
//! sequential: apply scaling, analyze the base case, walk the contingency
//! list, restore scaling, move on. The abort flag is honored between
//! scenarios and between contingencies, always after restoring whatever is
//! currently applied.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nca_analysis::{AnalysisContext, Analyzer};
use nca_core::{AnalysisConfig, ElementId, NcaError, NetworkModel, SimulationEngine};
use nca_results::ResultsAggregator;
use nca_scenarios::{Scenario, ScenarioManager};

use crate::contingency::{Contingency, ContingencyEngine};

/// Counters returned after the run so clients can log completion and spot
/// an aborted or partially failed sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub scenarios_total: usize,
    pub scenarios_completed: usize,
    /// Scenarios abandoned early (apply failure or scenario-fatal restore).
    pub scenarios_failed: usize,
    pub contingencies_analyzed: usize,
    pub contingencies_failed: usize,
    pub aborted: bool,
}

/// Drive the full analysis: every scenario, base case first, then each
/// contingency, recording everything into the aggregator.
///
/// Contingency targets are the model's in-service thermal elements at entry,
/// optionally capped by `max_contingencies`. Element- and contingency-scoped
/// failures are recorded and skipped; a failed outage restore abandons the
/// remaining contingencies of the current scenario; a failed scenario
/// restore aborts the whole run, since every later scenario would inherit a
/// polluted baseline.
pub fn run_analysis(
    engine: &mut dyn SimulationEngine,
    model: &mut NetworkModel,
    scenarios: &[Scenario],
    analyzers: &[&dyn Analyzer],
    config: &AnalysisConfig,
    aggregator: &mut ResultsAggregator,
    abort: &AtomicBool,
) -> Result<RunReport> {
    config.validate().context("validating analysis configuration")?;
    if config.run.parallel {
        warn!("parallel execution requested but only one engine session is available; running sequentially");
    }

    let mut targets = model.contingency_candidates();
    if let Some(cap) = config.run.max_contingencies {
        targets.truncate(cap);
    }
    info!(
        scenarios = scenarios.len(),
        contingencies = targets.len(),
        "starting contingency analysis run"
    );

    let mut report = RunReport {
        scenarios_total: scenarios.len(),
        ..RunReport::default()
    };
    let mut scenario_manager = ScenarioManager::new();
    let mut outages = ContingencyEngine::new(config.run.clone());

    for scenario in scenarios {
        if abort.load(Ordering::SeqCst) {
            report.aborted = true;
            break;
        }
        info!(scenario = %scenario.name, "running scenario");

        if let Err(err) = scenario_manager.apply_scenario(engine, model, scenario) {
            warn!(scenario = %scenario.name, error = %err, "scenario apply failed");
            aggregator.record_failure(&scenario.name, None, err.to_string());
            report.scenarios_failed += 1;
            restore_scenario(&mut scenario_manager, engine, &scenario.name)?;
            continue;
        }

        let scenario_fatal = run_scenario_cases(
            engine,
            model,
            analyzers,
            scenario,
            &targets,
            &mut outages,
            aggregator,
            &mut report,
            abort,
        );
        if scenario_fatal {
            report.scenarios_failed += 1;
        } else {
            report.scenarios_completed += 1;
        }

        restore_scenario(&mut scenario_manager, engine, &scenario.name)?;
        if report.aborted {
            break;
        }
    }

    info!(
        completed = report.scenarios_completed,
        failed = report.scenarios_failed,
        contingencies_failed = report.contingencies_failed,
        aborted = report.aborted,
        "contingency analysis run finished"
    );
    Ok(report)
}

/// Base case plus contingency walk for one applied scenario. Returns true
/// when the scenario had to be abandoned (scenario-fatal restore failure).
#[allow(clippy::too_many_arguments)]
fn run_scenario_cases(
    engine: &mut dyn SimulationEngine,
    model: &mut NetworkModel,
    analyzers: &[&dyn Analyzer],
    scenario: &Scenario,
    targets: &[ElementId],
    outages: &mut ContingencyEngine,
    aggregator: &mut ResultsAggregator,
    report: &mut RunReport,
    abort: &AtomicBool,
) -> bool {
    // Base case always completes, successfully or as a recorded failure,
    // before any contingency begins.
    match outages.execute_load_flow_with_retries(engine) {
        Ok(status) if status.converged() => {
            let ctx = AnalysisContext::base_case(&scenario.name);
            for analyzer in analyzers {
                match analyzer.analyze(engine, model, &ctx) {
                    Ok(results) => aggregator.record(results),
                    Err(err) => {
                        warn!(scenario = %scenario.name, error = %err, "base case analysis failed");
                        aggregator.record_failure(&scenario.name, None, err.to_string());
                    }
                }
            }
        }
        Ok(_) => {
            warn!(scenario = %scenario.name, "base case load flow diverged");
            let err = NcaError::LoadFlowDivergence { contingency: None };
            aggregator.record_failure(&scenario.name, None, err.to_string());
        }
        Err(err) => {
            warn!(scenario = %scenario.name, error = %err, "base case load flow failed");
            aggregator.record_failure(&scenario.name, None, err.to_string());
        }
    }

    for target in targets {
        if abort.load(Ordering::SeqCst) {
            report.aborted = true;
            return false;
        }
        let name = model
            .get(target)
            .map(|element| element.name.clone())
            .unwrap_or_else(|| target.to_string());
        let contingency = Contingency::single(target, &name);

        match outages.execute_and_collect(engine, model, analyzers, &scenario.name, &contingency) {
            Ok(outcome) if outcome.converged => {
                aggregator.record(outcome.results);
                report.contingencies_analyzed += 1;
            }
            Ok(outcome) => {
                let err = NcaError::LoadFlowDivergence {
                    contingency: Some(outcome.contingency_id.clone()),
                };
                aggregator.record_failure(&scenario.name, Some(outcome.contingency_id), err.to_string());
                report.contingencies_failed += 1;
            }
            Err(err @ NcaError::ContingencyRestore { .. }) => {
                // The model is in an unknown outaged state; measurements for
                // the rest of this scenario would be invalid.
                warn!(scenario = %scenario.name, contingency = contingency.id(), error = %err,
                    "restore failed, abandoning scenario");
                aggregator.record_failure(
                    &scenario.name,
                    Some(contingency.id().to_string()),
                    err.to_string(),
                );
                report.contingencies_failed += 1;
                return true;
            }
            Err(err) => {
                warn!(scenario = %scenario.name, contingency = contingency.id(), error = %err,
                    "contingency failed");
                aggregator.record_failure(
                    &scenario.name,
                    Some(contingency.id().to_string()),
                    err.to_string(),
                );
                report.contingencies_failed += 1;
            }
        }
    }
    false
}

/// Scenario restore failure is run-fatal: every later scenario would scale
/// off a polluted baseline.
fn restore_scenario(
    manager: &mut ScenarioManager,
    engine: &mut dyn SimulationEngine,
    scenario_name: &str,
) -> Result<()> {
    manager
        .restore_original_values(engine)
        .with_context(|| format!("restoring original setpoints after scenario '{scenario_name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nca_analysis::{ThermalAnalyzer, VoltageAnalyzer};
    use nca_core::test_utils::{MockEngine, ScriptedFlow};
    use nca_core::{Attribute, ElementId, ElementKind, NetworkElement, Severity};
    use nca_scenarios::{ScalingTarget, Scenario};

    fn elements() -> Vec<NetworkElement> {
        vec![
            NetworkElement::new("L1", ElementKind::Line, 132.0, "north"),
            NetworkElement::new("T1", ElementKind::Transformer2W, 132.0, "north"),
            NetworkElement::new("B1", ElementKind::Busbar, 132.0, "north"),
            NetworkElement::new("BESS A", ElementKind::StaticGenerator, 33.0, "north"),
        ]
    }

    fn setup() -> (MockEngine, NetworkModel) {
        let mut engine = MockEngine::new();
        for element in elements() {
            engine = engine.with_element(element);
        }
        let engine = engine
            .with_value("L1", Attribute::Loading, 96.0)
            .with_value("T1", Attribute::Loading, 70.0)
            .with_value("B1", Attribute::VoltagePu, 0.93)
            .with_value("BESS A", Attribute::ActivePowerSetpoint, 10.0);
        (engine, NetworkModel::from_elements(elements()))
    }

    fn scenarios() -> Vec<Scenario> {
        vec![
            Scenario {
                name: "BESS_A_100".into(),
                description: "full export".into(),
                targets: vec![ScalingTarget {
                    element: ElementId::new("BESS A"),
                    factor: 1.0,
                }],
                load_scale: None,
            },
            Scenario {
                name: "BESS_A_-40".into(),
                description: "partial import".into(),
                targets: vec![ScalingTarget {
                    element: ElementId::new("BESS A"),
                    factor: -0.4,
                }],
                load_scale: None,
            },
        ]
    }

    fn run(
        engine: &mut MockEngine,
        model: &mut NetworkModel,
        config: &AnalysisConfig,
        abort: &AtomicBool,
    ) -> (RunReport, ResultsAggregator) {
        let thermal = ThermalAnalyzer::from_config(config);
        let voltage = VoltageAnalyzer::from_config(config);
        let analyzers: Vec<&dyn Analyzer> = vec![&thermal, &voltage];
        let mut aggregator = ResultsAggregator::new(config.severity.clone());
        let report = run_analysis(
            engine,
            model,
            &scenarios(),
            &analyzers,
            config,
            &mut aggregator,
            abort,
        )
        .unwrap();
        (report, aggregator)
    }

    #[test]
    fn full_sweep_records_base_and_contingency_results() {
        let (mut engine, mut model) = setup();
        let config = AnalysisConfig::default();
        let abort = AtomicBool::new(false);
        let (report, aggregator) = run(&mut engine, &mut model, &config, &abort);

        assert_eq!(report.scenarios_completed, 2);
        assert_eq!(report.scenarios_failed, 0);
        // Two contingency targets (L1, T1) per scenario.
        assert_eq!(report.contingencies_analyzed, 4);
        assert!(!report.aborted);

        // Per scenario: base (3 results) + 2 contingencies. The outaged
        // element is skipped while out of service, so each contingency
        // yields 2 results.
        assert_eq!(aggregator.len(), 2 * (3 + 2 + 2));
        // Base case thermal violation on L1 (96 > 90) in both scenarios.
        let violations = aggregator.violations();
        assert!(violations
            .iter()
            .any(|v| v.element_name == "L1" && v.contingency_id.is_none()));
        // The 0.93 pu busbar is a Low violation everywhere it is measured.
        assert!(violations
            .iter()
            .any(|v| v.element_name == "B1" && v.severity == Severity::Low));

        // Everything restored: setpoint at original, no outage left applied.
        assert_eq!(engine.value("BESS A", Attribute::ActivePowerSetpoint), Some(10.0));
        assert_eq!(engine.value("L1", Attribute::OutOfService), Some(0.0));
        assert_eq!(engine.value("T1", Attribute::OutOfService), Some(0.0));
        assert!(model.get(&ElementId::new("L1")).unwrap().in_service);
    }

    #[test]
    fn diverged_contingency_is_recorded_as_failed() {
        let (mut engine, mut model) = setup();
        // Flows: scenario1 base, c1 (diverges), c2; scenario2 base, c1, c2.
        engine.script_flow(ScriptedFlow::Converged);
        engine.script_flow(ScriptedFlow::Diverged);
        let config = AnalysisConfig::default();
        let abort = AtomicBool::new(false);
        let (report, aggregator) = run(&mut engine, &mut model, &config, &abort);

        assert_eq!(report.contingencies_analyzed, 3);
        assert_eq!(report.contingencies_failed, 1);
        assert_eq!(aggregator.failures().len(), 1);
        assert_eq!(aggregator.failures()[0].contingency_id.as_deref(), Some("L1"));
        assert_eq!(aggregator.summary().failed_contingencies, 1);
        // The diverged contingency was still restored.
        assert_eq!(engine.value("L1", Attribute::OutOfService), Some(0.0));
    }

    #[test]
    fn diverged_base_case_is_recorded_and_contingencies_continue() {
        let (mut engine, mut model) = setup();
        engine.script_flow(ScriptedFlow::Diverged); // scenario1 base
        let config = AnalysisConfig::default();
        let abort = AtomicBool::new(false);
        let (report, aggregator) = run(&mut engine, &mut model, &config, &abort);

        assert_eq!(report.scenarios_completed, 2);
        assert!(aggregator
            .failures()
            .iter()
            .any(|f| f.scenario_id == "BESS_A_100" && f.contingency_id.is_none()));
        assert_eq!(report.contingencies_analyzed, 4);
    }

    #[test]
    fn abort_before_run_does_nothing() {
        let (mut engine, mut model) = setup();
        let config = AnalysisConfig::default();
        let abort = AtomicBool::new(true);
        let (report, aggregator) = run(&mut engine, &mut model, &config, &abort);
        assert!(report.aborted);
        assert_eq!(report.scenarios_completed, 0);
        assert!(aggregator.is_empty());
        assert_eq!(engine.flow_count, 0);
    }

    #[test]
    fn max_contingencies_caps_the_walk() {
        let (mut engine, mut model) = setup();
        let mut config = AnalysisConfig::default();
        config.run.max_contingencies = Some(1);
        let abort = AtomicBool::new(false);
        let (report, _) = run(&mut engine, &mut model, &config, &abort);
        assert_eq!(report.contingencies_analyzed, 2); // 1 per scenario
    }

    #[test]
    fn scenario_apply_failure_skips_to_next_scenario() {
        let (mut engine, mut model) = setup();
        // First scenario targets an element the model does not know; nothing
        // is written, so the run continues with the next scenario.
        let ghost = Scenario {
            name: "ghost".into(),
            description: String::new(),
            targets: vec![ScalingTarget {
                element: ElementId::new("ghost"),
                factor: 1.0,
            }],
            load_scale: None,
        };
        let mut set = vec![ghost];
        set.push(scenarios().remove(0));

        let config = AnalysisConfig::default();
        let abort = AtomicBool::new(false);
        let thermal = ThermalAnalyzer::from_config(&config);
        let analyzers: Vec<&dyn Analyzer> = vec![&thermal];
        let mut aggregator = ResultsAggregator::new(config.severity.clone());
        let report = run_analysis(
            &mut engine,
            &mut model,
            &set,
            &analyzers,
            &config,
            &mut aggregator,
            &abort,
        )
        .unwrap();
        assert_eq!(report.scenarios_failed, 1);
        assert_eq!(report.scenarios_completed, 1);
        assert_eq!(aggregator.failures().len(), 1);
        assert_eq!(aggregator.failures()[0].scenario_id, "ghost");
        // Only the valid scenario ran flows: base case plus two contingencies.
        assert_eq!(engine.flow_count, 3);
    }

    #[test]
    fn failed_scenario_restore_is_run_fatal() {
        let (engine, mut model) = setup();
        // The setpoint write succeeds during apply, then the element starts
        // rejecting writes, so the scenario restore cannot complete.
        let config = AnalysisConfig::default();
        let abort = AtomicBool::new(false);
        let thermal = ThermalAnalyzer::from_config(&config);
        let analyzers: Vec<&dyn Analyzer> = vec![&thermal];
        let mut aggregator = ResultsAggregator::new(config.severity.clone());

        struct FlakyWrites {
            inner: MockEngine,
            writes_seen: usize,
        }
        impl nca_core::SimulationEngine for FlakyWrites {
            fn connect(&mut self, user: Option<&str>) -> nca_core::NcaResult<()> {
                self.inner.connect(user)
            }
            fn disconnect(&mut self) {
                self.inner.disconnect()
            }
            fn elements_by_pattern(
                &self,
                kind: ElementKind,
                pattern: &nca_core::NamePattern,
            ) -> nca_core::NcaResult<Vec<NetworkElement>> {
                self.inner.elements_by_pattern(kind, pattern)
            }
            fn get_attribute(
                &self,
                element: &ElementId,
                attribute: Attribute,
            ) -> nca_core::NcaResult<f64> {
                self.inner.get_attribute(element, attribute)
            }
            fn set_attribute(
                &mut self,
                element: &ElementId,
                attribute: Attribute,
                value: f64,
            ) -> nca_core::NcaResult<()> {
                self.writes_seen += 1;
                if attribute == Attribute::ActivePowerSetpoint && self.writes_seen > 1 {
                    return Err(nca_core::NcaError::AttributeWrite {
                        element: element.clone(),
                        attribute,
                        reason: "session lost".into(),
                    });
                }
                self.inner.set_attribute(element, attribute, value)
            }
            fn execute_load_flow(&mut self) -> nca_core::NcaResult<nca_core::LoadFlowStatus> {
                self.inner.execute_load_flow()
            }
        }

        let mut flaky = FlakyWrites {
            inner: engine,
            writes_seen: 0,
        };
        let err = run_analysis(
            &mut flaky,
            &mut model,
            &scenarios(),
            &analyzers,
            &config,
            &mut aggregator,
            &abort,
        )
        .unwrap_err();
        assert!(err.to_string().contains("restoring original setpoints"));
    }
}
