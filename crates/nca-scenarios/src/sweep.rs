//! Sweep generator: factor cross-products over controllable elements.

use nca_core::{NcaError, NcaResult, NetworkElement};
use serde::{Deserialize, Serialize};

use crate::{ScalingTarget, Scenario};

/// Guard against combinatorial blow-up of the cross product.
const MAX_COMBINATIONS: usize = 10_000;

/// Scaling factors for a sweep: an explicit list or an inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepFactors {
    List(Vec<f64>),
    Range { start: f64, stop: f64, step: f64 },
}

impl SweepFactors {
    pub fn values(&self) -> NcaResult<Vec<f64>> {
        match self {
            SweepFactors::List(values) => {
                if values.is_empty() {
                    return Err(NcaError::Config("sweep factor list is empty".into()));
                }
                Ok(values.clone())
            }
            SweepFactors::Range { start, stop, step } => {
                if *step <= 0.0 || !step.is_finite() {
                    return Err(NcaError::Config(format!(
                        "sweep step {step} must be positive and finite"
                    )));
                }
                if stop < start {
                    return Err(NcaError::Config(format!(
                        "sweep range [{start}, {stop}] is inverted"
                    )));
                }
                let mut values = Vec::new();
                let mut current = *start;
                // Half-step tolerance absorbs float accumulation at the stop bound.
                while current <= stop + step / 2.0 {
                    values.push(current);
                    current += step;
                }
                Ok(values)
            }
        }
    }
}

/// Build named scenarios from the cross product of `factors` over `targets`.
///
/// Every combination assigns each target one factor; names embed the signed
/// integer percent per target, e.g. `BESS_A_100_BESS_B_-40`.
pub fn generate_sweep(
    targets: &[&NetworkElement],
    factors: &SweepFactors,
) -> NcaResult<Vec<Scenario>> {
    if targets.is_empty() {
        return Err(NcaError::Config("sweep has no target elements".into()));
    }
    let values = factors.values()?;
    let combinations = values
        .len()
        .checked_pow(targets.len() as u32)
        .filter(|&n| n <= MAX_COMBINATIONS)
        .ok_or_else(|| {
            NcaError::Config(format!(
                "sweep of {} factors over {} elements exceeds {MAX_COMBINATIONS} combinations",
                values.len(),
                targets.len()
            ))
        })?;

    let mut scenarios = Vec::with_capacity(combinations);
    let mut assignment = vec![0usize; targets.len()];
    loop {
        let combo: Vec<(usize, f64)> = assignment
            .iter()
            .enumerate()
            .map(|(t, &f)| (t, values[f]))
            .collect();
        scenarios.push(build_scenario(targets, &combo));

        // Odometer increment over the factor indices.
        let mut pos = targets.len();
        loop {
            if pos == 0 {
                return Ok(scenarios);
            }
            pos -= 1;
            assignment[pos] += 1;
            if assignment[pos] < values.len() {
                break;
            }
            assignment[pos] = 0;
        }
    }
}

fn build_scenario(targets: &[&NetworkElement], combo: &[(usize, f64)]) -> Scenario {
    let mut name_parts = Vec::with_capacity(combo.len());
    let mut description_parts = Vec::with_capacity(combo.len());
    let mut scaling = Vec::with_capacity(combo.len());
    for &(index, factor) in combo {
        let element = targets[index];
        let percent = (factor * 100.0).round() as i64;
        name_parts.push(format!("{}_{percent}", element.name));
        description_parts.push(format!(
            "{} at {percent}% {}",
            element.name,
            if factor >= 0.0 { "export" } else { "import" }
        ));
        scaling.push(ScalingTarget {
            element: element.id.clone(),
            factor,
        });
    }
    Scenario {
        name: name_parts.join("_"),
        description: description_parts.join(", "),
        targets: scaling,
        load_scale: None,
    }
}
