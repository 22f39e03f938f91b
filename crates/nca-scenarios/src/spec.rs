//! Scenario spec files: named scaling combinations loaded from YAML or JSON.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use nca_core::ElementId;

use crate::{ScalingTarget, Scenario};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub version: Option<u32>,
    #[serde(default)]
    pub defaults: ScenarioDefaults,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefaults {
    #[serde(default = "default_scale")]
    pub load_scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for ScenarioDefaults {
    fn default() -> Self {
        Self {
            load_scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub elements: Vec<ElementFactorSpec>,
    pub load_scale: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementFactorSpec {
    pub element: String,
    pub factor: f64,
}

pub fn load_spec_from_path(path: &Path) -> Result<ScenarioSet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading scenario spec '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing scenario spec yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing scenario spec json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing scenario spec"),
    }
}

pub fn resolve_scenarios(set: &ScenarioSet) -> Result<Vec<Scenario>> {
    if set.scenarios.is_empty() {
        return Err(anyhow!("scenario set contains no scenarios"));
    }
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(set.scenarios.len());
    for scenario in &set.scenarios {
        if scenario.name.trim().is_empty() {
            return Err(anyhow!("scenario name cannot be empty"));
        }
        if !seen.insert(scenario.name.clone()) {
            return Err(anyhow!("duplicate scenario '{}' in spec", scenario.name));
        }
        let load_scale = scenario.load_scale.unwrap_or(set.defaults.load_scale);
        if scenario.elements.is_empty() && (load_scale - 1.0).abs() < f64::EPSILON {
            return Err(anyhow!(
                "scenario '{}' scales nothing; give it elements or a load_scale",
                scenario.name
            ));
        }
        for spec in &scenario.elements {
            if !spec.factor.is_finite() {
                return Err(anyhow!(
                    "scenario '{}' has non-finite factor for '{}'",
                    scenario.name,
                    spec.element
                ));
            }
        }
        resolved.push(Scenario {
            name: scenario.name.clone(),
            description: scenario.description.clone().unwrap_or_default(),
            targets: scenario
                .elements
                .iter()
                .map(|spec| ScalingTarget {
                    element: ElementId::new(spec.element.clone()),
                    factor: spec.factor,
                })
                .collect(),
            load_scale: if (load_scale - 1.0).abs() > f64::EPSILON {
                Some(load_scale)
            } else {
                None
            },
        });
    }
    Ok(resolved)
}

pub fn validate(set: &ScenarioSet) -> Result<()> {
    resolve_scenarios(set).map(|_| ())
}
