//! Serializable run snapshot for the external report writer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use nca_core::{AnalysisResult, Violation};

use crate::aggregator::{AggregateSummary, ContingencyScore, FailedContingency, ResultsAggregator};

/// Finalized view of a run: everything downstream rendering needs, stable
/// and self-contained.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub created_at: DateTime<Utc>,
    pub summary: AggregateSummary,
    pub ranking: Vec<ContingencyScore>,
    pub violations: Vec<Violation>,
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<FailedContingency>,
}

impl RunSnapshot {
    pub fn from_aggregator(aggregator: &ResultsAggregator) -> Self {
        Self {
            created_at: Utc::now(),
            summary: aggregator.summary(),
            ranking: aggregator.rank_contingencies(),
            violations: aggregator.violations(),
            results: aggregator.results().cloned().collect(),
            failures: aggregator.failures().to_vec(),
        }
    }
}

pub fn write_snapshot(path: &Path, snapshot: &RunSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating snapshot directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(snapshot).context("serializing run snapshot to JSON")?;
    fs::write(path, json).with_context(|| format!("writing run snapshot '{}'", path.display()))?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<RunSnapshot> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening run snapshot '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing run snapshot '{}'", path.display()))
}
