//! Result collection, deduplication, ranking, and summarization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use nca_core::{
    AnalysisKind, AnalysisResult, ResultKey, Severity, SeverityConfig, Violation,
};

/// A contingency whose analysis could not be completed (non-convergence,
/// rejected apply, abort). Carried into the summary so an incomplete run is
/// never presented as complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedContingency {
    pub scenario_id: String,
    /// `None` when the base case itself failed.
    pub contingency_id: Option<String>,
    pub reason: String,
}

/// Severity-weighted score of one contingency across the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyScore {
    pub contingency_id: String,
    pub score: u64,
    pub violations: usize,
}

/// Aggregate counters for downstream reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_results: usize,
    pub total_violations: usize,
    pub base_case_violations: usize,
    pub contingency_violations: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_region: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<AnalysisKind, usize>,
    pub failed_contingencies: usize,
}

/// Collects results across the scenario × contingency space.
///
/// Results are upserted by their unique key (scenario, contingency, element,
/// analysis kind); recording the same key twice keeps the most recent
/// measurement. Storage is ordered so every derived view is deterministic.
#[derive(Debug, Default)]
pub struct ResultsAggregator {
    results: BTreeMap<ResultKey, AnalysisResult>,
    failures: Vec<FailedContingency>,
    severity: SeverityConfig,
}

impl ResultsAggregator {
    pub fn new(severity: SeverityConfig) -> Self {
        Self {
            results: BTreeMap::new(),
            failures: Vec::new(),
            severity,
        }
    }

    /// Upsert a batch of results; last write wins per key.
    pub fn record(&mut self, results: impl IntoIterator<Item = AnalysisResult>) {
        for result in results {
            self.results.insert(result.key(), result);
        }
    }

    /// Record a contingency (or base case) whose analysis did not complete.
    pub fn record_failure(
        &mut self,
        scenario_id: impl Into<String>,
        contingency_id: Option<String>,
        reason: impl Into<String>,
    ) {
        self.failures.push(FailedContingency {
            scenario_id: scenario_id.into(),
            contingency_id,
            reason: reason.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.values()
    }

    pub fn failures(&self) -> &[FailedContingency] {
        &self.failures
    }

    /// All violating results as reporting views, in key order.
    pub fn violations(&self) -> Vec<Violation> {
        self.results
            .values()
            .filter_map(Violation::from_result)
            .collect()
    }

    /// Contingencies ordered by descending severity-weighted violation score.
    ///
    /// Ties break on the lexicographically smallest violating element name,
    /// then on the contingency id, so repeated calls on identical input give
    /// identical output.
    pub fn rank_contingencies(&self) -> Vec<ContingencyScore> {
        struct Entry {
            score: u64,
            violations: usize,
            first_element: String,
        }
        let mut per_contingency: BTreeMap<&str, Entry> = BTreeMap::new();
        for result in self.results.values() {
            let Some(contingency_id) = result.contingency_id.as_deref() else {
                continue;
            };
            if !result.violation {
                continue;
            }
            let entry = per_contingency.entry(contingency_id).or_insert(Entry {
                score: 0,
                violations: 0,
                first_element: result.element_name.clone(),
            });
            entry.score += u64::from(self.severity.weight_of(result.severity));
            entry.violations += 1;
            if result.element_name < entry.first_element {
                entry.first_element = result.element_name.clone();
            }
        }

        let mut ranked: Vec<(String, Entry)> = per_contingency
            .into_iter()
            .map(|(id, entry)| (id.to_string(), entry))
            .collect();
        ranked.sort_by(|(id_a, a), (id_b, b)| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.first_element.cmp(&b.first_element))
                .then_with(|| id_a.cmp(id_b))
        });
        ranked
            .into_iter()
            .map(|(contingency_id, entry)| ContingencyScore {
                contingency_id,
                score: entry.score,
                violations: entry.violations,
            })
            .collect()
    }

    /// Counts per severity tier, region, and analysis kind, plus the failed
    /// contingency count.
    pub fn summary(&self) -> AggregateSummary {
        let mut summary = AggregateSummary {
            total_results: self.results.len(),
            failed_contingencies: self.failures.len(),
            ..AggregateSummary::default()
        };
        for result in self.results.values() {
            if !result.violation {
                continue;
            }
            summary.total_violations += 1;
            if result.is_base_case() {
                summary.base_case_violations += 1;
            } else {
                summary.contingency_violations += 1;
            }
            *summary.by_severity.entry(result.severity).or_default() += 1;
            *summary.by_region.entry(result.region.clone()).or_default() += 1;
            *summary.by_kind.entry(result.kind).or_default() += 1;
        }
        summary
    }
}
