//! Unified error types for the NCA ecosystem
//!
//! This module provides a common error type [`NcaError`] that classifies every
//! failure mode of the contingency pipeline. The variants carry the propagation
//! policy: connection and configuration failures are fatal before any scenario
//! runs, element-scoped failures are skipped and logged, divergence is recorded
//! as a failed contingency, and a failed restore is fatal for the current
//! scenario because the model is left in an unknown outaged state.

use crate::engine::Attribute;
use crate::model::ElementId;
use thiserror::Error;

/// Unified error type for all NCA operations.
#[derive(Error, Debug)]
pub enum NcaError {
    /// Cannot reach or authenticate to the simulation engine. Fatal; aborts
    /// before any scenario runs.
    #[error("engine connection failed: {0}")]
    Connection(String),

    /// A named or pattern-matched element is missing from the engine. Skip
    /// that element or contingency and continue.
    #[error("element '{0}' not found")]
    ElementNotFound(ElementId),

    /// The load flow did not converge. Recorded as a failed result for the
    /// current scenario/contingency; the sweep continues.
    #[error("load flow did not converge{}", contingency_suffix(.contingency))]
    LoadFlowDivergence { contingency: Option<String> },

    /// The engine rejected an outage mutation, or an outage is already
    /// applied. Abort this contingency, attempt restore, continue.
    #[error("cannot apply contingency on '{element}': {reason}")]
    ContingencyApply { element: ElementId, reason: String },

    /// Restoration after an outage failed. Fatal for the current scenario:
    /// further measurements would be taken on a polluted model.
    #[error("cannot restore '{element}' after contingency: {reason}")]
    ContingencyRestore { element: ElementId, reason: String },

    /// A setpoint write during scenario scaling or restore failed.
    #[error("writing {attribute:?} on '{element}' failed: {reason}")]
    AttributeWrite {
        element: ElementId,
        attribute: Attribute,
        reason: String,
    },

    /// Missing or invalid limits, thresholds, or sweep specification.
    /// Fail fast before connecting.
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend fault that fits no narrower variant.
    #[error("engine error: {0}")]
    Engine(String),
}

fn contingency_suffix(contingency: &Option<String>) -> String {
    match contingency {
        Some(name) => format!(" (contingency '{name}')"),
        None => String::new(),
    }
}

/// Convenience type alias for Results using NcaError.
pub type NcaResult<T> = Result<T, NcaError>;

impl NcaError {
    /// Whether this failure is scoped to a single element or contingency and
    /// the sweep may continue past it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NcaError::ElementNotFound(_)
                | NcaError::LoadFlowDivergence { .. }
                | NcaError::ContingencyApply { .. }
        )
    }
}

impl From<anyhow::Error> for NcaError {
    fn from(err: anyhow::Error) -> Self {
        NcaError::Engine(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NcaError::ContingencyApply {
            element: ElementId::new("Line A"),
            reason: "another contingency is active".into(),
        };
        assert!(err.to_string().contains("Line A"));
        assert!(err.to_string().contains("another contingency is active"));
    }

    #[test]
    fn test_divergence_display_with_and_without_contingency() {
        let base = NcaError::LoadFlowDivergence { contingency: None };
        assert_eq!(base.to_string(), "load flow did not converge");
        let cont = NcaError::LoadFlowDivergence {
            contingency: Some("Line A".into()),
        };
        assert!(cont.to_string().contains("Line A"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(NcaError::ElementNotFound(ElementId::new("x")).is_recoverable());
        assert!(NcaError::LoadFlowDivergence { contingency: None }.is_recoverable());
        assert!(!NcaError::Connection("refused".into()).is_recoverable());
        assert!(!NcaError::ContingencyRestore {
            element: ElementId::new("x"),
            reason: "write rejected".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> NcaResult<()> {
            Err(NcaError::Config("missing thermal limits".into()))
        }

        fn outer() -> NcaResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
