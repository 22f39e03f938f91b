//! Network element registry mirrored from the external simulation engine.
//!
//! The model is a read-mostly cache: it is populated once per analysis run via
//! pattern queries against the engine and afterwards mutated only through the
//! contingency engine and scenario manager, which keep the in-service flags in
//! sync with the engine-side state. Analyzers read from it, never write.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::engine::SimulationEngine;
use crate::error::NcaResult;
use crate::matcher::NamePattern;

/// Stable identifier of an engine-side element. Engine object names are the
/// natural key; the newtype keeps them from mixing with display names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Closed set of element classes the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Line,
    Transformer2W,
    Transformer3W,
    Coupler,
    Reactor,
    Busbar,
    Load,
    StaticGenerator,
    PvSystem,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Line => "line",
            ElementKind::Transformer2W => "transformer_2w",
            ElementKind::Transformer3W => "transformer_3w",
            ElementKind::Coupler => "coupler",
            ElementKind::Reactor => "reactor",
            ElementKind::Busbar => "busbar",
            ElementKind::Load => "load",
            ElementKind::StaticGenerator => "static_generator",
            ElementKind::PvSystem => "pv_system",
        }
    }

    /// Subject to thermal loading analysis and N-1 outages.
    pub fn is_thermal(&self) -> bool {
        matches!(
            self,
            ElementKind::Line
                | ElementKind::Transformer2W
                | ElementKind::Transformer3W
                | ElementKind::Coupler
                | ElementKind::Reactor
        )
    }

    /// Subject to voltage band analysis.
    pub fn is_voltage(&self) -> bool {
        matches!(self, ElementKind::Busbar)
    }

    /// Has a scalable active-power setpoint (generation/storage).
    pub fn is_controllable(&self) -> bool {
        matches!(self, ElementKind::StaticGenerator | ElementKind::PvSystem)
    }
}

/// A network element mirrored from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkElement {
    pub id: ElementId,
    pub name: String,
    pub kind: ElementKind,
    /// Nominal voltage level in kV.
    pub voltage_kv: f64,
    /// Region tag used for voltage band selection and reporting.
    pub region: String,
    pub in_service: bool,
    /// Type-specific rated limit (MVA for branches), when the engine exposes one.
    pub rating: Option<f64>,
}

impl NetworkElement {
    pub fn new(
        id: impl Into<String>,
        kind: ElementKind,
        voltage_kv: f64,
        region: impl Into<String>,
    ) -> Self {
        let id = ElementId::new(id);
        Self {
            name: id.as_str().to_string(),
            id,
            kind,
            voltage_kv,
            region: region.into(),
            in_service: true,
            rating: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }
}

/// Which element classes to mirror from the engine and which names to keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFilter {
    pub kinds: Vec<ElementKind>,
    /// Wildcard pattern matched against element names; `*` keeps everything.
    #[serde(default = "default_pattern")]
    pub name_pattern: String,
}

fn default_pattern() -> String {
    "*".to_string()
}

impl Default for ModelFilter {
    fn default() -> Self {
        Self {
            kinds: vec![
                ElementKind::Line,
                ElementKind::Transformer2W,
                ElementKind::Transformer3W,
                ElementKind::Coupler,
                ElementKind::Reactor,
                ElementKind::Busbar,
                ElementKind::Load,
                ElementKind::StaticGenerator,
                ElementKind::PvSystem,
            ],
            name_pattern: default_pattern(),
        }
    }
}

/// In-memory registry of network elements, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct NetworkModel {
    elements: Vec<NetworkElement>,
    index: HashMap<ElementId, usize>,
}

impl NetworkModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from a list of elements. Later duplicates replace
    /// earlier ones, mirroring the engine's own last-definition-wins rule.
    pub fn from_elements(elements: impl IntoIterator<Item = NetworkElement>) -> Self {
        let mut model = Self::new();
        for element in elements {
            model.insert(element);
        }
        model
    }

    /// Mirror elements from the engine according to the filter.
    pub fn load_from_engine(
        engine: &dyn SimulationEngine,
        filter: &ModelFilter,
    ) -> NcaResult<Self> {
        let pattern = NamePattern::compile(&filter.name_pattern);
        let mut model = Self::new();
        for &kind in &filter.kinds {
            for element in engine.elements_by_pattern(kind, &pattern)? {
                model.insert(element);
            }
        }
        Ok(model)
    }

    pub fn insert(&mut self, element: NetworkElement) {
        match self.index.get(&element.id) {
            Some(&pos) => self.elements[pos] = element,
            None => {
                self.index.insert(element.id.clone(), self.elements.len());
                self.elements.push(element);
            }
        }
    }

    pub fn get(&self, id: &ElementId) -> Option<&NetworkElement> {
        self.index.get(id).map(|&pos| &self.elements[pos])
    }

    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut NetworkElement> {
        self.index.get(id).map(|&pos| &mut self.elements[pos])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = &NetworkElement> {
        self.elements.iter()
    }

    pub fn thermal_elements(&self) -> impl Iterator<Item = &NetworkElement> {
        self.elements.iter().filter(|e| e.kind.is_thermal())
    }

    pub fn voltage_elements(&self) -> impl Iterator<Item = &NetworkElement> {
        self.elements.iter().filter(|e| e.kind.is_voltage())
    }

    pub fn controllable_elements(&self) -> impl Iterator<Item = &NetworkElement> {
        self.elements.iter().filter(|e| e.kind.is_controllable())
    }

    /// In-service thermal elements, the default N-1 contingency targets.
    pub fn contingency_candidates(&self) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|e| e.kind.is_thermal() && e.in_service)
            .map(|e| e.id.clone())
            .collect()
    }
}
