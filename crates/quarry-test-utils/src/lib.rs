//! Test utilities and mock types for Quarry development.
//!
//! Provides [`MockContext`], an in-memory [`FieldContext`] with
//! configurable raw fields, parameters, properties and geometry, plus
//! dataset fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    base_dataset, base_fields, fake_random_dataset, get_params, legacy_base_dataset, FakeDataset,
};

use std::sync::Arc;

use indexmap::IndexMap;
use quarry_core::{
    EvaluationStack, FieldContext, FieldError, FieldKey, FieldValue, Parameter, ParameterMap,
    Shape, SpatialInfo,
};
use quarry_units::{CodeUnits, UnitRegistry};

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Hook used by [`MockContext`] for keys it has no raw data for.
///
/// Returns `None` when the hook does not know the key.
pub type Evaluator = Arc<
    dyn Fn(&FieldKey, &mut dyn FieldContext) -> Option<Result<FieldValue, FieldError>>
        + Send
        + Sync,
>;

/// Mock implementation of [`FieldContext`].
///
/// Raw fields are served as stored. Any other key goes to the evaluator
/// hook (typically a closure calling `quarry_fields::evaluate`), and its
/// results are cached. Every request is recorded in
/// [`requests`](MockContext::requests).
pub struct MockContext {
    shape: Shape,
    raw: IndexMap<FieldKey, FieldValue>,
    cache: IndexMap<FieldKey, FieldValue>,
    parameters: ParameterMap,
    properties: ParameterMap,
    dataset_parameters: ParameterMap,
    conversions: IndexMap<String, f64>,
    spatial: Option<SpatialInfo>,
    units: UnitRegistry,
    evaluator: Option<Evaluator>,
    stack: EvaluationStack,
    requests: Vec<FieldKey>,
}

impl MockContext {
    /// A non-spatial context whose scalar fields have `shape`.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.iter().copied().collect(),
            raw: IndexMap::new(),
            cache: IndexMap::new(),
            parameters: ParameterMap::new(),
            properties: ParameterMap::new(),
            dataset_parameters: ParameterMap::new(),
            conversions: IndexMap::new(),
            spatial: None,
            units: UnitRegistry::default().with_code_units(CodeUnits::default()),
            evaluator: None,
            stack: EvaluationStack::new(),
            requests: Vec::new(),
        }
    }

    /// Add a raw field.
    pub fn with_raw(mut self, key: impl Into<FieldKey>, value: FieldValue) -> Self {
        self.raw.insert(key.into(), value);
        self
    }

    /// Set a runtime parameter.
    pub fn with_parameter(mut self, name: &str, value: impl Into<Parameter>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    /// Set a container property.
    pub fn with_property(mut self, name: &str, value: impl Into<Parameter>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Set a dataset parameter.
    pub fn with_dataset_parameter(mut self, name: &str, value: impl Into<Parameter>) -> Self {
        self.dataset_parameters.insert(name.to_string(), value.into());
        self
    }

    /// Set a legacy conversion factor.
    pub fn with_conversion(mut self, name: &str, factor: f64) -> Self {
        self.conversions.insert(name.to_string(), factor);
        self
    }

    /// Make the context a 3-D stencil region.
    pub fn with_spatial(mut self, info: SpatialInfo) -> Self {
        self.spatial = Some(info);
        self
    }

    /// Replace the unit registry.
    pub fn with_units(mut self, units: UnitRegistry) -> Self {
        self.units = units;
        self
    }

    /// Install the hook for non-raw keys.
    pub fn with_evaluator<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldKey, &mut dyn FieldContext) -> Option<Result<FieldValue, FieldError>>
            + Send
            + Sync
            + 'static,
    {
        self.evaluator = Some(Arc::new(f));
        self
    }

    /// Set a runtime parameter in place.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Parameter>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    /// Every key requested through [`FieldContext::get`], in order.
    pub fn requests(&self) -> &[FieldKey] {
        &self.requests
    }

    fn raw_field(&self, key: &FieldKey) -> Option<&FieldValue> {
        if key.is_bare() {
            self.raw
                .iter()
                .find(|(k, _)| k.name() == key.name())
                .map(|(_, v)| v)
        } else {
            self.raw.get(key)
        }
    }
}

impl FieldContext for MockContext {
    fn get(&mut self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        self.requests.push(key.clone());
        if let Some(value) = self.cache.get(key) {
            return Ok(value.clone());
        }
        if let Some(value) = self.raw_field(key) {
            return Ok(value.clone());
        }
        if let Some(evaluator) = self.evaluator.clone() {
            if let Some(result) = evaluator(key, self) {
                let value = result?;
                self.cache.insert(key.clone(), value.clone());
                return Ok(value);
            }
        }
        Err(FieldError::FieldNotFound { key: key.clone() })
    }

    fn parameter(&self, name: &str) -> Option<Parameter> {
        self.parameters.get(name).cloned()
    }

    fn property(&self, name: &str) -> Option<Parameter> {
        self.properties.get(name).cloned()
    }

    fn has_raw_field(&self, key: &FieldKey) -> bool {
        self.raw_field(key).is_some()
    }

    fn field_list(&self) -> Vec<FieldKey> {
        self.raw.keys().cloned().collect()
    }

    fn spatial(&self) -> Option<SpatialInfo> {
        self.spatial
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn dataset_parameter(&self, name: &str) -> Option<Parameter> {
        self.dataset_parameters.get(name).cloned()
    }

    fn convert(&self, name: &str) -> f64 {
        self.conversions.get(name).copied().unwrap_or(1.0)
    }

    fn unit_registry(&self) -> &UnitRegistry {
        &self.units
    }

    fn cached_keys(&self) -> Vec<FieldKey> {
        self.cache.keys().cloned().collect()
    }

    fn evict(&mut self, key: &FieldKey) {
        self.cache.shift_remove(key);
    }

    fn stack(&mut self) -> &mut EvaluationStack {
        &mut self.stack
    }
}
