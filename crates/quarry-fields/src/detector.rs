//! Dependency detection by running compute routines on filler data.
//!
//! [`FieldDetector`] is a synthetic [`FieldContext`]: every field request
//! returns an array of ones. Requests for registered fields are expanded
//! by running their compute routine against the detector; everything else
//! is recorded as a leaf. The leaves are the raw fields an I/O layer has
//! to fetch.

use std::collections::BTreeSet;

use quarry_core::{
    EvaluationStack, FieldContext, FieldError, FieldKey, FieldValue, Parameter, Shape, SpatialInfo,
};
use quarry_units::{CodeUnits, UnitRegistry};
use tracing::trace;

use crate::registry::FieldRegistry;
use crate::spec::DerivedField;

/// A synthetic context that records which raw fields a field reads.
///
/// Detection only uses non-caching registry lookups, so the registry is
/// left exactly as it was.
pub struct FieldDetector<'r> {
    registry: &'r FieldRegistry,
    shape: Shape,
    units: UnitRegistry,
    visiting: BTreeSet<FieldKey>,
    leaves: BTreeSet<FieldKey>,
    stack: EvaluationStack,
}

impl<'r> FieldDetector<'r> {
    /// A detector using the registry's configured filler shape.
    pub fn new(registry: &'r FieldRegistry) -> Self {
        Self {
            registry,
            shape: registry.config().detector_shape.iter().copied().collect(),
            units: UnitRegistry::default().with_code_units(CodeUnits::default()),
            visiting: BTreeSet::new(),
            leaves: BTreeSet::new(),
            stack: EvaluationStack::new(),
        }
    }

    /// Run `field` once and return the leaf keys it touched.
    pub fn detect(mut self, field: &DerivedField) -> Result<BTreeSet<FieldKey>, FieldError> {
        self.visiting.insert(field.key().clone());
        field.compute(&mut self)?;
        Ok(self.leaves)
    }

    fn filler(&self, vector: bool) -> FieldValue {
        if vector {
            let mut shape = Shape::new();
            shape.push(3);
            shape.extend_from_slice(&self.shape);
            FieldValue::ones(&shape)
        } else {
            FieldValue::ones(&self.shape)
        }
    }
}

impl FieldContext for FieldDetector<'_> {
    fn get(&mut self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        let canonical = self
            .registry
            .canonical_key(key)
            .unwrap_or_else(|| key.clone());
        match self.registry.peek(&canonical) {
            Some(field) if !self.visiting.contains(&canonical) => {
                self.visiting.insert(canonical.clone());
                let result = field.compute(self);
                self.visiting.remove(&canonical);
                result?;
                Ok(self.filler(field.is_vector()))
            }
            _ => {
                trace!(leaf = %canonical, "dependency leaf");
                self.leaves.insert(canonical);
                Ok(self.filler(false))
            }
        }
    }

    fn parameter(&self, _name: &str) -> Option<Parameter> {
        Some(Parameter::Scalar(1.0))
    }

    fn property(&self, _name: &str) -> Option<Parameter> {
        Some(Parameter::Scalar(1.0))
    }

    fn has_raw_field(&self, _key: &FieldKey) -> bool {
        true
    }

    fn field_list(&self) -> Vec<FieldKey> {
        self.leaves.iter().cloned().collect()
    }

    fn spatial(&self) -> Option<SpatialInfo> {
        let dim = |i: usize| self.shape.get(i).copied().unwrap_or(1);
        Some(SpatialInfo {
            ghost_zones: 0,
            dimensions: [dim(0), dim(1), dim(2)],
            left_edge: [0.0; 3],
            cell_widths: [1.0; 3],
            level: 0,
        })
    }

    fn shape(&self) -> Shape {
        self.shape.clone()
    }

    fn dataset_parameter(&self, _name: &str) -> Option<Parameter> {
        Some(Parameter::Scalar(1.0))
    }

    fn convert(&self, _name: &str) -> f64 {
        1.0
    }

    fn unit_registry(&self) -> &UnitRegistry {
        &self.units
    }

    fn cached_keys(&self) -> Vec<FieldKey> {
        Vec::new()
    }

    fn evict(&mut self, _key: &FieldKey) {}

    fn stack(&mut self) -> &mut EvaluationStack {
        &mut self.stack
    }
}
