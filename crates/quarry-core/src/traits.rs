//! The capability contract between fields and the data they read.

use quarry_units::{Unit, UnitRegistry};
use smallvec::SmallVec;

use crate::error::FieldError;
use crate::key::FieldKey;
use crate::parameter::Parameter;
use crate::stack::EvaluationStack;
use crate::value::FieldValue;

/// Geometry of a 3-D stencil-capable region.
///
/// Extents include ghost zones: `dimensions` counts every cell held by
/// the region and `left_edge` is the left face of the first ghost cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialInfo {
    /// Ghost cells on each side of each axis.
    pub ghost_zones: usize,
    /// Cells along each axis, ghost zones included.
    pub dimensions: [usize; 3],
    /// Left face of the first cell along each axis.
    pub left_edge: [f64; 3],
    /// Cell width along each axis.
    pub cell_widths: [f64; 3],
    /// Refinement level.
    pub level: u32,
}

impl SpatialInfo {
    /// Cells along each axis without ghost zones.
    pub fn interior_dimensions(&self) -> [usize; 3] {
        let g = 2 * self.ghost_zones;
        self.dimensions.map(|n| n.saturating_sub(g))
    }

    /// Center of cell `index` along `axis`.
    pub fn cell_center(&self, axis: usize, index: usize) -> f64 {
        self.left_edge[axis] + (index as f64 + 0.5) * self.cell_widths[axis]
    }
}

/// Shape of a scalar field array.
pub type Shape = SmallVec<[usize; 4]>;

/// An evaluation context: the data container fields are computed against.
///
/// Grid patches, particle sets, whole-domain unions and the dependency
/// detector all implement this trait. Compute routines receive
/// `&mut dyn FieldContext` and read other fields through [`get`](Self::get),
/// which runs the evaluation pipeline for derived fields and caches the
/// result.
pub trait FieldContext {
    /// Return the value of `key`, evaluating and caching it if needed.
    fn get(&mut self, key: &FieldKey) -> Result<FieldValue, FieldError>;

    /// A runtime parameter.
    fn parameter(&self, name: &str) -> Option<Parameter>;

    /// Whether a runtime parameter is set.
    fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// A named property of the container (`left_edge`, `dds`, `level`, ...).
    fn property(&self, name: &str) -> Option<Parameter>;

    /// Whether the container has a property.
    fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Whether `key` is a raw (on-disk) field of this container.
    fn has_raw_field(&self, key: &FieldKey) -> bool;

    /// Every raw field available to this container.
    fn field_list(&self) -> Vec<FieldKey>;

    /// Geometry, if this is a 3-D stencil region.
    fn spatial(&self) -> Option<SpatialInfo>;

    /// Shape of a scalar cell field on this context.
    fn shape(&self) -> Shape;

    /// A parameter of the whole dataset (`Gamma`, `mu`, ...).
    fn dataset_parameter(&self, name: &str) -> Option<Parameter>;

    /// Legacy multiplicative conversion factor for a named quantity.
    fn convert(&self, name: &str) -> f64;

    /// Units known to this dataset, code units included.
    fn unit_registry(&self) -> &UnitRegistry;

    /// Keys currently held in the context's cache.
    fn cached_keys(&self) -> Vec<FieldKey>;

    /// Drop a cached value.
    fn evict(&mut self, key: &FieldKey);

    /// The chain of fields being evaluated on this context.
    fn stack(&mut self) -> &mut EvaluationStack;

    // ── Convenience accessors ──────────────────────────────────

    /// Shorthand for `get(&FieldKey::new(category, name))`.
    fn field(&mut self, category: &str, name: &str) -> Result<FieldValue, FieldError> {
        self.get(&FieldKey::new(category, name))
    }

    /// A parameter read as a scalar.
    fn scalar_parameter(&self, name: &str) -> Result<f64, FieldError> {
        let p = require(name, self.parameter(name))?;
        p.as_scalar().ok_or_else(|| wrong_kind(name, "scalar", &p))
    }

    /// A parameter read as an integer.
    fn integer_parameter(&self, name: &str) -> Result<i64, FieldError> {
        let p = require(name, self.parameter(name))?;
        p.as_integer().ok_or_else(|| wrong_kind(name, "integer", &p))
    }

    /// A parameter read as a 3-vector.
    fn vector_parameter(&self, name: &str) -> Result<[f64; 3], FieldError> {
        let p = require(name, self.parameter(name))?;
        p.as_vector().ok_or_else(|| wrong_kind(name, "vector", &p))
    }

    /// A dataset parameter read as a scalar.
    fn dataset_scalar(&self, name: &str) -> Result<f64, FieldError> {
        let p = require(name, self.dataset_parameter(name))?;
        p.as_scalar().ok_or_else(|| wrong_kind(name, "scalar", &p))
    }

    /// Parse a unit expression with this dataset's unit registry.
    fn unit(&self, expr: &str) -> Result<Unit, FieldError> {
        Ok(self.unit_registry().parse(expr)?)
    }
}

fn require(name: &str, value: Option<Parameter>) -> Result<Parameter, FieldError> {
    value.ok_or_else(|| FieldError::InvalidParameter {
        name: name.to_string(),
        reason: "not set".to_string(),
    })
}

fn wrong_kind(name: &str, expected: &str, found: &Parameter) -> FieldError {
    FieldError::InvalidParameter {
        name: name.to_string(),
        reason: format!("expected {expected}, found {}", found.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_excludes_ghost_zones() {
        let info = SpatialInfo {
            ghost_zones: 2,
            dimensions: [12, 12, 8],
            left_edge: [-0.25, -0.25, -0.25],
            cell_widths: [0.125; 3],
            level: 0,
        };
        assert_eq!(info.interior_dimensions(), [8, 8, 4]);
        assert_eq!(info.cell_center(0, 0), -0.1875);
        assert_eq!(info.cell_center(0, 2), 0.0625);
    }
}
