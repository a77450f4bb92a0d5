//! The whole-domain union container.

use indexmap::IndexMap;
use quarry_core::{
    EvaluationStack, FieldContext, FieldError, FieldKey, FieldValue, Parameter, ParameterMap,
    Shape, SpatialInfo, ValidationFailure,
};
use quarry_fields::evaluate;
use quarry_units::UnitRegistry;
use tracing::debug;

use crate::dataset::Dataset;

/// Every grid of a [`Dataset`] as one flat, non-spatial container.
///
/// Raw fields are the per-grid values flattened and concatenated in grid
/// order. Fields that need a stencil region are computed grid by grid
/// and concatenated the same way, so both paths agree cell for cell.
pub struct AllData<'a> {
    ds: &'a Dataset,
    cache: IndexMap<FieldKey, FieldValue>,
    parameters: ParameterMap,
    stack: EvaluationStack,
}

impl<'a> AllData<'a> {
    pub(crate) fn new(ds: &'a Dataset) -> Self {
        Self {
            ds,
            cache: IndexMap::new(),
            parameters: ds.default_parameters().clone(),
            stack: EvaluationStack::new(),
        }
    }

    /// Drop every cached field.
    pub fn clear_data(&mut self) {
        self.cache.clear();
    }

    /// Set a runtime parameter; grids built for fallback evaluation see it.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Parameter>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    fn raw_union(&self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        let mut parts = Vec::with_capacity(self.ds.regions().len());
        for region in self.ds.regions() {
            if let Some(raw) = self.ds.raw_value(key, region, 0) {
                parts.push(raw?.flatten());
            }
        }
        FieldValue::concatenate(&parts, false)
    }

    fn per_grid(&self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        let vector = self.ds.registry().resolve(key)?.is_vector();
        let mut parts = Vec::with_capacity(self.ds.regions().len());
        for mut grid in self.ds.grids() {
            grid.update_parameters(self.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
            let value = grid.get(key)?;
            parts.push(if vector { value } else { value.flatten() });
        }
        FieldValue::concatenate(&parts, vector)
    }
}

impl FieldContext for AllData<'_> {
    fn get(&mut self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value.clone());
        }
        if self.ds.has_raw_field(key) {
            return self.raw_union(key);
        }
        let ds = self.ds;
        let value = match evaluate(ds.registry(), key, self) {
            Err(FieldError::Validation {
                failure:
                    ValidationFailure::MissingSpatialContext { .. }
                    | ValidationFailure::InsufficientGhostZones { .. },
                ..
            }) => {
                debug!(field = %key, grids = ds.regions().len(), "evaluating grid by grid");
                self.per_grid(key)?
            }
            other => other?,
        };
        self.cache.insert(key.clone(), value.clone());
        Ok(value)
    }

    fn parameter(&self, name: &str) -> Option<Parameter> {
        self.parameters.get(name).cloned()
    }

    fn property(&self, name: &str) -> Option<Parameter> {
        let config = self.ds.config();
        match name {
            "left_edge" => Some(Parameter::Vector(config.domain_left_edge)),
            "right_edge" => Some(Parameter::Vector(config.domain_right_edge)),
            _ => None,
        }
    }

    fn has_raw_field(&self, key: &FieldKey) -> bool {
        self.ds.has_raw_field(key)
    }

    fn field_list(&self) -> Vec<FieldKey> {
        self.ds.field_list()
    }

    fn spatial(&self) -> Option<SpatialInfo> {
        None
    }

    fn shape(&self) -> Shape {
        let cells: usize = self.ds.config().domain_dimensions.iter().product();
        std::iter::once(cells).collect()
    }

    fn dataset_parameter(&self, name: &str) -> Option<Parameter> {
        self.ds.dataset_parameter(name)
    }

    fn convert(&self, name: &str) -> f64 {
        self.ds.conversion(name)
    }

    fn unit_registry(&self) -> &UnitRegistry {
        self.ds.unit_registry()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use ndarray::{array, Array3};
    use quarry_fields::{DerivedField, FieldOptions, FieldRegistry, Validator};

    fn dataset(nprocs: usize) -> Dataset {
        let mut ds = Dataset::new(DatasetConfig::cube(4, nprocs), FieldRegistry::new()).unwrap();
        let ramp = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| (16 * i + 4 * j + k) as f64);
        ds.add_cell_field("density", ramp, "g/cm**3").unwrap();
        ds
    }

    #[test]
    fn raw_fields_are_flattened() {
        let ds = dataset(1);
        let mut all = ds.all_data();
        let rho = all.field("gas", "density").unwrap();
        assert_eq!(rho.shape(), &[64]);
        assert_eq!(rho.sum(), (0..64).sum::<usize>() as f64);
        assert!(all.spatial().is_none());
    }

    #[test]
    fn stencil_fields_fall_back_to_grids() {
        let mut ds = dataset(2);
        ds.add_field(
            ("gas", "stencil_density"),
            |_: &DerivedField, ctx: &mut dyn FieldContext| ctx.field("gas", "density"),
            FieldOptions::new()
                .units("g/cm**3")
                .validator(Validator::spatial(0)),
        );
        let mut all = ds.all_data();
        let stencil = all.field("gas", "stencil_density").unwrap();
        let raw = all.field("gas", "density").unwrap();
        assert_eq!(stencil.data(), raw.data());
    }

    #[test]
    fn particles_are_gathered_per_grid() {
        let mut ds = dataset(2);
        ds.add_particle_field("particle_position_x", array![0.1, 0.9, 0.6], "code_length")
            .unwrap();
        ds.add_particle_field("particle_position_y", array![0.5, 0.5, 0.5], "code_length")
            .unwrap();
        ds.add_particle_field("particle_position_z", array![0.5, 0.5, 0.5], "code_length")
            .unwrap();
        ds.add_particle_field("particle_mass", array![1.0, 2.0, 3.0], "g")
            .unwrap();
        let mut first = ds.grid(0).unwrap();
        assert_eq!(first.field("all", "particle_mass").unwrap().sum(), 1.0);
        let mut all = ds.all_data();
        let mass = all.field("all", "particle_mass").unwrap();
        assert_eq!(mass.data().as_slice().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn missing_positions_are_reported() {
        let mut ds = dataset(1);
        ds.add_particle_field("particle_mass", array![1.0], "g").unwrap();
        let mut all = ds.all_data();
        assert!(matches!(
            all.field("all", "particle_mass"),
            Err(FieldError::FieldNotFound { .. })
        ));
    }
}
