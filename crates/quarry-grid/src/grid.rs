//! A single grid patch: the spatial evaluation context.

use indexmap::IndexMap;
use ndarray::Slice;
use quarry_core::{
    EvaluationStack, FieldContext, FieldError, FieldKey, FieldValue, Parameter, ParameterMap,
    Shape, SpatialInfo, ValidationFailure,
};
use quarry_fields::evaluate;
use quarry_units::UnitRegistry;
use tracing::warn;

use crate::dataset::Dataset;
use crate::region::Region;

/// One patch of a [`Dataset`], optionally padded by ghost zones.
///
/// Raw cell fields are sliced from the dataset with the padding filled
/// per [`EdgeBehavior`](crate::EdgeBehavior); raw particle fields hold the
/// particles whose cell lies inside the patch. Derived fields are
/// evaluated through the dataset's registry and cached until
/// [`clear_data`](Self::clear_data).
pub struct Grid<'a> {
    ds: &'a Dataset,
    id: usize,
    region: Region,
    ghost_zones: usize,
    cache: IndexMap<FieldKey, FieldValue>,
    parameters: ParameterMap,
    stack: EvaluationStack,
}

impl<'a> Grid<'a> {
    pub(crate) fn new(ds: &'a Dataset, id: usize, region: Region, ghost_zones: usize) -> Self {
        Self {
            ds,
            id,
            region,
            ghost_zones,
            cache: IndexMap::new(),
            parameters: ds.default_parameters().clone(),
            stack: EvaluationStack::new(),
        }
    }

    /// This patch padded by `ghost_zones` on every side, with the same
    /// parameters and an empty cache.
    pub fn with_ghost_zones(&self, ghost_zones: usize) -> Grid<'a> {
        let mut padded = Grid::new(self.ds, self.id, self.region, ghost_zones);
        padded.parameters = self.parameters.clone();
        padded
    }

    /// Patch id within the dataset.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Interior cells of this patch in domain index space.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Ghost zones on each side.
    pub fn ghost_zones(&self) -> usize {
        self.ghost_zones
    }

    /// Drop every cached field.
    pub fn clear_data(&mut self) {
        self.cache.clear();
    }

    /// Set a runtime parameter.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Parameter>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    /// Set several runtime parameters.
    pub fn update_parameters<I, S, P>(&mut self, parameters: I)
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<Parameter>,
    {
        for (name, value) in parameters {
            self.parameters.insert(name.into(), value.into());
        }
    }

    fn interior_left_edge(&self) -> [f64; 3] {
        let widths = self.ds.config().cell_widths();
        let left = self.ds.config().domain_left_edge;
        [0, 1, 2].map(|a| left[a] + self.region.start[a] as f64 * widths[a])
    }

    fn evaluate_with_retry(&mut self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        let ds = self.ds;
        match evaluate(ds.registry(), key, self) {
            Err(FieldError::Validation {
                failure: ValidationFailure::InsufficientGhostZones { required, .. },
                ..
            }) if ds.config().auto_ghost_zones && self.ghost_zones == 0 && required > 0 => {
                warn!(
                    field = %key,
                    grid = self.id,
                    ghost_zones = required,
                    "field needs ghost zones; retrying on a padded patch"
                );
                let mut padded = self.with_ghost_zones(required);
                let value = padded.get(key)?;
                let extent = self.region.dims().map(|n| n + 2 * required);
                Ok(crop(&value, required, extent))
            }
            other => other,
        }
    }
}

/// Strip `g` cells from both ends of the last three axes.
///
/// Only values laid out on the padded cell grid are cropped: each trailing
/// axis must match `extent`. Particle fields and other non-cell results
/// pass through untouched.
fn crop(value: &FieldValue, g: usize, extent: [usize; 3]) -> FieldValue {
    let ndim = value.ndim();
    if ndim < 3 || value.shape()[ndim - 3..] != extent {
        return value.clone();
    }
    let data = value.data().slice_each_axis(|axis| {
        if axis.axis.index() + 3 >= ndim {
            Slice::from(g..axis.len - g)
        } else {
            Slice::from(..)
        }
    });
    FieldValue::new(data.to_owned(), value.units().clone())
}

impl FieldContext for Grid<'_> {
    fn get(&mut self, key: &FieldKey) -> Result<FieldValue, FieldError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value.clone());
        }
        if let Some(raw) = self.ds.raw_value(key, &self.region, self.ghost_zones) {
            return raw;
        }
        let value = self.evaluate_with_retry(key)?;
        self.cache.insert(key.clone(), value.clone());
        Ok(value)
    }

    fn parameter(&self, name: &str) -> Option<Parameter> {
        self.parameters.get(name).cloned()
    }

    fn property(&self, name: &str) -> Option<Parameter> {
        let left = self.interior_left_edge();
        let widths = self.ds.config().cell_widths();
        let dims = self.region.dims();
        match name {
            "left_edge" => Some(Parameter::Vector(left)),
            "right_edge" => Some(Parameter::Vector(
                [0, 1, 2].map(|a| left[a] + dims[a] as f64 * widths[a]),
            )),
            "dds" => Some(Parameter::Vector(widths)),
            "level" => Some(Parameter::Integer(0)),
            "ActiveDimensions" => Some(Parameter::Vector(dims.map(|n| n as f64))),
            "id" => Some(Parameter::Integer(self.id as i64)),
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
        let g = self.ghost_zones;
        let widths = self.ds.config().cell_widths();
        let left = self.interior_left_edge();
        Some(SpatialInfo {
            ghost_zones: g,
            dimensions: self.region.dims().map(|n| n + 2 * g),
            left_edge: [0, 1, 2].map(|a| left[a] - g as f64 * widths[a]),
            cell_widths: widths,
            level: 0,
        })
    }

    fn shape(&self) -> Shape {
        let g = self.ghost_zones;
        self.region.dims().iter().map(|n| n + 2 * g).collect()
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

impl std::fmt::Debug for Grid<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("id", &self.id)
            .field("region", &self.region)
            .field("ghost_zones", &self.ghost_zones)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;
    use crate::edge::EdgeBehavior;
    use ndarray::{array, Array3};
    use quarry_fields::{FieldOptions, FieldRegistry, Validator};

    fn ramp(n: usize) -> Array3<f64> {
        Array3::from_shape_fn((n, n, n), |(i, j, k)| (100 * i + 10 * j + k) as f64)
    }

    fn dataset(edge: EdgeBehavior) -> Dataset {
        let config = DatasetConfig {
            edge_behavior: edge,
            ..DatasetConfig::cube(4, 1)
        };
        let mut ds = Dataset::new(config, FieldRegistry::new()).unwrap();
        ds.add_cell_field("density", ramp(4), "g/cm**3").unwrap();
        ds
    }

    #[test]
    fn ghost_cells_clamp_at_the_boundary() {
        let ds = dataset(EdgeBehavior::Clamp);
        let mut grid = ds.grid(0).unwrap().with_ghost_zones(1);
        let rho = grid.field("gas", "density").unwrap();
        assert_eq!(rho.shape(), &[6, 6, 6]);
        assert_eq!(rho.data()[[0, 0, 0]], 0.0);
        assert_eq!(rho.data()[[1, 1, 1]], 0.0);
        assert_eq!(rho.data()[[5, 1, 1]], 300.0);
    }

    #[test]
    fn ghost_cells_wrap_when_periodic() {
        let ds = dataset(EdgeBehavior::Wrap);
        let mut grid = ds.grid(0).unwrap().with_ghost_zones(1);
        let rho = grid.field("gas", "density").unwrap();
        assert_eq!(rho.data()[[0, 1, 1]], 300.0);
        assert_eq!(rho.data()[[5, 1, 1]], 0.0);
    }

    #[test]
    fn properties_describe_the_patch() {
        let ds = Dataset::new(DatasetConfig::cube(4, 2), FieldRegistry::new()).unwrap();
        let grid = ds.grid(1).unwrap();
        assert_eq!(grid.property("left_edge"), Some(Parameter::Vector([0.5, 0.0, 0.0])));
        assert_eq!(grid.property("right_edge"), Some(Parameter::Vector([1.0; 3])));
        assert_eq!(grid.property("dds"), Some(Parameter::Vector([0.25; 3])));
        assert_eq!(grid.property("id"), Some(Parameter::Integer(1)));
        assert!(grid.property("nope").is_none());
        assert_eq!(grid.shape().as_slice(), &[2, 4, 4]);
    }

    #[test]
    fn spatial_info_includes_padding() {
        let ds = dataset(EdgeBehavior::Clamp);
        let grid = ds.grid(0).unwrap().with_ghost_zones(2);
        let info = grid.spatial().unwrap();
        assert_eq!(info.dimensions, [8; 3]);
        assert_eq!(info.interior_dimensions(), [4; 3]);
        assert_eq!(info.left_edge, [-0.5; 3]);
    }

    #[test]
    fn stencil_fields_are_retried_and_cropped() {
        let mut ds = dataset(EdgeBehavior::Clamp);
        ds.add_field(
            ("gas", "padded_density"),
            |_: &quarry_fields::DerivedField, ctx: &mut dyn FieldContext| {
                ctx.field("gas", "density")
            },
            FieldOptions::new()
                .units("g/cm**3")
                .validator(Validator::spatial(1)),
        );
        let mut grid = ds.grid(0).unwrap();
        let value = grid.field("gas", "padded_density").unwrap();
        assert_eq!(value.shape(), &[4, 4, 4]);
        assert_eq!(value.data(), grid.field("gas", "density").unwrap().data());
    }

    #[test]
    fn retried_particle_fields_keep_every_particle() {
        let mut ds = dataset(EdgeBehavior::Clamp);
        for (axis, xs) in [
            ("particle_position_x", array![0.1, 0.4, 0.6, 0.9]),
            ("particle_position_y", array![0.5, 0.5, 0.5, 0.5]),
            ("particle_position_z", array![0.5, 0.5, 0.5, 0.5]),
        ] {
            ds.add_particle_field(axis, xs, "code_length").unwrap();
        }
        ds.add_particle_field("particle_mass", array![1.0, 2.0, 3.0, 4.0], "g")
            .unwrap();
        ds.add_field(
            ("all", "stencil_mass"),
            |_: &quarry_fields::DerivedField, ctx: &mut dyn FieldContext| {
                ctx.field("all", "particle_mass")
            },
            FieldOptions::new()
                .units("g")
                .particle()
                .validator(Validator::spatial(1)),
        );
        let mut grid = ds.grid(0).unwrap();
        let value = grid.field("all", "stencil_mass").unwrap();
        assert_eq!(value.shape(), &[4]);
        assert_eq!(value.data(), grid.field("all", "particle_mass").unwrap().data());
    }

    #[test]
    fn crop_only_touches_padded_cell_axes() {
        let cells = FieldValue::ones(&[3, 6, 6, 6]);
        assert_eq!(crop(&cells, 1, [6; 3]).shape(), &[3, 4, 4, 4]);
        let other = FieldValue::ones(&[5, 5, 5]);
        assert_eq!(crop(&other, 1, [6; 3]).shape(), &[5, 5, 5]);
        let particles = FieldValue::ones(&[6]);
        assert_eq!(crop(&particles, 1, [6; 3]).shape(), &[6]);
    }

    #[test]
    fn retry_can_be_disabled() {
        let config = DatasetConfig {
            auto_ghost_zones: false,
            ..DatasetConfig::cube(4, 1)
        };
        let mut ds = Dataset::new(config, FieldRegistry::new()).unwrap();
        ds.add_field(
            ("gas", "stencil"),
            |_: &quarry_fields::DerivedField, ctx: &mut dyn FieldContext| {
                Ok(FieldValue::zeros(&ctx.shape()))
            },
            FieldOptions::new().validator(Validator::spatial(1)),
        );
        let mut grid = ds.grid(0).unwrap();
        let err = grid.field("gas", "stencil").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn clear_data_empties_the_cache() {
        let mut ds = dataset(EdgeBehavior::Clamp);
        ds.add_field(
            ("gas", "double_density"),
            |_: &quarry_fields::DerivedField, ctx: &mut dyn FieldContext| {
                Ok(ctx.field("gas", "density")? * 2.0)
            },
            FieldOptions::new().units("g/cm**3"),
        );
        let mut grid = ds.grid(0).unwrap();
        grid.field("gas", "double_density").unwrap();
        assert_eq!(grid.cached_keys(), vec![FieldKey::new("gas", "double_density")]);
        grid.clear_data();
        assert!(grid.cached_keys().is_empty());
    }

    #[test]
    fn parameters_are_inherited_and_updated() {
        let mut ds = dataset(EdgeBehavior::Clamp);
        ds.set_default_parameter("center", [0.5; 3]);
        let mut grid = ds.grid(0).unwrap();
        assert_eq!(grid.vector_parameter("center").unwrap(), [0.5; 3]);
        grid.update_parameters([("center", [0.25; 3]), ("bulk_velocity", [0.0; 3])]);
        assert_eq!(grid.vector_parameter("center").unwrap(), [0.25; 3]);
        assert!(grid.has_parameter("bulk_velocity"));
    }
}
