//! The in-memory dataset: raw data, geometry and the field registry.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use ndarray::{Array1, Array3, ArrayD, IxDyn};
use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue, Parameter, ParameterMap};
use quarry_fields::{DerivedField, FieldOptions, FieldRegistry, UnitMode, UnitsDecl};
use quarry_units::constants::{AU_CGS, MPC_CGS};
use quarry_units::{CodeUnits, Unit, UnitRegistry};
use tracing::debug;

use crate::config::DatasetConfig;
use crate::edge::EdgeBehavior;
use crate::error::DatasetError;
use crate::grid::Grid;
use crate::region::{partition, Region};
use crate::union::AllData;

/// Raw particle position fields, in code length.
const POSITION_FIELDS: [&str; 3] = [
    "particle_position_x",
    "particle_position_y",
    "particle_position_z",
];

struct RawField {
    data: ArrayD<f64>,
    unit: Unit,
}

/// A uniform-grid dataset held in memory.
///
/// Owns the raw cell and particle arrays, dataset parameters, the unit
/// registry (with this dataset's code units) and a [`FieldRegistry`].
/// The domain is split into [`Grid`] patches according to
/// [`DatasetConfig::nprocs`]; [`all_data`](Self::all_data) spans all of
/// them.
pub struct Dataset {
    config: DatasetConfig,
    registry: FieldRegistry,
    units: UnitRegistry,
    regions: Vec<Region>,
    cell_fields: IndexMap<FieldKey, RawField>,
    particle_fields: IndexMap<FieldKey, RawField>,
    dataset_parameters: ParameterMap,
    conversions: IndexMap<String, f64>,
    default_parameters: ParameterMap,
}

impl Dataset {
    /// Validate `config` and build an empty dataset around `registry`.
    pub fn new(config: DatasetConfig, registry: FieldRegistry) -> Result<Self, DatasetError> {
        config.validate()?;
        let regions = partition(config.domain_dimensions, config.nprocs)?;
        let units = UnitRegistry::default().with_code_units(config.code_units);
        let conversions = default_conversions(&config.code_units);
        Ok(Self {
            config,
            registry,
            units,
            regions,
            cell_fields: IndexMap::new(),
            particle_fields: IndexMap::new(),
            dataset_parameters: ParameterMap::new(),
            conversions,
            default_parameters: ParameterMap::new(),
        })
    }

    /// The dataset configuration.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// The field registry.
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Mutable access for setup-time registration and overrides.
    pub fn registry_mut(&mut self) -> &mut FieldRegistry {
        &mut self.registry
    }

    /// Units known to this dataset, code units included.
    pub fn unit_registry(&self) -> &UnitRegistry {
        &self.units
    }

    /// The patch regions, in grid-id order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    // ── Raw data ───────────────────────────────────────────────────

    /// Add a raw cell field covering the whole domain.
    ///
    /// Bare keys get the registry's default cell category.
    pub fn add_cell_field(
        &mut self,
        key: impl Into<FieldKey>,
        data: Array3<f64>,
        units: &str,
    ) -> Result<FieldKey, DatasetError> {
        let key = self.promote(key.into(), false);
        let expected = self.config.domain_dimensions.to_vec();
        if data.shape() != expected.as_slice() {
            return Err(DatasetError::ShapeMismatch {
                key,
                expected,
                actual: data.shape().to_vec(),
            });
        }
        let unit = self.parse_units(&key, units)?;
        debug!(field = %key, units, "added cell field");
        self.cell_fields.insert(
            key.clone(),
            RawField {
                data: data.into_dyn(),
                unit,
            },
        );
        Ok(key)
    }

    /// Add a raw particle field.
    ///
    /// Bare keys get the registry's default particle category. Every
    /// field of a category must have the same length, and the category
    /// needs `particle_position_{x,y,z}` fields (in `code_length`) before
    /// its particles can be assigned to grids.
    pub fn add_particle_field(
        &mut self,
        key: impl Into<FieldKey>,
        data: Array1<f64>,
        units: &str,
    ) -> Result<FieldKey, DatasetError> {
        let key = self.promote(key.into(), true);
        let sibling = self
            .particle_fields
            .iter()
            .find(|(k, _)| k.category() == key.category() && **k != key);
        if let Some((_, existing)) = sibling {
            if existing.data.len() != data.len() {
                return Err(DatasetError::ShapeMismatch {
                    key,
                    expected: vec![existing.data.len()],
                    actual: vec![data.len()],
                });
            }
        }
        let unit = self.parse_units(&key, units)?;
        debug!(field = %key, units, count = data.len(), "added particle field");
        self.particle_fields.insert(
            key.clone(),
            RawField {
                data: data.into_dyn(),
                unit,
            },
        );
        Ok(key)
    }

    fn promote(&self, key: FieldKey, particle: bool) -> FieldKey {
        if !key.is_bare() {
            return key;
        }
        let config = self.registry.config();
        let category = if particle {
            &config.default_particle_category
        } else {
            &config.default_cell_category
        };
        key.with_category(category.as_str())
    }

    fn parse_units(&self, key: &FieldKey, units: &str) -> Result<Unit, DatasetError> {
        self.units
            .parse(units)
            .map_err(|source| DatasetError::Units {
                key: key.clone(),
                source,
            })
    }

    /// Every raw field, cell fields first.
    pub fn field_list(&self) -> Vec<FieldKey> {
        self.cell_fields
            .keys()
            .chain(self.particle_fields.keys())
            .cloned()
            .collect()
    }

    /// Units of a raw field, or the declared units of a registered field.
    ///
    /// Registered fields without units are dimensionless, and `Auto`
    /// units resolve to the coherent CGS unit of their dimension.
    pub fn field_units(&self, key: &FieldKey) -> Result<Unit, FieldError> {
        let raw = find(&self.cell_fields, key).or_else(|| find(&self.particle_fields, key));
        if let Some((_, raw)) = raw {
            return Ok(raw.unit.clone());
        }
        let field = self
            .registry
            .peek(key)
            .ok_or_else(|| FieldError::FieldNotFound { key: key.clone() })?;
        let unit_parse = |units: &str, source| FieldError::UnitParse {
            key: field.key().clone(),
            units: units.to_string(),
            source,
        };
        match field.units() {
            UnitsDecl::None => Ok(Unit::dimensionless()),
            UnitsDecl::Explicit(units) => {
                self.units.parse(units).map_err(|e| unit_parse(units, e))
            }
            UnitsDecl::Auto { dimensions } => self
                .units
                .parse_dimensions(dimensions)
                .map(Unit::cgs)
                .map_err(|e| unit_parse(dimensions, e)),
        }
    }

    /// Whether `key` names a raw field. Bare keys match by name.
    pub fn has_raw_field(&self, key: &FieldKey) -> bool {
        find(&self.cell_fields, key).is_some() || find(&self.particle_fields, key).is_some()
    }

    // ── Parameters ─────────────────────────────────────────────────

    /// Set a dataset parameter (`Gamma`, `mu`, ...).
    pub fn set_dataset_parameter(&mut self, name: &str, value: impl Into<Parameter>) {
        self.dataset_parameters.insert(name.to_string(), value.into());
    }

    /// A dataset parameter.
    pub fn dataset_parameter(&self, name: &str) -> Option<Parameter> {
        self.dataset_parameters.get(name).cloned()
    }

    /// Set a legacy conversion factor.
    pub fn set_conversion(&mut self, name: &str, factor: f64) {
        self.conversions.insert(name.to_string(), factor);
    }

    /// A legacy conversion factor; 1.0 when unset.
    pub fn conversion(&self, name: &str) -> f64 {
        self.conversions.get(name).copied().unwrap_or(1.0)
    }

    /// Set a runtime parameter copied into every new container.
    pub fn set_default_parameter(&mut self, name: &str, value: impl Into<Parameter>) {
        self.default_parameters.insert(name.to_string(), value.into());
    }

    /// Runtime parameters copied into every new container.
    pub fn default_parameters(&self) -> &ParameterMap {
        &self.default_parameters
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Register a derived field on this dataset's registry.
    pub fn add_field<F>(
        &mut self,
        key: impl Into<FieldKey>,
        compute: F,
        options: FieldOptions,
    ) -> FieldKey
    where
        F: Fn(&DerivedField, &mut dyn FieldContext) -> Result<FieldValue, FieldError>
            + Send
            + Sync
            + 'static,
    {
        self.registry.add_field(key, compute, options)
    }

    /// Raw fields `key` ultimately reads.
    pub fn get_dependencies(&self, key: &FieldKey) -> Result<BTreeSet<FieldKey>, FieldError> {
        self.registry.get_dependencies(key)
    }

    /// Every registered derived field, sorted.
    pub fn derived_field_list(&self) -> Vec<FieldKey> {
        self.registry.derived_field_list()
    }

    // ── Containers ─────────────────────────────────────────────────

    /// One container per patch, without ghost zones.
    pub fn grids(&self) -> Vec<Grid<'_>> {
        (0..self.regions.len())
            .filter_map(|id| self.grid(id))
            .collect()
    }

    /// The patch with id `id`.
    pub fn grid(&self, id: usize) -> Option<Grid<'_>> {
        let region = *self.regions.get(id)?;
        Some(Grid::new(self, id, region, 0))
    }

    /// A container spanning the whole domain.
    pub fn all_data(&self) -> AllData<'_> {
        AllData::new(self)
    }

    // ── Raw access for containers ──────────────────────────────────

    /// Raw value of `key` on `region` padded by `ghost_zones`, or `None`
    /// if `key` is not a raw field.
    pub(crate) fn raw_value(
        &self,
        key: &FieldKey,
        region: &Region,
        ghost_zones: usize,
    ) -> Option<Result<FieldValue, FieldError>> {
        if let Some((_, raw)) = find(&self.cell_fields, key) {
            return Some(Ok(self.cell_slab(raw, region, ghost_zones)));
        }
        let (found, raw) = find(&self.particle_fields, key)?;
        Some(
            self.particles_in(found.category(), region)
                .map(|indices| {
                    let data = Array1::from_iter(indices.iter().map(|&i| raw.data[IxDyn(&[i])]));
                    self.tag(data.into_dyn(), &raw.unit)
                }),
        )
    }

    fn cell_slab(&self, raw: &RawField, region: &Region, g: usize) -> FieldValue {
        let dims = self.config.domain_dimensions;
        let edge: EdgeBehavior = self.config.edge_behavior;
        let interior = region.dims();
        let shape = [0, 1, 2].map(|a| interior[a] + 2 * g);
        let origin = [0, 1, 2].map(|a| region.start[a] as isize - g as isize);
        let data = Array3::from_shape_fn(shape, |(i, j, k)| {
            let index = [
                edge.resolve(origin[0] + i as isize, dims[0]),
                edge.resolve(origin[1] + j as isize, dims[1]),
                edge.resolve(origin[2] + k as isize, dims[2]),
            ];
            raw.data[IxDyn(&index)]
        });
        self.tag(data.into_dyn(), &raw.unit)
    }

    /// Indices of the particles of `category` whose cell lies in `region`.
    fn particles_in(&self, category: &str, region: &Region) -> Result<Vec<usize>, FieldError> {
        let code_length = self.units.parse("code_length")?;
        let dims = self.config.domain_dimensions;
        let widths = self.config.cell_widths();
        let mut axes = Vec::with_capacity(3);
        for name in POSITION_FIELDS {
            let key = FieldKey::new(category, name);
            let raw = self
                .particle_fields
                .get(&key)
                .ok_or(FieldError::FieldNotFound { key })?;
            axes.push((raw, raw.unit.conversion_factor(&code_length)?));
        }
        let count = axes.first().map_or(0, |(raw, _)| raw.data.len());
        let cell = |p: usize, a: usize| {
            let (raw, factor) = axes[a];
            let x = raw.data[IxDyn(&[p])] * factor;
            let offset = ((x - self.config.domain_left_edge[a]) / widths[a]).floor();
            EdgeBehavior::Clamp.resolve(offset as isize, dims[a])
        };
        Ok((0..count)
            .filter(|&p| region.contains([cell(p, 0), cell(p, 1), cell(p, 2)]))
            .collect())
    }

    fn tag(&self, data: ArrayD<f64>, unit: &Unit) -> FieldValue {
        match self.registry.config().unit_mode {
            UnitMode::Legacy => FieldValue::bare(data),
            UnitMode::UnitAware => FieldValue::tagged(data, unit.clone()),
        }
    }
}

/// Legacy conversion factors implied by the code units.
fn default_conversions(code: &CodeUnits) -> IndexMap<String, f64> {
    let length = code.length_cm;
    let velocity = code.velocity_cgs();
    [
        ("cm", length),
        ("pc", length / (MPC_CGS * 1e-6)),
        ("kpc", length / (MPC_CGS * 1e-3)),
        ("mpc", length / MPC_CGS),
        ("au", length / AU_CGS),
        ("Time", code.time_s),
        ("Density", code.density_cgs()),
        ("x-velocity", velocity),
        ("y-velocity", velocity),
        ("z-velocity", velocity),
    ]
    .into_iter()
    .map(|(name, factor)| (name.to_string(), factor))
    .collect()
}

fn find<'m>(
    fields: &'m IndexMap<FieldKey, RawField>,
    key: &FieldKey,
) -> Option<(&'m FieldKey, &'m RawField)> {
    if key.is_bare() {
        fields.iter().find(|(k, _)| k.name() == key.name())
    } else {
        fields.get_key_value(key)
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("config", &self.config)
            .field("grids", &self.regions.len())
            .field("cell_fields", &self.cell_fields.keys().collect::<Vec<_>>())
            .field("particle_fields", &self.particle_fields.keys().collect::<Vec<_>>())
            .field("derived_fields", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> Dataset {
        Dataset::new(DatasetConfig::cube(4, 2), FieldRegistry::new()).unwrap()
    }

    #[test]
    fn bare_keys_are_promoted() {
        let mut ds = small();
        let key = ds
            .add_cell_field("density", Array3::ones((4, 4, 4)), "g/cm**3")
            .unwrap();
        assert_eq!(key, FieldKey::new("gas", "density"));
        let key = ds
            .add_particle_field("particle_mass", array![1.0, 2.0], "g")
            .unwrap();
        assert_eq!(key, FieldKey::new("all", "particle_mass"));
        assert!(ds.has_raw_field(&FieldKey::bare("density")));
        assert_eq!(ds.field_list().len(), 2);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let mut ds = small();
        let err = ds
            .add_cell_field("density", Array3::ones((4, 4, 3)), "g/cm**3")
            .unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch { .. }));
    }

    #[test]
    fn particle_lengths_must_agree() {
        let mut ds = small();
        ds.add_particle_field("particle_mass", array![1.0, 2.0], "g")
            .unwrap();
        let err = ds
            .add_particle_field("particle_position_x", array![0.5], "code_length")
            .unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch { .. }));
    }

    #[test]
    fn field_units_cover_raw_and_registered_fields() {
        let mut ds = small();
        ds.add_cell_field("density", Array3::ones((4, 4, 4)), "g/cm**3")
            .unwrap();
        let noop = |_: &DerivedField, ctx: &mut dyn FieldContext| ctx.field("gas", "density");
        ds.add_field(("gas", "explicit"), noop, FieldOptions::new().units("km/s"));
        ds.add_field(("gas", "auto"), noop, FieldOptions::new().auto_units("density"));
        ds.add_field(("gas", "plain"), noop, FieldOptions::new());
        ds.add_field(("gas", "broken"), noop, FieldOptions::new().units("dragons"));

        let units = |name: &str| ds.field_units(&FieldKey::new("gas", name));
        assert_eq!(units("density").unwrap().to_string(), "g/cm**3");
        assert_eq!(units("explicit").unwrap().scale(), 1e5);
        assert_eq!(units("auto").unwrap().to_string(), "g/cm**3");
        assert!(units("plain").unwrap().is_dimensionless());
        assert!(matches!(units("broken"), Err(FieldError::UnitParse { .. })));
        assert!(matches!(units("nope"), Err(FieldError::FieldNotFound { .. })));
        assert!(ds.field_units(&FieldKey::bare("density")).is_ok());
    }

    #[test]
    fn bad_units_are_rejected() {
        let mut ds = small();
        let err = ds
            .add_cell_field("density", Array3::ones((4, 4, 4)), "furlongs")
            .unwrap_err();
        assert!(matches!(err, DatasetError::Units { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Dataset::new(DatasetConfig::cube(4, 3), FieldRegistry::new()).unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)));
    }

    #[test]
    fn grids_tile_the_domain() {
        let ds = small();
        let grids = ds.grids();
        assert_eq!(grids.len(), 2);
        assert!(ds.grid(2).is_none());
    }

    #[test]
    fn conversions_follow_code_units() {
        let mut ds = small();
        assert_eq!(ds.conversion("cm"), 1.0);
        assert!((ds.conversion("mpc") * MPC_CGS - 1.0).abs() < 1e-12);
        ds.set_conversion("Density", 2.5);
        assert_eq!(ds.conversion("Density"), 2.5);
        assert_eq!(ds.conversion("Temperature"), 1.0);
    }
}
