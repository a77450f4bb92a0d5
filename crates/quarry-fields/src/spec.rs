//! Derived field specifications.
//!
//! A [`DerivedField`] bundles a compute routine with everything the
//! pipeline needs to know about it: declared units, a legacy convert
//! routine, sampling, display metadata and validators. Specifications are
//! immutable once registered; the registry's override methods replace an
//! entry with a patched copy.

use std::fmt;
use std::sync::Arc;

use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue, ValidationFailure};

use crate::alias::AliasKind;
use crate::validator::Validator;

/// A compute routine: reads other fields from the context and returns a value.
pub type ComputeFn =
    Arc<dyn Fn(&DerivedField, &mut dyn FieldContext) -> Result<FieldValue, FieldError> + Send + Sync>;

/// A legacy scalar convert routine: the factor applied to a computed value.
pub type ConvertFn = Arc<dyn Fn(&dyn FieldContext) -> f64 + Send + Sync>;

/// Declared units of a derived field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UnitsDecl {
    /// Unitless: the computed value must be dimensionless.
    #[default]
    None,
    /// An explicit unit expression such as `"g/cm**3"`.
    Explicit(String),
    /// Whatever CGS unit matches the named dimension, e.g. `"density"`.
    Auto {
        /// Dimension name or expression.
        dimensions: String,
    },
}

impl UnitsDecl {
    /// Explicit units.
    pub fn explicit(units: impl Into<String>) -> Self {
        Self::Explicit(units.into())
    }

    /// Automatic units for a dimension.
    pub fn auto(dimensions: impl Into<String>) -> Self {
        Self::Auto {
            dimensions: dimensions.into(),
        }
    }
}

impl fmt::Display for UnitsDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "dimensionless"),
            Self::Explicit(u) => write!(f, "{u}"),
            Self::Auto { dimensions } => write!(f, "auto ({dimensions})"),
        }
    }
}

/// What a field is sampled on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Sampling {
    /// Cell-centred grid data.
    #[default]
    Cell,
    /// Per-particle data.
    Particle,
}

/// Whether a field was registered directly or synthesized from another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Registered directly.
    Base,
    /// Synthesized from `base`.
    Alias {
        /// Which variant.
        kind: AliasKind,
        /// The field it was synthesized from.
        base: FieldKey,
    },
}

/// Display and projection hints. Carried through evaluation untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Whether plots may log-scale this field. Default: `true`.
    pub take_log: bool,
    /// Whether projections integrate this field along the line of sight.
    pub line_integral: bool,
    /// Units of the projected field.
    pub projected_units: Option<String>,
    /// Path-length unit used when projecting. Default: `"cm"`.
    pub projection_conversion: String,
    /// Human-readable label.
    pub display_name: Option<String>,
}

impl Default for FieldMetadata {
    fn default() -> Self {
        Self {
            take_log: true,
            line_integral: false,
            projected_units: None,
            projection_conversion: "cm".to_string(),
            display_name: None,
        }
    }
}

/// Registration options for [`DerivedField::new`].
///
/// Built with chained setters:
///
/// ```
/// use quarry_fields::{FieldOptions, Validator};
///
/// let opts = FieldOptions::new()
///     .units("cm/s")
///     .take_log(false)
///     .validator(Validator::parameters(["bulk_velocity"]));
/// ```
#[derive(Clone, Default)]
pub struct FieldOptions {
    units: UnitsDecl,
    convert: Option<ConvertFn>,
    sampling: Sampling,
    vector_field: bool,
    metadata: FieldMetadata,
    validators: Vec<Validator>,
}

impl FieldOptions {
    /// Defaults: unitless, cell-sampled, scalar, no validators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit units.
    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = UnitsDecl::Explicit(units.into());
        self
    }

    /// Automatic units of the given dimension.
    pub fn auto_units(mut self, dimensions: impl Into<String>) -> Self {
        self.units = UnitsDecl::auto(dimensions);
        self
    }

    /// Any unit declaration.
    pub fn units_decl(mut self, units: UnitsDecl) -> Self {
        self.units = units;
        self
    }

    /// Legacy convert routine.
    pub fn convert(mut self, f: impl Fn(&dyn FieldContext) -> f64 + Send + Sync + 'static) -> Self {
        self.convert = Some(Arc::new(f));
        self
    }

    /// Mark as a particle field.
    pub fn particle(mut self) -> Self {
        self.sampling = Sampling::Particle;
        self
    }

    /// Set sampling.
    pub fn sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Mark as a vector field (leading axis of length 3).
    pub fn vector(mut self) -> Self {
        self.vector_field = true;
        self
    }

    /// Log-scaling hint.
    pub fn take_log(mut self, take_log: bool) -> Self {
        self.metadata.take_log = take_log;
        self
    }

    /// Line-integral hint.
    pub fn line_integral(mut self, line_integral: bool) -> Self {
        self.metadata.line_integral = line_integral;
        self
    }

    /// Units of the projected field.
    pub fn projected_units(mut self, units: impl Into<String>) -> Self {
        self.metadata.projected_units = Some(units.into());
        self
    }

    /// Projection path-length unit.
    pub fn projection_conversion(mut self, units: impl Into<String>) -> Self {
        self.metadata.projection_conversion = units.into();
        self
    }

    /// Display label.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.display_name = Some(name.into());
        self
    }

    /// Append a validator.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Append several validators.
    pub fn validators(mut self, validators: impl IntoIterator<Item = Validator>) -> Self {
        self.validators.extend(validators);
        self
    }
}

/// A registered, computable field.
#[derive(Clone)]
pub struct DerivedField {
    key: FieldKey,
    compute: ComputeFn,
    units: UnitsDecl,
    convert: Option<ConvertFn>,
    sampling: Sampling,
    vector_field: bool,
    metadata: FieldMetadata,
    validators: Vec<Validator>,
    kind: FieldKind,
}

impl DerivedField {
    /// Build a base field.
    pub fn new<F>(key: impl Into<FieldKey>, compute: F, options: FieldOptions) -> Self
    where
        F: Fn(&DerivedField, &mut dyn FieldContext) -> Result<FieldValue, FieldError>
            + Send
            + Sync
            + 'static,
    {
        Self::from_parts(key.into(), Arc::new(compute), options)
    }

    pub(crate) fn from_parts(key: FieldKey, compute: ComputeFn, options: FieldOptions) -> Self {
        Self {
            key,
            compute,
            units: options.units,
            convert: options.convert,
            sampling: options.sampling,
            vector_field: options.vector_field,
            metadata: options.metadata,
            validators: options.validators,
            kind: FieldKind::Base,
        }
    }

    /// The field's key.
    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    /// Declared units.
    pub fn units(&self) -> &UnitsDecl {
        &self.units
    }

    /// Sampling.
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Whether this is a particle field.
    pub fn is_particle(&self) -> bool {
        self.sampling == Sampling::Particle
    }

    /// Whether values carry a leading axis of length 3.
    pub fn is_vector(&self) -> bool {
        self.vector_field
    }

    /// Display and projection hints.
    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }

    /// Log-scaling hint.
    pub fn take_log(&self) -> bool {
        self.metadata.take_log
    }

    /// Validators in check order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Base or alias.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether the field was synthesized from another.
    pub fn is_alias(&self) -> bool {
        matches!(self.kind, FieldKind::Alias { .. })
    }

    /// Run the compute routine. Validators are not checked.
    pub fn compute(&self, ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
        (self.compute)(self, ctx)
    }

    /// The legacy convert factor, `1.0` when no routine is set.
    pub fn convert(&self, ctx: &dyn FieldContext) -> f64 {
        self.convert.as_ref().map_or(1.0, |f| f(ctx))
    }

    /// Run every validator in order, stopping at the first failure.
    pub fn check_available(&self, ctx: &dyn FieldContext) -> Result<(), ValidationFailure> {
        self.validators.iter().try_for_each(|v| v.check(ctx))
    }

    /// Largest ghost-zone requirement among the spatial validators.
    pub fn required_ghost_zones(&self) -> usize {
        self.validators
            .iter()
            .filter_map(Validator::ghost_zones)
            .max()
            .unwrap_or(0)
    }

    /// Whether any validator asks for a spatial context.
    pub fn needs_spatial(&self) -> bool {
        self.validators.iter().any(|v| v.ghost_zones().is_some())
    }

    // ── Crate-internal construction and patching ────────────────

    pub(crate) fn compute_fn(&self) -> &ComputeFn {
        &self.compute
    }

    pub(crate) fn convert_fn(&self) -> Option<&ConvertFn> {
        self.convert.as_ref()
    }

    pub(crate) fn rekeyed(mut self, key: FieldKey) -> Self {
        self.key = key;
        self
    }

    pub(crate) fn into_alias(
        mut self,
        key: FieldKey,
        kind: AliasKind,
        base: FieldKey,
    ) -> Self {
        self.key = key;
        self.kind = FieldKind::Alias { kind, base };
        self
    }

    pub(crate) fn set_compute(&mut self, compute: ComputeFn) {
        self.compute = compute;
    }

    pub(crate) fn set_convert(&mut self, convert: Option<ConvertFn>) {
        self.convert = convert;
    }

    pub(crate) fn set_units(&mut self, units: UnitsDecl) {
        self.units = units;
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut FieldMetadata {
        &mut self.metadata
    }
}

impl fmt::Debug for DerivedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedField")
            .field("key", &self.key)
            .field("units", &self.units)
            .field("has_convert", &self.convert.is_some())
            .field("sampling", &self.sampling)
            .field("vector_field", &self.vector_field)
            .field("metadata", &self.metadata)
            .field("validators", &self.validators)
            .field("kind", &self.kind)
            .finish()
    }
}
