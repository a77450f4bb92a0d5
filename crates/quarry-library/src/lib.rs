//! The standard derived-field library.
//!
//! [`register_standard_fields`] adds every field to a
//! [`FieldRegistry`]; [`standard_registry`] builds a registry that
//! already has them. Fields are grouped by what they need:
//!
//! - [`geometry`]: cell widths, coordinates and volumes, radii (`index`
//!   and `gas` categories);
//! - [`fluid`]: thermodynamic and kinematic gas quantities;
//! - [`stencil`]: fields that read neighbouring cells and need ghost zones;
//! - [`particle`]: particle fields (`all` category).
//!
//! Compute routines keep physical constants as unit-tagged quantities,
//! so results are correct in unit-aware mode. Legacy convert routines
//! only carry the code-unit factors the dataset supplies through
//! [`FieldContext::convert`](quarry_core::FieldContext::convert).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod fluid;
pub mod geometry;
pub mod particle;
pub mod stencil;

mod util;

use quarry_fields::{ConfigError, FieldRegistry, RegistryConfig};
use tracing::debug;

/// Chemical species with a `<species>_density` raw field.
pub const SPECIES: [&str; 13] = [
    "HI", "HII", "Electron", "HeI", "HeII", "HeIII", "H2I", "H2II", "HM", "DI", "DII", "HDI",
    "Metal",
];

/// Register every standard field, then apply the metadata overrides.
pub fn register_standard_fields(registry: &mut FieldRegistry) {
    let before = registry.len();
    geometry::register(registry);
    fluid::register(registry);
    stencil::register(registry);
    particle::register(registry);
    fluid::apply_overrides(registry);
    debug!(
        added = registry.len() - before,
        "registered standard field library"
    );
}

/// A default-configured registry holding the standard fields.
pub fn standard_registry() -> FieldRegistry {
    let mut registry = FieldRegistry::new();
    register_standard_fields(&mut registry);
    registry
}

/// A registry with `config` holding the standard fields.
pub fn standard_registry_with(config: RegistryConfig) -> Result<FieldRegistry, ConfigError> {
    let mut registry = FieldRegistry::with_config(config)?;
    register_standard_fields(&mut registry);
    Ok(registry)
}
