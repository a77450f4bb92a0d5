//! Quarry: a derived-field registry and lazy evaluation engine for
//! gridded simulation data.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Quarry sub-crates. For most users, adding `quarry` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use quarry::ndarray::Array3;
//! use quarry::prelude::*;
//!
//! // A 16³ unit cube split over four grids, with the standard fields.
//! let mut ds = Dataset::new(DatasetConfig::cube(16, 4), standard_registry()).unwrap();
//! ds.add_cell_field("density", Array3::from_elem((16, 16, 16), 2.0), "g/cm**3")
//!     .unwrap();
//!
//! // A user field; its result is checked against the declared units.
//! ds.add_field(
//!     ("gas", "double_density"),
//!     |_: &DerivedField, ctx: &mut dyn FieldContext| Ok(ctx.field("gas", "density")? * 2.0),
//!     FieldOptions::new().units("g/cm**3"),
//! );
//!
//! let mut all = ds.all_data();
//! let mass = all.field("gas", "cell_mass").unwrap();
//! assert!((mass.sum() - 2.0).abs() < 1e-12);
//! assert_eq!(all.field("gas", "double_density").unwrap().sum(), 4.0 * 4096.0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`units`] | `quarry-units` | Dimensions, unit parsing, code units, constants |
//! | [`types`] | `quarry-core` | Field keys, values, parameters, errors, `FieldContext` |
//! | [`fields`] | `quarry-fields` | Registry, validators, aliases, evaluation pipeline |
//! | [`grid`] | `quarry-grid` | Datasets, grids and the whole-domain container |
//! | [`library`] | `quarry-library` | The standard derived-field library |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Units and dimensional analysis (`quarry-units`).
pub use quarry_units as units;

/// Core types and the [`types::FieldContext`] trait (`quarry-core`).
pub use quarry_core as types;

/// The field registry and evaluation pipeline (`quarry-fields`).
///
/// [`fields::FieldRegistry`] holds field specifications;
/// [`fields::evaluate`] runs one through validation, compute and units.
pub use quarry_fields as fields;

/// Datasets and data containers (`quarry-grid`).
pub use quarry_grid as grid;

/// Standard derived fields (`quarry-library`).
pub use quarry_library as library;

/// The array crate field values are built on.
pub use ndarray;

/// Common imports for typical Quarry usage.
pub mod prelude {
    // Core types and traits
    pub use quarry_core::{
        FieldContext, FieldError, FieldKey, FieldValue, Parameter, SpatialInfo, Units,
        ValidationFailure,
    };

    // Registry
    pub use quarry_fields::{
        DerivedField, FieldOptions, FieldRegistry, RegistryConfig, UnitMode, UnitsDecl, Validator,
    };

    // Containers
    pub use quarry_grid::{AllData, Dataset, DatasetConfig, DatasetError, EdgeBehavior, Grid};

    // Field library
    pub use quarry_library::{standard_registry, standard_registry_with};

    // Units
    pub use quarry_units::{CodeUnits, Unit, UnitRegistry};
}
