//! Derived-field registry and lazy evaluation engine.
//!
//! A [`FieldRegistry`] maps [`FieldKey`](quarry_core::FieldKey)s to
//! [`DerivedField`] specifications. Containers call [`evaluate`] for keys
//! they cannot serve from raw data or cache; the pipeline checks
//! [`Validator`]s, runs the compute routine and enforces declared units.
//! [`FieldDetector`] discovers which raw fields a derived field reads
//! without touching real data.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod alias;
pub mod config;
pub mod detector;
pub mod pipeline;
pub mod registry;
pub mod spec;
pub mod validator;

pub use alias::AliasKind;
pub use config::{ConfigError, RegistryConfig, UnitMode};
pub use detector::FieldDetector;
pub use pipeline::{apply_units, evaluate};
pub use registry::FieldRegistry;
pub use spec::{
    ComputeFn, ConvertFn, DerivedField, FieldKind, FieldMetadata, FieldOptions, Sampling,
    UnitsDecl,
};
pub use validator::Validator;
