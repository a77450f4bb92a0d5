//! Core types and traits for the Quarry derived-field engine.
//!
//! This crate has no internal dependencies besides the unit algebra. It
//! defines field keys, runtime parameters, unit-tagged field arrays, the
//! error taxonomy, and the [`FieldContext`] trait every data container
//! implements.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod key;
pub mod parameter;
pub mod stack;
pub mod traits;
pub mod value;

pub use error::{FieldError, ValidationFailure};
pub use key::FieldKey;
pub use parameter::{Parameter, ParameterMap};
pub use stack::EvaluationStack;
pub use traits::{FieldContext, Shape, SpatialInfo};
pub use value::{FieldValue, Units};
