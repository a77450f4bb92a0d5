//! Error types for field evaluation.
//!
//! Two classes that must never be conflated: [`ValidationFailure`]s are
//! raised before a compute routine runs and are recoverable by retrying
//! with a richer context; everything else in [`FieldError`] is raised
//! during or after compute and points at a bug in a field definition or
//! a missing field.

use quarry_units::UnitError;
use thiserror::Error;

use crate::key::FieldKey;

/// A field's precondition on its evaluation context was not met.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// The context is not a 3-D stencil-capable region.
    #[error("field needs a spatial region with {ghost_zones} ghost zones")]
    MissingSpatialContext {
        /// Ghost zones the field requires.
        ghost_zones: usize,
        /// Raw fields the stencil reads, if declared.
        fields: Vec<FieldKey>,
    },
    /// The context is spatial but has the wrong number of ghost zones.
    #[error("field needs {required} ghost zones, context has {actual}")]
    InsufficientGhostZones {
        /// Ghost zones the field requires.
        required: usize,
        /// Ghost zones the context has.
        actual: usize,
        /// Raw fields the stencil reads, if declared.
        fields: Vec<FieldKey>,
    },
    /// Named runtime parameters are absent.
    #[error("missing parameters: {}", .names.join(", "))]
    MissingParameter {
        /// Every absent parameter name.
        names: Vec<String>,
    },
    /// Named raw fields are absent from the context's field list.
    #[error("missing raw fields: {}", join_keys(.names))]
    MissingDataField {
        /// Every absent raw field.
        names: Vec<FieldKey>,
    },
    /// Named context properties are absent.
    #[error("missing properties: {}", .names.join(", "))]
    MissingProperty {
        /// Every absent property name.
        names: Vec<String>,
    },
}

fn join_keys(keys: &[FieldKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_chain(keys: &[FieldKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors from resolving or evaluating a field.
#[derive(Clone, Debug, Error)]
pub enum FieldError {
    /// A validator rejected the context before compute.
    #[error("{key}: {failure}")]
    Validation {
        /// The field being evaluated.
        key: FieldKey,
        /// What precondition failed.
        failure: ValidationFailure,
    },
    /// No field is registered or available under this key.
    #[error("field {key} not found")]
    FieldNotFound {
        /// The requested key.
        key: FieldKey,
    },
    /// A field was requested while already being evaluated.
    #[error("cyclic field dependency: {}", join_chain(.chain))]
    CyclicDependency {
        /// The evaluation chain, ending with the repeated key.
        chain: Vec<FieldKey>,
    },
    /// The computed units cannot be converted to the declared units.
    #[error("{key}: declared units '{declared}' but computed '{actual}'")]
    UnitMismatch {
        /// The field being evaluated.
        key: FieldKey,
        /// Declared units (or `dimensionless` for unitless fields).
        declared: String,
        /// Units of the computed value.
        actual: String,
    },
    /// A declared unit or dimension string could not be parsed.
    #[error("{key}: cannot parse units '{units}'")]
    UnitParse {
        /// The field being evaluated.
        key: FieldKey,
        /// The offending string.
        units: String,
        /// Parser error.
        #[source]
        source: UnitError,
    },
    /// The computed dimension differs from the declared dimension.
    #[error("{key}: expected dimensions '{expected}' but computed '{actual}'")]
    Dimensionality {
        /// The field being evaluated.
        key: FieldKey,
        /// Declared dimensions.
        expected: String,
        /// Dimensions of the computed value.
        actual: String,
    },
    /// A runtime parameter exists but has the wrong kind or value.
    #[error("parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A compute routine could not produce a value.
    #[error("{key}: compute failed: {reason}")]
    ComputeFailed {
        /// The field being evaluated.
        key: FieldKey,
        /// Human-readable description.
        reason: String,
    },
    /// Arrays of incompatible shapes were combined.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    /// Unit algebra failed inside a compute routine.
    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl FieldError {
    /// Whether an outer layer may retry with an upgraded context.
    ///
    /// Only validator failures qualify; unit and lookup failures point at
    /// the field definition and are never retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// The validator failure, if this is one.
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Validation { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
