//! Errors from building datasets.

use quarry_core::FieldKey;
use quarry_fields::ConfigError;
use quarry_units::UnitError;
use thiserror::Error;

/// Errors from dataset construction and raw-field loading.
#[derive(Clone, Debug, Error)]
pub enum DatasetError {
    /// The dataset or registry configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A raw field does not have the shape the dataset expects.
    #[error("field {key} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        /// The field being added.
        key: FieldKey,
        /// Required shape.
        expected: Vec<usize>,
        /// Supplied shape.
        actual: Vec<usize>,
    },
    /// A raw field's unit string does not parse.
    #[error("field {key} has invalid units")]
    Units {
        /// The field being added.
        key: FieldKey,
        /// Parser error.
        #[source]
        source: UnitError,
    },
    /// The domain cannot be split as requested.
    #[error("invalid region: {reason}")]
    InvalidRegion {
        /// What went wrong.
        reason: String,
    },
}
