//! Registry configuration, validation, and error types.
//!
//! [`RegistryConfig`] is fixed when a [`FieldRegistry`](crate::FieldRegistry)
//! is created. [`validate()`](RegistryConfig::validate) checks it before
//! the registry accepts any field.

use thiserror::Error;

use crate::alias::AliasKind;

// ── UnitMode ───────────────────────────────────────────────────────

/// How the pipeline treats the units of computed values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnitMode {
    /// Multiply by the field's scalar convert routine and tag the result
    /// with its declared units. Computed units are not checked.
    Legacy,
    /// Ignore convert routines; check computed units against the
    /// declaration and convert to the declared units.
    #[default]
    UnitAware,
}

// ── RegistryConfig ─────────────────────────────────────────────────

/// Configuration for a [`FieldRegistry`](crate::FieldRegistry).
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryConfig {
    /// Unit handling. Default: [`UnitMode::UnitAware`].
    pub unit_mode: UnitMode,
    /// Category given to bare cell-field keys. Default: `"gas"`.
    pub default_cell_category: String,
    /// Category given to bare particle-field keys. Default: `"all"`.
    pub default_particle_category: String,
    /// Alias variants declared for every registered field. Default: both.
    pub alias_kinds: Vec<AliasKind>,
    /// Shape of the filler arrays used by dependency detection.
    /// Default: `[8, 8, 8]`.
    pub detector_shape: Vec<usize>,
    /// Evict intermediate fields cached during a compute routine.
    /// Default: `true`.
    pub discard_intermediates: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            unit_mode: UnitMode::UnitAware,
            default_cell_category: "gas".to_string(),
            default_particle_category: "all".to_string(),
            alias_kinds: AliasKind::ALL.to_vec(),
            detector_shape: vec![8, 8, 8],
            discard_intermediates: true,
        }
    }
}

impl RegistryConfig {
    /// Legacy-mode configuration with every other setting at its default.
    pub fn legacy() -> Self {
        Self {
            unit_mode: UnitMode::Legacy,
            ..Self::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_cell_category.trim().is_empty() {
            return Err(ConfigError::EmptyCategory {
                which: "default_cell_category",
            });
        }
        if self.default_particle_category.trim().is_empty() {
            return Err(ConfigError::EmptyCategory {
                which: "default_particle_category",
            });
        }
        if self.detector_shape.is_empty() || self.detector_shape.contains(&0) {
            return Err(ConfigError::InvalidDetectorShape {
                shape: self.detector_shape.clone(),
            });
        }
        for (i, kind) in self.alias_kinds.iter().enumerate() {
            if self.alias_kinds[..i].contains(kind) {
                return Err(ConfigError::DuplicateAliasKind { kind: *kind });
            }
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors from configuration validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A default category is blank.
    #[error("{which} must not be empty")]
    EmptyCategory {
        /// Which setting.
        which: &'static str,
    },
    /// The detector shape is empty or has a zero extent.
    #[error("detector shape {shape:?} must be non-empty with positive extents")]
    InvalidDetectorShape {
        /// The configured shape.
        shape: Vec<usize>,
    },
    /// An alias kind is listed twice.
    #[error("alias kind {kind:?} listed more than once")]
    DuplicateAliasKind {
        /// The repeated kind.
        kind: AliasKind,
    },
    /// A domain or grid setting is invalid.
    #[error("invalid domain: {reason}")]
    InvalidDomain {
        /// What is wrong.
        reason: String,
    },
}
