//! Preconditions a derived field places on its evaluation context.

use quarry_core::{FieldContext, FieldKey, ValidationFailure};

/// One precondition of a derived field.
///
/// Validators are stateless. A field's validators run in registration
/// order before its compute routine and the first failure stops
/// evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validator {
    /// The context must be a 3-D stencil region with exactly
    /// `ghost_zones` ghost cells.
    Spatial {
        /// Required ghost zones.
        ghost_zones: usize,
        /// Raw fields the stencil reads (informational).
        fields: Vec<FieldKey>,
    },
    /// Named runtime parameters must be set.
    Parameter {
        /// Parameter names.
        names: Vec<String>,
    },
    /// Named raw fields must be available. Bare keys match any category.
    DataField {
        /// Raw field keys.
        names: Vec<FieldKey>,
    },
    /// Named container properties must exist.
    Property {
        /// Property names.
        names: Vec<String>,
    },
}

impl Validator {
    /// A spatial requirement with no declared stencil fields.
    pub fn spatial(ghost_zones: usize) -> Self {
        Self::Spatial {
            ghost_zones,
            fields: Vec::new(),
        }
    }

    /// A spatial requirement naming the raw fields the stencil reads.
    pub fn spatial_with_fields<I, K>(ghost_zones: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<FieldKey>,
    {
        Self::Spatial {
            ghost_zones,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Require runtime parameters.
    pub fn parameters<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Parameter {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Require raw fields.
    pub fn data_fields<I, K>(names: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<FieldKey>,
    {
        Self::DataField {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Require container properties.
    pub fn properties<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Property {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Check the precondition against `ctx`.
    pub fn check(&self, ctx: &dyn FieldContext) -> Result<(), ValidationFailure> {
        match self {
            Self::Spatial {
                ghost_zones,
                fields,
            } => match ctx.spatial() {
                None => Err(ValidationFailure::MissingSpatialContext {
                    ghost_zones: *ghost_zones,
                    fields: fields.clone(),
                }),
                Some(info) if info.ghost_zones != *ghost_zones => {
                    Err(ValidationFailure::InsufficientGhostZones {
                        required: *ghost_zones,
                        actual: info.ghost_zones,
                        fields: fields.clone(),
                    })
                }
                Some(_) => Ok(()),
            },
            Self::Parameter { names } => {
                let missing: Vec<String> = names
                    .iter()
                    .filter(|n| !ctx.has_parameter(n))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ValidationFailure::MissingParameter { names: missing })
                }
            }
            Self::DataField { names } => {
                let available = ctx.field_list();
                let missing: Vec<FieldKey> = names
                    .iter()
                    .filter(|key| {
                        if key.is_bare() {
                            !available.iter().any(|k| k.name() == key.name())
                        } else {
                            !ctx.has_raw_field(key)
                        }
                    })
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ValidationFailure::MissingDataField { names: missing })
                }
            }
            Self::Property { names } => {
                let missing: Vec<String> = names
                    .iter()
                    .filter(|n| !ctx.has_property(n))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ValidationFailure::MissingProperty { names: missing })
                }
            }
        }
    }

    /// Ghost zones required, if this is a spatial validator.
    pub fn ghost_zones(&self) -> Option<usize> {
        match self {
            Self::Spatial { ghost_zones, .. } => Some(*ghost_zones),
            _ => None,
        }
    }
}
