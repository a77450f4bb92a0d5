//! Alias variants synthesized from registered fields.
//!
//! Every base field gets one alias key per configured [`AliasKind`],
//! declared when the base is registered. The alias specification itself
//! is built on first lookup. Aliases are only ever derived from base
//! fields, so they never chain.

use std::sync::Arc;

use quarry_core::{FieldContext, FieldKey};

use crate::spec::{ComputeFn, ConvertFn, DerivedField};

/// A variant of a base field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AliasKind {
    /// The base field with its legacy convert factor inverted
    /// (`1 / base.convert`). Key suffix `_code`.
    ///
    /// Convert routines only apply in [`UnitMode::Legacy`], so under
    /// [`UnitMode::UnitAware`] this alias evaluates to the same values as
    /// its base. In legacy mode the value is `raw / c` but the alias keeps
    /// the base's declared units tag.
    ///
    /// [`UnitMode::Legacy`]: crate::UnitMode::Legacy
    /// [`UnitMode::UnitAware`]: crate::UnitMode::UnitAware
    UnitInverted,
    /// The elementwise absolute value of the base field. Key suffix `_abs`.
    AbsoluteValue,
}

impl AliasKind {
    /// Every alias kind.
    pub const ALL: [AliasKind; 2] = [AliasKind::UnitInverted, AliasKind::AbsoluteValue];

    /// Name suffix appended to the base key.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::UnitInverted => "_code",
            Self::AbsoluteValue => "_abs",
        }
    }

    /// The alias key for `base`.
    pub fn alias_key(self, base: &FieldKey) -> FieldKey {
        base.with_name(format!("{}{}", base.name(), self.suffix()))
    }

    /// Build the alias specification from its base.
    pub fn synthesize(self, base: &DerivedField) -> DerivedField {
        let key = self.alias_key(base.key());
        let mut alias = base.clone().into_alias(key, self, base.key().clone());
        match self {
            Self::UnitInverted => {
                let base_convert = base.convert_fn().cloned();
                let inverted: ConvertFn = Arc::new(move |ctx: &dyn FieldContext| match &base_convert {
                    Some(f) => 1.0 / f(ctx),
                    None => 1.0,
                });
                alias.set_convert(Some(inverted));
            }
            Self::AbsoluteValue => {
                let base_compute = base.compute_fn().clone();
                let wrapped: ComputeFn =
                    Arc::new(move |field: &DerivedField, ctx: &mut dyn FieldContext| {
                        Ok(base_compute(field, ctx)?.abs())
                    });
                alias.set_compute(wrapped);
            }
        }
        alias
    }
}
