//! The evaluation pipeline.
//!
//! [`evaluate`] is what a container's `get` calls for a key that is not a
//! raw field and not cached:
//!
//! 1. resolve the key (synthesizing an alias if needed);
//! 2. push it on the context's evaluation stack, failing on a cycle;
//! 3. run validators, failing before any compute side effect;
//! 4. run the compute routine, which may recurse through the context;
//! 5. evict anything the routine cached that was not cached before;
//! 6. apply units according to the registry's [`UnitMode`];
//! 7. pop the stack, whatever happened.

use std::collections::BTreeSet;

use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue, Units};
use quarry_units::{Unit, UnitRegistry};
use tracing::trace;

use crate::config::UnitMode;
use crate::registry::FieldRegistry;
use crate::spec::{DerivedField, UnitsDecl};

/// Evaluate `key` against `ctx`.
///
/// The result is not cached here; containers cache what this returns.
pub fn evaluate(
    registry: &FieldRegistry,
    key: &FieldKey,
    ctx: &mut dyn FieldContext,
) -> Result<FieldValue, FieldError> {
    let field = registry.resolve(key)?;
    let key = field.key().clone();
    ctx.stack().enter(&key)?;
    let result = run(registry, &field, ctx);
    ctx.stack().exit(&key);
    result
}

fn run(
    registry: &FieldRegistry,
    field: &DerivedField,
    ctx: &mut dyn FieldContext,
) -> Result<FieldValue, FieldError> {
    let key = field.key();
    field
        .check_available(&*ctx)
        .map_err(|failure| FieldError::Validation {
            key: key.clone(),
            failure,
        })?;

    let config = registry.config();
    let before: BTreeSet<FieldKey> = ctx.cached_keys().into_iter().collect();
    trace!(field = %key, depth = ctx.stack().depth(), "evaluating field");
    let raw = field.compute(ctx);

    if config.discard_intermediates {
        for cached in ctx.cached_keys() {
            if !before.contains(&cached) {
                trace!(field = %key, intermediate = %cached, "discarding intermediate");
                ctx.evict(&cached);
            }
        }
    }

    apply_units(config.unit_mode, field, raw?, &*ctx)
}

/// Scale or validate a computed value against the field's declared units.
pub fn apply_units(
    mode: UnitMode,
    field: &DerivedField,
    raw: FieldValue,
    ctx: &dyn FieldContext,
) -> Result<FieldValue, FieldError> {
    let key = field.key();
    let units = ctx.unit_registry();
    match mode {
        UnitMode::Legacy => {
            let unit = declared_unit(key, field.units(), units)?;
            let data = raw.into_data() * field.convert(ctx);
            Ok(FieldValue::tagged(data, unit))
        }
        UnitMode::UnitAware => {
            let actual = computed_unit(key, field.units(), &raw)?;
            match field.units() {
                UnitsDecl::Explicit(expr) => {
                    let declared = parse_units(key, expr, units)?;
                    if !actual.is_compatible_with(&declared) {
                        return Err(mismatch(key, expr, &actual));
                    }
                    raw.convert_to(&declared)
                        .map_err(|_| mismatch(key, expr, &actual))
                }
                UnitsDecl::Auto { dimensions } => {
                    let expected = parse_dimensions(key, dimensions, units)?;
                    if actual.dims() != &expected {
                        return Err(FieldError::Dimensionality {
                            key: key.clone(),
                            expected: dimensions.clone(),
                            actual: actual.dims().to_string(),
                        });
                    }
                    raw.convert_to(&Unit::cgs(expected))
                        .map_err(|_| mismatch(key, dimensions, &actual))
                }
                UnitsDecl::None => {
                    if !actual.is_dimensionless() {
                        return Err(mismatch(key, "dimensionless", &actual));
                    }
                    Ok(FieldValue::dimensionless(raw.in_cgs().into_data()))
                }
            }
        }
    }
}

/// The unit a legacy-mode result is tagged with.
fn declared_unit(key: &FieldKey, decl: &UnitsDecl, units: &UnitRegistry) -> Result<Unit, FieldError> {
    match decl {
        UnitsDecl::None => Ok(Unit::dimensionless()),
        UnitsDecl::Explicit(expr) => parse_units(key, expr, units),
        UnitsDecl::Auto { dimensions } => {
            Ok(Unit::cgs(parse_dimensions(key, dimensions, units)?))
        }
    }
}

/// The unit a compute routine produced. Bare values are dimensionless.
fn computed_unit(key: &FieldKey, decl: &UnitsDecl, raw: &FieldValue) -> Result<Unit, FieldError> {
    match raw.units() {
        Units::Bare => Ok(Unit::dimensionless()),
        Units::Tagged(unit) => Ok(unit.clone()),
        Units::Inconsistent(reason) => Err(FieldError::UnitMismatch {
            key: key.clone(),
            declared: decl.to_string(),
            actual: format!("inconsistent ({reason})"),
        }),
    }
}

fn parse_units(key: &FieldKey, expr: &str, units: &UnitRegistry) -> Result<Unit, FieldError> {
    units.parse(expr).map_err(|source| FieldError::UnitParse {
        key: key.clone(),
        units: expr.to_string(),
        source,
    })
}

fn parse_dimensions(
    key: &FieldKey,
    expr: &str,
    units: &UnitRegistry,
) -> Result<quarry_units::Dimensions, FieldError> {
    units
        .parse_dimensions(expr)
        .map_err(|source| FieldError::UnitParse {
            key: key.clone(),
            units: expr.to_string(),
            source,
        })
}

fn mismatch(key: &FieldKey, declared: &str, actual: &Unit) -> FieldError {
    FieldError::UnitMismatch {
        key: key.clone(),
        declared: declared.to_string(),
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldOptions;
    use crate::validator::Validator;
    use crate::RegistryConfig;
    use quarry_core::{SpatialInfo, ValidationFailure};
    use quarry_test_utils::MockContext;
    use std::sync::Arc;

    fn density() -> FieldValue {
        let reg = UnitRegistry::default();
        FieldValue::tagged(
            ndarray::ArrayD::from_elem(ndarray::IxDyn(&[2, 2, 2]), 2.0),
            reg.parse("g/cm**3").unwrap(),
        )
    }

    fn returns_density(_: &DerivedField, ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
        ctx.field("gas", "density")
    }

    /// A mock context whose derived lookups go through `registry`.
    fn context(registry: FieldRegistry) -> MockContext {
        let registry = Arc::new(registry);
        MockContext::new(&[2, 2, 2])
            .with_raw(("gas", "density"), density())
            .with_evaluator(move |key, ctx| {
                registry
                    .contains(key)
                    .then(|| evaluate(&registry, key, ctx))
            })
    }

    fn eval(reg: FieldRegistry, key: (&str, &str)) -> Result<FieldValue, FieldError> {
        let mut ctx = context(reg);
        ctx.get(&key.into())
    }

    #[test]
    fn explicit_units_convert() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "rho"), returns_density, FieldOptions::new().units("kg/m**3"));
        let value = eval(reg, ("gas", "rho")).unwrap();
        assert!((value.data()[[0, 0, 0]] - 2000.0).abs() < 1e-9);
        assert_eq!(value.unit().unwrap().to_string(), "kg/m**3");
    }

    #[test]
    fn wrong_explicit_units_mismatch() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "rho"), returns_density, FieldOptions::new().units("m/s"));
        match eval(reg, ("gas", "rho")) {
            Err(FieldError::UnitMismatch { declared, actual, .. }) => {
                assert_eq!(declared, "m/s");
                assert_eq!(actual, "g/cm**3");
            }
            other => panic!("expected UnitMismatch, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_units() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "rho"), returns_density, FieldOptions::new().units("dragons"));
        assert!(matches!(
            eval(reg, ("gas", "rho")),
            Err(FieldError::UnitParse { .. })
        ));
    }

    #[test]
    fn auto_units_check_dimensions() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "t"), returns_density, FieldOptions::new().auto_units("temperature"));
        reg.add_field(("gas", "rho"), returns_density, FieldOptions::new().auto_units("density"));
        let mut ctx = context(reg);
        assert!(matches!(
            ctx.get(&("gas", "t").into()),
            Err(FieldError::Dimensionality { .. })
        ));
        let rho = ctx.get(&("gas", "rho").into()).unwrap();
        assert_eq!(rho.unit().unwrap().to_string(), "g/cm**3");
    }

    #[test]
    fn unitless_declaration_requires_dimensionless_result() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "rho"), returns_density, FieldOptions::new());
        reg.add_field(
            ("gas", "ratio"),
            |_, ctx| {
                let rho = ctx.field("gas", "density")?;
                Ok(&rho / &rho)
            },
            FieldOptions::new(),
        );
        let mut ctx = context(reg);
        assert!(matches!(
            ctx.get(&("gas", "rho").into()),
            Err(FieldError::UnitMismatch { .. })
        ));
        let ratio = ctx.get(&("gas", "ratio").into()).unwrap();
        assert!(ratio.units().is_dimensionless());
    }

    #[test]
    fn bare_result_with_dimensional_units_mismatches() {
        let mut reg = FieldRegistry::new();
        reg.add_field(
            ("gas", "ones"),
            |_, ctx| Ok(FieldValue::ones(&ctx.shape())),
            FieldOptions::new().units("g/cm**3"),
        );
        assert!(matches!(
            eval(reg, ("gas", "ones")),
            Err(FieldError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn inconsistent_result_mismatches() {
        let mut reg = FieldRegistry::new();
        reg.add_field(
            ("gas", "bad"),
            |_, ctx| {
                let rho = ctx.field("gas", "density")?;
                Ok(&rho + &(&rho * &rho))
            },
            FieldOptions::new().units("g/cm**3"),
        );
        assert!(matches!(
            eval(reg, ("gas", "bad")),
            Err(FieldError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn legacy_mode_scales_and_tags() {
        let mut reg = FieldRegistry::with_config(RegistryConfig::legacy()).unwrap();
        reg.add_field(
            ("gas", "rho"),
            returns_density,
            FieldOptions::new().units("m/s").convert(|_| 3.0),
        );
        let value = eval(reg, ("gas", "rho")).unwrap();
        assert_eq!(value.data()[[0, 0, 0]], 6.0);
        assert_eq!(value.unit().unwrap().to_string(), "m/s");
    }

    #[test]
    fn legacy_mode_still_parses_units() {
        let mut reg = FieldRegistry::with_config(RegistryConfig::legacy()).unwrap();
        reg.add_field(("gas", "rho"), returns_density, FieldOptions::new().units("dragons"));
        assert!(matches!(
            eval(reg, ("gas", "rho")),
            Err(FieldError::UnitParse { .. })
        ));
    }

    #[test]
    fn validators_run_before_compute() {
        let mut reg = FieldRegistry::new();
        reg.add_field(
            ("gas", "needs_center"),
            |_, _| panic!("compute must not run"),
            FieldOptions::new().validator(Validator::parameters(["center", "bulk_velocity"])),
        );
        match eval(reg, ("gas", "needs_center")) {
            Err(FieldError::Validation { failure, .. }) => assert_eq!(
                failure,
                ValidationFailure::MissingParameter {
                    names: vec!["center".into(), "bulk_velocity".into()]
                }
            ),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn ghost_zone_requirement() {
        let mut reg = FieldRegistry::new();
        reg.add_field(
            ("gas", "stencil"),
            |_, ctx| Ok(FieldValue::ones(&ctx.shape()).tag(Unit::dimensionless())),
            FieldOptions::new().validator(Validator::spatial(2)),
        );
        let reg = Arc::new(reg);
        let spatial = |ghost_zones| SpatialInfo {
            ghost_zones,
            dimensions: [2 + 2 * ghost_zones; 3],
            left_edge: [0.0; 3],
            cell_widths: [1.0; 3],
            level: 0,
        };

        let r = Arc::clone(&reg);
        let mut flat = MockContext::new(&[2, 2, 2])
            .with_spatial(spatial(0))
            .with_evaluator(move |key, ctx| r.contains(key).then(|| evaluate(&r, key, ctx)));
        match flat.get(&("gas", "stencil").into()) {
            Err(FieldError::Validation {
                failure: ValidationFailure::InsufficientGhostZones { required, actual, .. },
                ..
            }) => {
                assert_eq!(required, 2);
                assert_eq!(actual, 0);
            }
            other => panic!("expected InsufficientGhostZones, got {other:?}"),
        }

        let r = Arc::clone(&reg);
        let mut padded = MockContext::new(&[6, 6, 6])
            .with_spatial(spatial(2))
            .with_evaluator(move |key, ctx| r.contains(key).then(|| evaluate(&r, key, ctx)));
        let value = padded.get(&("gas", "stencil").into()).unwrap();
        assert_eq!(value.shape(), &[6, 6, 6]);

        let r = Arc::clone(&reg);
        let mut nonspatial = MockContext::new(&[8])
            .with_evaluator(move |key, ctx| r.contains(key).then(|| evaluate(&r, key, ctx)));
        assert!(matches!(
            nonspatial.get(&("gas", "stencil").into()),
            Err(FieldError::Validation {
                failure: ValidationFailure::MissingSpatialContext { ghost_zones: 2, .. },
                ..
            })
        ));
    }

    #[test]
    fn cycles_fail_instead_of_recursing() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "a"), |_, ctx| ctx.field("gas", "b"), FieldOptions::new());
        reg.add_field(("gas", "b"), |_, ctx| ctx.field("gas", "a"), FieldOptions::new());
        let mut ctx = context(reg);
        match ctx.get(&("gas", "a").into()) {
            Err(FieldError::CyclicDependency { chain }) => {
                assert_eq!(
                    chain,
                    vec![
                        FieldKey::new("gas", "a"),
                        FieldKey::new("gas", "b"),
                        FieldKey::new("gas", "a")
                    ]
                );
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
        assert!(ctx.stack().is_empty());
    }

    #[test]
    fn intermediates_are_discarded() {
        let mut reg = FieldRegistry::new();
        reg.add_field(("gas", "inner"), returns_density, FieldOptions::new().units("g/cm**3"));
        reg.add_field(
            ("gas", "outer"),
            |_, ctx| ctx.field("gas", "inner"),
            FieldOptions::new().units("g/cm**3"),
        );
        let mut ctx = context(reg);
        ctx.get(&("gas", "outer").into()).unwrap();
        assert_eq!(ctx.cached_keys(), vec![FieldKey::new("gas", "outer")]);
    }

    #[test]
    fn intermediates_kept_when_configured() {
        let cfg = RegistryConfig {
            discard_intermediates: false,
            ..RegistryConfig::default()
        };
        let mut reg = FieldRegistry::with_config(cfg).unwrap();
        reg.add_field(("gas", "inner"), returns_density, FieldOptions::new().units("g/cm**3"));
        reg.add_field(
            ("gas", "outer"),
            |_, ctx| ctx.field("gas", "inner"),
            FieldOptions::new().units("g/cm**3"),
        );
        let mut ctx = context(reg);
        ctx.get(&("gas", "outer").into()).unwrap();
        let cached = ctx.cached_keys();
        assert!(cached.contains(&FieldKey::new("gas", "inner")));
        assert!(cached.contains(&FieldKey::new("gas", "outer")));
    }

    #[test]
    fn stack_is_popped_after_errors() {
        let mut reg = FieldRegistry::new();
        reg.add_field(
            ("gas", "fails"),
            |field, _| {
                Err(FieldError::ComputeFailed {
                    key: field.key().clone(),
                    reason: "boom".into(),
                })
            },
            FieldOptions::new(),
        );
        let mut ctx = context(reg);
        assert!(ctx.get(&("gas", "fails").into()).is_err());
        assert!(ctx.stack().is_empty());
    }

    #[test]
    fn absolute_alias_evaluates() {
        let mut reg = FieldRegistry::new();
        reg.add_field(
            ("gas", "neg"),
            |_, ctx| Ok(-ctx.field("gas", "density")?),
            FieldOptions::new().units("g/cm**3"),
        );
        let mut ctx = context(reg);
        let neg = ctx.get(&("gas", "neg").into()).unwrap();
        let abs = ctx.get(&("gas", "neg_abs").into()).unwrap();
        assert_eq!(abs, neg.abs());
    }
}
