//! Thermodynamic, kinematic and observational gas fields.

use std::f64::consts::PI;
use std::sync::Arc;

use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue};
use quarry_fields::{DerivedField, FieldOptions, FieldRegistry, Validator};
use quarry_units::constants::{
    BOLTZMANN_CGS, CROSS_SECTION_THOMSON_CGS, GRAVITATIONAL_CONSTANT_CGS, MASS_ELECTRON_CGS,
    MASS_HYDROGEN_CGS, MASS_SUN_CGS, SPEED_OF_LIGHT_CGS,
};
use quarry_units::Rational;
use tracing::warn;

use crate::util::{dataset_integer, offsets, quantity, relative_velocity};
use crate::SPECIES;

/// Metal mass fraction of the Sun.
pub const SOLAR_METALLICITY: f64 = 0.0204;

/// Mean molecular weight used when the `mu` parameter is unset.
pub const DEFAULT_MU: f64 = 0.6;

/// Register the gas fields.
pub fn register(registry: &mut FieldRegistry) {
    register_thermodynamics(registry);
    register_kinematics(registry);
    register_observables(registry);
    register_species(registry);
}

fn register_thermodynamics(registry: &mut FieldRegistry) {
    registry.add_field(
        ("gas", "cell_mass"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| cell_mass(ctx),
        FieldOptions::new().units("g"),
    );
    registry.add_field(
        ("gas", "cell_mass_msun"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| cell_mass(ctx),
        FieldOptions::new()
            .units("Msun")
            .convert(|_: &dyn FieldContext| 1.0 / MASS_SUN_CGS),
    );

    // HydroMethod 2 evolves thermal energy directly; otherwise the dual
    // energy formalism decides between gas energy and total minus kinetic.
    registry.add_field(
        ("gas", "thermal_energy"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            if dataset_integer(&*ctx, "HydroMethod", 0) == 2 {
                return ctx.field("gas", "total_energy");
            }
            if dataset_integer(&*ctx, "DualEnergyFormalism", 0) != 0 {
                return ctx.field("gas", "gas_energy");
            }
            let total = ctx.field("gas", "total_energy")?;
            Ok(total - speed_squared(ctx)?)
        },
        FieldOptions::new().units("erg/g"),
    );
    registry.add_field(
        ("gas", "pressure"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let gamma = ctx.dataset_scalar("Gamma")?;
            let rho = ctx.field("gas", "density")?;
            Ok(rho * ctx.field("gas", "thermal_energy")? * (gamma - 1.0))
        },
        FieldOptions::new().units("dyne/cm**2"),
    );
    registry.add_field(
        ("gas", "sound_speed"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let gamma = ctx.dataset_scalar("Gamma")?;
            let p = ctx.field("gas", "pressure")?;
            Ok((p / ctx.field("gas", "density")? * gamma).sqrt())
        },
        FieldOptions::new().units("cm/s"),
    );
    registry.add_field(
        ("gas", "entropy"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let rho = ctx.field("gas", "density")?;
            Ok(rho.pow(Rational::new(-2, 3)) * ctx.field("gas", "temperature")?)
        },
        FieldOptions::new().units("K*cm**2/g**(2/3)"),
    );
    registry.add_field(
        ("gas", "number_density"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let mh = quantity(&*ctx, MASS_HYDROGEN_CGS, "g")?;
            let species = dataset_integer(&*ctx, "MultiSpecies", 0);
            if species == 0 {
                let mu = ctx
                    .parameter("mu")
                    .and_then(|p| p.as_scalar())
                    .unwrap_or(DEFAULT_MU);
                return Ok(ctx.field("gas", "density")? / (mh * mu));
            }
            let mut weighted: Vec<(&str, f64)> = vec![
                ("HI", 1.0),
                ("HII", 1.0),
                ("HeI", 4.0),
                ("HeII", 4.0),
                ("HeIII", 4.0),
                ("Electron", 1.0),
            ];
            if species > 1 {
                weighted.extend([("HM", 1.0), ("H2I", 2.0), ("H2II", 2.0)]);
            }
            if species > 2 {
                weighted.extend([("DI", 2.0), ("DII", 2.0), ("HDI", 3.0)]);
            }
            let mut total: Option<FieldValue> = None;
            for (sp, weight) in weighted {
                let term = ctx.field("gas", &format!("{sp}_density"))? / weight;
                total = Some(match total {
                    Some(sum) => sum + term,
                    None => term,
                });
            }
            let total = total.unwrap_or_else(|| FieldValue::zeros(&ctx.shape()));
            Ok(total / mh)
        },
        FieldOptions::new().units("1/cm**3"),
    );
    registry.add_field(
        ("gas", "dynamical_time"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let g = quantity(&*ctx, GRAVITATIONAL_CONSTANT_CGS, "cm**3/(g*s**2)")?;
            let rho = ctx.field("gas", "density")?;
            Ok(((3.0 * PI / 16.0) / (g * rho)).sqrt())
        },
        FieldOptions::new().units("s"),
    );
}

fn register_kinematics(registry: &mut FieldRegistry) {
    registry.add_field(
        ("gas", "velocity_magnitude"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| Ok(speed_squared(ctx)?.sqrt()),
        FieldOptions::new().units("cm/s"),
    );
    registry.add_field(
        ("gas", "mach_number"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let v = ctx.field("gas", "velocity_magnitude")?;
            Ok(v / ctx.field("gas", "sound_speed")?)
        },
        FieldOptions::new(),
    );
    registry.add_field(
        ("gas", "courant_time_step"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let cs = ctx.field("gas", "sound_speed")?;
            let mut step: Option<FieldValue> = None;
            for (width, velocity) in [
                ("dx", "velocity_x"),
                ("dy", "velocity_y"),
                ("dz", "velocity_z"),
            ] {
                let t = ctx.field("index", width)? / (&cs + ctx.field("gas", velocity)?.abs());
                step = Some(match step {
                    Some(s) => s.minimum(&t),
                    None => t,
                });
            }
            Ok(step.unwrap_or_else(|| FieldValue::zeros(&ctx.shape())))
        },
        FieldOptions::new().units("s"),
    );
    let radial = [Validator::parameters(["center", "bulk_velocity"])];
    registry.add_field(
        ("gas", "radial_velocity"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| radial_velocity(ctx),
        FieldOptions::new()
            .units("cm/s")
            .validators(radial.clone()),
    );
    registry.add_field(
        ("gas", "radial_velocity_kms"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| radial_velocity(ctx),
        FieldOptions::new()
            .units("km/s")
            .convert(|_: &dyn FieldContext| 1e-5)
            .validators(radial),
    );
    registry.add_field(
        ("gas", "specific_angular_momentum"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let [rx, ry, rz] = offsets(ctx)?;
            let [vx, vy, vz] = relative_velocity(ctx)?;
            let lx = &ry * &vz - &rz * &vy;
            let ly = &rz * &vx - &rx * &vz;
            let lz = &rx * &vy - &ry * &vx;
            FieldValue::stack([&lx, &ly, &lz])
        },
        FieldOptions::new()
            .units("cm**2/s")
            .vector()
            .validator(Validator::parameters(["center"])),
    );
}

fn register_observables(registry: &mut FieldRegistry) {
    registry.add_field(
        ("gas", "sz_kinetic"),
        |field: &DerivedField, ctx: &mut dyn FieldContext| {
            let axis = ctx.integer_parameter("axis")?;
            let component = match axis {
                0 => "velocity_x",
                1 => "velocity_y",
                2 => "velocity_z",
                _ => {
                    return Err(FieldError::InvalidParameter {
                        name: "axis".into(),
                        reason: format!("{} needs an axis in 0..=2, got {axis}", field.key()),
                    })
                }
            };
            let coefficient = quantity(&*ctx, 0.88 * CROSS_SECTION_THOMSON_CGS, "cm**2")?
                / (quantity(&*ctx, MASS_HYDROGEN_CGS, "g")?
                    * quantity(&*ctx, SPEED_OF_LIGHT_CGS, "cm/s")?);
            let v = ctx.field("gas", component)?;
            Ok(v * ctx.field("gas", "density")? * coefficient)
        },
        FieldOptions::new()
            .units("1/cm")
            .validator(Validator::parameters(["axis"])),
    );
    registry.add_field(
        ("gas", "sz_y"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let c = quantity(&*ctx, SPEED_OF_LIGHT_CGS, "cm/s")?;
            let coefficient = quantity(&*ctx, 0.88 / MASS_HYDROGEN_CGS, "1/g")?
                * quantity(&*ctx, BOLTZMANN_CGS, "erg/K")?
                * quantity(&*ctx, CROSS_SECTION_THOMSON_CGS, "cm**2")?
                / (quantity(&*ctx, MASS_ELECTRON_CGS, "g")? * &c * &c);
            let rho = ctx.field("gas", "density")?;
            Ok(rho * ctx.field("gas", "temperature")? * coefficient)
        },
        FieldOptions::new().units("1/cm"),
    );
    registry.add_field(
        ("gas", "xray_emissivity"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let coefficient = quantity(&*ctx, 2.168e60, "erg*cm**3/(s*g**2*K**(1/2))")?;
            let rho = ctx.field("gas", "density")?;
            let t = ctx.field("gas", "temperature")?;
            Ok(&rho * &rho * t.sqrt() * coefficient)
        },
        FieldOptions::new()
            .units("erg/(cm**3*s)")
            .projection_conversion("1"),
    );
}

fn register_species(registry: &mut FieldRegistry) {
    for sp in SPECIES {
        let density = FieldKey::new("gas", format!("{sp}_density"));
        let source = density.clone();
        registry.add_field(
            ("gas", format!("{sp}_fraction").as_str()),
            move |_: &DerivedField, ctx: &mut dyn FieldContext| {
                Ok(ctx.get(&source)? / ctx.field("gas", "density")?)
            },
            FieldOptions::new().validator(Validator::data_fields([density])),
        );
    }
    registry.add_field(
        ("gas", "metallicity"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            Ok(ctx.field("gas", "Metal_fraction")? / SOLAR_METALLICITY)
        },
        FieldOptions::new()
            .display_name("Z/Z_sun")
            .projection_conversion("1")
            .validator(Validator::data_fields([FieldKey::new("gas", "Metal_density")])),
    );
}

/// Setup-time metadata and unit overrides on already-registered fields.
pub fn apply_overrides(registry: &mut FieldRegistry) {
    for name in ["velocity_magnitude", "radial_velocity", "radial_velocity_kms"] {
        patch(registry, name, |meta| {
            meta.take_log = false;
            meta.line_integral = false;
            meta.projection_conversion = "1".to_string();
        });
    }
    for sp in SPECIES {
        let label = format!("{sp} fraction");
        patch(registry, &format!("{sp}_fraction"), move |meta| {
            meta.display_name = Some(label);
        });
    }
    let energy = FieldKey::new("gas", "thermal_energy");
    let convert = Arc::new(|ctx: &dyn FieldContext| ctx.convert("specific_energy"));
    if let Err(err) = registry.override_convert(&energy, convert) {
        warn!(field = %energy, error = %err, "override skipped");
    }
}

fn patch(
    registry: &mut FieldRegistry,
    name: &str,
    edit: impl FnOnce(&mut quarry_fields::FieldMetadata),
) {
    let key = FieldKey::new("gas", name);
    if let Err(err) = registry.override_metadata(&key, edit) {
        warn!(field = %key, error = %err, "override skipped");
    }
}

fn speed_squared(ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
    let vx = ctx.field("gas", "velocity_x")?;
    let vy = ctx.field("gas", "velocity_y")?;
    let vz = ctx.field("gas", "velocity_z")?;
    Ok(&vx * &vx + &vy * &vy + &vz * &vz)
}

fn cell_mass(ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
    Ok(ctx.field("gas", "density")? * ctx.field("index", "cell_volume")?)
}

fn radial_velocity(ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
    let [rx, ry, rz] = offsets(ctx)?;
    let [vx, vy, vz] = relative_velocity(ctx)?;
    let r = ctx.field("gas", "radius")?;
    Ok((rx * vx + ry * vy + rz * vz) / r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Parameter;
    use quarry_fields::evaluate;
    use quarry_test_utils::MockContext;
    use ndarray::arr1;
    use quarry_units::UnitRegistry;

    fn tagged(values: &[f64], units: &str) -> FieldValue {
        let unit = UnitRegistry::default().parse(units).unwrap();
        FieldValue::tagged(arr1(values).into_dyn(), unit)
    }

    fn context() -> MockContext {
        let mut registry = FieldRegistry::new();
        register(&mut registry);
        apply_overrides(&mut registry);
        let registry = Arc::new(registry);
        MockContext::new(&[2])
            .with_raw(("gas", "density"), tagged(&[1.0, 2.0], "g/cm**3"))
            .with_raw(("gas", "temperature"), tagged(&[100.0, 400.0], "K"))
            .with_raw(("gas", "velocity_x"), tagged(&[3.0, 0.0], "cm/s"))
            .with_raw(("gas", "velocity_y"), tagged(&[4.0, 0.0], "cm/s"))
            .with_raw(("gas", "velocity_z"), tagged(&[0.0, 0.0], "cm/s"))
            .with_raw(("gas", "gas_energy"), tagged(&[6.0, 6.0], "erg/g"))
            .with_raw(("gas", "total_energy"), tagged(&[30.0, 30.0], "erg/g"))
            .with_dataset_parameter("Gamma", 1.5)
            .with_evaluator(move |key: &FieldKey, ctx: &mut dyn FieldContext| {
                registry.contains(key).then(|| evaluate(&registry, key, ctx))
            })
    }

    fn values(v: &FieldValue) -> Vec<f64> {
        v.data().iter().copied().collect()
    }

    #[test]
    fn velocity_magnitude() {
        let mut ctx = context();
        let v = ctx.field("gas", "velocity_magnitude").unwrap();
        assert_eq!(values(&v), vec![5.0, 0.0]);
    }

    #[test]
    fn thermal_energy_follows_hydro_method() {
        let mut ctx = context();
        assert_eq!(values(&ctx.field("gas", "thermal_energy").unwrap()), vec![5.0, 30.0]);

        let mut ctx = context().with_dataset_parameter("DualEnergyFormalism", 1i64);
        assert_eq!(values(&ctx.field("gas", "thermal_energy").unwrap()), vec![6.0, 6.0]);

        let mut ctx = context().with_dataset_parameter("HydroMethod", 2i64);
        assert_eq!(values(&ctx.field("gas", "thermal_energy").unwrap()), vec![30.0, 30.0]);
    }

    #[test]
    fn pressure_and_sound_speed() {
        let mut ctx = context().with_dataset_parameter("DualEnergyFormalism", 1i64);
        let p = ctx.field("gas", "pressure").unwrap();
        assert_eq!(values(&p), vec![3.0, 6.0]);
        let cs = ctx.field("gas", "sound_speed").unwrap();
        assert!(values(&cs).iter().all(|c| (c - 4.5f64.sqrt()).abs() < 1e-12));
        let mach = ctx.field("gas", "mach_number").unwrap();
        assert!(mach.units().is_dimensionless());
    }

    #[test]
    fn pressure_needs_gamma() {
        let registry = {
            let mut r = FieldRegistry::new();
            register(&mut r);
            Arc::new(r)
        };
        let mut ctx = MockContext::new(&[1])
            .with_raw(("gas", "density"), tagged(&[1.0], "g/cm**3"))
            .with_raw(("gas", "total_energy"), tagged(&[1.0], "erg/g"))
            .with_raw(("gas", "velocity_x"), tagged(&[0.0], "cm/s"))
            .with_raw(("gas", "velocity_y"), tagged(&[0.0], "cm/s"))
            .with_raw(("gas", "velocity_z"), tagged(&[0.0], "cm/s"))
            .with_evaluator(move |key: &FieldKey, ctx: &mut dyn FieldContext| {
                registry.contains(key).then(|| evaluate(&registry, key, ctx))
            });
        assert!(matches!(
            ctx.field("gas", "pressure"),
            Err(FieldError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn number_density_uses_mu() {
        let mut ctx = context().with_parameter("mu", 1.0);
        let n = ctx.field("gas", "number_density").unwrap();
        let n = values(&n);
        assert!((n[0] * MASS_HYDROGEN_CGS - 1.0).abs() < 1e-12);
        assert!((n[1] * MASS_HYDROGEN_CGS - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sz_kinetic_rejects_bad_axis() {
        let mut ctx = context().with_parameter("axis", 5i64);
        assert!(matches!(
            ctx.field("gas", "sz_kinetic"),
            Err(FieldError::InvalidParameter { .. })
        ));
        let mut ctx = context().with_parameter("axis", Parameter::Integer(0));
        let sz = values(&ctx.field("gas", "sz_kinetic").unwrap());
        assert!(sz[0] > 0.0);
        assert_eq!(sz[1], 0.0);
    }

    #[test]
    fn observables_have_declared_units() {
        let mut ctx = context();
        let y = ctx.field("gas", "sz_y").unwrap();
        let per_cm = ctx.unit("1/cm").unwrap();
        assert!(y.unit().unwrap().is_compatible_with(&per_cm));
        let x = values(&ctx.field("gas", "xray_emissivity").unwrap());
        assert!((x[0] - 2.168e61).abs() / 2.168e61 < 1e-12);
        let t = values(&ctx.field("gas", "dynamical_time").unwrap());
        let expected = (3.0 * PI / (16.0 * GRAVITATIONAL_CONSTANT_CGS)).sqrt();
        assert!((t[0] - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn species_fractions_need_their_density() {
        let mut ctx = context();
        let err = ctx.field("gas", "HI_fraction").unwrap_err();
        assert!(err.is_recoverable());
        let mut ctx = context()
            .with_raw(("gas", "HI_density"), tagged(&[0.5, 0.5], "g/cm**3"))
            .with_raw(("gas", "Metal_density"), tagged(&[0.0204, 0.0408], "g/cm**3"));
        assert_eq!(values(&ctx.field("gas", "HI_fraction").unwrap()), vec![0.5, 0.25]);
        let z = ctx.field("gas", "metallicity").unwrap();
        assert!(values(&z).iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn overrides_are_applied() {
        let mut registry = FieldRegistry::new();
        register(&mut registry);
        apply_overrides(&mut registry);
        let v = registry.resolve(&("gas", "velocity_magnitude").into()).unwrap();
        assert!(!v.take_log());
        assert_eq!(v.metadata().projection_conversion, "1");
        let hi = registry.resolve(&("gas", "HI_fraction").into()).unwrap();
        assert_eq!(hi.metadata().display_name.as_deref(), Some("HI fraction"));
    }
}
