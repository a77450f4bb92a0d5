//! Integration test: every standard field on the base dataset.
//!
//! Each field is evaluated on the whole domain for several grid
//! decompositions. Results must be repeatable, must not depend on how the
//! domain is split, and must agree between legacy and unit-aware modes.

use quarry_core::{FieldContext, FieldKey, FieldValue};
use quarry_grid::{AllData, Dataset};
use quarry_test_utils::{base_dataset, get_params, init_test_logging, legacy_base_dataset};
use quarry_units::constants::MASS_SUN_CGS;

const CELLS: usize = 64;
const PARTICLES: usize = 20;

fn with_params(ds: &Dataset) -> AllData<'_> {
    let mut all = ds.all_data();
    for (name, value) in get_params() {
        all.set_parameter(name, value);
    }
    all
}

fn close(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

fn evaluate_all(ds: &Dataset) -> Vec<(FieldKey, FieldValue)> {
    let mut all = with_params(ds);
    ds.derived_field_list()
        .into_iter()
        .map(|key| {
            let value = all
                .get(&key)
                .unwrap_or_else(|e| panic!("{key} failed to evaluate: {e}"));
            (key, value)
        })
        .collect()
}

#[test]
fn every_field_evaluates_with_the_expected_length() {
    init_test_logging();
    for nprocs in [1, 4, 8] {
        let ds = base_dataset(nprocs);
        for (key, value) in evaluate_all(&ds) {
            let field = ds.registry().resolve(&key).unwrap();
            let expected = if field.is_particle() { PARTICLES } else { CELLS };
            let len = if field.is_vector() {
                assert_eq!(value.shape()[0], 3, "{key}");
                value.shape()[1]
            } else {
                value.len()
            };
            assert_eq!(len, expected, "{key} on {nprocs} grids");
            assert!(
                value.data().iter().all(|v| v.is_finite()),
                "{key} has non-finite values"
            );
        }
    }
}

#[test]
fn evaluation_is_repeatable() {
    let ds = base_dataset(4);
    let mut all = with_params(&ds);
    for key in ds.derived_field_list() {
        let first = all.get(&key).unwrap();
        all.clear_data();
        let second = all.get(&key).unwrap();
        assert_eq!(first.data(), second.data(), "{key}");
    }
}

#[test]
fn totals_do_not_depend_on_the_decomposition() {
    let reference = evaluate_all(&base_dataset(1));
    for nprocs in [4, 8] {
        let split = evaluate_all(&base_dataset(nprocs));
        for ((key, a), (_, b)) in reference.iter().zip(&split) {
            if key.name() == "grid_indices" {
                continue;
            }
            assert!(
                close(a.sum(), b.sum()),
                "{key}: {} on one grid vs {} on {nprocs}",
                a.sum(),
                b.sum()
            );
        }
    }
}

#[test]
fn legacy_mode_matches_unit_aware_mode() {
    let aware = evaluate_all(&base_dataset(1));
    let legacy = evaluate_all(&legacy_base_dataset(1));
    assert_eq!(aware.len(), legacy.len());
    for ((key, a), (_, b)) in aware.iter().zip(&legacy) {
        for (x, y) in a.data().iter().zip(b.data().iter()) {
            assert!(close(*x, *y), "{key}: {x} vs {y}");
        }
    }
}

#[test]
fn stencil_fields_are_zero_only_outside_the_domain() {
    let ds = base_dataset(8);
    let mut all = with_params(&ds);
    let smoothed = all.field("gas", "smoothed_density").unwrap();
    assert!(smoothed.data().iter().all(|v| *v > 0.0));
    let averaged = all.field("gas", "averaged_density").unwrap();
    assert!(averaged.data().iter().all(|v| *v > 0.0));
}

#[test]
fn dependencies_of_standard_fields() {
    let ds = base_dataset(1);
    let deps = |category: &str, name: &str| -> Vec<String> {
        ds.get_dependencies(&FieldKey::new(category, name))
            .unwrap()
            .into_iter()
            .map(|k| k.name().to_string())
            .collect()
    };
    assert_eq!(deps("gas", "cell_mass"), vec!["density"]);
    assert_eq!(
        deps("gas", "velocity_magnitude"),
        vec!["velocity_x", "velocity_y", "velocity_z"]
    );
    assert_eq!(deps("gas", "metallicity"), vec!["Metal_density", "density"]);
    assert!(deps("index", "dx").is_empty());
    assert_eq!(deps("all", "particle_mass_msun"), vec!["particle_mass"]);
}

#[test]
fn no_standard_field_fails_detection() {
    let ds = base_dataset(1);
    let failures = ds.registry().check_derived_fields();
    assert!(failures.is_empty(), "{failures:?}");
}

#[test]
fn aliases_of_library_fields() {
    let ds = base_dataset(1);
    let mut all = with_params(&ds);
    let abs = all.field("gas", "radial_velocity_abs").unwrap();
    let signed = all.field("gas", "radial_velocity").unwrap();
    assert_eq!(abs.data(), signed.abs().data());

    // Convert routines are ignored in unit-aware mode, so `_code` is the base.
    let msun = all.field("gas", "cell_mass_msun").unwrap();
    let code = all.field("gas", "cell_mass_msun_code").unwrap();
    assert_eq!(msun.data(), code.data());

    // In legacy mode `_code` divides the raw value by the base's convert.
    let legacy = legacy_base_dataset(1);
    let mut all = with_params(&legacy);
    let grams = all.field("gas", "cell_mass").unwrap();
    let code = all.field("gas", "cell_mass_msun_code").unwrap();
    assert_eq!(code.len(), grams.len());
    for (g, c) in grams.data().iter().zip(code.data().iter()) {
        assert!(close(*c, g * MASS_SUN_CGS), "{c} vs {}", g * MASS_SUN_CGS);
    }
}
