//! Integration test: grids and the whole-domain container on a seeded
//! dataset with the standard field library.

use std::thread;

use quarry_core::{FieldContext, FieldKey};
use quarry_grid::Dataset;
use quarry_test_utils::{base_dataset, get_params, init_test_logging};

fn parameterized_grids(ds: &Dataset) -> Vec<quarry_grid::Grid<'_>> {
    ds.grids()
        .into_iter()
        .map(|mut g| {
            g.update_parameters(get_params());
            g
        })
        .collect()
}

#[test]
fn grids_tile_the_domain() {
    let ds = base_dataset(8);
    let total: usize = ds.regions().iter().map(|r| r.cell_count()).sum();
    assert_eq!(total, 64);
    for mut grid in ds.grids() {
        let dims = grid.region().dims();
        let density = grid.field("gas", "density").unwrap();
        assert_eq!(density.shape(), &dims[..]);
    }
}

#[test]
fn stencil_fields_retry_with_ghost_zones() {
    init_test_logging();
    let ds = base_dataset(8);
    for mut grid in parameterized_grids(&ds) {
        let dims = grid.region().dims();
        for name in ["div_v", "averaged_density", "smoothed_density"] {
            let value = grid.field("gas", name).unwrap();
            assert_eq!(value.shape(), &dims[..], "{name}");
        }
        assert_eq!(grid.ghost_zones(), 0);
    }
}

#[test]
fn padded_grids_serve_neighbour_cells() {
    let ds = base_dataset(8);
    let grid = ds.grid(0).unwrap();
    let mut padded = grid.with_ghost_zones(1);
    let density = padded.field("gas", "density").unwrap();
    let dims = grid.region().dims();
    assert_eq!(density.shape(), &[dims[0] + 2, dims[1] + 2, dims[2] + 2]);
}

#[test]
fn grids_can_be_evaluated_in_parallel() {
    let ds = base_dataset(8);
    let key = FieldKey::new("gas", "velocity_magnitude_abs");
    let sums: Vec<f64> = thread::scope(|s| {
        let handles: Vec<_> = parameterized_grids(&ds)
            .into_iter()
            .map(|mut grid| {
                let key = key.clone();
                s.spawn(move || grid.get(&key).map(|v| v.sum()))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });
    let mut all = ds.all_data();
    let whole = all.get(&key).unwrap().sum();
    let parts: f64 = sums.iter().sum();
    assert!((whole - parts).abs() <= 1e-9 * whole.abs());
    assert!(ds.registry().synthesized_count() >= 1);
}

#[test]
fn parameters_reach_fallback_grids() {
    let ds = base_dataset(4);
    let mut all = ds.all_data();
    assert!(all.field("gas", "radius").unwrap_err().is_recoverable());
    for (name, value) in get_params() {
        all.set_parameter(name, value);
    }
    let radius = all.field("gas", "radius").unwrap();
    assert_eq!(radius.len(), 64);
    assert!(radius.data().iter().all(|r| *r > 0.0));
}
