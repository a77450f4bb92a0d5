//! Benchmark profiles for the Quarry derived-field engine.
//!
//! - [`reference_profile`]: 32³ cells over 8 grids with every raw field
//!   the standard library reads
//! - [`stress_profile`]: 64³ cells over 64 grids
//! - [`profile_fields`]: a cross-section of the library exercised by the
//!   evaluation benchmarks

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use quarry_core::FieldKey;
use quarry_grid::Dataset;
use quarry_test_utils::{base_fields, FakeDataset};

/// 32³ cells split over 8 grids, 1000 particles.
pub fn reference_profile(seed: u64) -> Dataset {
    profile(32, 8, 1_000, seed)
}

/// 64³ cells split over 64 grids, 10000 particles.
pub fn stress_profile(seed: u64) -> Dataset {
    profile(64, 64, 10_000, seed)
}

fn profile(n: usize, nprocs: usize, particles: usize, seed: u64) -> Dataset {
    let mut ds = FakeDataset::new(n)
        .nprocs(nprocs)
        .particles(particles)
        .seed(seed)
        .fields(base_fields())
        .build();
    ds.set_dataset_parameter("Gamma", 5.0 / 3.0);
    ds.set_dataset_parameter("DualEnergyFormalism", 1i64);
    ds.set_dataset_parameter("MultiSpecies", 3i64);
    ds
}

/// Fields covering plain arithmetic, deep dependency chains, stencils
/// and particles.
pub fn profile_fields() -> Vec<FieldKey> {
    [
        ("gas", "cell_mass"),
        ("gas", "velocity_magnitude"),
        ("gas", "mach_number"),
        ("gas", "number_density"),
        ("gas", "courant_time_step"),
        ("gas", "div_v"),
        ("all", "particle_mass_msun"),
    ]
    .into_iter()
    .map(FieldKey::from)
    .collect()
}
