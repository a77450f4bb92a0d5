//! Seeded fake datasets and standard field parameters.
//!
//! - [`FakeDataset`] builds a [`Dataset`] of uniform random cell (and
//!   optionally particle) data from a fixed seed.
//! - [`base_dataset`] is the dataset every library field can be computed
//!   on: all raw fields the library reads plus the dataset parameters it
//!   needs.
//! - [`get_params`] returns the runtime parameters field tests set.

use ndarray::{Array1, Array3};
use quarry_core::Parameter;
use quarry_fields::{FieldRegistry, RegistryConfig};
use quarry_grid::{Dataset, DatasetConfig};
use quarry_library::{standard_registry_with, SPECIES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Default seed for fixtures.
pub const DEFAULT_SEED: u64 = 0x5eed;

/// Builder for a dataset filled with seeded random values.
///
/// Fields whose name contains `velocity` are uniform in `[-0.5, 0.5)`;
/// everything else is uniform in `[0.5, 1.5)` so that powers and roots
/// stay finite.
#[derive(Clone, Debug)]
pub struct FakeDataset {
    pub n: usize,
    pub nprocs: usize,
    pub particles: usize,
    pub seed: u64,
    pub fields: Vec<(String, String)>,
    pub registry: RegistryConfig,
}

impl FakeDataset {
    /// An `n`³ single-grid dataset with density and velocity fields.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            nprocs: 1,
            particles: 0,
            seed: DEFAULT_SEED,
            fields: default_fields(),
            registry: RegistryConfig::default(),
        }
    }

    pub fn nprocs(mut self, nprocs: usize) -> Self {
        self.nprocs = nprocs;
        self
    }

    pub fn particles(mut self, count: usize) -> Self {
        self.particles = count;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fields(mut self, fields: Vec<(String, String)>) -> Self {
        self.fields = fields;
        self
    }

    pub fn legacy(mut self) -> Self {
        self.registry = RegistryConfig::legacy();
        self
    }

    /// Build with the standard field library.
    pub fn build(&self) -> Dataset {
        let registry =
            standard_registry_with(self.registry.clone()).expect("fixture registry config is valid");
        self.build_with(registry)
    }

    /// Build around a caller-supplied registry.
    pub fn build_with(&self, registry: FieldRegistry) -> Dataset {
        let mut ds = Dataset::new(DatasetConfig::cube(self.n, self.nprocs), registry)
            .expect("fixture dataset config is valid");
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n = self.n;
        for (name, units) in &self.fields {
            let centered = name.contains("velocity");
            let data = Array3::from_shape_fn((n, n, n), |_| sample(&mut rng, centered));
            ds.add_cell_field(name.as_str(), data, units)
                .expect("fixture cell field is valid");
        }
        if self.particles > 0 {
            for (name, units) in particle_fields() {
                let centered = name.contains("velocity");
                let data = if name.starts_with("particle_position") {
                    Array1::from_shape_fn(self.particles, |_| rng.gen::<f64>())
                } else {
                    Array1::from_shape_fn(self.particles, |_| sample(&mut rng, centered))
                };
                ds.add_particle_field(name, data, units)
                    .expect("fixture particle field is valid");
            }
        }
        ds
    }
}

fn sample(rng: &mut ChaCha8Rng, centered: bool) -> f64 {
    let r: f64 = rng.gen();
    if centered {
        r - 0.5
    } else {
        r + 0.5
    }
}

/// Density and the three velocity components, in CGS.
pub fn default_fields() -> Vec<(String, String)> {
    [
        ("density", "g/cm**3"),
        ("velocity_x", "cm/s"),
        ("velocity_y", "cm/s"),
        ("velocity_z", "cm/s"),
    ]
    .into_iter()
    .map(|(n, u)| (n.to_string(), u.to_string()))
    .collect()
}

/// Every raw gas field the standard library reads.
pub fn base_fields() -> Vec<(String, String)> {
    let mut fields = default_fields();
    fields.extend(
        [
            ("temperature", "K"),
            ("gas_energy", "erg/g"),
            ("total_energy", "erg/g"),
        ]
        .into_iter()
        .map(|(n, u)| (n.to_string(), u.to_string())),
    );
    fields.extend(
        SPECIES
            .iter()
            .map(|sp| (format!("{sp}_density"), "g/cm**3".to_string())),
    );
    fields
}

fn particle_fields() -> [(&'static str, &'static str); 7] {
    [
        ("particle_position_x", "code_length"),
        ("particle_position_y", "code_length"),
        ("particle_position_z", "code_length"),
        ("particle_velocity_x", "cm/s"),
        ("particle_velocity_y", "cm/s"),
        ("particle_velocity_z", "cm/s"),
        ("particle_mass", "g"),
    ]
}

/// A single-patch random dataset with the standard library.
pub fn fake_random_dataset(n: usize, nprocs: usize, seed: u64) -> Dataset {
    FakeDataset::new(n).nprocs(nprocs).seed(seed).build()
}

/// A 4³ dataset with every base field, 20 particles and the dataset
/// parameters the library reads.
pub fn base_dataset(nprocs: usize) -> Dataset {
    configure(FakeDataset::new(4).nprocs(nprocs).particles(20).fields(base_fields()).build())
}

/// [`base_dataset`] in legacy unit mode.
pub fn legacy_base_dataset(nprocs: usize) -> Dataset {
    configure(
        FakeDataset::new(4)
            .nprocs(nprocs)
            .particles(20)
            .fields(base_fields())
            .legacy()
            .build(),
    )
}

fn configure(mut ds: Dataset) -> Dataset {
    ds.set_dataset_parameter("Gamma", 5.0 / 3.0);
    ds.set_dataset_parameter("mu", 0.6);
    ds.set_dataset_parameter("HydroMethod", 0i64);
    ds.set_dataset_parameter("DualEnergyFormalism", 1i64);
    ds.set_dataset_parameter("MultiSpecies", 3i64);
    ds
}

/// Runtime parameters used by field tests.
pub fn get_params() -> Vec<(&'static str, Parameter)> {
    vec![
        ("axis", Parameter::Integer(0)),
        ("center", Parameter::Vector([0.0; 3])),
        ("bulk_velocity", Parameter::Vector([0.0; 3])),
        ("height_vector", Parameter::Vector([0.0, 0.0, 1.0])),
        ("normal", Parameter::Vector([0.0, 0.0, 1.0])),
    ]
}
