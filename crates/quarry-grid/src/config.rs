//! Dataset configuration.

use quarry_fields::ConfigError;
use quarry_units::CodeUnits;

use crate::edge::EdgeBehavior;

/// Geometry and behavior of an in-memory [`Dataset`](crate::Dataset).
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetConfig {
    /// Cells along each axis. Default: `[16, 16, 16]`.
    pub domain_dimensions: [usize; 3],
    /// Left domain edge in code length. Default: origin.
    pub domain_left_edge: [f64; 3],
    /// Right domain edge in code length. Default: `[1, 1, 1]`.
    pub domain_right_edge: [f64; 3],
    /// Number of grid patches; a power of two. Default: 1.
    pub nprocs: usize,
    /// Ghost-cell fill at the domain boundary. Default: clamp.
    pub edge_behavior: EdgeBehavior,
    /// Retry stencil fields on a ghost-padded patch instead of failing.
    /// Default: `true`.
    pub auto_ghost_zones: bool,
    /// Code units for the dataset's unit registry.
    pub code_units: CodeUnits,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            domain_dimensions: [16; 3],
            domain_left_edge: [0.0; 3],
            domain_right_edge: [1.0; 3],
            nprocs: 1,
            edge_behavior: EdgeBehavior::Clamp,
            auto_ghost_zones: true,
            code_units: CodeUnits::default(),
        }
    }
}

impl DatasetConfig {
    /// A cube of `n` cells per side split into `nprocs` patches.
    pub fn cube(n: usize, nprocs: usize) -> Self {
        Self {
            domain_dimensions: [n; 3],
            nprocs,
            ..Self::default()
        }
    }

    /// Width of one cell along each axis, in code length.
    pub fn cell_widths(&self) -> [f64; 3] {
        [0, 1, 2].map(|a| {
            (self.domain_right_edge[a] - self.domain_left_edge[a])
                / self.domain_dimensions[a] as f64
        })
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain_dimensions.contains(&0) {
            return Err(ConfigError::InvalidDomain {
                reason: format!("dimensions {:?} must be positive", self.domain_dimensions),
            });
        }
        for a in 0..3 {
            let (l, r) = (self.domain_left_edge[a], self.domain_right_edge[a]);
            if !(l.is_finite() && r.is_finite() && r > l) {
                return Err(ConfigError::InvalidDomain {
                    reason: format!("axis {a} has edges [{l}, {r}]"),
                });
            }
        }
        if self.nprocs == 0 || !self.nprocs.is_power_of_two() {
            return Err(ConfigError::InvalidDomain {
                reason: format!("nprocs must be a power of two, got {}", self.nprocs),
            });
        }
        let code = &self.code_units;
        if [code.length_cm, code.mass_g, code.time_s]
            .iter()
            .any(|v| !(v.is_finite() && *v > 0.0))
        {
            return Err(ConfigError::InvalidDomain {
                reason: format!("code units {code:?} must be positive"),
            });
        }
        Ok(())
    }
}
