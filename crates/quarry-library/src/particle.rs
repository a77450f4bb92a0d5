//! Per-particle fields, and cell fields deposited from particles.

use ndarray::{ArrayD, IxDyn};
use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue, SpatialInfo};
use quarry_fields::{DerivedField, FieldOptions, FieldRegistry, Validator};
use quarry_units::constants::MASS_SUN_CGS;
use quarry_units::Unit;

use crate::util::spatial;

const POSITIONS: [&str; 3] = [
    "particle_position_x",
    "particle_position_y",
    "particle_position_z",
];

/// Register the particle fields under the `all` category.
pub fn register(registry: &mut FieldRegistry) {
    registry.add_field(
        ("all", "particle_ones"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let mass = ctx.field("all", "particle_mass")?;
            Ok(FieldValue::ones(mass.shape()))
        },
        FieldOptions::new().particle().take_log(false),
    );
    registry.add_field(
        ("all", "particle_mass_msun"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| ctx.field("all", "particle_mass"),
        FieldOptions::new()
            .particle()
            .units("Msun")
            .convert(|_: &dyn FieldContext| 1.0 / MASS_SUN_CGS),
    );
}

// ── Deposition ─────────────────────────────────────────────────

/// How particle values are gathered onto cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepositMethod {
    /// Particles per cell.
    Count,
    /// Sum of the field over the particles in each cell.
    Sum,
    /// Cloud-in-cell: each particle is shared among the eight nearest
    /// cell centres with trilinear weights.
    Cic,
    /// Weighted mean of the field; zero in cells without particles.
    WeightedMean,
}

impl DepositMethod {
    /// Every method.
    pub const ALL: [DepositMethod; 4] = [
        DepositMethod::Count,
        DepositMethod::Sum,
        DepositMethod::Cic,
        DepositMethod::WeightedMean,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Cic => "cic",
            Self::WeightedMean => "avg",
        }
    }
}

/// Register a `deposit` field gathering the particle field `source`
/// (in `units`) onto cells. Returns its key.
///
/// Counts are named `<ptype>_count` and are dimensionless; the other
/// methods give `<ptype>_<method>_<name>` in the source units, with any
/// `particle_` prefix dropped from `name`. `weight` names the particle
/// field used by [`DepositMethod::WeightedMean`], `particle_mass` when
/// absent. Particles go to the cell holding them, clamped to the patch,
/// so deposited totals match the particle totals on every decomposition.
pub fn add_deposited_particle_field(
    registry: &mut FieldRegistry,
    source: impl Into<FieldKey>,
    method: DepositMethod,
    units: &Unit,
    weight: Option<&str>,
) -> FieldKey {
    let source = source.into();
    let ptype = source.category().to_string();
    let name = match method {
        DepositMethod::Count => format!("{ptype}_count"),
        _ => {
            let short = source.name().strip_prefix("particle_").unwrap_or(source.name());
            format!("{ptype}_{}_{short}", method.label())
        }
    };
    let weight = FieldKey::new(ptype.as_str(), weight.unwrap_or("particle_mass"));
    let options = match method {
        DepositMethod::Count => FieldOptions::new().take_log(false),
        _ => FieldOptions::new().units(units.to_string()),
    };
    registry.add_field(
        ("deposit", name.as_str()),
        move |field: &DerivedField, ctx: &mut dyn FieldContext| {
            deposit(field, ctx, &source, method, &weight)
        },
        options.validator(Validator::spatial(0)),
    )
}

fn deposit(
    field: &DerivedField,
    ctx: &mut dyn FieldContext,
    source: &FieldKey,
    method: DepositMethod,
    weight: &FieldKey,
) -> Result<FieldValue, FieldError> {
    let info = spatial(field, &*ctx)?;
    let positions = cell_coordinates(ctx, source.category(), &info)?;
    let count = positions.len();
    let dims = IxDyn(&info.dimensions);
    let nearest = |p: &[f64; 3]| {
        IxDyn(&[0, 1, 2].map(|a| clamp(p[a].floor(), info.dimensions[a])))
    };

    if method == DepositMethod::Count {
        let mut cells = ArrayD::zeros(dims);
        for p in &positions {
            cells[nearest(p)] += 1.0;
        }
        return Ok(FieldValue::bare(cells));
    }

    let values = particle_values(field, ctx, source, count)?;
    let mut cells = ArrayD::zeros(dims.clone());
    match method {
        DepositMethod::Sum => {
            for (p, v) in positions.iter().zip(values.data()) {
                cells[nearest(p)] += v;
            }
        }
        DepositMethod::Cic => {
            for (p, v) in positions.iter().zip(values.data()) {
                for (index, share) in cic_shares(p, &info.dimensions) {
                    cells[IxDyn(&index)] += v * share;
                }
            }
        }
        DepositMethod::WeightedMean => {
            let weights = particle_values(field, ctx, weight, count)?;
            let mut total = ArrayD::<f64>::zeros(dims);
            for ((p, v), w) in positions.iter().zip(values.data()).zip(weights.data()) {
                let index = nearest(p);
                cells[index.clone()] += v * w;
                total[index] += w;
            }
            cells.zip_mut_with(&total, |c, &t| *c = if t > 0.0 { *c / t } else { 0.0 });
        }
        DepositMethod::Count => {}
    }
    Ok(FieldValue::new(cells, values.units().clone()))
}

/// Particle positions in fractional cell coordinates of the patch.
fn cell_coordinates(
    ctx: &mut dyn FieldContext,
    ptype: &str,
    info: &SpatialInfo,
) -> Result<Vec<[f64; 3]>, FieldError> {
    let code_length = ctx.unit("code_length")?;
    let mut axes = Vec::with_capacity(3);
    for name in POSITIONS {
        axes.push(ctx.field(ptype, name)?.convert_to(&code_length)?);
    }
    let count = axes[0].len();
    if axes.iter().any(|a| a.len() != count) {
        return Err(FieldError::ComputeFailed {
            key: FieldKey::new(ptype, "particle_position"),
            reason: "position components differ in length".into(),
        });
    }
    let coordinate = |a: usize, x: f64| (x - info.left_edge[a]) / info.cell_widths[a];
    let mut positions = vec![[0.0; 3]; count];
    for (a, axis) in axes.iter().enumerate() {
        for (p, x) in positions.iter_mut().zip(axis.data()) {
            p[a] = coordinate(a, *x);
        }
    }
    Ok(positions)
}

fn particle_values(
    field: &DerivedField,
    ctx: &mut dyn FieldContext,
    key: &FieldKey,
    count: usize,
) -> Result<FieldValue, FieldError> {
    let values = ctx.get(key)?;
    if values.len() != count {
        return Err(FieldError::ComputeFailed {
            key: field.key().clone(),
            reason: format!("{key} has {} values for {count} particles", values.len()),
        });
    }
    Ok(values)
}

fn clamp(cell: f64, n: usize) -> usize {
    if cell <= 0.0 || n == 0 {
        0
    } else {
        (cell as usize).min(n - 1)
    }
}

/// The eight `(cell, weight)` pairs of a cloud-in-cell deposit.
fn cic_shares(p: &[f64; 3], dims: &[usize; 3]) -> impl Iterator<Item = ([usize; 3], f64)> {
    let base = p.map(|x| (x - 0.5).floor());
    let frac = [0, 1, 2].map(|a| p[a] - 0.5 - base[a]);
    let dims = *dims;
    (0..8).map(move |corner| {
        let mut index = [0; 3];
        let mut share = 1.0;
        for a in 0..3 {
            let upper = (corner >> a) & 1 == 1;
            let cell = if upper { base[a] + 1.0 } else { base[a] };
            index[a] = clamp(cell, dims[a]);
            share *= if upper { frac[a] } else { 1.0 - frac[a] };
        }
        (index, share)
    })
}
