//! Finite-difference and smoothing fields that read neighbouring cells.
//!
//! Each routine runs on a patch padded with the ghost zones its spatial
//! validator asks for. Cell widths come from the patch geometry rather
//! than from `(index, dx)`, whose own validator only accepts an unpadded
//! patch.

use ndarray::{ArrayD, IxDyn, Slice};
use quarry_core::{FieldContext, FieldError, FieldKey, FieldValue, SpatialInfo};
use quarry_fields::{DerivedField, FieldOptions, FieldRegistry, Validator};
use quarry_units::{Dimensions, Unit};

use crate::util::{dataset_integer, quantity, spatial};

const VELOCITIES: [&str; 3] = ["velocity_x", "velocity_y", "velocity_z"];

const AXES: [&str; 3] = ["x", "y", "z"];

/// Register the stencil fields.
pub fn register(registry: &mut FieldRegistry) {
    registry.add_field(
        ("gas", "div_v"),
        div_v,
        FieldOptions::new()
            .units("1/s")
            .convert(|ctx: &dyn FieldContext| 1.0 / ctx.convert("cm"))
            .validator(Validator::spatial_with_fields(
                1,
                VELOCITIES.map(|v| ("gas", v)),
            )),
    );
    registry.add_field(
        ("gas", "averaged_density"),
        averaged_density,
        FieldOptions::new()
            .units("g/cm**3")
            .validator(Validator::spatial(1)),
    );
    registry.add_field(
        ("gas", "smoothed_density"),
        smoothed_density,
        FieldOptions::new()
            .units("g/cm**3")
            .validator(Validator::spatial(2)),
    );
}

/// Register `<name>_gradient_{x,y,z,magnitude}` for `source`, whose values
/// are in `units`. Returns the new keys in that order.
///
/// Components are central differences over one ghost zone, declared in
/// the CGS unit of `units` per centimetre (`g/cm**4` for a density,
/// `1/cm` for a dimensionless field). The outer layer of cells is zero.
pub fn add_gradient_fields(
    registry: &mut FieldRegistry,
    source: impl Into<FieldKey>,
    units: &Unit,
) -> Vec<FieldKey> {
    let source = source.into();
    let target = Unit::cgs(units.dims().divide(&Dimensions::LENGTH)).to_string();
    let named = |suffix: &str| source.with_name(format!("{}_gradient_{suffix}", source.name()));

    let mut keys = Vec::with_capacity(4);
    for (axis, suffix) in AXES.iter().enumerate() {
        let base = source.clone();
        keys.push(registry.add_field(
            named(suffix),
            move |field: &DerivedField, ctx: &mut dyn FieldContext| {
                gradient(field, ctx, &base, axis)
            },
            FieldOptions::new()
                .units(target.clone())
                .convert(|ctx: &dyn FieldContext| 1.0 / ctx.convert("cm"))
                .validator(Validator::spatial_with_fields(1, [source.clone()])),
        ));
    }

    let components = keys.clone();
    keys.push(registry.add_field(
        named("magnitude"),
        move |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let mut total: Option<FieldValue> = None;
            for key in &components {
                let squared = ctx.get(key)?.powi(2);
                total = Some(match total {
                    Some(sum) => sum + squared,
                    None => squared,
                });
            }
            Ok(total.map_or_else(|| FieldValue::zeros(&ctx.shape()), |t| t.sqrt()))
        },
        FieldOptions::new().units(target),
    ));
    keys
}

/// Central difference of `source` along `axis`.
fn gradient(
    field: &DerivedField,
    ctx: &mut dyn FieldContext,
    source: &FieldKey,
    axis: usize,
) -> Result<FieldValue, FieldError> {
    let info = spatial(field, &*ctx)?;
    require_extent(field, &info, 3)?;
    let value = ctx.get(source)?;
    if value.shape() != info.dimensions.as_slice() {
        return Err(FieldError::ComputeFailed {
            key: field.key().clone(),
            reason: format!(
                "{source} has shape {:?}, not the patch shape {:?}",
                value.shape(),
                info.dimensions
            ),
        });
    }
    let width = quantity(&*ctx, 2.0 * info.cell_widths[axis], "code_length")?;
    let slope = (window(&value, along(axis, 2), 2) - window(&value, along(axis, 0), 2)) / width;
    Ok(embed(&slope, 1, &info.dimensions))
}

/// Absolute velocity divergence.
///
/// Central differences by default; backward differences on the staggered
/// mesh of `HydroMethod` 2. The outer layer of cells is zero.
fn div_v(field: &DerivedField, ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
    let info = spatial(field, &*ctx)?;
    require_extent(field, &info, 3)?;
    let staggered = dataset_integer(&*ctx, "HydroMethod", 0) == 2;
    let (upper, span) = if staggered { (1, 1.0) } else { (2, 2.0) };

    let mut divergence: Option<FieldValue> = None;
    for (axis, name) in VELOCITIES.iter().enumerate() {
        let v = ctx.field("gas", name)?;
        let width = quantity(&*ctx, info.cell_widths[axis] * span, "code_length")?;
        let term = (window(&v, along(axis, upper), 2) - window(&v, along(axis, 0), 2)) / width;
        divergence = Some(match divergence {
            Some(sum) => sum + term,
            None => term,
        });
    }
    match divergence {
        Some(d) => Ok(embed(&d, 1, &info.dimensions).abs()),
        None => Ok(FieldValue::zeros(&info.dimensions)),
    }
}

/// Mass-weighted mean density over the 27-cell neighbourhood.
fn averaged_density(
    field: &DerivedField,
    ctx: &mut dyn FieldContext,
) -> Result<FieldValue, FieldError> {
    let info = spatial(field, &*ctx)?;
    require_extent(field, &info, 3)?;
    let rho = ctx.field("gas", "density")?;
    let volume: f64 = info.cell_widths.iter().product();
    let mass = &rho * quantity(&*ctx, volume, "code_length**3")?;

    let mut weighted: Option<FieldValue> = None;
    let mut total: Option<FieldValue> = None;
    for offset in neighbourhood() {
        let m = window(&mass, offset, 2);
        let w = window(&rho, offset, 2) * &m;
        weighted = Some(match weighted {
            Some(sum) => sum + w,
            None => w,
        });
        total = Some(match total {
            Some(sum) => sum + m,
            None => m,
        });
    }
    match (weighted, total) {
        (Some(w), Some(t)) => Ok(embed(&(w / t), 1, &info.dimensions)),
        _ => Ok(FieldValue::zeros(&info.dimensions)),
    }
}

/// Density convolved with a normalized 3x3x3 Gaussian, zero outside.
fn smoothed_density(
    field: &DerivedField,
    ctx: &mut dyn FieldContext,
) -> Result<FieldValue, FieldError> {
    let info = spatial(field, &*ctx)?;
    let rho = ctx.field("gas", "density")?;
    let padded_dims = info.dimensions.map(|n| n + 2);
    let padded = embed(&rho, 1, &padded_dims);

    let kernel: Vec<([usize; 3], f64)> = neighbourhood()
        .map(|o| {
            let r2: f64 = o.iter().map(|&i| (i as f64 - 1.0).powi(2)).sum();
            (o, (-r2).exp())
        })
        .collect();
    let norm: f64 = kernel.iter().map(|(_, w)| w).sum();

    let mut smoothed: Option<FieldValue> = None;
    for (offset, weight) in kernel {
        let term = window(&padded, offset, 2) * (weight / norm);
        smoothed = Some(match smoothed {
            Some(sum) => sum + term,
            None => term,
        });
    }
    Ok(smoothed.unwrap_or_else(|| FieldValue::zeros(&info.dimensions)))
}

fn require_extent(field: &DerivedField, info: &SpatialInfo, min: usize) -> Result<(), FieldError> {
    if info.dimensions.iter().all(|&n| n >= min) {
        Ok(())
    } else {
        Err(FieldError::ComputeFailed {
            key: field.key().clone(),
            reason: format!("patch {:?} is too small for the stencil", info.dimensions),
        })
    }
}

fn neighbourhood() -> impl Iterator<Item = [usize; 3]> {
    (0..27).map(|n| [n / 9, (n / 3) % 3, n % 3])
}

/// Offset 1 on every axis except `axis`.
fn along(axis: usize, offset: usize) -> [usize; 3] {
    let mut o = [1; 3];
    o[axis] = offset;
    o
}

/// The sub-array starting at `offset` and `trim` cells shorter per axis.
fn window(value: &FieldValue, offset: [usize; 3], trim: usize) -> FieldValue {
    let data = value.data().slice_each_axis(|axis| {
        let start = offset[axis.axis.index()];
        Slice::from(start..axis.len + start - trim)
    });
    FieldValue::new(data.to_owned(), value.units().clone())
}

/// `interior` surrounded by `border` cells of zeros.
fn embed(interior: &FieldValue, border: usize, dims: &[usize; 3]) -> FieldValue {
    let mut data = ArrayD::zeros(IxDyn(dims));
    data.slice_each_axis_mut(|axis| Slice::from(border..axis.len - border))
        .assign(interior.data());
    FieldValue::new(data, interior.units().clone())
}
