//! Cell geometry, coordinates and distances.
//!
//! `index` fields need a stencil-capable context: they read the patch
//! geometry directly. Coordinates are cell centers; distances are
//! measured from the `center` parameter, which is given in the units of
//! the coordinate fields (cm).

use ndarray::Array3;
use quarry_core::{FieldContext, FieldError, FieldValue};
use quarry_fields::{DerivedField, FieldOptions, FieldRegistry, Validator};

use crate::util::{offsets, quantity, spatial};

const AXES: [&str; 3] = ["x", "y", "z"];
const WIDTHS: [&str; 3] = ["dx", "dy", "dz"];

/// Register the geometric fields.
pub fn register(registry: &mut FieldRegistry) {
    for axis in 0..3 {
        registry.add_field(
            ("index", WIDTHS[axis]),
            move |field: &DerivedField, ctx: &mut dyn FieldContext| {
                let info = spatial(field, &*ctx)?;
                let width = quantity(&*ctx, info.cell_widths[axis], "code_length")?;
                Ok(FieldValue::ones(&ctx.shape()) * width)
            },
            length_options().take_log(false),
        );
        registry.add_field(
            ("index", AXES[axis]),
            move |field: &DerivedField, ctx: &mut dyn FieldContext| {
                let info = spatial(field, &*ctx)?;
                let centers = Array3::from_shape_fn(info.dimensions, |(i, j, k)| {
                    info.cell_center(axis, [i, j, k][axis])
                });
                Ok(FieldValue::bare(centers.into_dyn()) * quantity(&*ctx, 1.0, "code_length")?)
            },
            length_options(),
        );
    }

    registry.add_field(
        ("index", "cell_volume"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| cell_volume(ctx),
        FieldOptions::new().units("cm**3"),
    );
    registry.add_field(
        ("gas", "cell_volume_mpc"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| cell_volume(ctx),
        FieldOptions::new()
            .units("Mpc**3")
            .convert(|ctx: &dyn FieldContext| (ctx.convert("mpc") / ctx.convert("cm")).powi(3)),
    );

    registry.add_field(
        ("index", "ones"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| Ok(FieldValue::ones(&ctx.shape())),
        FieldOptions::new(),
    );
    registry.add_field(
        ("index", "grid_level"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let level = ctx
                .property("level")
                .and_then(|p| p.as_integer())
                .unwrap_or(0);
            Ok(FieldValue::full(&ctx.shape(), level as f64))
        },
        FieldOptions::new()
            .take_log(false)
            .validator(Validator::spatial(0)),
    );
    registry.add_field(
        ("index", "grid_indices"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let id = ctx.property("id").and_then(|p| p.as_integer()).unwrap_or(0);
            Ok(FieldValue::full(&ctx.shape(), id as f64))
        },
        FieldOptions::new()
            .take_log(false)
            .validator(Validator::spatial(0)),
    );

    registry.add_field(
        ("gas", "radius"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| radius(ctx),
        FieldOptions::new()
            .units("cm")
            .validator(Validator::parameters(["center"])),
    );
    registry.add_field(
        ("gas", "radius_mpc"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| radius(ctx),
        FieldOptions::new()
            .units("Mpc")
            .convert(|ctx: &dyn FieldContext| ctx.convert("mpc") / ctx.convert("cm"))
            .validator(Validator::parameters(["center"])),
    );
    registry.add_field(
        ("gas", "radius_kpc"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| radius(ctx),
        FieldOptions::new()
            .units("kpc")
            .convert(|ctx: &dyn FieldContext| ctx.convert("kpc") / ctx.convert("cm"))
            .validator(Validator::parameters(["center"])),
    );
    registry.add_field(
        ("gas", "height"),
        |_: &DerivedField, ctx: &mut dyn FieldContext| {
            let [rx, ry, rz] = offsets(ctx)?;
            let h = ctx.vector_parameter("height_vector")?;
            let norm = (h[0] * h[0] + h[1] * h[1] + h[2] * h[2]).sqrt();
            if norm == 0.0 {
                return Err(FieldError::InvalidParameter {
                    name: "height_vector".into(),
                    reason: "must be non-zero".into(),
                });
            }
            let height = rx * (h[0] / norm) + ry * (h[1] / norm) + rz * (h[2] / norm);
            Ok(height.abs())
        },
        FieldOptions::new()
            .units("cm")
            .validator(Validator::parameters(["center", "height_vector"])),
    );
}

fn length_options() -> FieldOptions {
    FieldOptions::new()
        .units("cm")
        .convert(|ctx: &dyn FieldContext| ctx.convert("cm"))
        .validator(Validator::spatial(0))
}

fn cell_volume(ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
    Ok(ctx.field("index", "dx")? * ctx.field("index", "dy")? * ctx.field("index", "dz")?)
}

/// Distance of each cell center from the `center` parameter.
pub(crate) fn radius(ctx: &mut dyn FieldContext) -> Result<FieldValue, FieldError> {
    let [rx, ry, rz] = offsets(ctx)?;
    Ok((&rx * &rx + &ry * &ry + &rz * &rz).sqrt())
}
