use ndarray::arr0;
use quarry_core::{FieldContext, FieldError, FieldValue, SpatialInfo, ValidationFailure};
use quarry_fields::DerivedField;

/// A 0-d value tagged with `units`; broadcasts against any field.
pub(crate) fn quantity(
    ctx: &dyn FieldContext,
    value: f64,
    units: &str,
) -> Result<FieldValue, FieldError> {
    Ok(FieldValue::tagged(arr0(value).into_dyn(), ctx.unit(units)?))
}

/// The context geometry, or the validation error a missing one implies.
pub(crate) fn spatial(
    field: &DerivedField,
    ctx: &dyn FieldContext,
) -> Result<SpatialInfo, FieldError> {
    ctx.spatial().ok_or_else(|| FieldError::Validation {
        key: field.key().clone(),
        failure: ValidationFailure::MissingSpatialContext {
            ghost_zones: field.required_ghost_zones(),
            fields: Vec::new(),
        },
    })
}

/// A dataset parameter read as an integer, with a default.
pub(crate) fn dataset_integer(ctx: &dyn FieldContext, name: &str, default: i64) -> i64 {
    ctx.dataset_parameter(name)
        .and_then(|p| p.as_integer())
        .unwrap_or(default)
}

/// The three velocity components, minus `bulk_velocity` when it is set.
pub(crate) fn relative_velocity(ctx: &mut dyn FieldContext) -> Result<[FieldValue; 3], FieldError> {
    let bulk = if ctx.has_parameter("bulk_velocity") {
        ctx.vector_parameter("bulk_velocity")?
    } else {
        [0.0; 3]
    };
    Ok([
        ctx.field("gas", "velocity_x")? - bulk[0],
        ctx.field("gas", "velocity_y")? - bulk[1],
        ctx.field("gas", "velocity_z")? - bulk[2],
    ])
}

/// Cell-center offsets from the `center` parameter.
pub(crate) fn offsets(ctx: &mut dyn FieldContext) -> Result<[FieldValue; 3], FieldError> {
    let center = ctx.vector_parameter("center")?;
    Ok([
        ctx.field("index", "x")? - center[0],
        ctx.field("index", "y")? - center[1],
        ctx.field("index", "z")? - center[2],
    ])
}
