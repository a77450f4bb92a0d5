//! Unit-tagged field arrays.
//!
//! [`FieldValue`] is what every field access returns: an n-dimensional
//! `f64` array plus [`Units`]. Arithmetic follows ndarray's broadcasting
//! rules and panics on incompatible shapes, exactly like the arrays it
//! wraps. Units propagate through the operators:
//!
//! - `*` and `/` combine units;
//! - `+`, `-` and [`FieldValue::minimum`] convert the right operand into
//!   the left operand's units, or mark the result [`Units::Inconsistent`]
//!   when the dimensions differ;
//! - an untagged ([`Units::Bare`]) operand adopts the other operand's units;
//! - plain `f64` operands are unitless factors.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use quarry_units::{Dimensions, Rational, Unit, UnitError};

use crate::error::FieldError;

/// Unit information attached to a [`FieldValue`].
#[derive(Clone, Debug, PartialEq)]
pub enum Units {
    /// No unit information. Legacy-mode values and synthetic filler
    /// arrays are bare; bare values count as dimensionless.
    Bare,
    /// A physical unit.
    Tagged(Unit),
    /// An operation combined incompatible units. Carries a description.
    Inconsistent(String),
}

impl Units {
    /// The unit, if tagged.
    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Self::Tagged(u) => Some(u),
            _ => None,
        }
    }

    /// Dimensions of the value. Bare is dimensionless; inconsistent has none.
    pub fn dims(&self) -> Option<Dimensions> {
        match self {
            Self::Bare => Some(Dimensions::DIMENSIONLESS),
            Self::Tagged(u) => Some(*u.dims()),
            Self::Inconsistent(_) => None,
        }
    }

    /// Whether the value carries no dimension.
    pub fn is_dimensionless(&self) -> bool {
        self.dims().is_some_and(|d| d.is_dimensionless())
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare => write!(f, "dimensionless"),
            Self::Tagged(u) => write!(f, "{u}"),
            Self::Inconsistent(reason) => write!(f, "inconsistent ({reason})"),
        }
    }
}

/// Units of `lhs ± rhs` and the factor that brings `rhs` into them.
fn additive_units(lhs: &Units, rhs: &Units) -> (f64, Units) {
    match (lhs, rhs) {
        (Units::Inconsistent(r), _) | (_, Units::Inconsistent(r)) => {
            (1.0, Units::Inconsistent(r.clone()))
        }
        (Units::Bare, other) | (other, Units::Bare) => (1.0, other.clone()),
        (Units::Tagged(a), Units::Tagged(b)) => match b.conversion_factor(a) {
            Ok(factor) => (factor, Units::Tagged(a.clone())),
            Err(_) => (
                1.0,
                Units::Inconsistent(format!("cannot combine '{a}' with '{b}'")),
            ),
        },
    }
}

fn multiplicative_units(lhs: &Units, rhs: &Units, divide: bool) -> Units {
    match (lhs, rhs) {
        (Units::Inconsistent(r), _) | (_, Units::Inconsistent(r)) => {
            Units::Inconsistent(r.clone())
        }
        (Units::Bare, Units::Bare) => Units::Bare,
        (Units::Tagged(a), Units::Bare) => Units::Tagged(a.clone()),
        (Units::Bare, Units::Tagged(b)) => {
            Units::Tagged(if divide { b.inverse() } else { b.clone() })
        }
        (Units::Tagged(a), Units::Tagged(b)) => Units::Tagged(if divide {
            a.divide(b)
        } else {
            a.multiply(b)
        }),
    }
}

fn power_units(units: &Units, exponent: Rational) -> Units {
    match units {
        Units::Tagged(u) => Units::Tagged(u.pow(exponent)),
        other => other.clone(),
    }
}

/// A field array with units.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValue {
    data: ArrayD<f64>,
    units: Units,
}

impl FieldValue {
    /// Wrap an array with explicit unit information.
    pub fn new(data: ArrayD<f64>, units: Units) -> Self {
        Self { data, units }
    }

    /// An untagged value.
    pub fn bare(data: ArrayD<f64>) -> Self {
        Self::new(data, Units::Bare)
    }

    /// A value tagged with `unit`.
    pub fn tagged(data: ArrayD<f64>, unit: Unit) -> Self {
        Self::new(data, Units::Tagged(unit))
    }

    /// A value tagged as dimensionless.
    pub fn dimensionless(data: ArrayD<f64>) -> Self {
        Self::tagged(data, Unit::dimensionless())
    }

    /// An untagged array of `shape` filled with `value`.
    pub fn full(shape: &[usize], value: f64) -> Self {
        Self::bare(ArrayD::from_elem(IxDyn(shape), value))
    }

    /// An untagged array of ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// An untagged array of zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// An untagged 1-D array.
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self::bare(Array1::from_vec(values).into_dyn())
    }

    /// The underlying array.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Mutable access to the array. Units are unaffected.
    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    /// Consume into the array, dropping units.
    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// Unit information.
    pub fn units(&self) -> &Units {
        &self.units
    }

    /// The unit, if tagged.
    pub fn unit(&self) -> Option<&Unit> {
        self.units.unit()
    }

    /// Array shape.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    /// Mean of all elements, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        self.data.mean()
    }

    /// Smallest element, `None` when empty.
    pub fn min_value(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::min)
    }

    /// Largest element, `None` when empty.
    pub fn max_value(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::max)
    }

    /// Replace the unit tag without touching the data.
    pub fn tag(self, unit: Unit) -> Self {
        Self::tagged(self.data, unit)
    }

    /// Drop unit information.
    pub fn strip_units(self) -> Self {
        Self::bare(self.data)
    }

    /// Apply `f` elementwise. Units are kept as they are.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(self.data.mapv(f), self.units.clone())
    }

    /// Elementwise absolute value.
    pub fn abs(&self) -> Self {
        self.map_values(f64::abs)
    }

    /// Elementwise square root; exponents of the units halve.
    pub fn sqrt(&self) -> Self {
        Self::new(self.data.mapv(f64::sqrt), power_units(&self.units, Rational::HALF))
    }

    /// Elementwise rational power.
    pub fn pow(&self, exponent: Rational) -> Self {
        let e = exponent.to_f64();
        Self::new(
            self.data.mapv(|x| x.powf(e)),
            power_units(&self.units, exponent),
        )
    }

    /// Elementwise integer power.
    pub fn powi(&self, exponent: i32) -> Self {
        Self::new(
            self.data.mapv(|x| x.powi(exponent)),
            power_units(&self.units, Rational::integer(exponent)),
        )
    }

    /// Elementwise minimum, with `other` converted into `self`'s units.
    pub fn minimum(&self, other: &FieldValue) -> Self {
        let (factor, units) = additive_units(&self.units, &other.units);
        let mut data = self.data.clone();
        Zip::from(&mut data)
            .and_broadcast(&other.data)
            .for_each(|a, &b| *a = a.min(b * factor));
        Self::new(data, units)
    }

    /// Express the value in `target` units.
    ///
    /// Bare values are taken to already be in `target` and are only retagged.
    pub fn convert_to(&self, target: &Unit) -> Result<Self, UnitError> {
        match &self.units {
            Units::Bare => Ok(Self::tagged(self.data.clone(), target.clone())),
            Units::Tagged(unit) => {
                let factor = unit.conversion_factor(target)?;
                Ok(Self::tagged(&self.data * factor, target.clone()))
            }
            Units::Inconsistent(reason) => Err(UnitError::Incompatible {
                from: reason.clone(),
                to: target.to_string(),
            }),
        }
    }

    /// Express a tagged value in coherent CGS units; other values are unchanged.
    pub fn in_cgs(&self) -> Self {
        match &self.units {
            Units::Tagged(unit) => {
                Self::tagged(&self.data * unit.scale(), unit.to_cgs())
            }
            _ => self.clone(),
        }
    }

    /// Stack three components along a new leading axis of length 3.
    ///
    /// The `y` and `z` components are converted into `x`'s units.
    pub fn stack(components: [&FieldValue; 3]) -> Result<Self, FieldError> {
        let [x, y, z] = components;
        let (fy, units) = additive_units(&x.units, &y.units);
        let (fz, units) = additive_units(&units, &z.units);
        let y_data = &y.data * fy;
        let z_data = &z.data * fz;
        let data = ndarray::stack(Axis(0), &[x.data.view(), y_data.view(), z_data.view()])?;
        Ok(Self::new(data, units))
    }

    /// Component `index` along the leading axis (for vector fields).
    ///
    /// # Panics
    ///
    /// Panics if the value has no axes or `index` is out of bounds.
    pub fn component(&self, index: usize) -> Self {
        Self::new(
            self.data.index_axis(Axis(0), index).to_owned(),
            self.units.clone(),
        )
    }

    /// Copy into a 1-D array in logical order.
    pub fn flatten(&self) -> Self {
        Self::new(
            Array1::from_iter(self.data.iter().copied()).into_dyn(),
            self.units.clone(),
        )
    }

    /// Concatenate several values into one.
    ///
    /// Scalar values are flattened and joined into a 1-D array. With
    /// `vector` set, each value must have a leading axis of 3 and the
    /// result has shape `[3, n]`. Units follow the first value.
    pub fn concatenate(values: &[FieldValue], vector: bool) -> Result<Self, FieldError> {
        let Some(first) = values.first() else {
            let shape: &[usize] = if vector { &[3, 0] } else { &[0] };
            return Ok(Self::zeros(shape));
        };
        let mut units = first.units.clone();
        let mut parts = Vec::with_capacity(values.len());
        for value in values {
            let (factor, combined) = additive_units(&units, &value.units);
            units = combined;
            let flat = Array1::from_iter(value.data.iter().map(|v| v * factor));
            let part = if vector {
                let n = flat.len() / 3;
                flat.into_shape_with_order(IxDyn(&[3, n]))?
            } else {
                flat.into_dyn()
            };
            parts.push(part);
        }
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let axis = if vector { Axis(1) } else { Axis(0) };
        Ok(Self::new(ndarray::concatenate(axis, &views)?, units))
    }
}

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

fn binary(lhs: &FieldValue, rhs: &FieldValue, op: Op) -> FieldValue {
    match op {
        Op::Add | Op::Sub => {
            let (factor, units) = additive_units(&lhs.units, &rhs.units);
            let scaled;
            let r = if factor == 1.0 {
                &rhs.data
            } else {
                scaled = &rhs.data * factor;
                &scaled
            };
            let data = match op {
                Op::Add => &lhs.data + r,
                _ => &lhs.data - r,
            };
            FieldValue::new(data, units)
        }
        Op::Mul => FieldValue::new(
            &lhs.data * &rhs.data,
            multiplicative_units(&lhs.units, &rhs.units, false),
        ),
        Op::Div => FieldValue::new(
            &lhs.data / &rhs.data,
            multiplicative_units(&lhs.units, &rhs.units, true),
        ),
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&FieldValue> for &FieldValue {
            type Output = FieldValue;
            fn $method(self, rhs: &FieldValue) -> FieldValue {
                binary(self, rhs, $op)
            }
        }

        impl $trait<FieldValue> for FieldValue {
            type Output = FieldValue;
            fn $method(self, rhs: FieldValue) -> FieldValue {
                binary(&self, &rhs, $op)
            }
        }

        impl $trait<&FieldValue> for FieldValue {
            type Output = FieldValue;
            fn $method(self, rhs: &FieldValue) -> FieldValue {
                binary(&self, rhs, $op)
            }
        }

        impl $trait<FieldValue> for &FieldValue {
            type Output = FieldValue;
            fn $method(self, rhs: FieldValue) -> FieldValue {
                binary(self, &rhs, $op)
            }
        }
    };
}

impl_binary_op!(Add, add, Op::Add);
impl_binary_op!(Sub, sub, Op::Sub);
impl_binary_op!(Mul, mul, Op::Mul);
impl_binary_op!(Div, div, Op::Div);

// ── Scalar operands ────────────────────────────────────────────

macro_rules! impl_scalar_op {
    ($trait:ident, $method:ident, $sym:tt, $invert:expr) => {
        impl $trait<f64> for FieldValue {
            type Output = FieldValue;
            fn $method(self, rhs: f64) -> FieldValue {
                FieldValue::new(self.data $sym rhs, self.units)
            }
        }

        impl $trait<f64> for &FieldValue {
            type Output = FieldValue;
            fn $method(self, rhs: f64) -> FieldValue {
                FieldValue::new(&self.data $sym rhs, self.units.clone())
            }
        }

        impl $trait<&FieldValue> for f64 {
            type Output = FieldValue;
            fn $method(self, rhs: &FieldValue) -> FieldValue {
                let units = if $invert {
                    power_units(&rhs.units, Rational::integer(-1))
                } else {
                    rhs.units.clone()
                };
                FieldValue::new(self $sym &rhs.data, units)
            }
        }

        impl $trait<FieldValue> for f64 {
            type Output = FieldValue;
            fn $method(self, rhs: FieldValue) -> FieldValue {
                self $sym &rhs
            }
        }
    };
}

impl_scalar_op!(Add, add, +, false);
impl_scalar_op!(Sub, sub, -, false);
impl_scalar_op!(Mul, mul, *, false);
impl_scalar_op!(Div, div, /, true);

impl Neg for FieldValue {
    type Output = FieldValue;
    fn neg(self) -> FieldValue {
        FieldValue::new(-self.data, self.units)
    }
}

impl Neg for &FieldValue {
    type Output = FieldValue;
    fn neg(self) -> FieldValue {
        FieldValue::new(-&self.data, self.units.clone())
    }
}
