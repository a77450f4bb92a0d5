//! The [`Unit`] type: a CGS scale factor, dimensions, and a display symbol.

use std::fmt;

use crate::dimensions::Dimensions;
use crate::error::UnitError;
use crate::rational::Rational;

/// A physical unit.
///
/// `scale` is the multiplicative factor to the coherent CGS unit of the
/// same dimensions: `km` has scale `1e5`, `Msun` has scale `1.988e33`.
/// Units that were parsed from a string remember that string for display;
/// units produced by arithmetic render as their CGS expression.
#[derive(Clone, Debug)]
pub struct Unit {
    scale: f64,
    dims: Dimensions,
    symbol: Option<String>,
}

impl Unit {
    /// Create a unit from its parts, without a display symbol.
    pub fn new(scale: f64, dims: Dimensions) -> Self {
        Self {
            scale,
            dims,
            symbol: None,
        }
    }

    /// The dimensionless unit with scale 1.
    pub fn dimensionless() -> Self {
        Self::new(1.0, Dimensions::DIMENSIONLESS)
    }

    /// The coherent CGS unit for `dims` (scale 1).
    pub fn cgs(dims: Dimensions) -> Self {
        Self::new(1.0, dims)
    }

    /// Attach a display symbol.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        self.symbol = if symbol.trim().is_empty() {
            None
        } else {
            Some(symbol.trim().to_string())
        };
        self
    }

    /// Factor to the coherent CGS unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Dimensional exponents.
    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    /// Display symbol, if the unit was parsed or named.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Whether the unit carries no dimension.
    pub fn is_dimensionless(&self) -> bool {
        self.dims.is_dimensionless()
    }

    /// Whether values in `self` can be converted to `other`.
    pub fn is_compatible_with(&self, other: &Unit) -> bool {
        self.dims == other.dims
    }

    /// Product of two units.
    pub fn multiply(&self, other: &Unit) -> Unit {
        Unit::new(self.scale * other.scale, self.dims.multiply(&other.dims))
    }

    /// Quotient of two units.
    pub fn divide(&self, other: &Unit) -> Unit {
        Unit::new(self.scale / other.scale, self.dims.divide(&other.dims))
    }

    /// Rational power of a unit.
    pub fn pow(&self, exponent: Rational) -> Unit {
        Unit::new(self.scale.powf(exponent.to_f64()), self.dims.pow(exponent))
    }

    /// Reciprocal unit.
    pub fn inverse(&self) -> Unit {
        self.pow(Rational::integer(-1))
    }

    /// Factor `f` such that `value_in_self * f == value_in_target`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible_with(target) {
            return Err(UnitError::Incompatible {
                from: self.to_string(),
                to: target.to_string(),
            });
        }
        Ok(self.scale / target.scale)
    }

    /// The same quantity expressed in coherent CGS units.
    pub fn to_cgs(&self) -> Unit {
        Unit::cgs(self.dims)
    }
}

/// Units compare by scale and dimensions; the display symbol is ignored.
impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && approx_eq(self.scale, other.scale)
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(symbol) = &self.symbol {
            return write!(f, "{symbol}");
        }
        if approx_eq(self.scale, 1.0) {
            write!(f, "{}", self.dims)
        } else if self.dims.is_dimensionless() {
            write!(f, "{}", self.scale)
        } else {
            write!(f, "{}*{}", self.scale, self.dims)
        }
    }
}
