//! Physical dimensions as rational exponents of the CGS base quantities.

use std::fmt;

use crate::rational::Rational;

/// Exponents of the base dimensions (length, mass, time, temperature, angle).
///
/// Electromagnetic quantities are expressed in Gaussian CGS, where the
/// magnetic field carries half-integer mass and length exponents, so no
/// separate current dimension is tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    /// Length exponent (base unit: cm).
    pub length: Rational,
    /// Mass exponent (base unit: g).
    pub mass: Rational,
    /// Time exponent (base unit: s).
    pub time: Rational,
    /// Temperature exponent (base unit: K).
    pub temperature: Rational,
    /// Angle exponent (base unit: rad).
    pub angle: Rational,
}

const fn dims(length: i32, mass: i32, time: i32, temperature: i32, angle: i32) -> Dimensions {
    Dimensions {
        length: Rational::integer(length),
        mass: Rational::integer(mass),
        time: Rational::integer(time),
        temperature: Rational::integer(temperature),
        angle: Rational::integer(angle),
    }
}

impl Dimensions {
    /// All exponents zero.
    pub const DIMENSIONLESS: Dimensions = dims(0, 0, 0, 0, 0);
    /// `L`
    pub const LENGTH: Dimensions = dims(1, 0, 0, 0, 0);
    /// `M`
    pub const MASS: Dimensions = dims(0, 1, 0, 0, 0);
    /// `T`
    pub const TIME: Dimensions = dims(0, 0, 1, 0, 0);
    /// `Θ`
    pub const TEMPERATURE: Dimensions = dims(0, 0, 0, 1, 0);
    /// Plane angle.
    pub const ANGLE: Dimensions = dims(0, 0, 0, 0, 1);
    /// `L T^-1`
    pub const VELOCITY: Dimensions = dims(1, 0, -1, 0, 0);
    /// `M L^-3`
    pub const DENSITY: Dimensions = dims(-3, 1, 0, 0, 0);
    /// `M L^2 T^-2`
    pub const ENERGY: Dimensions = dims(2, 1, -2, 0, 0);
    /// `M L^-1 T^-2`
    pub const PRESSURE: Dimensions = dims(-1, 1, -2, 0, 0);

    /// Whether every exponent is zero.
    pub fn is_dimensionless(&self) -> bool {
        self.components().iter().all(|(_, e)| e.is_zero())
    }

    /// Exponent-wise sum (dimension of a product).
    pub fn multiply(&self, other: &Dimensions) -> Dimensions {
        Dimensions {
            length: self.length + other.length,
            mass: self.mass + other.mass,
            time: self.time + other.time,
            temperature: self.temperature + other.temperature,
            angle: self.angle + other.angle,
        }
    }

    /// Exponent-wise difference (dimension of a quotient).
    pub fn divide(&self, other: &Dimensions) -> Dimensions {
        self.multiply(&other.pow(Rational::integer(-1)))
    }

    /// Scale every exponent (dimension of a power).
    pub fn pow(&self, exponent: Rational) -> Dimensions {
        Dimensions {
            length: self.length * exponent,
            mass: self.mass * exponent,
            time: self.time * exponent,
            temperature: self.temperature * exponent,
            angle: self.angle * exponent,
        }
    }

    /// [`multiply`](Self::multiply), or `None` if an exponent overflows.
    pub fn checked_multiply(&self, other: &Dimensions) -> Option<Dimensions> {
        Some(Dimensions {
            length: self.length.checked_add(other.length)?,
            mass: self.mass.checked_add(other.mass)?,
            time: self.time.checked_add(other.time)?,
            temperature: self.temperature.checked_add(other.temperature)?,
            angle: self.angle.checked_add(other.angle)?,
        })
    }

    /// [`divide`](Self::divide), or `None` if an exponent overflows.
    pub fn checked_divide(&self, other: &Dimensions) -> Option<Dimensions> {
        self.checked_multiply(&other.checked_pow(Rational::integer(-1))?)
    }

    /// [`pow`](Self::pow), or `None` if an exponent overflows.
    pub fn checked_pow(&self, exponent: Rational) -> Option<Dimensions> {
        Some(Dimensions {
            length: self.length.checked_mul(exponent)?,
            mass: self.mass.checked_mul(exponent)?,
            time: self.time.checked_mul(exponent)?,
            temperature: self.temperature.checked_mul(exponent)?,
            angle: self.angle.checked_mul(exponent)?,
        })
    }

    /// `(cgs symbol, exponent)` pairs in canonical order.
    pub fn components(&self) -> [(&'static str, Rational); 5] {
        [
            ("g", self.mass),
            ("cm", self.length),
            ("s", self.time),
            ("K", self.temperature),
            ("rad", self.angle),
        ]
    }

    /// Look up a named dimension (`"density"`, `"velocity"`, ...).
    ///
    /// Base dimension names (`"length"`, `"mass"`, `"time"`,
    /// `"temperature"`, `"angle"`) are included.
    pub fn named(name: &str) -> Option<Dimensions> {
        let found = match name {
            "dimensionless" => Self::DIMENSIONLESS,
            "length" => Self::LENGTH,
            "mass" => Self::MASS,
            "time" => Self::TIME,
            "temperature" => Self::TEMPERATURE,
            "angle" => Self::ANGLE,
            "velocity" => Self::VELOCITY,
            "acceleration" => dims(1, 0, -2, 0, 0),
            "area" => dims(2, 0, 0, 0, 0),
            "volume" => dims(3, 0, 0, 0, 0),
            "density" => Self::DENSITY,
            "number_density" => dims(-3, 0, 0, 0, 0),
            "column_density" => dims(-2, 1, 0, 0, 0),
            "momentum" => dims(1, 1, -1, 0, 0),
            "force" => dims(1, 1, -2, 0, 0),
            "energy" => Self::ENERGY,
            "specific_energy" => dims(2, 0, -2, 0, 0),
            "pressure" => Self::PRESSURE,
            "power" => dims(2, 1, -3, 0, 0),
            "rate" | "frequency" => dims(0, 0, -1, 0, 0),
            "specific_angular_momentum" => dims(2, 0, -1, 0, 0),
            "magnetic_field" => Dimensions {
                length: Rational::new(-1, 2),
                mass: Rational::HALF,
                time: Rational::integer(-1),
                temperature: Rational::ZERO,
                angle: Rational::ZERO,
            },
            _ => return None,
        };
        Some(found)
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::DIMENSIONLESS
    }
}

/// Renders the CGS base-unit expression, e.g. `g/cm**3` or `cm**(1/2)/s`.
impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let mut numerator = Vec::new();
        let mut denominator = Vec::new();
        for (symbol, exponent) in self.components() {
            if exponent.is_zero() {
                continue;
            }
            if exponent.numerator() > 0 {
                numerator.push(format_power(symbol, exponent));
            } else {
                denominator.push(format_power(symbol, -exponent));
            }
        }
        let num = if numerator.is_empty() {
            "1".to_string()
        } else {
            numerator.join("*")
        };
        if denominator.is_empty() {
            write!(f, "{num}")
        } else {
            write!(f, "{num}/{}", denominator.join("/"))
        }
    }
}

fn format_power(symbol: &str, exponent: Rational) -> String {
    if exponent == Rational::ONE {
        symbol.to_string()
    } else if exponent.is_integer() {
        format!("{symbol}**{exponent}")
    } else {
        format!("{symbol}**({exponent})")
    }
}
