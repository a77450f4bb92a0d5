//! Exact rational exponents for dimensional analysis.
//!
//! Derived quantities routinely raise units to fractional powers
//! (`sqrt(P / rho)`, `rho**(-2/3)`), so dimension exponents are stored as
//! normalized `num / denom` pairs rather than integers.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A rational number in lowest terms with a positive denominator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i32,
    denom: i32,
}

impl Rational {
    /// Zero (`0/1`).
    pub const ZERO: Self = Self { num: 0, denom: 1 };

    /// One (`1/1`).
    pub const ONE: Self = Self { num: 1, denom: 1 };

    /// One half, the exponent of a square root.
    pub const HALF: Self = Self { num: 1, denom: 2 };

    /// Create a normalized rational.
    ///
    /// # Panics
    ///
    /// Panics if `denom` is zero.
    pub fn new(num: i32, denom: i32) -> Self {
        assert!(denom != 0, "rational denominator must be non-zero");
        if num == 0 {
            return Self::ZERO;
        }
        let sign = if denom < 0 { -1 } else { 1 };
        let g = gcd(num.unsigned_abs(), denom.unsigned_abs()) as i32;
        Self {
            num: sign * num / g,
            denom: sign * denom / g,
        }
    }

    /// An integer rational (`n/1`).
    pub const fn integer(n: i32) -> Self {
        Self { num: n, denom: 1 }
    }

    /// Numerator (carries the sign).
    pub const fn numerator(self) -> i32 {
        self.num
    }

    /// Denominator (always positive).
    pub const fn denominator(self) -> i32 {
        self.denom
    }

    /// Whether this rational is zero.
    pub const fn is_zero(self) -> bool {
        self.num == 0
    }

    /// Whether this rational is a whole number.
    pub const fn is_integer(self) -> bool {
        self.denom == 1
    }

    /// Lossy conversion to `f64`.
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Recover a rational from a decimal exponent such as `0.5` or `-0.6667`.
    ///
    /// Only denominators up to 12 are tried; that covers every exponent
    /// that shows up in physical unit strings. Returns `None` otherwise.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        for denom in 1..=12 {
            let scaled = value * denom as f64;
            let rounded = scaled.round();
            if (scaled - rounded).abs() < 1e-3 {
                if rounded.abs() > i32::MAX as f64 {
                    return None;
                }
                return Some(Self::new(rounded as i32, denom));
            }
        }
        None
    }

    /// Sum, or `None` if the result does not fit in `i32` terms.
    pub fn checked_add(self, other: Rational) -> Option<Rational> {
        let (a, b, c, d) = self.widen(other);
        Self::reduce(a * d + c * b, b * d)
    }

    /// Product, or `None` if the result does not fit in `i32` terms.
    pub fn checked_mul(self, other: Rational) -> Option<Rational> {
        let (a, b, c, d) = self.widen(other);
        Self::reduce(a * c, b * d)
    }

    fn widen(self, other: Rational) -> (i64, i64, i64, i64) {
        (
            i64::from(self.num),
            i64::from(self.denom),
            i64::from(other.num),
            i64::from(other.denom),
        )
    }

    // `denom` is a product of positive i32 denominators, so it is positive.
    fn reduce(num: i64, denom: i64) -> Option<Rational> {
        if num == 0 {
            return Some(Self::ZERO);
        }
        let g = gcd64(num.unsigned_abs(), denom.unsigned_abs()) as i64;
        let (num, denom) = (num / g, denom / g);
        if num.abs() > i64::from(i32::MAX) || denom > i64::from(i32::MAX) {
            return None;
        }
        Some(Self {
            num: num as i32,
            denom: denom as i32,
        })
    }
}

fn gcd64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

/// Greatest common divisor (Euclid).
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, other: Rational) -> Rational {
        Rational::new(
            self.num * other.denom + other.num * self.denom,
            self.denom * other.denom,
        )
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, other: Rational) -> Rational {
        self + (-other)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, other: Rational) -> Rational {
        Rational::new(self.num * other.num, self.denom * other.denom)
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            denom: self.denom,
        }
    }
}

impl From<i32> for Rational {
    fn from(n: i32) -> Self {
        Self::integer(n)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.denom)
        }
    }
}
