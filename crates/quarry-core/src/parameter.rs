//! Runtime parameters attached to evaluation contexts.

use std::fmt;

use indexmap::IndexMap;

/// Named runtime parameters in insertion order (`center`, `bulk_velocity`, ...).
pub type ParameterMap = IndexMap<String, Parameter>;

/// A runtime parameter value.
///
/// Accessors are lenient in the directions that are lossless: a scalar
/// broadcasts to a 3-vector and an integral scalar reads as an integer.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    /// A floating-point scalar.
    Scalar(f64),
    /// An integer (axis indices, counts).
    Integer(i64),
    /// A 3-vector (positions, velocities, normals).
    Vector([f64; 3]),
    /// Free text.
    Text(String),
}

impl Parameter {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Integer(_) => "integer",
            Self::Vector(_) => "vector",
            Self::Text(_) => "text",
        }
    }

    /// Read as a scalar. Integers widen.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Read as an integer. Scalars with no fractional part narrow.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Scalar(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Read as a 3-vector. Scalars broadcast.
    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            Self::Vector(v) => Some(*v),
            Self::Scalar(v) => Some([*v; 3]),
            Self::Integer(v) => Some([*v as f64; 3]),
            Self::Text(_) => None,
        }
    }

    /// Read as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Vector([x, y, z]) => write!(f, "[{x}, {y}, {z}]"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Parameter {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<i64> for Parameter {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<[f64; 3]> for Parameter {
    fn from(v: [f64; 3]) -> Self {
        Self::Vector(v)
    }
}

impl From<&str> for Parameter {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
