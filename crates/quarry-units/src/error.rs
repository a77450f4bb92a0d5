//! Error types for unit parsing and conversion.

use thiserror::Error;

/// Errors from parsing unit or dimension expressions and converting values.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UnitError {
    /// A symbol in the expression is not known to the unit registry.
    #[error("unknown unit symbol '{symbol}' in '{expr}'")]
    UnknownSymbol {
        /// The unrecognized symbol.
        symbol: String,
        /// The full expression being parsed.
        expr: String,
    },
    /// The expression is malformed.
    #[error("malformed unit expression '{expr}': {reason}")]
    Syntax {
        /// The full expression being parsed.
        expr: String,
        /// What went wrong.
        reason: String,
    },
    /// A dimension name is not recognized.
    #[error("unknown dimension '{name}'")]
    UnknownDimension {
        /// The unrecognized dimension expression.
        name: String,
    },
    /// Conversion between units of different dimensions.
    #[error("cannot convert '{from}' to '{to}'")]
    Incompatible {
        /// Source unit.
        from: String,
        /// Target unit.
        to: String,
    },
}
