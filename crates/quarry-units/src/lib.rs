//! CGS unit algebra for Quarry.
//!
//! Units are a scale factor to the coherent CGS unit plus rational
//! exponents of length, mass, time, temperature and angle. A
//! [`UnitRegistry`] parses expressions like `"g/cm**3"`, `"km/s"` or
//! `"code_length**(1/2)"` and knows per-dataset code units.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod dimensions;
pub mod error;
mod parser;
pub mod rational;
pub mod registry;
pub mod unit;

pub use dimensions::Dimensions;
pub use error::UnitError;
pub use parser::parse_dimensions;
pub use rational::Rational;
pub use registry::{CodeUnits, UnitRegistry};
pub use unit::Unit;
