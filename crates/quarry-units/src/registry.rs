//! Symbol table mapping unit names to CGS scale and dimensions.

use indexmap::IndexMap;

use crate::constants::*;
use crate::dimensions::Dimensions;
use crate::error::UnitError;
use crate::parser::{self, parse_expression};
use crate::rational::Rational;
use crate::unit::Unit;

/// Simulation-native ("code") units for one dataset.
///
/// Velocity and density code units are derived from length, mass and
/// time so that they stay mutually consistent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CodeUnits {
    /// One code length in cm.
    pub length_cm: f64,
    /// One code mass in g.
    pub mass_g: f64,
    /// One code time in s.
    pub time_s: f64,
}

impl CodeUnits {
    /// One code velocity in cm/s.
    pub fn velocity_cgs(&self) -> f64 {
        self.length_cm / self.time_s
    }

    /// One code density in g/cm**3.
    pub fn density_cgs(&self) -> f64 {
        self.mass_g / self.length_cm.powi(3)
    }
}

impl Default for CodeUnits {
    fn default() -> Self {
        Self {
            length_cm: 1.0,
            mass_g: 1.0,
            time_s: 1.0,
        }
    }
}

/// A table of named units used to parse unit expressions.
///
/// [`UnitRegistry::default`] knows the common CGS, SI and astronomical
/// symbols; datasets add code units with [`UnitRegistry::with_code_units`].
#[derive(Clone, Debug)]
pub struct UnitRegistry {
    symbols: IndexMap<String, (f64, Dimensions)>,
}

impl UnitRegistry {
    /// An empty registry. Only `dimensionless` is known.
    pub fn empty() -> Self {
        let mut symbols = IndexMap::new();
        symbols.insert("dimensionless".to_string(), (1.0, Dimensions::DIMENSIONLESS));
        Self { symbols }
    }

    /// Add or replace a symbol.
    pub fn add_symbol(&mut self, symbol: impl Into<String>, scale: f64, dims: Dimensions) {
        self.symbols.insert(symbol.into(), (scale, dims));
    }

    /// Add `code_length`, `code_mass`, `code_time`, `code_velocity` and
    /// `code_density` for the given code units.
    pub fn with_code_units(mut self, code: CodeUnits) -> Self {
        self.add_symbol("code_length", code.length_cm, Dimensions::LENGTH);
        self.add_symbol("code_mass", code.mass_g, Dimensions::MASS);
        self.add_symbol("code_time", code.time_s, Dimensions::TIME);
        self.add_symbol("code_velocity", code.velocity_cgs(), Dimensions::VELOCITY);
        self.add_symbol("code_density", code.density_cgs(), Dimensions::DENSITY);
        self
    }

    /// Whether `symbol` is known.
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    /// Scale and dimensions of a single symbol.
    pub fn lookup(&self, symbol: &str) -> Option<(f64, Dimensions)> {
        self.symbols.get(symbol).copied()
    }

    /// Number of known symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no symbols are known. Never true: `dimensionless` is always present.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Parse a unit expression such as `"g/cm**3"` or `"km/s"`.
    ///
    /// The parsed unit displays as the original expression.
    pub fn parse(&self, expr: &str) -> Result<Unit, UnitError> {
        let (scale, dims) = parse_expression(expr, |s| self.lookup(s))?;
        Ok(Unit::new(scale, dims).with_symbol(expr))
    }

    /// Parse a dimension expression such as `"density"`.
    pub fn parse_dimensions(&self, expr: &str) -> Result<Dimensions, UnitError> {
        parser::parse_dimensions(expr)
    }

    /// Factor converting a value in `from` to `to`.
    pub fn conversion_factor(&self, from: &str, to: &str) -> Result<f64, UnitError> {
        self.parse(from)?.conversion_factor(&self.parse(to)?)
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let l = Dimensions::LENGTH;
        let m = Dimensions::MASS;
        let t = Dimensions::TIME;
        let energy = Dimensions::ENERGY;
        let force = Dimensions::LENGTH
            .multiply(&Dimensions::MASS)
            .divide(&Dimensions::TIME.pow(Rational::integer(2)));
        let power = energy.divide(&t);
        let rate = t.pow(Rational::integer(-1));

        let mut reg = Self::empty();
        for (symbol, scale, dims) in [
            // length
            ("cm", 1.0, l),
            ("mm", 0.1, l),
            ("m", 1e2, l),
            ("km", 1e5, l),
            ("au", AU_CGS, l),
            ("AU", AU_CGS, l),
            ("ly", LIGHT_YEAR_CGS, l),
            ("pc", MPC_CGS * 1e-6, l),
            ("kpc", MPC_CGS * 1e-3, l),
            ("Mpc", MPC_CGS, l),
            // mass
            ("g", 1.0, m),
            ("kg", 1e3, m),
            ("Msun", MASS_SUN_CGS, m),
            ("mh", MASS_HYDROGEN_CGS, m),
            ("amu", AMU_CGS, m),
            ("me", MASS_ELECTRON_CGS, m),
            // time
            ("s", 1.0, t),
            ("ms", 1e-3, t),
            ("min", 60.0, t),
            ("hr", 3600.0, t),
            ("day", 86400.0, t),
            ("yr", YEAR_CGS, t),
            ("kyr", YEAR_CGS * 1e3, t),
            ("Myr", YEAR_CGS * 1e6, t),
            ("Gyr", YEAR_CGS * 1e9, t),
            // temperature and angle
            ("K", 1.0, Dimensions::TEMPERATURE),
            ("rad", 1.0, Dimensions::ANGLE),
            ("degree", std::f64::consts::PI / 180.0, Dimensions::ANGLE),
            // derived
            ("dyne", 1.0, force),
            ("N", 1e5, force),
            ("erg", 1.0, energy),
            ("J", 1e7, energy),
            ("eV", ELECTRON_VOLT_CGS, energy),
            ("keV", ELECTRON_VOLT_CGS * 1e3, energy),
            ("Pa", 10.0, Dimensions::PRESSURE),
            ("W", 1e7, power),
            ("Hz", 1.0, rate),
        ] {
            reg.add_symbol(symbol, scale, dims);
        }
        if let Some(gauss) = Dimensions::named("magnetic_field") {
            reg.add_symbol("G", 1.0, gauss);
            reg.add_symbol("gauss", 1.0, gauss);
        }
        reg
    }
}
