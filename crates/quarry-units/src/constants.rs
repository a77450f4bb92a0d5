//! Physical constants in CGS.

/// Hydrogen mass, g.
pub const MASS_HYDROGEN_CGS: f64 = 1.673_534_1e-24;

/// Electron mass, g.
pub const MASS_ELECTRON_CGS: f64 = 9.109_382e-28;

/// Atomic mass unit, g.
pub const AMU_CGS: f64 = 1.660_538_92e-24;

/// Thomson cross-section, cm**2.
pub const CROSS_SECTION_THOMSON_CGS: f64 = 6.652_458_54e-25;

/// Speed of light, cm/s.
pub const SPEED_OF_LIGHT_CGS: f64 = 2.997_924_58e10;

/// Boltzmann constant, erg/K.
pub const BOLTZMANN_CGS: f64 = 1.380_650_4e-16;

/// Newton's gravitational constant, cm**3/g/s**2.
pub const GRAVITATIONAL_CONSTANT_CGS: f64 = 6.674_28e-8;

/// Solar mass, g.
pub const MASS_SUN_CGS: f64 = 1.988_92e33;

/// Megaparsec, cm.
pub const MPC_CGS: f64 = 3.085_677_58e24;

/// Astronomical unit, cm.
pub const AU_CGS: f64 = 1.495_978_707e13;

/// Julian year, s.
pub const YEAR_CGS: f64 = 3.155_76e7;

/// Light year, cm.
pub const LIGHT_YEAR_CGS: f64 = SPEED_OF_LIGHT_CGS * YEAR_CGS;

/// Electron volt, erg.
pub const ELECTRON_VOLT_CGS: f64 = 1.602_176_634e-12;
