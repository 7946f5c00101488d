//! Unit constants.
//!
//! Values follow the detector-description convention: lengths in
//! centimetres, energies in GeV, times in nanoseconds. Multiply a literal by
//! a constant to express it, divide by one to read it back out.

/// Millimetre.
pub const MM: f64 = 0.1;
/// Centimetre.
pub const CM: f64 = 1.0;
/// Metre.
pub const M: f64 = 100.0;

/// Kilo-electronvolt.
pub const KEV: f64 = 1e-6;
/// Mega-electronvolt.
pub const MEV: f64 = 1e-3;
/// Giga-electronvolt.
pub const GEV: f64 = 1.0;

/// Nanosecond.
pub const NS: f64 = 1.0;
/// Picosecond.
pub const PS: f64 = 1e-3;

/// Radian.
pub const RAD: f64 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_ratios() {
        assert!((10.0 * MM - CM).abs() < f64::EPSILON);
        assert!((1000.0 * MEV - GEV).abs() < f64::EPSILON);
        assert!((1000.0 * PS - NS).abs() < 1e-12);
    }
}
