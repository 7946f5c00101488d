//! Three-vector type and the angular helpers reconstruction needs.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cartesian three-vector (positions, momenta, cell dimensions).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component (beam axis).
    pub z: f64,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Builds a vector from spherical coordinates.
    #[inline]
    #[must_use]
    pub fn from_spherical(r: f64, theta: f64, phi: f64) -> Self {
        Self {
            x: r * theta.sin() * phi.cos(),
            y: r * theta.sin() * phi.sin(),
            z: r * theta.cos(),
        }
    }

    /// Scalar product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Distance from the beam (z) axis.
    #[inline]
    #[must_use]
    pub fn magnitude_transverse(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Azimuthal angle in (-π, π].
    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Polar angle in [0, π], measured from +z.
    #[inline]
    #[must_use]
    pub fn theta(&self) -> f64 {
        self.magnitude_transverse().atan2(self.z)
    }

    /// Pseudorapidity, `-ln(tan(θ/2))`. Infinite on the beam axis.
    #[inline]
    #[must_use]
    pub fn eta(&self) -> f64 {
        -(self.theta() / 2.0).tan().ln()
    }

    /// Unit vector in the same direction, or `None` for the zero vector.
    #[must_use]
    pub fn unit(&self) -> Option<Self> {
        let r = self.magnitude();
        (r > 0.0 && r.is_finite()).then(|| *self / r)
    }

    /// True if every component is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Polar angle corresponding to a pseudorapidity.
#[inline]
#[must_use]
pub fn eta_to_theta(eta: f64) -> f64 {
    2.0 * (-eta).exp().atan()
}

/// Wraps an azimuthal difference into [-π, π].
#[inline]
#[must_use]
pub fn wrap_phi(dphi: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (dphi + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI && dphi > 0.0 {
        PI
    } else {
        wrapped
    }
}

impl Add for Vector3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vector3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vector3 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}
