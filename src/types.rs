//! Simulation data types.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Three-dimensional vector used for positions and velocities.
///
/// Serialized as a plain `[x, y, z]` array. The transport axis is `x`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector along `self`, or `None` if the norm is below `tol`.
    pub fn normalized(self, tol: f64) -> Option<Self> {
        let norm = self.norm();
        if !(norm > tol) {
            return None;
        }
        Some(self * (1.0 / norm))
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(vec: Vec3) -> Self {
        [vec.x, vec.y, vec.z]
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        rhs * self
    }
}

/// Terminal state of a neutron history.
///
/// Exactly one is produced per history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TerminationClass {
    EscapedRight,
    EscapedLeft,
    Absorbed,
    Thermalized,
    /// The first interaction was a scattering (single-collision mode only).
    Scattered,
    /// The history hit the maximum collision count.
    Aborted,
}

impl TerminationClass {
    pub const ALL: [TerminationClass; 6] = [
        TerminationClass::EscapedRight,
        TerminationClass::EscapedLeft,
        TerminationClass::Absorbed,
        TerminationClass::Thermalized,
        TerminationClass::Scattered,
        TerminationClass::Aborted,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Diagnostic data recorded along a history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Interaction positions, in order.
    pub trajectory: Vec<Vec3>,
    /// Lab-frame scattering angle of each collision, in radians.
    pub scattering_angles: Vec<f64>,
    /// Post-collision energy of the first collisions (bounded length).
    pub energies: Vec<f64>,
}

/// Outcome of a single neutron history.
///
/// Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub termination: TerminationClass,

    pub final_position: Vec3,

    /// Number of elastic collisions undergone.
    pub n_collisions: usize,

    /// Present only if diagnostics were requested.
    pub diagnostics: Option<Diagnostics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_product_is_orthogonal() {
        let a = Vec3::new(0.5, 0.5, 0.5);
        let b = Vec3::new(-0.3, 0.9, 0.1);
        let c = a.cross(b);
        assert!(c.dot(a).abs() < 1e-12);
        assert!(c.dot(b).abs() < 1e-12);
    }

    #[test]
    fn normalized_rejects_zero_vector() {
        assert_eq!(Vec3::default().normalized(1e-12), None);
        let unit = Vec3::new(3.0, 0.0, 4.0).normalized(1e-12).unwrap();
        assert!((unit.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vec3_deserializes_from_array() {
        #[derive(Deserialize)]
        struct Wrapper {
            v: Vec3,
        }
        let wrapper: Wrapper = toml::from_str("v = [1.0, 2.0, 3.0]").unwrap();
        assert_eq!(wrapper.v, Vec3::new(1.0, 2.0, 3.0));
    }
}
