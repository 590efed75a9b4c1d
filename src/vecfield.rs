//! Small value types shared by the field, current and particle modules.

use crate::Float;
use derive_more::{Add, AddAssign, Div, Mul, Sub};
use serde::{Deserialize, Serialize};

/// A 3-component vector, used for `E`, `B`, `J` samples and for a particle's
/// generalized velocity `(ux, uy, uz)`.
#[derive(Debug, Clone, Copy, PartialEq, Add, Sub, Mul, Div, AddAssign, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

impl Vec3 {
    pub const fn zero() -> Vec3 {
        Vec3 {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn new(x: Float, y: Float, z: Float) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> Float {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn norm_sq(&self) -> Float {
        self.dot(self)
    }

    pub fn scale(&self, s: Float) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }
}
