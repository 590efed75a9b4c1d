//! Physical and numerical constants used throughout the engine.
//!
//! Natural units are used everywhere: `c = mu_0 = epsilon_0 = 1`.

use crate::Float;

/// Speed of light, fixed to 1 in the natural-unit system used by the solver.
pub const LIGHT_SPEED: Float = 1.0;

pub const TWOPI: Float = std::f64::consts::TAU as Float;
