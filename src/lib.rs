//! A 2D, fully relativistic, electromagnetic Particle-in-Cell engine.
//!
//! Particles are advanced with a Boris push, deposit current with a
//! charge-conserving zigzag scheme, and the electromagnetic field is
//! advanced on a staggered Yee grid. See `simulation` for the step driver
//! that stitches these pieces together.

#[macro_use]
extern crate error_chain;

pub mod consts;
pub mod current;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod grid;
pub mod laser;
pub mod rng;
pub mod settings;
pub mod simulation;
pub mod smoothing;
pub mod species;
pub mod vecfield;
pub mod window;

#[cfg(not(feature = "single"))]
pub type Float = f64;
#[cfg(feature = "single")]
pub type Float = f32;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::simulation::Simulation;
