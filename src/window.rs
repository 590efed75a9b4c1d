//! Moving-window advection: shifts the simulated frame by one cell along
//! axis 0 once the light cone has advanced far enough to justify it.

use crate::current::Current;
use crate::field::EmfField;
use crate::grid::Grid;
use crate::rng::{standard_normal, Kiss64};
use crate::species::{Particle, Species};
use crate::Float;

/// Tracks how many shifts have happened (`n_move`) and decides when the
/// next one is due.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovingWindow {
    n_move: u64,
}

impl MovingWindow {
    pub fn new() -> MovingWindow {
        MovingWindow { n_move: 0 }
    }

    pub fn n_move(&self) -> u64 {
        self.n_move
    }

    /// Overwrites the shift count directly, used by
    /// [`crate::simulation::Simulation::resume`] to restore a snapshot
    /// without replaying every shift.
    pub(crate) fn set_n_move(&mut self, n_move: u64) {
        self.n_move = n_move;
    }

    /// Shifts field, current and every species by one cell if
    /// `iter * dt > dx0 * n_move + 1`. The `+1` offset is load-bearing
    /// and must not be simplified away.
    pub fn maybe_advance(
        &mut self,
        iter: u64,
        dt: Float,
        grid: &Grid,
        field: &mut EmfField,
        current: &mut Current,
        species: &mut [Species],
        rng: &mut Kiss64,
    ) -> bool {
        let dx0 = grid.dx[0];
        if (iter as Float) * dt <= dx0 * (self.n_move as Float) + 1.0 {
            return false;
        }

        field.shift_left();
        current.shift_left();
        for s in species.iter_mut() {
            shift_species(s, grid, rng);
        }
        self.n_move += 1;
        true
    }
}

/// Drops particles whose cell index ran off the left edge, then injects a
/// fresh slab at the newly exposed right-edge cell, sampled the same way
/// initial loading samples a cell (see [`Species::load`]).
fn shift_species(species: &mut Species, grid: &Grid, rng: &mut Kiss64) {
    for p in species.particles.iter_mut() {
        if !p.is_live() {
            continue;
        }
        p.ix -= 1;
        if p.ix < 0 {
            p.ix = -1;
        }
    }
    species.particles.retain(|p| p.is_live());

    let i = grid.nx[0] - 1;
    let xc = (i as Float + 0.5) * grid.dx[0];
    let n = species.density.sample(xc);
    if n < 1e-6 {
        return;
    }

    let (p0, p1) = (species.ppc[0], species.ppc[1]);
    let ppc_total = p0 * p1;
    let count = ((ppc_total as Float) * n).round().clamp(0.0, ppc_total as Float) as usize;

    for j in 0..grid.nx[1] {
        for idx in 0..count {
            let k = idx / p1;
            let l = idx % p1;
            let x = (k as Float + 0.5) / p0 as Float;
            let y = (l as Float + 0.5) / p1 as Float;

            let ux = species.ufl.x + species.uth.x * standard_normal(rng);
            let uy = species.ufl.y + species.uth.y * standard_normal(rng);
            let uz = species.ufl.z + species.uth.z * standard_normal(rng);

            species.particles.push(Particle {
                ix: i as i64,
                iy: j as i64,
                x,
                y,
                ux,
                uy,
                uz,
            });
        }
    }
}
