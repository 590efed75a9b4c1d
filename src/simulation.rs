//! The step driver: owns grid, field, current and species state and
//! advances them one step at a time in a fixed order — zero current,
//! push and deposit every species, smooth and apply the Maxwell update,
//! then advect the moving window if one is active.

use crate::current::Current;
use crate::field::{EmfField, FieldKind};
use crate::grid::{AxisBoundary, Grid};
use crate::laser::Laser;
use crate::rng::Kiss64;
use crate::smoothing::Smoothing;
use crate::species::{Particle, Species};
use crate::vecfield::Vec3;
use crate::window::MovingWindow;
use crate::Float;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A fully self-contained simulation instance. No process-wide mutable
/// state is used anywhere in its evolution except the RNG owned here,
/// whose seed is fixed at construction.
pub struct Simulation {
    grid: Grid,
    emf: EmfField,
    current: Current,
    species: Vec<Species>,
    smoothing: Smoothing,
    window: Option<MovingWindow>,
    rng: Kiss64,
    report_callback: Option<Box<dyn FnMut(&Simulation) + Send>>,
    n: u64,
    t: Float,
}

impl Simulation {
    /// Validates and constructs a simulation. Species are loaded from
    /// their density profile immediately, using the simulation's own RNG
    /// stream so that species initialization order is part of what makes
    /// a run reproducible.
    pub fn new(
        nx: [usize; 2],
        box_size: [Float; 2],
        dt: Float,
        boundary: [AxisBoundary; 2],
        mut species: Vec<Species>,
        report_callback: Option<Box<dyn FnMut(&Simulation) + Send>>,
        seed: [u32; 2],
    ) -> crate::Result<Simulation> {
        if box_size[0] <= 0.0 || box_size[1] <= 0.0 {
            bail!(crate::ErrorKind::Configuration(
                "box size must be positive on each axis".into()
            ));
        }
        let dx = [box_size[0] / nx[0] as Float, box_size[1] / nx[1] as Float];
        let grid = Grid::new(nx, dx, boundary, dt)?;

        let mut rng = Kiss64::from_seed_words(seed[0], seed[1]);
        for s in species.iter_mut() {
            s.load(&grid, &mut rng);
        }

        Ok(Simulation {
            grid,
            emf: EmfField::new(grid),
            current: Current::new(grid),
            species,
            smoothing: Smoothing::none(),
            window: None,
            rng,
            report_callback,
            n: 0,
            t: 0.0,
        })
    }

    pub fn set_smooth(&mut self, smoothing: Smoothing) {
        self.smoothing = smoothing;
    }

    pub fn set_moving_window(&mut self, enabled: bool) {
        self.window = if enabled { Some(MovingWindow::new()) } else { None };
    }

    pub fn set_external(&mut self, e0: Vec3, b0: Vec3) {
        self.emf.set_external(e0, b0);
    }

    pub fn add_laser(&mut self, laser: &Laser) {
        laser.inject_into(&mut self.emf);
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn t(&self) -> Float {
        self.t
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn emf(&self) -> &EmfField {
        &self.emf
    }

    pub fn current(&self) -> &Current {
        &self.current
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn species_mut(&mut self) -> &mut [Species] {
        &mut self.species
    }

    /// Total kinetic energy summed over every species.
    pub fn kinetic_energy(&self) -> Float {
        self.species.iter().map(|s| s.kinetic_energy()).sum()
    }

    /// Total field energy, `sum(E^2) + sum(B^2)`.
    pub fn field_energy(&self) -> Float {
        self.emf.energy().iter().sum()
    }

    /// Runs `iter()` repeatedly until `t >= tmax`.
    pub fn run(&mut self, tmax: Float) {
        while self.t < tmax {
            self.iter();
        }
    }

    /// Advances exactly one step, invoking the report callback first if
    /// one was provided. Returns the new step count.
    pub fn iter(&mut self) -> u64 {
        self.next().expect("Simulation::next never returns None")
    }

    fn advance_one_step(&mut self) -> u64 {
        self.current.zero();
        for s in self.species.iter_mut() {
            s.push_and_deposit(&self.emf, &self.grid, &mut self.current, self.grid.dt);
        }
        self.current.update(&self.smoothing);
        self.emf.advance(&self.current, self.grid.dt);

        if let Some(window) = self.window.as_mut() {
            window.maybe_advance(
                self.n + 1,
                self.grid.dt,
                &self.grid,
                &mut self.emf,
                &mut self.current,
                &mut self.species,
                &mut self.rng,
            );
        }

        self.n += 1;
        self.t = self.n as Float * self.grid.dt;

        for s in self.species.iter_mut() {
            if s.n_sort != 0 && self.n % s.n_sort == 0 {
                s.sort(&self.grid);
            }
        }

        self.n
    }

    pub fn get_snapshot(&self) -> Snapshot {
        Snapshot {
            n: self.n,
            t: self.t,
            n_move: self.window.map(|w| w.n_move()).unwrap_or(0),
            rng: self.rng,
            species: self
                .species
                .iter()
                .map(|s| s.particles.clone())
                .collect(),
            ex: self.emf.report(FieldKind::E, 0),
            ey: self.emf.report(FieldKind::E, 1),
            ez: self.emf.report(FieldKind::E, 2),
            bx: self.emf.report(FieldKind::B, 0),
            by: self.emf.report(FieldKind::B, 1),
            bz: self.emf.report(FieldKind::B, 2),
            current: self.current.report(),
        }
    }

    /// Restores simulation state from a snapshot taken on a simulation
    /// constructed with the same grid and species configuration.
    pub fn resume(&mut self, snapshot: Snapshot) {
        self.n = snapshot.n;
        self.t = snapshot.t;
        self.rng = snapshot.rng;
        if let Some(window) = self.window.as_mut() {
            window.set_n_move(snapshot.n_move);
        }
        for (s, particles) in self.species.iter_mut().zip(snapshot.species.into_iter()) {
            s.particles = particles;
        }
        self.emf.restore_from_physical(
            [snapshot.ex, snapshot.ey, snapshot.ez],
            [snapshot.bx, snapshot.by, snapshot.bz],
        );
        self.current.restore_from_physical(snapshot.current);
    }
}

impl Iterator for Simulation {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if let Some(mut cb) = self.report_callback.take() {
            cb(self);
            self.report_callback = Some(cb);
        }
        Some(self.advance_one_step())
    }
}

/// Captures the full state of a simulation: step count, time, RNG stream,
/// every species' particle array and the physical-extent field/current
/// buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    n: u64,
    t: Float,
    n_move: u64,
    rng: Kiss64,
    species: Vec<Vec<Particle>>,
    ex: Array2<Float>,
    ey: Array2<Float>,
    ez: Array2<Float>,
    bx: Array2<Float>,
    by: Array2<Float>,
    bz: Array2<Float>,
    current: [Array2<Float>; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::DensityProfile;

    fn make_species() -> Species {
        Species::new(
            "electrons",
            1.0,
            -1.0,
            [2, 2],
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::zero(),
            DensityProfile::Uniform { n: 1.0 },
        )
        .unwrap()
    }

    #[test]
    fn constructor_rejects_non_positive_box_size() {
        let r = Simulation::new(
            [8, 8],
            [0.0, 1.0],
            0.01,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![make_species()],
            None,
            [1, 1],
        );
        assert!(r.is_err());
    }

    #[test]
    fn iter_advances_n_and_t_consistently() {
        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![make_species()],
            None,
            [1, 1],
        )
        .unwrap();

        for expected in 1..=5u64 {
            let n = sim.iter();
            assert_eq!(n, expected);
        }
        assert!((sim.t() - 5.0 * 0.05).abs() < 1e-12);
    }

    #[test]
    fn periodic_sort_compacts_departed_particles() {
        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![make_species()],
            None,
            [1, 1],
        )
        .unwrap();

        {
            let species = &mut sim.species_mut()[0];
            species.n_sort = 1;
            species.particles.push(Particle {
                ix: -1,
                iy: 0,
                x: 0.0,
                y: 0.0,
                ux: 0.0,
                uy: 0.0,
                uz: 0.0,
            });
        }
        let before = sim.species()[0].particles.len();

        sim.iter();

        let after = sim.species()[0].particles.len();
        assert_eq!(after, before - 1, "sort should compact the departed particle out of the vec");
    }

    #[test]
    fn discrete_charge_conservation_holds_after_a_step() {
        // The zigzag deposition scheme is charge-conserving by construction:
        // per cell, (rho_new - rho_old)/dt + div(J) must vanish to machine
        // precision, independent of the field solve.
        let mut species = make_species();
        species.particles.push(Particle {
            ix: 7,
            iy: 7,
            x: 0.3,
            y: 0.6,
            ux: 0.4,
            uy: -0.2,
            uz: 0.1,
        });
        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![species],
            None,
            [1, 1],
        )
        .unwrap();

        let rho_before = sim.species()[0].charge(sim.grid());
        sim.iter();
        let rho_after = sim.species()[0].charge(sim.grid());
        let [jx, jy, _jz] = sim.current().report();

        let grid = sim.grid();
        let (nx0, nx1) = (grid.nx[0], grid.nx[1]);
        let dt = grid.dt;
        let dx = grid.dx[0];
        let dy = grid.dx[1];
        let cell_area = dx * dy;

        for i in 0..nx0 {
            for j in 0..nx1 {
                let im = (i + nx0 - 1) % nx0;
                let jm = (j + nx1 - 1) % nx1;
                let div_j = (jx[[i, j]] - jx[[im, j]]) / dx + (jy[[i, j]] - jy[[i, jm]]) / dy;
                let drho_dt = (rho_after[[i, j]] - rho_before[[i, j]]) / (dt * cell_area);
                assert!(
                    (drho_dt + div_j).abs() < 1e-6,
                    "continuity violated at ({}, {}): d(rho)/dt = {}, div(J) = {}",
                    i,
                    j,
                    drho_dt,
                    div_j
                );
            }
        }
    }

    #[test]
    fn gauss_law_residual_is_preserved_by_a_step() {
        // With no field solve tying E to rho directly, the Yee update only
        // preserves whatever Gauss's-law residual (div(E) - rho) existed
        // initially; it must neither grow nor shrink it.
        let mut species = make_species();
        species.particles.push(Particle {
            ix: 7,
            iy: 7,
            x: 0.3,
            y: 0.6,
            ux: 0.4,
            uy: -0.2,
            uz: 0.1,
        });
        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![species],
            None,
            [1, 1],
        )
        .unwrap();

        let div_e = |sim: &Simulation, rho: &Array2<Float>| -> Array2<Float> {
            let grid = sim.grid();
            let (nx0, nx1) = (grid.nx[0], grid.nx[1]);
            let cell_area = grid.dx[0] * grid.dx[1];
            let ex = sim.emf().report(FieldKind::E, 0);
            let ey = sim.emf().report(FieldKind::E, 1);
            let mut residual = Array2::zeros((nx0, nx1));
            for i in 0..nx0 {
                for j in 0..nx1 {
                    let im = (i + nx0 - 1) % nx0;
                    let jm = (j + nx1 - 1) % nx1;
                    let div = (ex[[i, j]] - ex[[im, j]]) / grid.dx[0] + (ey[[i, j]] - ey[[i, jm]]) / grid.dx[1];
                    residual[[i, j]] = div - rho[[i, j]] / cell_area;
                }
            }
            residual
        };

        let rho_before = sim.species()[0].charge(sim.grid());
        let residual_before = div_e(&sim, &rho_before);

        sim.iter();

        let rho_after = sim.species()[0].charge(sim.grid());
        let residual_after = div_e(&sim, &rho_after);

        for (before, after) in residual_before.iter().zip(residual_after.iter()) {
            assert!(
                (after - before).abs() < 1e-6,
                "Gauss's-law residual drifted: before = {}, after = {}",
                before,
                after
            );
        }
    }

    #[test]
    fn energy_drift_stays_bounded_in_a_cold_closed_periodic_run() {
        // Cold (zero thermal spread), closed (periodic, so nothing escapes
        // the box) and laser-free: total energy must drift by no more than
        // 1% over 1000 steps.
        let mut species = Species::new(
            "electrons",
            1.0,
            -1.0,
            [2, 2],
            Vec3::new(0.05, 0.0, 0.0),
            Vec3::zero(),
            DensityProfile::Uniform { n: 1.0 },
        )
        .unwrap();
        species.boundary = [crate::species::Boundary::Periodic, crate::species::Boundary::Periodic];
        let mut ion = Species::new(
            "ions",
            1836.0,
            1.0,
            [2, 2],
            Vec3::zero(),
            Vec3::zero(),
            DensityProfile::Uniform { n: 1.0 },
        )
        .unwrap();
        ion.boundary = [crate::species::Boundary::Periodic, crate::species::Boundary::Periodic];

        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.02,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![species, ion],
            None,
            [11, 22],
        )
        .unwrap();

        let initial = sim.kinetic_energy() + sim.field_energy();
        assert!(initial > 0.0, "the cold drifting configuration must start with nonzero energy");

        for _ in 0..1000 {
            sim.iter();
        }

        let total = sim.kinetic_energy() + sim.field_energy();
        let drift = (total - initial).abs() / initial;
        assert!(drift <= 0.01, "energy drift {} exceeds the 1% budget over 1000 steps", drift);
    }

    #[test]
    fn snapshot_round_trips_step_count_and_particles() {
        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![make_species()],
            None,
            [1, 1],
        )
        .unwrap();
        for _ in 0..3 {
            sim.iter();
        }
        let snap = sim.get_snapshot();

        let mut resumed = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![make_species()],
            None,
            [1, 1],
        )
        .unwrap();
        resumed.resume(snap);

        assert_eq!(resumed.n(), 3);
        assert_eq!(resumed.species()[0].particles.len(), sim.species()[0].particles.len());
    }

    #[test]
    fn report_callback_runs_before_every_step() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU64::new(0));
        let calls_in_cb = calls.clone();
        let callback: Box<dyn FnMut(&Simulation) + Send> = Box::new(move |_sim| {
            calls_in_cb.fetch_add(1, Ordering::SeqCst);
        });

        let mut sim = Simulation::new(
            [16, 16],
            [1.6, 1.6],
            0.05,
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            vec![make_species()],
            Some(callback),
            [1, 1],
        )
        .unwrap();

        sim.iter();
        sim.iter();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
