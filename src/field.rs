//! Electromagnetic field state on a staggered (Yee) grid and its leapfrog
//! advance.
//!
//! Component layout: `Ex` at `(i+1/2, j)`, `Ey` at
//! `(i, j+1/2)`, `Ez` at `(i+1/2, j+1/2)`; `Bx` at `(i, j+1/2)`, `By` at
//! `(i+1/2, j)`, `Bz` at `(i, j)`. Array index `[i, j]` always refers to the
//! extended (guard-cell-including) buffer; the half-integer offset is
//! implicit in which component array is being read, exactly as in a
//! conventional Yee-FDTD implementation — no fractional indices are ever
//! materialized.

use crate::current::Current;
use crate::grid::{AxisBoundary, Grid};
use crate::vecfield::Vec3;
use crate::Float;
use ndarray::Array2;

/// The six field components, each stored on the grid's extended shape.
#[derive(Debug, Clone)]
struct Components {
    ex: Array2<Float>,
    ey: Array2<Float>,
    ez: Array2<Float>,
    bx: Array2<Float>,
    by: Array2<Float>,
    bz: Array2<Float>,
}

impl Components {
    fn zeros(shape: (usize, usize)) -> Components {
        Components {
            ex: Array2::zeros(shape),
            ey: Array2::zeros(shape),
            ez: Array2::zeros(shape),
            bx: Array2::zeros(shape),
            by: Array2::zeros(shape),
            bz: Array2::zeros(shape),
        }
    }
}

/// A frozen or analytically re-evaluated external field, summed into the
/// particle-facing field but never touched by the Maxwell advance.
pub struct ExternalOverlay {
    fields: Components,
    /// Re-evaluates the overlay at a physical position; used to fill the
    /// column newly exposed by a moving-window shift. `None` means the
    /// newly exposed column is simply zeroed.
    #[allow(clippy::type_complexity)]
    analytic: Option<Box<dyn Fn(Float, Float) -> (Vec3, Vec3) + Send + Sync>>,
}

impl ExternalOverlay {
    fn uniform(shape: (usize, usize), e0: Vec3, b0: Vec3) -> ExternalOverlay {
        let mut fields = Components::zeros(shape);
        fields.ex.fill(e0.x);
        fields.ey.fill(e0.y);
        fields.ez.fill(e0.z);
        fields.bx.fill(b0.x);
        fields.by.fill(b0.y);
        fields.bz.fill(b0.z);
        ExternalOverlay {
            fields,
            analytic: None,
        }
    }
}

/// Self-consistent electromagnetic field state plus an optional external
/// overlay.
pub struct EmfField {
    grid: Grid,
    fields: Components,
    external: Option<ExternalOverlay>,
}

impl EmfField {
    pub fn new(grid: Grid) -> EmfField {
        let shape = grid.extended_shape();
        EmfField {
            grid,
            fields: Components::zeros(shape),
            external: None,
        }
    }

    /// Installs a uniform external field overlay, summed into particle-facing
    /// reads but excluded from the self-consistent Maxwell advance.
    pub fn set_external(&mut self, e0: Vec3, b0: Vec3) {
        self.external = Some(ExternalOverlay::uniform(self.grid.extended_shape(), e0, b0));
    }

    /// Installs (or replaces) the analytic function used to re-evaluate the
    /// overlay's newly exposed column during a moving-window shift.
    pub fn set_external_analytic<F>(&mut self, f: F)
    where
        F: Fn(Float, Float) -> (Vec3, Vec3) + Send + Sync + 'static,
    {
        if let Some(ext) = self.external.as_mut() {
            ext.analytic = Some(Box::new(f));
        }
    }

    fn phys(&self, i: usize, j: usize) -> (usize, usize) {
        (i + self.grid.gc[0].lo, j + self.grid.gc[1].lo)
    }

    /// Adds a laser pulse's fields directly into the self-consistent state,
    /// as an initial condition (see [`crate::laser`]).
    pub fn add_laser_fields(&mut self, add: impl Fn(Float, Float) -> (Vec3, Vec3)) {
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let (dx, dy) = (self.grid.dx[0], self.grid.dx[1]);
        for i in 0..nx0 {
            for j in 0..nx1 {
                let (pi, pj) = self.phys(i, j);
                let x = (i as Float + 0.5) * dx;
                let y = (j as Float + 0.5) * dy;
                let (e, b) = add(x, y);
                self.fields.ex[[pi, pj]] += e.x;
                self.fields.ey[[pi, pj]] += e.y;
                self.fields.ez[[pi, pj]] += e.z;
                self.fields.bx[[pi, pj]] += b.x;
                self.fields.by[[pi, pj]] += b.y;
                self.fields.bz[[pi, pj]] += b.z;
            }
        }
        self.refresh_all_boundaries();
    }

    /// Advances the field by one full Maxwell leapfrog step:
    /// `B(-dt/2) -> E(+dt) -> B(+dt/2)`, refreshing guard cells after each
    /// half/full update.
    pub fn advance(&mut self, current: &Current, dt: Float) {
        self.step_b(dt / 2.0);
        self.refresh_b_boundaries();
        self.step_e(current, dt);
        self.refresh_e_boundaries();
        self.step_b(dt / 2.0);
        self.refresh_b_boundaries();
    }

    fn step_b(&mut self, half_dt: Float) {
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let dtdx = half_dt / self.grid.dx[0];
        let dtdy = half_dt / self.grid.dx[1];

        for i in 0..nx0 {
            for j in 0..nx1 {
                let (pi, pj) = (i + lo0, j + lo1);
                let dez_dy = self.fields.ez[[pi, pj]] - self.fields.ez[[pi, pj - 1]];
                let dez_dx = self.fields.ez[[pi, pj]] - self.fields.ez[[pi - 1, pj]];
                let dey_dx = self.fields.ey[[pi, pj]] - self.fields.ey[[pi - 1, pj]];
                let dex_dy = self.fields.ex[[pi, pj]] - self.fields.ex[[pi, pj - 1]];

                self.fields.bx[[pi, pj]] -= dtdy * dez_dy;
                self.fields.by[[pi, pj]] += dtdx * dez_dx;
                self.fields.bz[[pi, pj]] -= dtdx * dey_dx - dtdy * dex_dy;
            }
        }
    }

    fn step_e(&mut self, current: &Current, dt: Float) {
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let dtdx = dt / self.grid.dx[0];
        let dtdy = dt / self.grid.dx[1];

        for i in 0..nx0 {
            for j in 0..nx1 {
                let (pi, pj) = (i + lo0, j + lo1);
                let dbz_dy = self.fields.bz[[pi, pj + 1]] - self.fields.bz[[pi, pj]];
                let dbz_dx = self.fields.bz[[pi + 1, pj]] - self.fields.bz[[pi, pj]];
                let dby_dx = self.fields.by[[pi + 1, pj]] - self.fields.by[[pi, pj]];
                let dbx_dy = self.fields.bx[[pi, pj + 1]] - self.fields.bx[[pi, pj]];

                self.fields.ex[[pi, pj]] += dtdy * dbz_dy - dt * current.jx[[pi, pj]];
                self.fields.ey[[pi, pj]] -= dtdx * dbz_dx + dt * current.jy[[pi, pj]];
                self.fields.ez[[pi, pj]] += dtdx * dby_dx - dtdy * dbx_dy - dt * current.jz[[pi, pj]];
            }
        }
    }

    fn refresh_all_boundaries(&mut self) {
        self.refresh_e_boundaries();
        self.refresh_b_boundaries();
    }

    fn refresh_e_boundaries(&mut self) {
        refresh_component(&mut self.fields.ex, &self.grid);
        refresh_component(&mut self.fields.ey, &self.grid);
        refresh_component(&mut self.fields.ez, &self.grid);
    }

    fn refresh_b_boundaries(&mut self) {
        refresh_component(&mut self.fields.bx, &self.grid);
        refresh_component(&mut self.fields.by, &self.grid);
        refresh_component(&mut self.fields.bz, &self.grid);
    }

    /// Sum of the six field-energy integrals `(E_x^2, E_y^2, E_z^2, B_x^2,
    /// B_y^2, B_z^2)`, each integrated (summed times cell area) over the
    /// physical domain.
    pub fn energy(&self) -> [Float; 6] {
        let cell_area = self.grid.dx[0] * self.grid.dx[1];
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let mut e = [0.0; 6];
        for i in 0..nx0 {
            for j in 0..nx1 {
                let (pi, pj) = (i + lo0, j + lo1);
                e[0] += self.fields.ex[[pi, pj]].powi(2);
                e[1] += self.fields.ey[[pi, pj]].powi(2);
                e[2] += self.fields.ez[[pi, pj]].powi(2);
                e[3] += self.fields.bx[[pi, pj]].powi(2);
                e[4] += self.fields.by[[pi, pj]].powi(2);
                e[5] += self.fields.bz[[pi, pj]].powi(2);
            }
        }
        for v in &mut e {
            *v *= cell_area;
        }
        e
    }

    /// Returns a physical-extent (guard cells hidden) copy of a field
    /// component, selected by name, for diagnostics.
    pub fn report(&self, kind: FieldKind, component: usize) -> Array2<Float> {
        let arr = match (kind, component) {
            (FieldKind::E, 0) => &self.fields.ex,
            (FieldKind::E, 1) => &self.fields.ey,
            (FieldKind::E, 2) => &self.fields.ez,
            (FieldKind::B, 0) => &self.fields.bx,
            (FieldKind::B, 1) => &self.fields.by,
            (FieldKind::B, _) => &self.fields.bz,
            (FieldKind::E, _) => &self.fields.ez,
        };
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        arr.slice(ndarray::s![lo0..lo0 + nx0, lo1..lo1 + nx1]).to_owned()
    }

    /// The field value used by the particle pusher: self-consistent field
    /// plus external overlay, read with CIC weights at a particle's
    /// continuous position. `ix, iy` are the particle's physical cell
    /// indices and `x, y` its in-cell offset in `[0, 1)`.
    pub fn interpolate(&self, ix: usize, iy: usize, x: Float, y: Float) -> (Vec3, Vec3) {
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (pi, pj) = (ix + lo0, iy + lo1);

        let e = Vec3::new(
            cic_x_staggered(&self.fields.ex, pi, pj, x, y),
            cic_y_staggered(&self.fields.ey, pi, pj, x, y),
            cic_xy_staggered(&self.fields.ez, pi, pj, x, y),
        );
        let b = Vec3::new(
            cic_y_staggered(&self.fields.bx, pi, pj, x, y),
            cic_x_staggered(&self.fields.by, pi, pj, x, y),
            cic_center(&self.fields.bz, pi, pj, x, y),
        );

        match &self.external {
            None => (e, b),
            Some(ext) => {
                let ee = Vec3::new(
                    cic_x_staggered(&ext.fields.ex, pi, pj, x, y),
                    cic_y_staggered(&ext.fields.ey, pi, pj, x, y),
                    cic_xy_staggered(&ext.fields.ez, pi, pj, x, y),
                );
                let be = Vec3::new(
                    cic_y_staggered(&ext.fields.bx, pi, pj, x, y),
                    cic_x_staggered(&ext.fields.by, pi, pj, x, y),
                    cic_center(&ext.fields.bz, pi, pj, x, y),
                );
                (e + ee, b + be)
            }
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Overwrites the physical (guard-cell-hidden) interior from a
    /// snapshot and refreshes guard cells, used by
    /// [`crate::simulation::Simulation::resume`].
    pub fn restore_from_physical(&mut self, e: [Array2<Float>; 3], b: [Array2<Float>; 3]) {
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let mut dst = [
            &mut self.fields.ex,
            &mut self.fields.ey,
            &mut self.fields.ez,
            &mut self.fields.bx,
            &mut self.fields.by,
            &mut self.fields.bz,
        ];
        let src = [&e[0], &e[1], &e[2], &b[0], &b[1], &b[2]];
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            d.slice_mut(ndarray::s![lo0..lo0 + nx0, lo1..lo1 + nx1]).assign(s);
        }
        self.refresh_all_boundaries();
    }

    pub(crate) fn shift_left(&mut self) {
        shift_component_left(&mut self.fields.ex, &self.grid);
        shift_component_left(&mut self.fields.ey, &self.grid);
        shift_component_left(&mut self.fields.ez, &self.grid);
        shift_component_left(&mut self.fields.bx, &self.grid);
        shift_component_left(&mut self.fields.by, &self.grid);
        shift_component_left(&mut self.fields.bz, &self.grid);
        self.refresh_all_boundaries();

        if let Some(ext) = self.external.as_mut() {
            shift_component_left(&mut ext.fields.ex, &self.grid);
            shift_component_left(&mut ext.fields.ey, &self.grid);
            shift_component_left(&mut ext.fields.ez, &self.grid);
            shift_component_left(&mut ext.fields.bx, &self.grid);
            shift_component_left(&mut ext.fields.by, &self.grid);
            shift_component_left(&mut ext.fields.bz, &self.grid);

            if let Some(f) = &ext.analytic {
                let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
                let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
                let dx = self.grid.dx[0];
                let dy = self.grid.dx[1];
                let i = nx0 - 1;
                for j in 0..nx1 {
                    let x = (i as Float + 0.5) * dx;
                    let y = (j as Float + 0.5) * dy;
                    let (e, b) = f(x, y);
                    let (pi, pj) = (i + lo0, j + lo1);
                    ext.fields.ex[[pi, pj]] = e.x;
                    ext.fields.ey[[pi, pj]] = e.y;
                    ext.fields.ez[[pi, pj]] = e.z;
                    ext.fields.bx[[pi, pj]] = b.x;
                    ext.fields.by[[pi, pj]] = b.y;
                    ext.fields.bz[[pi, pj]] = b.z;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    E,
    B,
}

/// Bilinear (CIC) interpolation for a component whose staggered position is
/// `(i+1/2, j)`: center-weighted in `x` against the two neighboring cell
/// centers, linear in `y` against the two bounding grid lines.
fn cic_x_staggered(a: &Array2<Float>, pi: usize, pj: usize, x: Float, y: Float) -> Float {
    // x in [0, 1) measures offset from the cell's low edge; the component
    // lives at the cell center in x, so weight against the two neighboring
    // centers depending on whether x is in the lower or upper half.
    let (i0, wx) = if x < 0.5 { (pi - 1, 0.5 + x) } else { (pi, x - 0.5) };
    a[[i0, pj]] * (1.0 - wx) * (1.0 - y)
        + a[[i0 + 1, pj]] * wx * (1.0 - y)
        + a[[i0, pj + 1]] * (1.0 - wx) * y
        + a[[i0 + 1, pj + 1]] * wx * y
}

/// Symmetric to [`cic_x_staggered`]: linear in `x` against the two bounding
/// grid lines, center-weighted in `y` against the two neighboring cell
/// centers.
fn cic_y_staggered(a: &Array2<Float>, pi: usize, pj: usize, x: Float, y: Float) -> Float {
    let (j0, wy) = if y < 0.5 { (pj - 1, 0.5 + y) } else { (pj, y - 0.5) };
    a[[pi, j0]] * (1.0 - x) * (1.0 - wy)
        + a[[pi + 1, j0]] * x * (1.0 - wy)
        + a[[pi, j0 + 1]] * (1.0 - x) * wy
        + a[[pi + 1, j0 + 1]] * x * wy
}

fn cic_xy_staggered(a: &Array2<Float>, pi: usize, pj: usize, x: Float, y: Float) -> Float {
    let (i0, wx) = if x < 0.5 { (pi - 1, 0.5 + x) } else { (pi, x - 0.5) };
    let (j0, wy) = if y < 0.5 { (pj - 1, 0.5 + y) } else { (pj, y - 0.5) };
    a[[i0, j0]] * (1.0 - wx) * (1.0 - wy)
        + a[[i0 + 1, j0]] * wx * (1.0 - wy)
        + a[[i0, j0 + 1]] * (1.0 - wx) * wy
        + a[[i0 + 1, j0 + 1]] * wx * wy
}

/// Interpolation for a component sampled at the cell corner `(i, j)`:
/// ordinary CIC in both `x` and `y`.
fn cic_center(a: &Array2<Float>, pi: usize, pj: usize, x: Float, y: Float) -> Float {
    a[[pi, pj]] * (1.0 - x) * (1.0 - y)
        + a[[pi + 1, pj]] * x * (1.0 - y)
        + a[[pi, pj + 1]] * (1.0 - x) * y
        + a[[pi + 1, pj + 1]] * x * y
}

fn refresh_component(a: &mut Array2<Float>, grid: &Grid) {
    refresh_axis(a, grid, 0);
    refresh_axis(a, grid, 1);
}

fn refresh_axis(a: &mut Array2<Float>, grid: &Grid, axis: usize) {
    let nx = grid.nx[axis];
    let lo = grid.gc[axis].lo;
    let hi = grid.gc[axis].hi;

    match grid.boundary[axis] {
        AxisBoundary::Periodic => {
            for g in 0..lo {
                copy_plane(a, axis, lo - 1 - g, lo + nx - 1 - g);
            }
            for g in 0..hi {
                copy_plane(a, axis, lo + nx + g, lo + g);
            }
        }
        AxisBoundary::Open | AxisBoundary::MovingWindow => {
            // First-order Mur-like absorbing condition: the ghost value is
            // extrapolated from the two outermost interior planes so that an
            // outgoing wave passes through with minimal reflection.
            for g in 0..lo {
                let dst = lo - 1 - g;
                mur_extrapolate(a, axis, dst, lo);
            }
            for g in 0..hi {
                let dst = lo + nx + g;
                mur_extrapolate(a, axis, dst, lo + nx - 1);
            }
        }
    }
}

fn copy_plane(a: &mut Array2<Float>, axis: usize, dst: usize, src: usize) {
    if axis == 0 {
        let (d, s) = a.multi_slice_mut((
            ndarray::s![dst..dst + 1, ..],
            ndarray::s![src..src + 1, ..],
        ));
        d.assign(&s);
    } else {
        let (d, s) = a.multi_slice_mut((
            ndarray::s![.., dst..dst + 1],
            ndarray::s![.., src..src + 1],
        ));
        d.assign(&s);
    }
}

fn mur_extrapolate(a: &mut Array2<Float>, axis: usize, dst: usize, edge: usize) {
    // Simple first-order absorbing extrapolation: ghost = edge value (zero
    // gradient), which damps outgoing waves to first order without needing
    // the previous-timestep history a full Mur operator would track.
    copy_plane(a, axis, dst, edge);
}

fn shift_component_left(a: &mut Array2<Float>, grid: &Grid) {
    let nx0 = grid.nx[0];
    let lo0 = grid.gc[0].lo;
    for i in 0..(nx0 - 1) {
        let (mut dst, src) = a.multi_slice_mut((
            ndarray::s![lo0 + i..lo0 + i + 1, ..],
            ndarray::s![lo0 + i + 1..lo0 + i + 2, ..],
        ));
        dst.assign(&src);
    }
    let last = lo0 + nx0 - 1;
    let mut col = a.slice_mut(ndarray::s![last..last + 1, ..]);
    col.fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current::Current;
    use crate::grid::AxisBoundary;

    fn test_grid() -> Grid {
        Grid::new(
            [16, 16],
            [0.1, 0.1],
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            0.05,
        )
        .unwrap()
    }

    #[test]
    fn zero_field_zero_current_is_a_no_op() {
        let grid = test_grid();
        let mut field = EmfField::new(grid);
        let current = Current::new(grid);
        let before = field.energy();
        field.advance(&current, grid.dt);
        let after = field.energy();
        assert_eq!(before, after);
        assert_eq!(after, [0.0; 6]);
    }

    #[test]
    fn energy_is_nonnegative_after_a_kick() {
        let grid = test_grid();
        let mut field = EmfField::new(grid);
        field.set_external(Vec3::new(0.01, 0.0, 0.0), Vec3::zero());
        let current = Current::new(grid);
        field.advance(&current, grid.dt);
        for e in field.energy() {
            assert!(e >= 0.0);
        }
    }

    #[test]
    fn open_boundary_absorbs_an_outgoing_pulse_with_low_reflection() {
        use crate::laser::Laser;

        // A well-resolved plane pulse launched away from either edge should
        // exit through the open (+x) boundary and leave almost no energy
        // bouncing back into the domain.
        let grid = Grid::new(
            [128, 8],
            [0.02, 0.1],
            [AxisBoundary::Open, AxisBoundary::Periodic],
            0.01,
        )
        .unwrap();
        let mut field = EmfField::new(grid);
        let laser = Laser::plane(0.1, 2.0, 0.0, 1.0, 0.2, 0.3, 0.2).unwrap();
        field.add_laser_fields(|x, y| laser.fields_at(x, y));

        let initial_energy: Float = field.energy().iter().sum();
        assert!(initial_energy > 0.0);

        let current = Current::new(grid);
        // Box is 2.56 long; the pulse sits entirely within roughly
        // [1.0, 1.7], well clear of either edge at t = 0. Step well past the
        // ~1.6 time units its leading and trailing edges need to clear the
        // open (+x) boundary at c = 1.
        for _ in 0..300 {
            field.advance(&current, grid.dt);
        }

        let remaining_energy: Float = field.energy().iter().sum();
        let leaked_fraction = remaining_energy / initial_energy;
        assert!(
            leaked_fraction < 0.05,
            "expected the pulse to mostly exit through the open boundary, kept {} of its energy",
            leaked_fraction
        );
    }
}
