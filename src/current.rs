//! Current density accumulator.
//!
//! Deposition itself is driven by [`crate::species`] (the zigzag scheme
//! needs the particle's pre/post-push position, which only the pusher has);
//! this module owns the shared buffer, its boundary exchange and the
//! smoothing hookup.

use crate::grid::{AxisBoundary, Grid};
use crate::smoothing::Smoothing;
use crate::Float;
use ndarray::Array2;

pub struct Current {
    pub(crate) jx: Array2<Float>,
    pub(crate) jy: Array2<Float>,
    pub(crate) jz: Array2<Float>,
    grid: Grid,
}

impl Current {
    pub fn new(grid: Grid) -> Current {
        let shape = grid.extended_shape();
        Current {
            jx: Array2::zeros(shape),
            jy: Array2::zeros(shape),
            jz: Array2::zeros(shape),
            grid,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Zeroes the whole extended buffer; called once at the start of every
    /// step before any species deposits.
    pub fn zero(&mut self) {
        self.jx.fill(0.0);
        self.jy.fill(0.0);
        self.jz.fill(0.0);
    }

    /// Adds a weighted contribution at extended-buffer index `(pi, pj)`.
    /// Interior writes from distinct particles may alias the same cell;
    /// since deposition is single-threaded this needs no locking.
    #[inline]
    pub(crate) fn add(&mut self, pi: usize, pj: usize, jx: Float, jy: Float, jz: Float) {
        self.jx[[pi, pj]] += jx;
        self.jy[[pi, pj]] += jy;
        self.jz[[pi, pj]] += jz;
    }

    /// Applies the boundary condition (periodic wrap-add or open
    /// truncation) and then the smoothing filter. Called once per step,
    /// after all species have deposited.
    pub fn update(&mut self, smoothing: &Smoothing) {
        self.apply_boundary();
        smoothing.apply(&mut self.jx, &self.grid);
        smoothing.apply(&mut self.jy, &self.grid);
        smoothing.apply(&mut self.jz, &self.grid);
    }

    fn apply_boundary(&mut self) {
        wrap_or_truncate(&mut self.jx, &self.grid);
        wrap_or_truncate(&mut self.jy, &self.grid);
        wrap_or_truncate(&mut self.jz, &self.grid);
    }

    /// Overwrites the physical interior from a snapshot, used by
    /// [`crate::simulation::Simulation::resume`].
    pub fn restore_from_physical(&mut self, j: [Array2<Float>; 3]) {
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let mut dst = [&mut self.jx, &mut self.jy, &mut self.jz];
        for (d, s) in dst.iter_mut().zip(j.iter()) {
            d.slice_mut(ndarray::s![lo0..lo0 + nx0, lo1..lo1 + nx1]).assign(s);
        }
    }

    /// Physical-extent (guard cells hidden) copies of the three current
    /// components, for diagnostics and snapshotting.
    pub fn report(&self) -> [Array2<Float>; 3] {
        let (lo0, lo1) = (self.grid.gc[0].lo, self.grid.gc[1].lo);
        let (nx0, nx1) = (self.grid.nx[0], self.grid.nx[1]);
        let slice = |a: &Array2<Float>| a.slice(ndarray::s![lo0..lo0 + nx0, lo1..lo1 + nx1]).to_owned();
        [slice(&self.jx), slice(&self.jy), slice(&self.jz)]
    }

    /// Shifts the buffer left by one cell along axis 0, dropping the
    /// leftmost physical column and zeroing the newly exposed right
    /// column, for a moving-window advance.
    pub(crate) fn shift_left(&mut self) {
        shift_component_left(&mut self.jx, &self.grid);
        shift_component_left(&mut self.jy, &self.grid);
        shift_component_left(&mut self.jz, &self.grid);
    }
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

/// Folds guard-cell contributions back onto the physical domain: periodic
/// axes wrap-add the ghost charge onto the opposite physical edge; open
/// axes simply drop (truncate) charge that was deposited into guard cells.
fn wrap_or_truncate(a: &mut Array2<Float>, grid: &Grid) {
    for axis in 0..2 {
        let nx = grid.nx[axis];
        let lo = grid.gc[axis].lo;
        let hi = grid.gc[axis].hi;

        match grid.boundary[axis] {
            AxisBoundary::Periodic => {
                for g in 0..lo {
                    add_plane(a, axis, lo + nx - 1 - g, lo - 1 - g);
                    zero_plane(a, axis, lo - 1 - g);
                }
                for g in 0..hi {
                    add_plane(a, axis, lo + g, lo + nx + g);
                    zero_plane(a, axis, lo + nx + g);
                }
            }
            AxisBoundary::Open | AxisBoundary::MovingWindow => {
                for g in 0..lo {
                    zero_plane(a, axis, lo - 1 - g);
                }
                for g in 0..hi {
                    zero_plane(a, axis, lo + nx + g);
                }
            }
        }
    }
}

fn add_plane(a: &mut Array2<Float>, axis: usize, dst: usize, src: usize) {
    if axis == 0 {
        let (mut d, s) = a.multi_slice_mut((
            ndarray::s![dst..dst + 1, ..],
            ndarray::s![src..src + 1, ..],
        ));
        d += &s;
    } else {
        let (mut d, s) = a.multi_slice_mut((
            ndarray::s![.., dst..dst + 1],
            ndarray::s![.., src..src + 1],
        ));
        d += &s;
    }
}

fn zero_plane(a: &mut Array2<Float>, axis: usize, idx: usize) {
    if axis == 0 {
        a.slice_mut(ndarray::s![idx..idx + 1, ..]).fill(0.0);
    } else {
        a.slice_mut(ndarray::s![.., idx..idx + 1]).fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::AxisBoundary;
    use crate::smoothing::Smoothing;

    fn test_grid() -> Grid {
        Grid::new(
            [8, 8],
            [0.1, 0.1],
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            0.05,
        )
        .unwrap()
    }

    #[test]
    fn zero_clears_the_whole_buffer() {
        let grid = test_grid();
        let mut current = Current::new(grid);
        current.add(0, 0, 1.0, 2.0, 3.0);
        current.zero();
        assert_eq!(current.jx.sum(), 0.0);
        assert_eq!(current.jy.sum(), 0.0);
        assert_eq!(current.jz.sum(), 0.0);
    }

    #[test]
    fn update_with_no_smoothing_is_the_identity_after_deposit() {
        let grid = test_grid();
        let mut current = Current::new(grid);
        let smoothing = Smoothing::none();

        // Deposit squarely inside the physical domain, away from guard cells.
        current.add(4, 4, 1.0, 0.0, 0.0);
        let before = current.jx.clone();
        current.update(&smoothing);
        assert_eq!(current.jx, before);
    }
}
