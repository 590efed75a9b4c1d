//! Binomial / compensated current smoothing filter.
//!
//! A 1D separable `[1, 2, 1]/4` stencil is applied `xlevel` times along axis
//! 0 and `ylevel` times along axis 1. In `compensated` mode, one
//! `[-1, 6, -1]/4` pass follows the binomial passes on each axis that had at
//! least one binomial pass applied.

use crate::grid::{AxisBoundary, Grid};
use crate::Float;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Smoothing {
    pub xlevel: u32,
    pub ylevel: u32,
    pub compensated: bool,
}

impl Smoothing {
    /// No-op filter: `xlevel = ylevel = 0`.
    pub fn none() -> Smoothing {
        Smoothing {
            xlevel: 0,
            ylevel: 0,
            compensated: false,
        }
    }

    pub fn apply(&self, a: &mut Array2<Float>, grid: &Grid) {
        for _ in 0..self.xlevel {
            binomial_pass(a, grid, 0);
        }
        if self.compensated && self.xlevel > 0 {
            compensation_pass(a, grid, 0);
        }

        for _ in 0..self.ylevel {
            binomial_pass(a, grid, 1);
        }
        if self.compensated && self.ylevel > 0 {
            compensation_pass(a, grid, 1);
        }
    }
}

fn refresh_ghost(a: &mut Array2<Float>, grid: &Grid, axis: usize) {
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
            for g in 0..lo {
                copy_plane(a, axis, lo - 1 - g, lo);
            }
            for g in 0..hi {
                copy_plane(a, axis, lo + nx + g, lo + nx - 1);
            }
        }
    }
}

fn copy_plane(a: &mut Array2<Float>, axis: usize, dst: usize, src: usize) {
    if axis == 0 {
        let (mut d, s) = a.multi_slice_mut((
            ndarray::s![dst..dst + 1, ..],
            ndarray::s![src..src + 1, ..],
        ));
        d.assign(&s);
    } else {
        let (mut d, s) = a.multi_slice_mut((
            ndarray::s![.., dst..dst + 1],
            ndarray::s![.., src..src + 1],
        ));
        d.assign(&s);
    }
}

fn stencil_pass(a: &mut Array2<Float>, grid: &Grid, axis: usize, weights: [Float; 3]) {
    refresh_ghost(a, grid, axis);
    let nx0 = grid.nx[0];
    let nx1 = grid.nx[1];
    let lo0 = grid.gc[0].lo;
    let lo1 = grid.gc[1].lo;
    let mut out = Array2::zeros((nx0, nx1));

    for i in 0..nx0 {
        for j in 0..nx1 {
            let (pi, pj) = (i + lo0, j + lo1);
            let (m, c, p) = if axis == 0 {
                (a[[pi - 1, pj]], a[[pi, pj]], a[[pi + 1, pj]])
            } else {
                (a[[pi, pj - 1]], a[[pi, pj]], a[[pi, pj + 1]])
            };
            out[[i, j]] = weights[0] * m + weights[1] * c + weights[2] * p;
        }
    }

    for i in 0..nx0 {
        for j in 0..nx1 {
            a[[i + lo0, j + lo1]] = out[[i, j]];
        }
    }
}

fn binomial_pass(a: &mut Array2<Float>, grid: &Grid, axis: usize) {
    stencil_pass(a, grid, axis, [0.25, 0.5, 0.25]);
}

fn compensation_pass(a: &mut Array2<Float>, grid: &Grid, axis: usize) {
    stencil_pass(a, grid, axis, [-0.25, 1.5, -0.25]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::AxisBoundary;

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
    fn zero_levels_is_identity() {
        let grid = test_grid();
        let mut a = Array2::from_shape_fn(grid.extended_shape(), |(i, j)| (i + j) as Float);
        let before = a.clone();
        Smoothing::none().apply(&mut a, &grid);
        assert_eq!(a, before);
    }

    #[test]
    fn binomial_preserves_uniform_field() {
        let grid = test_grid();
        let mut a = Array2::from_elem(grid.extended_shape(), 3.0);
        let smoothing = Smoothing {
            xlevel: 2,
            ylevel: 2,
            compensated: false,
        };
        smoothing.apply(&mut a, &grid);
        let (lo0, lo1) = (grid.gc[0].lo, grid.gc[1].lo);
        for i in 0..grid.nx[0] {
            for j in 0..grid.nx[1] {
                assert!((a[[i + lo0, j + lo1]] - 3.0).abs() < 1e-10);
            }
        }
    }

    // Both the binomial `[0.25, 0.5, 0.25]` and compensation
    // `[-0.25, 1.5, -0.25]` stencils sum to 1 by construction, so any
    // number of passes in either order must leave a spatially uniform
    // field untouched. Exercise that algebraic property over arbitrary
    // pass counts rather than the two fixed cases above.
    #[quickcheck_macros::quickcheck]
    fn any_pass_combination_preserves_a_uniform_field(xlevel: u8, ylevel: u8, compensated: bool) -> bool {
        let grid = test_grid();
        let mut a = Array2::from_elem(grid.extended_shape(), 5.0);
        let smoothing = Smoothing {
            xlevel: (xlevel % 4) as u32,
            ylevel: (ylevel % 4) as u32,
            compensated,
        };
        smoothing.apply(&mut a, &grid);
        let (lo0, lo1) = (grid.gc[0].lo, grid.gc[1].lo);
        (0..grid.nx[0])
            .all(|i| (0..grid.nx[1]).all(|j| (a[[i + lo0, j + lo1]] - 5.0).abs() < 1e-8))
    }
}
