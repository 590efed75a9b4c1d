//! Grid geometry: cell counts, cell size, physical box, guard cells and
//! per-axis boundary policy.

use crate::error::{ErrorKind, Result};
use crate::Float;
use serde::{Deserialize, Serialize};

/// Per-axis field/grid boundary policy. `MovingWindow` only ever applies to
/// axis 0 and is handled by [`crate::window`]; the grid itself treats it
/// like `Open` for the purposes of guard-cell refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisBoundary {
    Periodic,
    Open,
    MovingWindow,
}

/// Guard-cell width on the low and high side of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardCells {
    pub lo: usize,
    pub hi: usize,
}

impl GuardCells {
    pub fn new(lo: usize, hi: usize) -> GuardCells {
        GuardCells { lo, hi }
    }

    pub fn total(&self) -> usize {
        self.lo + self.hi
    }
}

/// Grid geometry shared by the field, current and species state.
///
/// The deposition stencil used by [`crate::current`] needs two guard cells
/// on the lower side of each axis; `Grid::new` enforces this minimum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Grid {
    pub nx: [usize; 2],
    pub dx: [Float; 2],
    pub gc: [GuardCells; 2],
    pub boundary: [AxisBoundary; 2],
    pub dt: Float,
}

impl Grid {
    /// Validates and constructs a grid. Rejects `nx < 2`, non-positive cell
    /// sizes, non-positive `dt`, and `dt` violating the Courant condition
    /// `c * dt < min(dx_i)` (`c = 1` in natural units).
    pub fn new(
        nx: [usize; 2],
        dx: [Float; 2],
        boundary: [AxisBoundary; 2],
        dt: Float,
    ) -> Result<Grid> {
        for (axis, &n) in nx.iter().enumerate() {
            if n < 2 {
                bail!(ErrorKind::Configuration(format!(
                    "nx[{}] = {} is smaller than the minimum of 2",
                    axis, n
                )));
            }
        }
        for (axis, &d) in dx.iter().enumerate() {
            if d <= 0.0 {
                bail!(ErrorKind::Configuration(format!(
                    "dx[{}] = {} must be positive",
                    axis, d
                )));
            }
        }
        if dt <= 0.0 {
            bail!(ErrorKind::Configuration(format!(
                "dt = {} must be positive",
                dt
            )));
        }
        let dx_min = dx[0].min(dx[1]);
        if dt >= dx_min {
            bail!(ErrorKind::Configuration(format!(
                "dt = {} violates the Courant condition c*dt < min(dx) = {}",
                dt, dx_min
            )));
        }

        let gc = [GuardCells::new(2, 1), GuardCells::new(2, 1)];

        Ok(Grid {
            nx,
            dx,
            gc,
            boundary,
            dt,
        })
    }

    /// Physical box size, `nx * dx`.
    pub fn box_size(&self) -> [Float; 2] {
        [
            self.nx[0] as Float * self.dx[0],
            self.nx[1] as Float * self.dx[1],
        ]
    }

    /// Total extended size of a buffer along `axis`, guard cells included.
    pub fn extended_size(&self, axis: usize) -> usize {
        self.gc[axis].lo + self.nx[axis] + self.gc[axis].hi
    }

    pub fn extended_shape(&self) -> (usize, usize) {
        (self.extended_size(0), self.extended_size(1))
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.boundary[axis] == AxisBoundary::Periodic
    }

    pub fn is_moving_window(&self, axis: usize) -> bool {
        self.boundary[axis] == AxisBoundary::MovingWindow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_small_nx() {
        let r = Grid::new(
            [1, 8],
            [0.1, 0.1],
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            0.01,
        );
        assert!(r.is_err());
    }

    #[test]
    fn rejects_courant_violation() {
        let r = Grid::new(
            [8, 8],
            [0.1, 0.1],
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            0.2,
        );
        assert!(r.is_err());
    }

    #[test]
    fn accepts_valid_grid() {
        let g = Grid::new(
            [8, 8],
            [0.1, 0.1],
            [AxisBoundary::Periodic, AxisBoundary::Periodic],
            0.05,
        )
        .unwrap();
        assert_eq!(g.box_size(), [0.8, 0.8]);
        assert_eq!(g.extended_shape(), (11, 11));
    }
}
