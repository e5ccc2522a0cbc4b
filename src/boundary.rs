//! The periodic simulation cell and minimum image arithmetic are defined here.

use na::SVector;

use crate::errors::{CorundumError, Result};

/// An orthorhombic periodic cell with its origin at zero.
///
/// All geometry on the hot paths goes through [`SimulationBox::wrap`] and
/// [`SimulationBox::displacement`], which operate component-wise on
/// fixed-width vectors so that the compiler can specialise the 3D case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationBox<const D: usize> {
    side_lengths: SVector<f64, D>,
}

impl<const D: usize> SimulationBox<D> {
    pub fn new(side_lengths: SVector<f64, D>) -> Result<Self> {
        for axis in 0..D {
            if !(side_lengths[axis] > 0.0) {
                return Err(CorundumError::InvalidBoxExtent {
                    axis,
                    extent: side_lengths[axis],
                });
            }
        }
        Ok(Self { side_lengths })
    }

    pub fn side_lengths(&self) -> &SVector<f64, D> {
        &self.side_lengths
    }

    pub fn volume(&self) -> f64 {
        self.side_lengths.iter().product()
    }

    /// Wraps a coordinate back into `[0, L)` on every axis.
    pub fn wrap(&self, c: SVector<f64, D>) -> SVector<f64, D> {
        c.zip_map(&self.side_lengths, |ci, li| ci - li * (ci / li).floor())
    }

    /// The minimum image displacement `a - b`.
    ///
    /// Valid for separations below 1.5 box lengths per axis, which wrapped
    /// coordinates always satisfy.
    pub fn displacement(&self, a: &SVector<f64, D>, b: &SVector<f64, D>) -> SVector<f64, D> {
        (a - b).zip_map(&self.side_lengths, |di, li| di - li * (di / li).round())
    }
}
