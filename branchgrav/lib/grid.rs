//! Consistent position and momentum grids for the pseudo-spectral methods in
//! [`timedep`][crate::timedep].
//!
//! ```
//! use std::f64::consts::TAU;
//! use branchgrav::grid::Grid;
//!
//! let grid = Grid::new(256, 20.0, 1.0).unwrap();
//! assert_eq!(grid.len(), 256);
//! assert!((grid.dp() * grid.dx * 256.0 - TAU).abs() < 1e-10);
//! ```

use std::f64::consts::TAU;
use ndarray as nd;
use serde::{ Deserialize, Serialize };
use crate::{ error::GridError, utils::fft_freq };

pub type GResult<T> = Result<T, GridError>;

// relative tolerance on the conjugacy relation dp dx N = 2π ħ
const CONJUGACY_RTOL: f64 = 1e-10;

/// Normalization convention used by a forward/inverse discrete Fourier
/// transform pair.
///
/// Any convention whose forward and inverse scale factors multiply to `1/N`
/// gives a transform pair that round-trips exactly, which is all the
/// split-operator step requires: the kinetic propagator is a pure phase and
/// does not care where the `1/N` lives.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FourierConvention {
    /// Unnormalized forward transform, `1/N` on the inverse.
    #[default]
    Backward,
    /// `1/√N` on both transforms (unitary).
    Ortho,
}

impl FourierConvention {
    /// Scale factor applied after an unnormalized forward transform of `n`
    /// points.
    pub fn forward_scale(self, n: usize) -> f64 {
        match self {
            Self::Backward => 1.0,
            Self::Ortho => (n as f64).sqrt().recip(),
        }
    }

    /// Scale factor applied after an unnormalized inverse transform of `n`
    /// points.
    pub fn inverse_scale(self, n: usize) -> f64 {
        match self {
            Self::Backward => (n as f64).recip(),
            Self::Ortho => (n as f64).sqrt().recip(),
        }
    }

    /// Return `true` if a forward transform followed by an inverse transform
    /// of `n` points is the identity.
    pub fn round_trips(self, n: usize) -> bool {
        let prod = self.forward_scale(n) * self.inverse_scale(n) * n as f64;
        (prod - 1.0).abs() < 1e-12
    }
}

/// Uniform, periodic spatial grid together with its conjugate momentum grid.
///
/// The spatial grid covers `[-L/2, L/2)` with `N` points: the right edge is
/// excluded so that the grid is exactly one period of the discrete Fourier
/// transform. The momentum grid is `2π ħ` times the FFT sample frequencies for
/// `N` samples at spacing `dx`, in standard (unshifted) FFT order.
#[derive(Clone, Debug)]
pub struct Grid {
    /// Spatial coordinates.
    pub x: nd::Array1<f64>,
    /// Momentum coordinates, in FFT order.
    pub p: nd::Array1<f64>,
    /// Spatial grid spacing.
    pub dx: f64,
    /// Domain length.
    pub length: f64,
    /// Reduced Planck constant.
    pub hbar: f64,
    /// Fourier normalization convention used with this grid.
    pub convention: FourierConvention,
}

impl Grid {
    /// Construct grids of `n` points over a domain of length `length`, using
    /// the default [`FourierConvention`].
    ///
    /// `n` must be at least 2. A single point has no nonzero momentum and
    /// cannot represent any evolution, so it is rejected with
    /// [`GridError::BadSize`] rather than accepted as a degenerate grid.
    pub fn new(n: usize, length: f64, hbar: f64) -> GResult<Self> {
        Self::with_convention(n, length, hbar, FourierConvention::default())
    }

    /// Construct grids of `n` points over a domain of length `length` with an
    /// explicit Fourier convention.
    ///
    /// Subject to the same constraints as [`Grid::new`].
    pub fn with_convention(
        n: usize,
        length: f64,
        hbar: f64,
        convention: FourierConvention,
    ) -> GResult<Self>
    {
        GridError::check_size(n)?;
        GridError::check_length(length)?;
        GridError::check_hbar(hbar)?;
        let dx = length / n as f64;
        let x: nd::Array1<f64>
            = (0..n).map(|k| -length / 2.0 + k as f64 * dx).collect();
        let p = fft_freq(n, dx) * (TAU * hbar);
        Ok(Self { x, p, dx, length, hbar, convention })
    }

    /// Number of grid points.
    pub fn len(&self) -> usize { self.x.len() }

    /// Always `false`; grids have at least two points.
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    /// Momentum grid spacing, `2π ħ / (N dx)`.
    pub fn dp(&self) -> f64 { TAU * self.hbar / (self.len() as f64 * self.dx) }

    /// Largest representable momentum magnitude, `π ħ / dx`.
    pub fn p_max(&self) -> f64 { self.dp() * (self.len() / 2) as f64 }

    /// Check that the momentum grid is conjugate to the spatial grid, i.e. that
    /// `dp dx N = 2π ħ`.
    pub fn check_conjugate(&self) -> GResult<()> {
        let expected = TAU * self.hbar;
        let dp = (self.p[1] - self.p[0]).abs();
        let got = dp * self.dx * self.len() as f64;
        ((got - expected).abs() <= CONJUGACY_RTOL * expected)
            .then_some(())
            .ok_or(GridError::NotConjugate(got, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spatial_grid_is_half_open() {
        let grid = Grid::new(8, 4.0, 1.0).unwrap();
        assert_eq!(grid.x[0], -2.0);
        assert_relative_eq!(grid.x[7], 1.5);
        assert_relative_eq!(grid.dx, 0.5);
        grid.x.iter().zip(grid.x.iter().skip(1))
            .for_each(|(a, b)| assert_relative_eq!(b - a, grid.dx, epsilon = 1e-12));
    }

    #[test]
    fn momentum_grid_is_conjugate() {
        let grid = Grid::new(1024, 40.0, 1.0).unwrap();
        grid.check_conjugate().unwrap();
        assert_eq!(grid.p[0], 0.0);
        assert!(grid.p[grid.len() / 2] < 0.0);
        assert_relative_eq!(grid.p_max(), std::f64::consts::PI / grid.dx, max_relative = 1e-12);
    }

    #[test]
    fn bad_inputs_are_rejected() {
        assert!(matches!(Grid::new(1, 1.0, 1.0), Err(GridError::BadSize(1))));
        assert!(matches!(Grid::new(8, 0.0, 1.0), Err(GridError::BadLength(_))));
        assert!(matches!(Grid::new(8, -1.0, 1.0), Err(GridError::BadLength(_))));
        assert!(matches!(Grid::new(8, 1.0, 0.0), Err(GridError::BadHbar(_))));
    }

    #[test]
    fn conventions_round_trip() {
        for n in [2, 3, 64, 1000] {
            assert!(FourierConvention::Backward.round_trips(n));
            assert!(FourierConvention::Ortho.round_trips(n));
        }
    }
}
