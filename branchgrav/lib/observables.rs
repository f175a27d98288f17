//! Expectation values and norms of wavefunctions sampled on a
//! [`Grid`][crate::grid::Grid].
//!
//! Two estimators are provided for the momentum expectation value:
//! [`expectation_p_op`] applies `-iħ ∂/∂x` through a finite-difference
//! derivative in position space, while [`expectation_p_fft`] integrates over
//! the momentum-space probability density. For smooth states held away from
//! the grid edges the two agree to within discretization error; the spectral
//! form is not subject to finite-difference truncation error.

use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use crate::{
    Arr1,
    error::{ LengthError, ObsError },
    grid::Grid,
    utils::{ fft, fft_shift, wf_norm },
};

pub type OResult<T> = Result<T, ObsError>;

/// Selects a scalar observable to record from a time evolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observable {
    /// ⟨x⟩
    #[default]
    Position,
    /// ⟨p⟩ via the finite-difference momentum operator.
    MomentumOp,
    /// ⟨p⟩ via the momentum-space density.
    MomentumFft,
    /// `Σ |ψ|² dx`
    Norm,
}

impl Observable {
    /// Evaluate the observable for a single wavefunction.
    pub fn eval<S>(&self, psi: &Arr1<S>, grid: &Grid) -> OResult<f64>
    where S: nd::Data<Elem = C64>
    {
        match self {
            Self::Position => expectation_x(psi, &grid.x),
            Self::MomentumOp => expectation_p_op(psi, &grid.x, grid.hbar),
            Self::MomentumFft => expectation_p_fft(psi, grid),
            Self::Norm => {
                LengthError::check(psi, &grid.x)?;
                Ok(norm(psi, grid.dx))
            },
        }
    }
}

// grid spacing from the first two coordinates
fn spacing<S>(x: &Arr1<S>) -> f64
where S: nd::Data<Elem = f64>
{
    x[1] - x[0]
}

/// Probability density `|ψ|²` at each grid point.
pub fn probability_density<S>(psi: &Arr1<S>) -> nd::Array1<f64>
where S: nd::Data<Elem = C64>
{
    psi.mapv(|psik| psik.norm_sqr())
}

/// Norm `Σ |ψ|² dx`.
pub fn norm<S>(psi: &Arr1<S>, dx: f64) -> f64
where S: nd::Data<Elem = C64>
{
    wf_norm(psi, dx)
}

/// Position expectation value `⟨x⟩ = Σ |ψ|² x dx`.
///
/// *Panics if `x` has length less than 2.*
pub fn expectation_x<S, T>(psi: &Arr1<S>, x: &Arr1<T>) -> OResult<f64>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = f64>,
{
    LengthError::check(psi, x)?;
    let dx = spacing(x);
    let sum: f64
        = psi.iter().zip(x)
        .map(|(psik, xk)| psik.norm_sqr() * xk)
        .sum();
    Ok(sum * dx)
}

/// Derivative of a uniformly sampled function, using central differences in
/// the interior and first-order one-sided differences at either edge.
///
/// *Panics if `f` has length less than 2.*
pub fn gradient<S>(f: &Arr1<S>, dx: f64) -> nd::Array1<C64>
where S: nd::Data<Elem = C64>
{
    let n = f.len();
    let mut df: nd::Array1<C64> = nd::Array1::zeros(n);
    df[0] = (f[1] - f[0]) / dx;
    df[n - 1] = (f[n - 1] - f[n - 2]) / dx;
    df.slice_mut(nd::s![1..n - 1]).iter_mut()
        .zip(f.iter().zip(f.iter().skip(2)))
        .for_each(|(dfk, (fkm1, fkp1))| { *dfk = (fkp1 - fkm1) / (2.0 * dx); });
    df
}

/// Momentum expectation value computed in position space as
/// `Re[Σ ψ* (-iħ ∂ψ/∂x) dx]`, with the derivative taken by [`gradient`].
///
/// *Panics if `x` has length less than 2.*
pub fn expectation_p_op<S, T>(psi: &Arr1<S>, x: &Arr1<T>, hbar: f64)
    -> OResult<f64>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = f64>,
{
    LengthError::check(psi, x)?;
    let dx = spacing(x);
    let dpsi = gradient(psi, dx);
    let sum: C64
        = psi.iter().zip(&dpsi)
        .map(|(psik, dpsik)| psik.conj() * (-C64::i() * hbar * dpsik))
        .sum();
    Ok(sum.re * dx)
}

/// Normalized probability density in momentum space, together with the
/// matching momentum coordinates, both in centered (shifted) order.
///
/// The density integrates to 1 over `dp` regardless of the Fourier
/// normalization convention.
pub fn momentum_density<S>(psi: &Arr1<S>, grid: &Grid)
    -> OResult<(nd::Array1<f64>, nd::Array1<f64>)>
where S: nd::Data<Elem = C64>
{
    LengthError::check(psi, &grid.p)?;
    let psi_p = fft_shift(&fft(psi, grid.convention));
    let p = fft_shift(&grid.p);
    let dp = p[1] - p[0];
    let mut density = probability_density(&psi_p);
    let total = density.sum() * dp;
    density.map_inplace(|rk| { *rk /= total; });
    Ok((p, density))
}

/// Momentum expectation value `Σ p ρ(p) dp`, computed from the
/// [momentum-space density][momentum_density].
pub fn expectation_p_fft<S>(psi: &Arr1<S>, grid: &Grid) -> OResult<f64>
where S: nd::Data<Elem = C64>
{
    let (p, density) = momentum_density(psi, grid)?;
    let dp = p[1] - p[0];
    Ok(p.dot(&density) * dp)
}

/// Centers and widths of a wavepacket in position and momentum space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PacketMoments {
    /// ⟨x⟩
    pub x0: f64,
    /// ⟨p⟩
    pub p0: f64,
    /// Position standard deviation.
    pub sigma_x: f64,
    /// Momentum standard deviation.
    pub sigma_p: f64,
}

/// Compute the first two moments of `|ψ|²` in position space and of the
/// [momentum-space density][momentum_density].
///
/// `psi` need not be normalized.
pub fn packet_moments<S>(psi: &Arr1<S>, grid: &Grid) -> OResult<PacketMoments>
where S: nd::Data<Elem = C64>
{
    LengthError::check(psi, &grid.x)?;
    let rho = probability_density(psi);
    let total = rho.sum();
    let x0 = rho.dot(&grid.x) / total;
    let var_x
        = rho.iter().zip(&grid.x)
        .map(|(rk, xk)| rk * (xk - x0).powi(2))
        .sum::<f64>() / total;

    let (p, density) = momentum_density(psi, grid)?;
    let dp = p[1] - p[0];
    let p0 = p.dot(&density) * dp;
    let var_p
        = density.iter().zip(&p)
        .map(|(rk, pk)| rk * (pk - p0).powi(2))
        .sum::<f64>() * dp;
    Ok(PacketMoments { x0, p0, sigma_x: var_x.sqrt(), sigma_p: var_p.sqrt() })
}

/// Overlap `|⟨ψ₁|ψ₂⟩|` of two wavefunctions.
///
/// Not yet implemented; always returns [`ObsError::Unimplemented`].
pub fn overlap<S, T>(_psi1: &Arr1<S>, _psi2: &Arr1<T>, _dx: f64)
    -> OResult<f64>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    Err(ObsError::Unimplemented("overlap"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::states::Gaussian;

    fn packet(grid: &Grid, x0: f64, p0: f64) -> nd::Array1<C64> {
        Gaussian { x0, p0, sigma: 1.0 }.eval_normalized(&grid.x, grid.dx, grid.hbar)
    }

    #[test]
    fn position_expectation_tracks_center() {
        let grid = Grid::new(1024, 40.0, 1.0).unwrap();
        let psi = packet(&grid, 3.0, 0.0);
        assert_abs_diff_eq!(expectation_x(&psi, &grid.x).unwrap(), 3.0, epsilon = 1e-8);
    }

    #[test]
    fn momentum_estimators_agree() {
        let grid = Grid::new(1024, 40.0, 1.0).unwrap();
        let psi = packet(&grid, -2.0, 2.0);
        let p_op = expectation_p_op(&psi, &grid.x, grid.hbar).unwrap();
        let p_fft = expectation_p_fft(&psi, &grid).unwrap();
        assert_abs_diff_eq!(p_fft, 2.0, epsilon = 1e-8);
        assert!((p_op - p_fft).abs() / p_fft.abs() < 0.02);
    }

    #[test]
    fn momentum_density_is_normalized() {
        let grid = Grid::new(256, 20.0, 1.0).unwrap();
        let psi = packet(&grid, 0.0, 1.0);
        let (p, density) = momentum_density(&psi, &grid).unwrap();
        assert!(p.iter().zip(p.iter().skip(1)).all(|(a, b)| a < b));
        assert_abs_diff_eq!(density.sum() * (p[1] - p[0]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn gradient_is_exact_for_linear_functions() {
        let x = nd::Array1::linspace(0.0, 1.0, 11);
        let f = x.mapv(|xk| C64::new(3.0 * xk, -xk));
        let df = gradient(&f, 0.1);
        df.iter().for_each(|dfk| {
            assert_abs_diff_eq!(dfk.re, 3.0, epsilon = 1e-10);
            assert_abs_diff_eq!(dfk.im, -1.0, epsilon = 1e-10);
        });
    }

    #[test]
    fn observable_selector_dispatches() {
        let grid = Grid::new(512, 40.0, 1.0).unwrap();
        let psi = packet(&grid, 1.0, 0.5);
        assert_abs_diff_eq!(Observable::Norm.eval(&psi, &grid).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Observable::Position.eval(&psi, &grid).unwrap(), 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(Observable::MomentumFft.eval(&psi, &grid).unwrap(), 0.5, epsilon = 1e-8);
    }

    #[test]
    fn moments_of_a_gaussian() {
        let grid = Grid::new(1024, 40.0, 1.0).unwrap();
        let psi = packet(&grid, 2.0, 1.0);
        let m = packet_moments(&psi, &grid).unwrap();
        assert_abs_diff_eq!(m.x0, 2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(m.p0, 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(m.sigma_x, 1.0, epsilon = 1e-6);
        // minimum uncertainty: σ_p = ħ / 2σ_x
        assert_abs_diff_eq!(m.sigma_p, 0.5, epsilon = 1e-6);
        // unnormalized input gives the same moments
        let scaled = psi.mapv(|q| q * 3.0);
        assert_abs_diff_eq!(packet_moments(&scaled, &grid).unwrap().sigma_x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let grid = Grid::new(16, 4.0, 1.0).unwrap();
        let psi: nd::Array1<C64> = nd::Array1::zeros(8);
        assert!(matches!(expectation_x(&psi, &grid.x), Err(ObsError::Length(_))));
    }

    #[test]
    fn overlap_is_unimplemented() {
        let psi: nd::Array1<C64> = nd::Array1::zeros(4);
        assert!(matches!(overlap(&psi, &psi, 1.0), Err(ObsError::Unimplemented("overlap"))));
    }
}
