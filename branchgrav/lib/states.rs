//! Initial wavefunctions.

use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use crate::{ Arr1, utils::wf_normalized };

/// Parameters of a Gaussian wavepacket.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gaussian {
    /// Center position.
    pub x0: f64,
    /// Mean momentum.
    pub p0: f64,
    /// Position-space width (standard deviation of `|ψ|²`).
    pub sigma: f64,
}

impl Default for Gaussian {
    fn default() -> Self { Self { x0: 0.0, p0: 0.0, sigma: 1.0 } }
}

impl Gaussian {
    /// Evaluate the (unnormalized) wavepacket on a grid; see
    /// [`gaussian_wavepacket`].
    pub fn eval<S>(&self, x: &Arr1<S>, hbar: f64) -> nd::Array1<C64>
    where S: nd::Data<Elem = f64>
    {
        gaussian_wavepacket(x, self.x0, self.p0, self.sigma, hbar)
    }

    /// Evaluate the wavepacket on a grid and normalize it to unit norm.
    pub fn eval_normalized<S>(&self, x: &Arr1<S>, dx: f64, hbar: f64)
        -> nd::Array1<C64>
    where S: nd::Data<Elem = f64>
    {
        normalize(&self.eval(x, hbar), dx)
    }
}

/// Construct a Gaussian wavepacket
/// ```text
/// ψ(x) = exp(-(x - x0)² / (4 σ²) + i p0 (x - x0) / ħ)
/// ```
///
/// The result is the analytic envelope only: it is **not** normalized, and
/// must be passed through [`normalize`] before computing any observable.
pub fn gaussian_wavepacket<S>(
    x: &Arr1<S>,
    x0: f64,
    p0: f64,
    sigma: f64,
    hbar: f64,
) -> nd::Array1<C64>
where S: nd::Data<Elem = f64>
{
    x.mapv(|xk| {
        let u = xk - x0;
        C64::new(-u.powi(2) / (4.0 * sigma.powi(2)), p0 * u / hbar).exp()
    })
}

/// Normalize a wavefunction on a discrete grid, dividing by the square root of
/// `Σ |ψ|² dx`.
pub fn normalize<S>(psi: &Arr1<S>, dx: f64) -> nd::Array1<C64>
where S: nd::Data<Elem = C64>
{
    wf_normalized(psi, dx)
}
