//! Miscellaneous tools.

use ndarray::{ self as nd, Ix1, concatenate };
use num_complex::Complex64 as C64;
use crate::{ Arr1, grid::FourierConvention };

/// Calculate the norm of a wavefunction as the Riemann sum `Σ |q|² dx`.
///
/// Unlike a trapezoidal rule, this treats every grid point identically, which
/// is the correct measure on a periodic grid.
pub fn wf_norm<S>(q: &Arr1<S>, dx: f64) -> f64
where S: nd::Data<Elem = C64>
{
    q.iter().map(|qk| qk.norm_sqr()).sum::<f64>() * dx
}

/// Return a normalized copy of a wavefunction.
pub fn wf_normalized<S>(q: &Arr1<S>, dx: f64) -> nd::Array1<C64>
where S: nd::Data<Elem = C64>
{
    let norm = wf_norm(q, dx).sqrt();
    q.mapv(|qk| qk / norm)
}

/// Generate an array of frequency-space coordinates to accompany a FFT of `n`
/// points for sampling interval `dt`.
///
/// Frequencies are in standard FFT order: zero and positive frequencies first,
/// followed by negative frequencies in increasing order.
pub fn fft_freq(n: usize, dt: f64) -> nd::Array1<f64> {
    let m = if n % 2 == 0 { n / 2 } else { (n + 1) / 2 };
    let fp: nd::Array1<f64>
        = (0..m)
        .map(|k| k as f64 / (n as f64 * dt))
        .collect();
    let fm: nd::Array1<f64>
        = (1..n - m + 1).rev()
        .map(|k| -(k as f64) / (n as f64 * dt))
        .collect();
    concatenate!(nd::Axis(0), fp, fm)
}

/// Return a copy of `x` with indices shifted to map super-Nyquist frequency
/// components to negative frequencies, i.e. so that the zero-frequency
/// component sits at the center of the array.
pub fn fft_shift<S, A>(x: &Arr1<S>) -> nd::Array1<A>
where
    S: nd::Data<Elem = A>,
    A: Clone,
{
    let n = x.len();
    let (p, m)
        = if n % 2 == 0 {
            x.view().split_at(nd::Axis(0), n / 2)
        } else {
            x.view().split_at(nd::Axis(0), n / 2 + 1)
        };
    concatenate!(nd::Axis(0), m.into_owned(), p.into_owned())
}

/// Perform the one-dimensional, complex-valued FFT under a given
/// normalization convention.
pub fn fft<S>(x: &nd::ArrayBase<S, Ix1>, conv: FourierConvention)
    -> nd::Array1<C64>
where S: nd::Data<Elem = C64>
{
    let mut f = x.to_owned();
    fft_inplace(&mut f, conv);
    f
}

/// Perform the one-dimensional, complex-valued FFT in place under a given
/// normalization convention.
pub fn fft_inplace(f: &mut nd::Array1<C64>, conv: FourierConvention) {
    let n: usize = f.len();
    let mut plan = rustfft::FftPlanner::new();
    let fft_plan = plan.plan_fft_forward(n);
    process_contiguous(f, |buf| fft_plan.process(buf));
    let scale = conv.forward_scale(n);
    if scale != 1.0 { f.map_inplace(|fk| { *fk *= scale; }); }
}

/// Perform the one-dimensional, complex-valued inverse FFT under a given
/// normalization convention.
pub fn ifft<S>(f: &nd::ArrayBase<S, Ix1>, conv: FourierConvention)
    -> nd::Array1<C64>
where S: nd::Data<Elem = C64>
{
    let mut x = f.to_owned();
    ifft_inplace(&mut x, conv);
    x
}

/// Perform the one-dimensional, complex-valued inverse FFT in place under a
/// given normalization convention.
pub fn ifft_inplace(x: &mut nd::Array1<C64>, conv: FourierConvention) {
    let n: usize = x.len();
    let mut plan = rustfft::FftPlanner::new();
    let ifft_plan = plan.plan_fft_inverse(n);
    process_contiguous(x, |buf| ifft_plan.process(buf));
    let scale = conv.inverse_scale(n);
    if scale != 1.0 { x.map_inplace(|xk| { *xk *= scale; }); }
}

// run `f` on the contiguous data of `x`, copying through a buffer if `x` is
// not in standard layout
pub(crate) fn process_contiguous<F>(x: &mut nd::Array1<C64>, f: F)
where F: FnOnce(&mut [C64])
{
    match x.as_slice_mut() {
        Some(buf) => f(buf),
        None => {
            let mut buf: Vec<C64> = x.iter().copied().collect();
            f(&mut buf);
            x.iter_mut().zip(buf).for_each(|(xk, bk)| { *xk = bk; });
        },
    }
}
