//! Deviation statistics over ensembles of observable time series.
//!
//! Matrices are indexed as `realization × time`. NaN rows, as left by failed
//! realizations in an [`EnsembleResult`][crate::ensemble::EnsembleResult],
//! propagate through [`observable_deviation`] and [`rms_deviation`] and are
//! skipped by [`failure_probability`], [`summarize`], and [`time_profile`].

use ndarray as nd;
use serde::{ Deserialize, Serialize };
use crate::{ Arr1, Arr2, error::LengthError };

/// Elementwise difference `obs_branch - obs_eff` of two `R × T` matrices.
pub fn observable_deviation<S, T>(obs_branch: &Arr2<S>, obs_eff: &Arr2<T>)
    -> Result<nd::Array2<f64>, LengthError>
where
    S: nd::Data<Elem = f64>,
    T: nd::Data<Elem = f64>,
{
    LengthError::check_len(obs_branch.nrows(), obs_eff.nrows())?;
    LengthError::check_len(obs_branch.ncols(), obs_eff.ncols())?;
    Ok(obs_branch - obs_eff)
}

/// Root-mean-square over time of each realization's deviation, producing one
/// value per realization.
pub fn rms_deviation<S>(deviation: &Arr2<S>) -> nd::Array1<f64>
where S: nd::Data<Elem = f64>
{
    deviation.outer_iter()
        .map(|row| (row.iter().map(|d| d * d).sum::<f64>() / row.len() as f64).sqrt())
        .collect()
}

/// Fraction of realizations whose RMS deviation exceeds `threshold`.
///
/// Non-finite entries are excluded from both counts. Returns NaN if no finite
/// entries remain. This is a Monte Carlo estimate with sampling error of order
/// `1/√R`.
pub fn failure_probability<S>(rms: &Arr1<S>, threshold: f64) -> f64
where S: nd::Data<Elem = f64>
{
    let (exceed, total)
        = rms.iter()
        .filter(|r| r.is_finite())
        .fold((0_usize, 0_usize), |(e, t), r| (e + usize::from(*r > threshold), t + 1));
    if total == 0 { return f64::NAN; }
    exceed as f64 / total as f64
}

/// Summary statistics of a scalar ensemble.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Mean, population standard deviation, minimum, and maximum of the finite
/// entries of `data`.
///
/// All fields are NaN if there are no finite entries.
pub fn summarize<'a, I>(data: I) -> Summary
where I: IntoIterator<Item = &'a f64>
{
    let finite: Vec<f64> = data.into_iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return Summary { mean: f64::NAN, std: f64::NAN, min: f64::NAN, max: f64::NAN };
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Summary { mean, std: var.sqrt(), min, max }
}

/// Mean and population standard deviation of every element of a deviation
/// matrix.
pub fn summarize_deviation<S>(deviation: &Arr2<S>) -> (f64, f64)
where S: nd::Data<Elem = f64>
{
    let Summary { mean, std, .. } = summarize(deviation.iter());
    (mean, std)
}

/// Per-time mean and population standard deviation of a deviation matrix
/// across realizations, skipping non-finite entries.
pub fn time_profile<S>(deviation: &Arr2<S>)
    -> (nd::Array1<f64>, nd::Array1<f64>)
where S: nd::Data<Elem = f64>
{
    let (mean, std): (Vec<f64>, Vec<f64>)
        = deviation.axis_iter(nd::Axis(1))
        .map(|col| {
            let s = summarize(col.iter());
            (s.mean, s.std)
        })
        .unzip();
    (nd::Array1::from_vec(mean), nd::Array1::from_vec(std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn deviation_and_rms() {
        let b = nd::array![[1.0, 2.0, 3.0, 4.0], [0.0, 0.0, 0.0, 0.0]];
        let e = nd::array![[1.0, 1.0, 1.0, 1.0], [3.0, -3.0, 3.0, -3.0]];
        let dev = observable_deviation(&b, &e).unwrap();
        assert_eq!(dev, nd::array![[0.0, 1.0, 2.0, 3.0], [-3.0, 3.0, -3.0, 3.0]]);
        let rms = rms_deviation(&dev);
        assert_abs_diff_eq!(rms[0], (14.0_f64 / 4.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(rms[1], 3.0, epsilon = 1e-12);
        assert!(observable_deviation(&b, &e.slice(nd::s![.., ..2])).is_err());
    }

    #[test]
    fn failure_probability_counts_exceedances() {
        let rms = nd::array![0.1, 0.3, 0.5, f64::NAN];
        assert_abs_diff_eq!(failure_probability(&rms, 0.2), 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(failure_probability(&rms, 0.4), 1.0 / 3.0);
        assert_eq!(failure_probability(&rms, 0.5), 0.0);
        assert_eq!(failure_probability(&rms, 1.0), 0.0);
        assert!(failure_probability(&nd::array![f64::NAN], 1.0).is_nan());
    }

    #[test]
    fn summary_statistics() {
        let s = summarize(nd::array![1.0, 2.0, 3.0, 4.0, f64::NAN].iter());
        assert_eq!(s.mean, 2.5);
        assert_abs_diff_eq!(s.std, 1.25_f64.sqrt(), epsilon = 1e-12);
        assert_eq!((s.min, s.max), (1.0, 4.0));
        assert!(summarize(std::iter::empty()).mean.is_nan());
    }

    #[test]
    fn time_profile_is_columnwise() {
        let dev = nd::array![[1.0, 0.0], [3.0, 0.0], [f64::NAN, f64::NAN]];
        let (mean, std) = time_profile(&dev);
        assert_eq!(mean, nd::array![2.0, 0.0]);
        assert_eq!(std, nd::array![1.0, 0.0]);
        let (m, s) = summarize_deviation(&dev);
        assert_abs_diff_eq!(m, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s, 1.5_f64.sqrt(), epsilon = 1e-12);
    }
}
