//! Sampling of noisy branch-weight (probability) vectors for Monte Carlo
//! realizations.
//!
//! Each realization perturbs every component of a mean probability vector by
//! independent Gaussian noise, clips negative results to zero, and
//! renormalizes. Sampling is reproducible: the same seed and inputs always
//! produce the same sequence of vectors.
//!
//! ```
//! use ndarray as nd;
//! use branchgrav::sampler::sample_branch_weights;
//!
//! let mean = nd::array![0.5, 0.5];
//! let a = sample_branch_weights(&mean, 0.05, 10, Some(42)).unwrap();
//! let b = sample_branch_weights(&mean, 0.05, 10, Some(42)).unwrap();
//! assert_eq!(a, b);
//! ```

use ndarray as nd;
use rand::{ SeedableRng, rngs::StdRng };
use rand_distr::{ Distribution, Normal };
use serde::{ Deserialize, Serialize };
use crate::{ Arr1, error::SampleError };

pub type SResult<T> = Result<T, SampleError>;

/// Tolerance on the sum of a mean probability vector.
pub const PROB_SUM_TOL: f64 = 1e-8;

/// Default number of redraws allowed under [`DegeneratePolicy::Resample`].
pub const DEF_MAX_ATTEMPTS: usize = 1000;

/// Treatment of a realization in which every perturbed weight clips to zero,
/// leaving nothing to renormalize.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Redraw the perturbation from the same random stream, up to
    /// `max_attempts` times, then fail with
    /// [`SampleError::ResampleExhausted`].
    Resample { max_attempts: usize },
    /// Replace the realization with the uniform distribution over branches.
    Uniform,
    /// Fail with [`SampleError::Degenerate`].
    Error,
}

impl Default for DegeneratePolicy {
    fn default() -> Self { Self::Resample { max_attempts: DEF_MAX_ATTEMPTS } }
}

/// Check that `mean` is a valid probability vector: non-empty, with
/// non-negative, finite entries summing to 1 within [`PROB_SUM_TOL`].
pub fn check_probabilities<S>(mean: &Arr1<S>) -> SResult<()>
where S: nd::Data<Elem = f64>
{
    (!mean.is_empty()).then_some(()).ok_or(SampleError::EmptyMean)?;
    if let Some((k, pk))
        = mean.iter().enumerate().find(|(_, pk)| !(pk.is_finite() && **pk >= 0.0))
    {
        return Err(SampleError::BadProbability(k, *pk));
    }
    let total = mean.sum();
    ((total - 1.0).abs() <= PROB_SUM_TOL)
        .then_some(())
        .ok_or(SampleError::BadSum(total))
}

/// Sampler of noisy branch-weight vectors around a fixed mean.
#[derive(Clone, Debug)]
pub struct BranchSampler {
    mean: nd::Array1<f64>,
    noise: Normal<f64>,
    policy: DegeneratePolicy,
}

impl BranchSampler {
    /// Create a new sampler, validating `mean` and `sigma`.
    pub fn new<S>(mean: &Arr1<S>, sigma: f64, policy: DegeneratePolicy)
        -> SResult<Self>
    where S: nd::Data<Elem = f64>
    {
        check_probabilities(mean)?;
        SampleError::check_noise(sigma)?;
        let noise
            = Normal::new(0.0, sigma)
            .map_err(|_| SampleError::BadNoise(sigma))?;
        Ok(Self { mean: mean.to_owned(), noise, policy })
    }

    /// Number of branches.
    pub fn branches(&self) -> usize { self.mean.len() }

    /// Draw `n_realizations` probability vectors as the rows of a matrix.
    ///
    /// If `seed` is `None`, the generator is seeded from system entropy.
    pub fn sample(&self, n_realizations: usize, seed: Option<u64>)
        -> SResult<nd::Array2<f64>>
    {
        SampleError::check_realizations(n_realizations)?;
        let mut rng
            = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
        let mut probs: nd::Array2<f64>
            = nd::Array2::zeros((n_realizations, self.branches()));
        for (r, mut row) in probs.outer_iter_mut().enumerate() {
            self.draw_into(r, &mut row, &mut rng)?;
        }
        Ok(probs)
    }

    // perturb, clip, and renormalize one realization into `row`
    fn draw_into(
        &self,
        r: usize,
        row: &mut nd::ArrayViewMut1<f64>,
        rng: &mut StdRng,
    ) -> SResult<()>
    {
        let mut attempts: usize = 0;
        loop {
            row.iter_mut().zip(&self.mean)
                .for_each(|(wk, mk)| {
                    *wk = (mk + self.noise.sample(&mut *rng)).max(0.0);
                });
            let total = row.sum();
            if total > 0.0 {
                row.map_inplace(|wk| { *wk /= total; });
                return Ok(());
            }
            match self.policy {
                DegeneratePolicy::Error => {
                    return Err(SampleError::Degenerate(r));
                },
                DegeneratePolicy::Uniform => {
                    log::warn!(
                        "realization {r}: all branch weights clipped to zero; \
                        using uniform weights"
                    );
                    row.fill((self.branches() as f64).recip());
                    return Ok(());
                },
                DegeneratePolicy::Resample { max_attempts } => {
                    attempts += 1;
                    if attempts > max_attempts {
                        return Err(SampleError::ResampleExhausted(r, max_attempts));
                    }
                    log::debug!(
                        "realization {r}: degenerate draw, resampling \
                        (attempt {attempts})"
                    );
                },
            }
        }
    }
}

/// Draw `n_realizations` noisy, renormalized copies of `mean`, returned as the
/// rows of a `n_realizations × K` matrix, using the default
/// [`DegeneratePolicy`].
///
/// Each entry is perturbed by independent Gaussian noise of standard deviation
/// `sigma`, clipped below at zero, and each row is then renormalized to sum to
/// 1.
pub fn sample_branch_weights<S>(
    mean: &Arr1<S>,
    sigma: f64,
    n_realizations: usize,
    seed: Option<u64>,
) -> SResult<nd::Array2<f64>>
where S: nd::Data<Elem = f64>
{
    BranchSampler::new(mean, sigma, DegeneratePolicy::default())?
        .sample(n_realizations, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_valid(probs: &nd::Array2<f64>) {
        probs.outer_iter().for_each(|row| {
            assert!(row.iter().all(|wk| *wk >= 0.0));
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        });
    }

    #[test]
    fn zero_noise_reproduces_mean() {
        let mean = nd::array![0.2, 0.3, 0.5];
        let probs = sample_branch_weights(&mean, 0.0, 5, Some(1)).unwrap();
        probs.outer_iter().for_each(|row| {
            row.iter().zip(&mean).for_each(|(a, b)| assert_abs_diff_eq!(*a, *b, epsilon = 1e-15));
        });
    }

    #[test]
    fn same_seed_same_output() {
        let mean = nd::array![0.5, 0.5];
        let a = sample_branch_weights(&mean, 0.1, 50, Some(42)).unwrap();
        let b = sample_branch_weights(&mean, 0.1, 50, Some(42)).unwrap();
        let c = sample_branch_weights(&mean, 0.1, 50, Some(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_valid(&a);
    }

    #[test]
    fn invalid_means_are_rejected() {
        assert!(matches!(
            sample_branch_weights(&nd::Array1::<f64>::zeros(0), 0.1, 1, None),
            Err(SampleError::EmptyMean)
        ));
        assert!(matches!(
            sample_branch_weights(&nd::array![0.5, 0.6], 0.1, 1, None),
            Err(SampleError::BadSum(_))
        ));
        assert!(matches!(
            sample_branch_weights(&nd::array![1.5, -0.5], 0.1, 1, None),
            Err(SampleError::BadProbability(1, _))
        ));
        assert!(matches!(
            sample_branch_weights(&nd::array![0.5, 0.5], -0.1, 1, None),
            Err(SampleError::BadNoise(_))
        ));
        assert!(matches!(
            sample_branch_weights(&nd::array![0.5, 0.5], 0.1, 0, None),
            Err(SampleError::NoRealizations)
        ));
    }

    // with σ = 100, both weights clip to zero in about a quarter of all draws
    #[test]
    fn degenerate_policies() {
        let mean = nd::array![0.5, 0.5];
        let resampled = sample_branch_weights(&mean, 100.0, 200, Some(7)).unwrap();
        assert_valid(&resampled);

        let uniform
            = BranchSampler::new(&mean, 100.0, DegeneratePolicy::Uniform).unwrap()
            .sample(200, Some(7))
            .unwrap();
        assert_valid(&uniform);
        assert!(uniform.outer_iter().any(|row| row[0] == 0.5 && row[1] == 0.5));

        let res
            = BranchSampler::new(&mean, 100.0, DegeneratePolicy::Error).unwrap()
            .sample(200, Some(7));
        assert!(matches!(res, Err(SampleError::Degenerate(_))));
    }
}
