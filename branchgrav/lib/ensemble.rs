//! Monte Carlo ensembles comparing branch-mixed and effective-field
//! evolutions.
//!
//! The [runner][run_ensemble] only coordinates: it samples branch weights,
//! reduces them to effective fields, and hands both to a pair of
//! [`EvolutionStrategy`]s, collecting the resulting observable series. All
//! physics lives in the strategies, so that observables or solvers can be
//! swapped without touching the sampling logic.
//!
//! ```
//! use ndarray as nd;
//! use branchgrav::ensemble::{ EnsembleOptions, EvolveParams, FnStrategy, run_ensemble };
//!
//! // stub strategies producing constant series
//! let g = nd::array![1.0, 3.0];
//! let branch = FnStrategy(|params: EvolveParams<'_>| match params {
//!     EvolveParams::Branch(w) => Ok(nd::Array1::from_elem(4, w.dot(&g))),
//!     EvolveParams::Effective(_) => unreachable!(),
//! });
//! let effective = FnStrategy(|params: EvolveParams<'_>| match params {
//!     EvolveParams::Effective(geff) => Ok(nd::Array1::from_elem(4, geff)),
//!     EvolveParams::Branch(_) => unreachable!(),
//! });
//! let res = run_ensemble(
//!     &nd::array![0.5, 0.5], &g, 0.05, 8, &branch, &effective,
//!     Some(42), &EnsembleOptions::default(),
//! ).unwrap();
//! assert_eq!(res.obs_branch.dim(), (8, 4));
//! assert!(res.failures.is_empty());
//! ```

use std::sync::Arc;
use ndarray as nd;
use rayon::prelude::*;
use crate::{
    Arr1,
    CancelToken,
    error::{ EnsembleError, EvolveError, LengthError },
    effective::compute_geff,
    observables::Observable,
    potential::Potential,
    sampler::{ BranchSampler, DegeneratePolicy },
    simulation::Simulation,
};

pub type EResult<T> = Result<T, EnsembleError>;

/// Parameters handed to an [`EvolutionStrategy`] for one realization.
#[derive(Copy, Clone, Debug)]
pub enum EvolveParams<'a> {
    /// Branch probabilities of the realization.
    Branch(nd::ArrayView1<'a, f64>),
    /// Effective field of the realization.
    Effective(f64),
}

/// Produces the observable time series of one realization.
pub trait EvolutionStrategy: Sync {
    fn evolve(&self, params: EvolveParams<'_>) -> Result<nd::Array1<f64>, EvolveError>;
}

/// Adapts a closure into an [`EvolutionStrategy`].
#[derive(Copy, Clone, Debug)]
pub struct FnStrategy<F>(pub F);

impl<F> EvolutionStrategy for FnStrategy<F>
where F: Fn(EvolveParams<'_>) -> Result<nd::Array1<f64>, EvolveError> + Sync
{
    fn evolve(&self, params: EvolveParams<'_>) -> Result<nd::Array1<f64>, EvolveError> {
        (self.0)(params)
    }
}

/// Evolves the initial state separately in each branch's field and returns
/// the probability-weighted sum of the per-branch observable series.
///
/// Per-branch series do not depend on the weights, so they are computed once,
/// on construction, and reused for every realization.
#[derive(Clone)]
pub struct BranchMixed {
    g_values: nd::Array1<f64>,
    series: Arc<nd::Array2<f64>>,
}

impl BranchMixed {
    /// Evolve the initial state of `sim` once per entry of `g_values`.
    pub fn new<S>(
        sim: Arc<Simulation>,
        potential: Arc<dyn Potential>,
        g_values: &Arr1<S>,
        observable: Observable,
    ) -> Result<Self, EvolveError>
    where S: nd::Data<Elem = f64>
    {
        let mut series: nd::Array2<f64>
            = nd::Array2::zeros((g_values.len(), sim.n_steps()));
        for (mut row, &g) in series.outer_iter_mut().zip(g_values) {
            let s = sim.observable_series(potential.as_ref(), g, observable, None)?;
            row.assign(&s);
        }
        log::debug!("computed {} branch series", g_values.len());
        Ok(Self { g_values: g_values.to_owned(), series: Arc::new(series) })
    }

    /// Observable series of every branch as the rows of a `K × T` matrix.
    pub fn branch_series(&self) -> &nd::Array2<f64> { &self.series }
}

impl EvolutionStrategy for BranchMixed {
    fn evolve(&self, params: EvolveParams<'_>) -> Result<nd::Array1<f64>, EvolveError> {
        let EvolveParams::Branch(probs) = params else {
            return Err(EvolveError::WrongParams("branch"));
        };
        LengthError::check(&probs, &self.g_values)?;
        Ok(probs.dot(self.branch_series()))
    }
}

/// Evolves the initial state in the effective field of a realization.
#[derive(Clone)]
pub struct Effective {
    sim: Arc<Simulation>,
    potential: Arc<dyn Potential>,
    observable: Observable,
}

impl Effective {
    pub fn new(
        sim: Arc<Simulation>,
        potential: Arc<dyn Potential>,
        observable: Observable,
    ) -> Self
    {
        Self { sim, potential, observable }
    }
}

impl EvolutionStrategy for Effective {
    fn evolve(&self, params: EvolveParams<'_>) -> Result<nd::Array1<f64>, EvolveError> {
        let EvolveParams::Effective(geff) = params else {
            return Err(EvolveError::WrongParams("effective"));
        };
        let s = self.sim.observable_series(
            self.potential.as_ref(), geff, self.observable, None)?;
        Ok(s)
    }
}

/// Execution options for [`run_ensemble`].
#[derive(Clone, Debug, Default)]
pub struct EnsembleOptions {
    /// Run realizations on the global [`rayon`] thread pool.
    pub parallel: bool,
    /// Treatment of degenerate branch-weight draws.
    pub degenerate: DegeneratePolicy,
    /// Checked before each realization starts.
    pub cancel: Option<CancelToken>,
}

/// A realization whose evolution failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealizationFailure {
    /// Realization index.
    pub index: usize,
    /// Rendered error.
    pub error: String,
}

/// Outcome of an ensemble run, indexed by realization.
///
/// Rows of `obs_branch` and `obs_eff` belonging to failed realizations are
/// filled with NaN.
#[derive(Clone, Debug)]
pub struct EnsembleResult {
    /// Branch probabilities, `R × K`.
    pub branch_probs: nd::Array2<f64>,
    /// Effective fields, length `R`.
    pub geff: nd::Array1<f64>,
    /// Branch-mixed observable series, `R × T`.
    pub obs_branch: nd::Array2<f64>,
    /// Effective-field observable series, `R × T`.
    pub obs_eff: nd::Array2<f64>,
    /// Failed realizations, in increasing index order.
    pub failures: Vec<RealizationFailure>,
}

impl EnsembleResult {
    /// Number of realizations.
    pub fn realizations(&self) -> usize { self.geff.len() }

    /// Indices of realizations that completed.
    pub fn completed(&self) -> Vec<usize> {
        let mut failed = self.failures.iter().map(|f| f.index).peekable();
        (0..self.realizations())
            .filter(|k| {
                if failed.peek() == Some(k) { failed.next(); false } else { true }
            })
            .collect()
    }
}

type Outcome = Result<(nd::Array1<f64>, nd::Array1<f64>), EvolveError>;

// evolve one realization with both strategies
fn realization<B, E>(
    k: usize,
    probs: nd::ArrayView1<f64>,
    geff: f64,
    branch: &B,
    effective: &E,
    cancel: Option<&CancelToken>,
) -> Option<Outcome>
where
    B: EvolutionStrategy + ?Sized,
    E: EvolutionStrategy + ?Sized,
{
    if cancel.is_some_and(|c| c.is_cancelled()) { return None; }
    log::debug!("realization {k}: geff = {geff:.6}");
    let outcome
        = branch.evolve(EvolveParams::Branch(probs))
        .and_then(|b| {
            let e = effective.evolve(EvolveParams::Effective(geff))?;
            LengthError::check(&b, &e)?;
            Ok((b, e))
        });
    Some(outcome)
}

/// Run `n_realizations` Monte Carlo realizations.
///
/// Branch weights are drawn around `mean_probs` with noise `sigma` (see
/// [`BranchSampler`]) and reduced to effective fields with `g_values`. Each
/// realization then calls `branch` with its weights and `effective` with its
/// effective field. A realization whose strategies fail is recorded in
/// [`EnsembleResult::failures`] without stopping the others. The run fails
/// only on invalid sampling parameters, cancellation, or if no realization
/// succeeds.
///
/// With `seed` fixed, the result does not depend on `options.parallel`.
#[allow(clippy::too_many_arguments)]
pub fn run_ensemble<S, T, B, E>(
    mean_probs: &Arr1<S>,
    g_values: &Arr1<T>,
    sigma: f64,
    n_realizations: usize,
    branch: &B,
    effective: &E,
    seed: Option<u64>,
    options: &EnsembleOptions,
) -> EResult<EnsembleResult>
where
    S: nd::Data<Elem = f64>,
    T: nd::Data<Elem = f64>,
    B: EvolutionStrategy + ?Sized,
    E: EvolutionStrategy + ?Sized,
{
    LengthError::check(mean_probs, g_values)?;
    let branch_probs
        = BranchSampler::new(mean_probs, sigma, options.degenerate)?
        .sample(n_realizations, seed)?;
    let geff = compute_geff(&branch_probs, g_values)?;
    let cancel = options.cancel.as_ref();

    let outcomes: Vec<Option<Outcome>>
        = if options.parallel {
            (0..n_realizations).into_par_iter()
                .map(|k| {
                    realization(
                        k, branch_probs.row(k), geff[k], branch, effective, cancel)
                })
                .collect()
        } else {
            (0..n_realizations)
                .map(|k| {
                    realization(
                        k, branch_probs.row(k), geff[k], branch, effective, cancel)
                })
                .collect()
        };
    if outcomes.iter().any(Option::is_none) {
        return Err(EnsembleError::Cancelled);
    }

    let n_times
        = outcomes.iter().flatten()
        .find_map(|o| o.as_ref().ok().map(|(b, _)| b.len()));
    let Some(n_times) = n_times else {
        let first
            = outcomes.into_iter().flatten()
            .find_map(Result::err)
            .map(|e| e.to_string())
            .unwrap_or_default();
        return Err(EnsembleError::AllFailed(first));
    };

    let mut obs_branch: nd::Array2<f64>
        = nd::Array2::from_elem((n_realizations, n_times), f64::NAN);
    let mut obs_eff: nd::Array2<f64>
        = nd::Array2::from_elem((n_realizations, n_times), f64::NAN);
    let mut failures: Vec<RealizationFailure> = Vec::new();
    let iter
        = outcomes.into_iter().flatten().enumerate()
        .zip(obs_branch.outer_iter_mut().zip(obs_eff.outer_iter_mut()));
    for ((k, outcome), (mut row_b, mut row_e)) in iter {
        let checked
            = outcome
            .and_then(|(b, e)| {
                LengthError::check_len(b.len(), n_times)?;
                Ok((b, e))
            });
        match checked {
            Ok((b, e)) => {
                row_b.assign(&b);
                row_e.assign(&e);
            },
            Err(err) => {
                log::warn!("realization {k} failed: {err}");
                failures.push(RealizationFailure { index: k, error: err.to_string() });
            },
        }
    }
    log::info!(
        "ensemble finished: {} of {} realizations completed",
        n_realizations - failures.len(),
        n_realizations,
    );
    Ok(EnsembleResult { branch_probs, geff, obs_branch, obs_eff, failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use crate::{ grid::Grid, potential::LinearGravity, states::Gaussian };

    fn stub_branch(g: nd::Array1<f64>) -> impl EvolutionStrategy {
        FnStrategy(move |params: EvolveParams<'_>| match params {
            EvolveParams::Branch(w) => Ok(nd::Array1::from_elem(5, w.dot(&g))),
            EvolveParams::Effective(_) => Err(EvolveError::WrongParams("branch")),
        })
    }

    fn stub_effective() -> impl EvolutionStrategy {
        FnStrategy(|params: EvolveParams<'_>| match params {
            EvolveParams::Effective(geff) if geff > 2.1 => {
                Err(EvolveError::Other(format!("geff too large: {geff}")))
            },
            EvolveParams::Effective(geff) => Ok(nd::Array1::from_elem(5, geff)),
            EvolveParams::Branch(_) => Err(EvolveError::WrongParams("effective")),
        })
    }

    #[test]
    fn stub_strategies_agree_exactly() {
        let g = nd::array![1.0, 3.0];
        let res = run_ensemble(
            &nd::array![0.5, 0.5],
            &g,
            0.0,
            6,
            &stub_branch(g.clone()),
            &stub_effective(),
            Some(0),
            &EnsembleOptions::default(),
        ).unwrap();
        assert_eq!(res.geff, nd::Array1::from_elem(6, 2.0));
        assert_eq!(res.obs_branch, res.obs_eff);
        assert_eq!(res.completed(), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn failed_realizations_do_not_abort() {
        let g = nd::array![1.0, 3.0];
        let res = run_ensemble(
            &nd::array![0.5, 0.5],
            &g,
            0.2,
            40,
            &stub_branch(g.clone()),
            &stub_effective(),
            Some(3),
            &EnsembleOptions::default(),
        ).unwrap();
        assert!(!res.failures.is_empty());
        assert!(res.failures.len() < 40);
        for f in res.failures.iter() {
            assert!(res.geff[f.index] > 2.1);
            assert!(res.obs_branch.row(f.index).iter().all(|v| v.is_nan()));
        }
        for k in res.completed() {
            assert!(res.geff[k] <= 2.1);
            assert_eq!(res.obs_eff[[k, 0]], res.geff[k]);
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let g = nd::array![1.0, 2.0, 4.0];
        let mean = nd::array![0.2, 0.3, 0.5];
        let run = |parallel: bool| {
            run_ensemble(
                &mean, &g, 0.05, 16,
                &stub_branch(g.clone()),
                &FnStrategy(|params: EvolveParams<'_>| match params {
                    EvolveParams::Effective(geff) => Ok(nd::Array1::from_elem(5, geff)),
                    EvolveParams::Branch(_) => Err(EvolveError::WrongParams("effective")),
                }),
                Some(11),
                &EnsembleOptions { parallel, ..Default::default() },
            ).unwrap()
        };
        let a = run(false);
        let b = run(true);
        assert_eq!(a.branch_probs, b.branch_probs);
        assert_eq!(a.obs_branch, b.obs_branch);
        assert_eq!(a.obs_eff, b.obs_eff);
    }

    #[test]
    fn cancellation_stops_the_run() {
        let g = nd::array![1.0, 3.0];
        let cancel = CancelToken::new();
        cancel.cancel();
        let res = run_ensemble(
            &nd::array![0.5, 0.5],
            &g,
            0.05,
            4,
            &stub_branch(g.clone()),
            &stub_effective(),
            Some(0),
            &EnsembleOptions { cancel: Some(cancel), ..Default::default() },
        );
        assert!(matches!(res, Err(EnsembleError::Cancelled)));
    }

    #[test]
    fn all_failures_are_reported() {
        let g = nd::array![1.0, 3.0];
        let failing = FnStrategy(|_: EvolveParams<'_>| Err(EvolveError::Other("boom".into())));
        let res = run_ensemble(
            &nd::array![0.5, 0.5], &g, 0.05, 3, &failing, &failing, Some(0),
            &EnsembleOptions::default(),
        );
        assert!(matches!(res, Err(EnsembleError::AllFailed(ref e)) if e == "boom"));
    }

    #[test]
    fn physical_strategies_reject_wrong_params() {
        let grid = Grid::new(128, 40.0, 1.0).unwrap();
        let sim = Arc::new(
            Simulation::gaussian(grid, Gaussian::default(), 0.01, 10, 1.0).unwrap());
        let pot: Arc<dyn Potential> = Arc::new(LinearGravity { mass: 1.0 });
        let g = nd::array![1.0, 3.0];
        let branch
            = BranchMixed::new(sim.clone(), pot.clone(), &g, Observable::Position)
            .unwrap();
        let effective = Effective::new(sim, pot, Observable::Position);
        assert!(matches!(
            branch.evolve(EvolveParams::Effective(2.0)),
            Err(EvolveError::WrongParams(_))
        ));
        assert!(matches!(
            effective.evolve(EvolveParams::Branch(g.view())),
            Err(EvolveError::WrongParams(_))
        ));
        let mixed = branch.evolve(EvolveParams::Branch(nd::array![0.5, 0.5].view())).unwrap();
        let eff = effective.evolve(EvolveParams::Effective(2.0)).unwrap();
        assert_eq!(mixed.len(), 10);
        // Ehrenfest: ⟨x⟩ is linear in g for a linear potential
        mixed.iter().zip(&eff)
            .for_each(|(a, b)| approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-9));
    }

    struct CountingGravity {
        calls: AtomicUsize,
    }

    impl Potential for CountingGravity {
        fn eval(&self, x: nd::ArrayView1<f64>, field: f64) -> nd::Array1<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            LinearGravity { mass: 1.0 }.eval(x, field)
        }
    }

    #[test]
    fn branch_series_are_evolved_once() {
        let grid = Grid::new(128, 40.0, 1.0).unwrap();
        let sim = Arc::new(
            Simulation::gaussian(grid, Gaussian::default(), 0.01, 10, 1.0).unwrap());
        let counter = Arc::new(CountingGravity { calls: AtomicUsize::new(0) });
        let pot: Arc<dyn Potential> = counter.clone();
        let g = nd::array![1.0, 2.0, 3.0];
        let branch = BranchMixed::new(sim, pot, &g, Observable::Position).unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(branch.branch_series().dim(), (3, 10));

        let res = run_ensemble(
            &nd::array![0.2, 0.3, 0.5],
            &g,
            0.05,
            32,
            &branch,
            &stub_effective(),
            Some(5),
            &EnsembleOptions { parallel: true, ..Default::default() },
        ).unwrap();
        assert_eq!(res.realizations(), 32);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
    }
}
