//! Provides functions to compute solutions to the 1+1-dimensional
//! (time-dependent) Schrödinger equation (TDSE) for motion in a static,
//! conservative potential via the symmetrized split-operator method.
//!
//! In all 2D arrays, the first (or zero-th) axis indexes time.
//!
//! See [`docs`][crate::docs#split-operator-method] for background on the
//! scheme and on the [spectral validity bound][spectral_time_limit].

use std::{ f64::consts::PI, fmt, sync::Arc };
use ndarray as nd;
use num_complex::Complex64 as C64;
use rustfft::{ Fft, FftPlanner };
use crate::{
    Arr1,
    CancelToken,
    error::{ LengthError, ObsError, TError },
    grid::{ FourierConvention, Grid },
    observables::{
        OResult,
        Observable,
        expectation_p_fft,
        PacketMoments,
        expectation_p_op,
        expectation_x,
    },
    utils::{ fft_inplace, ifft_inplace, process_contiguous, wf_norm },
};

pub type TResult<T> = Result<T, TError>;

/// Default safety factor α for [`spectral_time_limit`].
pub const DEF_SAFETY: f64 = 0.4;

/// Number of packet widths kept clear of the domain edge by
/// [`position_time_limit`].
pub const EDGE_WIDTHS: f64 = 4.0;

// relative tolerance when matching a grid against a propagator
const GRID_RTOL: f64 = 1e-12;

/// Precompute the kinetic propagator `exp(-i p² dt / (2 m ħ))` over a momentum
/// grid in FFT order.
///
/// The result is a pure phase and assumes a forward/inverse transform pair
/// that round-trips exactly; see [`FourierConvention`].
pub fn kinetic_operator<S>(p: &Arr1<S>, dt: f64, mass: f64, hbar: f64)
    -> nd::Array1<C64>
where S: nd::Data<Elem = f64>
{
    p.mapv(|pk| C64::cis(-pk.powi(2) * dt / (2.0 * mass * hbar)))
}

/// Precompute the half-step potential propagator `exp(-i V dt / (2 ħ))`.
pub fn potential_half_operator<S>(V: &Arr1<S>, dt: f64, hbar: f64)
    -> nd::Array1<C64>
where S: nd::Data<Elem = f64>
{
    V.mapv(|Vk| C64::cis(-Vk * dt / (2.0 * hbar)))
}

// multiply `q` elementwise by `op` in place
fn apply_operator<S>(op: &Arr1<S>, q: &mut nd::Array1<C64>)
where S: nd::Data<Elem = C64>
{
    q.iter_mut().zip(op).for_each(|(qk, opk)| { *qk *= opk; });
}

/// Advance a wavefunction by one time step *in place*.
///
/// The step is the symmetrized (Strang) splitting
/// ```text
/// ψ → U_V(dt/2) F⁻¹ U_T(dt) F U_V(dt/2) ψ
/// ```
/// which is second-order accurate in `dt`. `U_T` must be built by
/// [`kinetic_operator`] for the same `dt`, and `conv` must be the convention
/// of the grid the momentum coordinates came from.
///
/// This function plans new transforms on every call; prefer a
/// [`Propagator`] when taking many steps.
pub fn split_operator_step<S, T>(
    psi: &mut nd::Array1<C64>,
    V: &Arr1<S>,
    U_T: &Arr1<T>,
    dt: f64,
    hbar: f64,
    conv: FourierConvention,
) -> TResult<()>
where
    S: nd::Data<Elem = f64>,
    T: nd::Data<Elem = C64>,
{
    LengthError::check(psi, V)?;
    LengthError::check(psi, U_T)?;
    let U_V_half = potential_half_operator(V, dt, hbar);
    apply_operator(&U_V_half, psi);
    fft_inplace(psi, conv);
    apply_operator(U_T, psi);
    ifft_inplace(psi, conv);
    apply_operator(&U_V_half, psi);
    Ok(())
}

/// Split-operator propagator for a fixed grid, particle mass, and time step.
///
/// FFT plans and the kinetic propagator are computed once at construction and
/// shared read-only across any number of evolutions, possibly on different
/// threads. The grid's [`FourierConvention`] is folded into the stored kinetic
/// operator, so that the raw (unnormalized) transforms can be used directly.
#[derive(Clone)]
pub struct Propagator {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    kinetic: nd::Array1<C64>,
    dt: f64,
    dx: f64,
    hbar: f64,
}

impl fmt::Debug for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Propagator")
            .field("n", &self.kinetic.len())
            .field("dt", &self.dt)
            .field("dx", &self.dx)
            .field("hbar", &self.hbar)
            .finish()
    }
}

impl Propagator {
    /// Build a propagator for `grid`, validating the grid's momentum
    /// coordinates and Fourier convention once.
    pub fn new(grid: &Grid, dt: f64, mass: f64) -> TResult<Self> {
        TError::check_timestep(dt)?;
        TError::check_mass(mass)?;
        grid.check_conjugate()?;
        let n = grid.len();
        debug_assert!(grid.convention.round_trips(n));
        let scale
            = grid.convention.forward_scale(n)
            * grid.convention.inverse_scale(n);
        let kinetic = kinetic_operator(&grid.p, dt, mass, grid.hbar) * scale;
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        Ok(Self { forward, inverse, kinetic, dt, dx: grid.dx, hbar: grid.hbar })
    }

    /// Number of grid points.
    pub fn len(&self) -> usize { self.kinetic.len() }

    /// Always `false`.
    pub fn is_empty(&self) -> bool { self.kinetic.is_empty() }

    /// Time step.
    pub fn dt(&self) -> f64 { self.dt }

    /// Check that `grid` has the size, spacing, and ħ this propagator was
    /// built for.
    pub fn check_grid(&self, grid: &Grid) -> TResult<()> {
        LengthError::check_len(grid.len(), self.len())?;
        let close = |a: f64, b: f64| (a - b).abs() <= GRID_RTOL * b.abs();
        (close(grid.dx, self.dx) && close(grid.hbar, self.hbar))
            .then_some(())
            .ok_or(TError::GridMismatch(grid.dx, grid.hbar, self.dx, self.hbar))
    }

    /// Kinetic propagator, including the transform normalization.
    pub fn kinetic(&self) -> &nd::Array1<C64> { &self.kinetic }

    /// Half-step potential propagator for this propagator's time step.
    pub fn potential_half<S>(&self, V: &Arr1<S>) -> TResult<nd::Array1<C64>>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check_len(V.len(), self.len())?;
        Ok(potential_half_operator(V, self.dt, self.hbar))
    }

    /// Advance `psi` by one time step *in place*, given the half-step
    /// potential propagator from [`Self::potential_half`].
    ///
    /// *Panics if `psi` or `U_V_half` do not have the length of the grid.*
    pub fn step<S>(&self, psi: &mut nd::Array1<C64>, U_V_half: &Arr1<S>)
    where S: nd::Data<Elem = C64>
    {
        assert_eq!(psi.len(), self.len());
        assert_eq!(U_V_half.len(), self.len());
        apply_operator(U_V_half, psi);
        process_contiguous(psi, |buf| self.forward.process(buf));
        apply_operator(&self.kinetic, psi);
        process_contiguous(psi, |buf| self.inverse.process(buf));
        apply_operator(U_V_half, psi);
    }

    /// Evolve `psi0` in the potential `V` for `n_steps` time steps.
    ///
    /// At each step index `k`, observables are recorded from the state
    /// *before* it is propagated, so that the record spans
    /// `t = 0, dt, ..., (n_steps - 1) dt` and its first entry describes
    /// `psi0` itself. If `store_wavefunction` is `true`, the pre-step state is
    /// archived as well.
    ///
    /// If `cancel` is given, it is checked before every step and the
    /// evolution stops with [`TError::Cancelled`] once it is set.
    ///
    /// `grid` must be the grid this propagator was built for; see
    /// [`Self::check_grid`].
    ///
    /// Results are only physically meaningful while the evolution stays
    /// within the [validity bounds][check_spectral_validity]; these are not
    /// checked here.
    pub fn evolve<S, T>(
        &self,
        grid: &Grid,
        psi0: &Arr1<S>,
        V: &Arr1<T>,
        n_steps: usize,
        store_wavefunction: bool,
        cancel: Option<&CancelToken>,
    ) -> TResult<EvolutionRecord>
    where
        S: nd::Data<Elem = C64>,
        T: nd::Data<Elem = f64>,
    {
        TError::check_steps(n_steps)?;
        self.check_grid(grid)?;
        LengthError::check(psi0, &grid.x)?;
        let U_V_half = self.potential_half(V)?;

        let time: nd::Array1<f64>
            = (0..n_steps).map(|k| k as f64 * self.dt).collect();
        let mut x_expectation: nd::Array1<f64> = nd::Array1::zeros(n_steps);
        let mut p_expectation: nd::Array1<f64> = nd::Array1::zeros(n_steps);
        let mut norm: nd::Array1<f64> = nd::Array1::zeros(n_steps);
        let mut psi_t: Option<nd::Array2<C64>>
            = store_wavefunction
            .then(|| nd::Array2::zeros((n_steps, grid.len())));

        let mut psi: nd::Array1<C64> = psi0.to_owned();
        let iter
            = x_expectation.iter_mut()
            .zip(p_expectation.iter_mut())
            .zip(norm.iter_mut())
            .enumerate();
        for (k, ((xk, pk), nk)) in iter {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(TError::Cancelled(k));
            }
            *xk = expectation_x(&psi, &grid.x)?;
            *pk = expectation_p_op(&psi, &grid.x, grid.hbar)?;
            *nk = wf_norm(&psi, grid.dx);
            if let Some(q) = psi_t.as_mut() {
                q.row_mut(k).assign(&psi);
            }
            self.step(&mut psi, &U_V_half);
        }
        Ok(EvolutionRecord { time, x_expectation, p_expectation, norm, psi: psi_t })
    }
}

/// Time series of observables produced by a time evolution.
///
/// All series have length `n_steps`, with entry `k` describing the state at
/// time `k dt`.
#[derive(Clone, Debug)]
pub struct EvolutionRecord {
    /// Time coordinates.
    pub time: nd::Array1<f64>,
    /// ⟨x⟩
    pub x_expectation: nd::Array1<f64>,
    /// ⟨p⟩, via the finite-difference momentum operator.
    pub p_expectation: nd::Array1<f64>,
    /// `Σ |ψ|² dx`
    pub norm: nd::Array1<f64>,
    /// Full wavefunction history, if requested; shape `(n_steps, N)`.
    pub psi: Option<nd::Array2<C64>>,
}

impl EvolutionRecord {
    /// Number of recorded time steps.
    pub fn len(&self) -> usize { self.time.len() }

    /// Always `false`; evolutions take at least one step.
    pub fn is_empty(&self) -> bool { self.time.is_empty() }

    /// Return the time series of a single observable.
    ///
    /// [`Observable::MomentumFft`] is evaluated from the stored wavefunction
    /// history and fails with [`ObsError::MissingHistory`] if there is none.
    pub fn series(&self, obs: Observable, grid: &Grid) -> OResult<nd::Array1<f64>> {
        match obs {
            Observable::Position => Ok(self.x_expectation.clone()),
            Observable::MomentumOp => Ok(self.p_expectation.clone()),
            Observable::Norm => Ok(self.norm.clone()),
            Observable::MomentumFft => {
                let psi
                    = self.psi.as_ref()
                    .ok_or(ObsError::MissingHistory("momentum_fft"))?;
                psi.outer_iter()
                    .map(|psik| expectation_p_fft(&psik, grid))
                    .collect()
            },
        }
    }

    /// Largest relative deviation of the norm from its initial value.
    pub fn norm_drift(&self) -> f64 {
        let n0 = self.norm[0];
        self.norm.iter()
            .map(|nk| ((nk - n0) / n0).abs())
            .fold(0.0, f64::max)
    }
}

/// Perform split-operator integration for a static potential, recording
/// observables from the pre-step state at every step.
///
/// This is a convenience wrapper around [`Propagator::evolve`] that builds a
/// fresh propagator; see there for details.
pub fn time_evolution<S, T>(
    psi0: &Arr1<S>,
    V: &Arr1<T>,
    grid: &Grid,
    dt: f64,
    n_steps: usize,
    mass: f64,
    store_wavefunction: bool,
) -> TResult<EvolutionRecord>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = f64>,
{
    Propagator::new(grid, dt, mass)?
        .evolve(grid, psi0, V, n_steps, store_wavefunction, None)
}

/// Maximum safe simulated time for a linear potential of strength up to
/// `g_max`,
/// ```text
/// t_max = α π ħ N / (m g_max L)
/// ```
/// i.e. the time taken by a constant force `m g_max` to push the momentum to a
/// fraction `α` of the largest momentum `π ħ / dx` representable on the grid.
/// Past this point the momentum-space wavefunction wraps around the periodic
/// grid and results are silently invalid.
///
/// Returns infinity for `g_max == 0`.
pub fn spectral_time_limit(grid: &Grid, mass: f64, g_max: f64, safety: f64)
    -> f64
{
    let g_max = g_max.abs();
    if g_max == 0.0 { return f64::INFINITY; }
    safety * PI * grid.hbar * grid.len() as f64 / (mass * g_max * grid.length)
}

/// Maximum safe simulated time before a packet with initial `moments` can
/// reach the edge of the spatial domain under a field of strength up to
/// `g_max`.
///
/// The packet's extent is bounded from above by
/// ```text
/// |x0| + |p0| t / m + g_max t² / 2 + k (σ_x + σ_p t / m)
/// ```
/// with `k` = [`EDGE_WIDTHS`], using the free-spreading bound
/// `σ_x(t) <= σ_x + σ_p t / m`. The limit is the time at which this reaches
/// `L/2`. Past it, probability mass wraps around the periodic domain and
/// position observables are silently corrupted.
///
/// Returns zero if the initial packet already violates the bound and
/// infinity if it never moves or spreads.
pub fn position_time_limit(
    grid: &Grid,
    moments: &PacketMoments,
    mass: f64,
    g_max: f64,
) -> f64
{
    let g_max = g_max.abs();
    let clearance
        = grid.length / 2.0
        - moments.x0.abs()
        - EDGE_WIDTHS * moments.sigma_x;
    if clearance <= 0.0 { return 0.0; }
    let speed = (moments.p0.abs() + EDGE_WIDTHS * moments.sigma_p) / mass;
    // positive root of g_max t² / 2 + speed t = clearance
    2.0 * clearance / (speed + (speed * speed + 2.0 * g_max * clearance).sqrt())
}

/// Outcome of the advisory [validity check][check_spectral_validity].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Validity {
    /// Simulated duration, `n_steps dt`.
    pub t_total: f64,
    /// [Spectral time limit][spectral_time_limit].
    pub t_max: f64,
    /// [Position-space time limit][position_time_limit].
    pub t_max_position: f64,
    /// `true` if `t_total` is within both limits.
    pub ok: bool,
}

impl Validity {
    /// The tighter of the two time limits.
    pub fn t_limit(&self) -> f64 { self.t_max.min(self.t_max_position) }
}

/// Compare a planned simulation duration against both the
/// [spectral time limit][spectral_time_limit] and the
/// [position-space time limit][position_time_limit] of a packet with initial
/// `moments`.
///
/// This never fails: exceeding either bound is logged as a warning and
/// reported through [`Validity::ok`], leaving the decision to abort to the
/// caller.
pub fn check_spectral_validity(
    grid: &Grid,
    moments: &PacketMoments,
    mass: f64,
    g_max: f64,
    safety: f64,
    dt: f64,
    n_steps: usize,
) -> Validity
{
    let t_total = n_steps as f64 * dt;
    let t_max = spectral_time_limit(grid, mass, g_max, safety);
    let t_max_position = position_time_limit(grid, moments, mass, g_max);
    if t_total > t_max {
        log::warn!(
            "simulated time {t_total:.4} exceeds the spectral validity limit \
            {t_max:.4} (g_max = {g_max}, safety = {safety}); results may be \
            corrupted by momentum wrap-around"
        );
    }
    if t_total > t_max_position {
        log::warn!(
            "simulated time {t_total:.4} exceeds the position-space limit \
            {t_max_position:.4} (g_max = {g_max}, domain length = {}); the \
            packet may reach the domain edge and wrap around",
            grid.length,
        );
    }
    let ok = t_total <= t_max && t_total <= t_max_position;
    Validity { t_total, t_max, t_max_position, ok }
}
