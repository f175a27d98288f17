//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use ndarray as nd;
use thiserror::Error;

/// Returned when an operation requiring equal-length arrays encounters arrays
/// with unequal length.
#[derive(Debug, Error)]
#[error("encountered arrays with incompatible lengths; got {0} and {1}")]
pub struct LengthError(pub usize, pub usize);

impl LengthError {
    pub(crate) fn check<S, A, T, B>(
        a: &nd::ArrayBase<S, nd::Ix1>,
        b: &nd::ArrayBase<T, nd::Ix1>,
    ) -> Result<(), Self>
    where
        S: nd::Data<Elem = A>,
        T: nd::Data<Elem = B>,
    {
        Self::check_len(a.len(), b.len())
    }

    pub(crate) fn check_len(na: usize, nb: usize) -> Result<(), Self> {
        (na == nb).then_some(()).ok_or(Self(na, nb))
    }
}

/// Returned from grid construction in [`grid`][crate::grid].
#[derive(Debug, Error)]
pub enum GridError {
    /// Returned when a grid of fewer than two points is requested.
    #[error("grid size must be at least 2; got {0}")]
    BadSize(usize),

    /// Returned when a non-positive or non-finite domain length is given.
    #[error("domain length must be positive and finite; got {0}")]
    BadLength(f64),

    /// Returned when a non-positive or non-finite ħ is given.
    #[error("hbar must be positive and finite; got {0}")]
    BadHbar(f64),

    /// Returned when the momentum grid fails `dp dx N = 2π ħ`.
    #[error("momentum grid is not conjugate to the spatial grid: dp dx N = {0}, expected {1}")]
    NotConjugate(f64, f64),
}

impl GridError {
    pub(crate) fn check_size(n: usize) -> Result<(), Self> {
        (n >= 2).then_some(()).ok_or(Self::BadSize(n))
    }

    pub(crate) fn check_length(length: f64) -> Result<(), Self> {
        (length.is_finite() && length > 0.0)
            .then_some(()).ok_or(Self::BadLength(length))
    }

    pub(crate) fn check_hbar(hbar: f64) -> Result<(), Self> {
        (hbar.is_finite() && hbar > 0.0)
            .then_some(()).ok_or(Self::BadHbar(hbar))
    }
}

/// Returned from time-dependent wavefunction solver functions.
#[derive(Debug, Error)]
pub enum TError {
    /// Returned when a non-positive time step is encountered.
    #[error("time step must be positive and finite; got {0}")]
    BadTimestep(f64),

    /// Returned when a non-positive particle mass is encountered.
    #[error("mass must be positive and finite; got {0}")]
    BadMass(f64),

    /// Returned when zero time steps are requested.
    #[error("number of time steps must be greater than 0")]
    NoSteps,

    /// Returned when an evolution is handed a grid whose spacing or ħ differ
    /// from those the propagator was built for.
    #[error("grid (dx = {0}, hbar = {1}) does not match the propagator (dx = {2}, hbar = {3})")]
    GridMismatch(f64, f64, f64, f64),

    /// Returned when an evolution is stopped through a
    /// [`CancelToken`][crate::CancelToken].
    #[error("time evolution cancelled after {0} steps")]
    Cancelled(usize),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// [`GridError`]
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// [`ObsError`]
    #[error("observable error: {0}")]
    Obs(#[from] ObsError),
}

impl TError {
    pub(crate) fn check_timestep(dt: f64) -> Result<(), Self> {
        (dt.is_finite() && dt > 0.0).then_some(()).ok_or(Self::BadTimestep(dt))
    }

    pub(crate) fn check_mass(mass: f64) -> Result<(), Self> {
        (mass.is_finite() && mass > 0.0)
            .then_some(()).ok_or(Self::BadMass(mass))
    }

    pub(crate) fn check_steps(n_steps: usize) -> Result<(), Self> {
        (n_steps != 0).then_some(()).ok_or(Self::NoSteps)
    }
}

/// Returned from functions in [`observables`][crate::observables].
#[derive(Debug, Error)]
pub enum ObsError {
    /// Returned by declared but unimplemented observables.
    #[error("observable `{0}` is not implemented")]
    Unimplemented(&'static str),

    /// Returned when an observable needs the wavefunction history of an
    /// evolution that did not store it.
    #[error("observable `{0}` requires the stored wavefunction history")]
    MissingHistory(&'static str),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from branch-weight sampling in [`sampler`][crate::sampler].
#[derive(Debug, Error)]
pub enum SampleError {
    /// Returned when the mean probability vector is empty.
    #[error("mean probability vector must be non-empty")]
    EmptyMean,

    /// Returned when a mean probability is negative or non-finite.
    #[error("mean probabilities must be non-negative and finite; got {1} at index {0}")]
    BadProbability(usize, f64),

    /// Returned when the mean probability vector does not sum to 1.
    #[error("mean probabilities must sum to 1; got {0}")]
    BadSum(f64),

    /// Returned when the noise standard deviation is negative or non-finite.
    #[error("noise standard deviation must be non-negative and finite; got {0}")]
    BadNoise(f64),

    /// Returned when zero realizations are requested.
    #[error("number of realizations must be greater than 0")]
    NoRealizations,

    /// Returned under [`DegeneratePolicy::Error`][crate::sampler::DegeneratePolicy::Error]
    /// when every perturbed weight of a realization clips to zero.
    #[error("all branch weights clipped to zero in realization {0}")]
    Degenerate(usize),

    /// Returned when resampling a degenerate realization fails to produce a
    /// valid probability vector within the allowed number of attempts.
    #[error("realization {0} stayed degenerate after {1} resampling attempts")]
    ResampleExhausted(usize, usize),
}

impl SampleError {
    pub(crate) fn check_noise(sigma: f64) -> Result<(), Self> {
        (sigma.is_finite() && sigma >= 0.0)
            .then_some(()).ok_or(Self::BadNoise(sigma))
    }

    pub(crate) fn check_realizations(n: usize) -> Result<(), Self> {
        (n != 0).then_some(()).ok_or(Self::NoRealizations)
    }
}

/// Returned from an [`EvolutionStrategy`][crate::ensemble::EvolutionStrategy].
#[derive(Debug, Error)]
pub enum EvolveError {
    /// [`TError`]
    #[error("time evolution error: {0}")]
    TimeDep(#[from] TError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// [`ObsError`]
    #[error("observable error: {0}")]
    Obs(#[from] ObsError),

    /// Returned when a strategy is handed the wrong kind of parameters.
    #[error("strategy expected {0} parameters")]
    WrongParams(&'static str),

    /// Free-form failure from a user-defined strategy.
    #[error("{0}")]
    Other(String),
}

/// Returned from the ensemble runner in [`ensemble`][crate::ensemble].
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// [`SampleError`]
    #[error("sampling error: {0}")]
    Sample(#[from] SampleError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// Returned when no realization produced an observable series, so that
    /// the output width is unknown.
    #[error("every realization failed; first error: {0}")]
    AllFailed(String),

    /// Returned when the run is stopped through a
    /// [`CancelToken`][crate::CancelToken].
    #[error("ensemble run cancelled")]
    Cancelled,
}

/// Returned from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when the configuration file is not valid TOML for
    /// [`SimConfig`][crate::config::SimConfig].
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// [`GridError`]
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// [`TError`]
    #[error("time evolution error: {0}")]
    TimeDep(#[from] TError),

    /// [`SampleError`]
    #[error("ensemble error: {0}")]
    Sample(#[from] SampleError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// Returned for any other invalid value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
