//! Immutable run configuration.
//!
//! A [`SimConfig`] collects every physical and numerical parameter of a run and
//! is passed explicitly to whatever needs it. All sections have defaults, so a
//! TOML file only needs to name the values it changes:
//! ```toml
//! [grid]
//! n = 2048
//! length = 100.0
//!
//! [time]
//! dt = 0.01
//! n_steps = 400
//!
//! [ensemble]
//! g_values = [1.0, 3.0]
//! mean_probs = [0.5, 0.5]
//! noise = 0.05
//! realizations = 200
//! seed = 42
//! ```

use std::path::Path;
use ndarray as nd;
use serde::{ Deserialize, Serialize };
use crate::{
    error::{ ConfigError, GridError, LengthError, SampleError, TError },
    grid::{ FourierConvention, Grid },
    sampler::{ DegeneratePolicy, check_probabilities },
    states::Gaussian,
    timedep::DEF_SAFETY,
};

pub type CResult<T> = Result<T, ConfigError>;

/// Spatial grid parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of grid points.
    pub n: usize,
    /// Domain length; the grid covers `[-length/2, length/2)`.
    pub length: f64,
    /// Fourier normalization convention.
    pub convention: FourierConvention,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { n: 1024, length: 40.0, convention: FourierConvention::default() }
    }
}

/// Physical constants of the particle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub hbar: f64,
    pub mass: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self { Self { hbar: 1.0, mass: 1.0 } }
}

/// Time stepping parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Time step.
    pub dt: f64,
    /// Number of recorded steps.
    pub n_steps: usize,
    /// Safety factor α of the
    /// [spectral time limit][crate::timedep::spectral_time_limit].
    pub safety: f64,
}

impl Default for TimeConfig {
    fn default() -> Self { Self { dt: 0.01, n_steps: 400, safety: DEF_SAFETY } }
}

impl TimeConfig {
    /// Total simulated time, `n_steps dt`.
    pub fn duration(&self) -> f64 { self.n_steps as f64 * self.dt }
}

/// Monte Carlo ensemble parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Field strength of each branch.
    pub g_values: Vec<f64>,
    /// Mean branch probabilities; must sum to 1.
    pub mean_probs: Vec<f64>,
    /// Standard deviation of the branch-weight noise.
    pub noise: f64,
    /// Number of realizations.
    pub realizations: usize,
    /// Random seed; drawn from system entropy if absent.
    pub seed: Option<u64>,
    /// RMS deviation above which a realization counts as a failure.
    pub threshold: f64,
    /// Treatment of degenerate branch-weight draws.
    pub degenerate: DegeneratePolicy,
    /// Run realizations on the global thread pool.
    pub parallel: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            g_values: vec![1.0, 3.0],
            mean_probs: vec![0.5, 0.5],
            noise: 0.05,
            realizations: 200,
            seed: None,
            threshold: 0.2,
            degenerate: DegeneratePolicy::default(),
            parallel: true,
        }
    }
}

impl EnsembleConfig {
    /// Branch field values as an array.
    pub fn g_values(&self) -> nd::Array1<f64> {
        nd::Array1::from_vec(self.g_values.clone())
    }

    /// Mean branch probabilities as an array.
    pub fn mean_probs(&self) -> nd::Array1<f64> {
        nd::Array1::from_vec(self.mean_probs.clone())
    }

    /// Largest branch field magnitude.
    pub fn g_max(&self) -> f64 {
        self.g_values.iter().fold(0.0, |acc, g| acc.max(g.abs()))
    }
}

/// Complete configuration of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub grid: GridConfig,
    pub physics: PhysicsConfig,
    pub time: TimeConfig,
    pub packet: Gaussian,
    pub ensemble: EnsembleConfig,
}

impl SimConfig {
    /// Parse a configuration from a TOML string and [validate][Self::validate]
    /// it.
    pub fn from_toml_str(s: &str) -> CResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the solver cannot work with.
    pub fn validate(&self) -> CResult<()> {
        GridError::check_size(self.grid.n)?;
        GridError::check_length(self.grid.length)?;
        GridError::check_hbar(self.physics.hbar)?;
        TError::check_mass(self.physics.mass)?;
        TError::check_timestep(self.time.dt)?;
        TError::check_steps(self.time.n_steps)?;
        (self.time.safety.is_finite() && self.time.safety > 0.0)
            .then_some(())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    format!("safety factor must be positive; got {}", self.time.safety)
                )
            })?;
        (self.packet.sigma.is_finite() && self.packet.sigma > 0.0)
            .then_some(())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    format!("packet width must be positive; got {}", self.packet.sigma)
                )
            })?;
        let ens = &self.ensemble;
        LengthError::check_len(ens.g_values.len(), ens.mean_probs.len())?;
        check_probabilities(&ens.mean_probs())?;
        SampleError::check_noise(ens.noise)?;
        SampleError::check_realizations(ens.realizations)?;
        (ens.threshold.is_finite() && ens.threshold >= 0.0)
            .then_some(())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    format!("failure threshold must be non-negative; got {}", ens.threshold)
                )
            })?;
        Ok(())
    }

    /// Build the [`Grid`] described by this configuration.
    pub fn build_grid(&self) -> Result<Grid, GridError> {
        Grid::with_convention(
            self.grid.n,
            self.grid.length,
            self.physics.hbar,
            self.grid.convention,
        )
    }
}

/// Read and validate a [`SimConfig`] from a TOML file.
pub fn read_toml<P>(path: P) -> CResult<SimConfig>
where P: AsRef<Path>
{
    let s = std::fs::read_to_string(path)?;
    SimConfig::from_toml_str(&s)
}
