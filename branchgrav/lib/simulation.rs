//! Shared, read-only context for many evolutions on the same grid.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Arr1,
    CancelToken,
    config::SimConfig,
    error::{ ConfigError, LengthError, TError },
    grid::Grid,
    observables::{ Observable, PacketMoments, packet_moments },
    potential::Potential,
    states::Gaussian,
    timedep::{
        EvolutionRecord,
        Propagator,
        TResult,
        Validity,
        DEF_SAFETY,
        check_spectral_validity,
    },
};

/// Grid, normalized initial state, and precomputed propagator for a run.
///
/// Every evolution started from a `Simulation` begins in the same initial state
/// and uses the same time step and number of steps; only the potential
/// differs. A `Simulation` is immutable once built and can be shared across
/// threads.
#[derive(Clone, Debug)]
pub struct Simulation {
    grid: Grid,
    psi0: nd::Array1<C64>,
    moments: PacketMoments,
    propagator: Propagator,
    mass: f64,
    n_steps: usize,
    safety: f64,
}

impl Simulation {
    /// Build a simulation from an explicit grid and initial state.
    ///
    /// `psi0` is used as given; normalize it first.
    pub fn new<S>(
        grid: Grid,
        psi0: &Arr1<S>,
        dt: f64,
        n_steps: usize,
        mass: f64,
        safety: f64,
    ) -> TResult<Self>
    where S: nd::Data<Elem = C64>
    {
        TError::check_steps(n_steps)?;
        LengthError::check(psi0, &grid.x)?;
        let propagator = Propagator::new(&grid, dt, mass)?;
        let moments = packet_moments(psi0, &grid)?;
        Ok(Self {
            grid,
            psi0: psi0.to_owned(),
            moments,
            propagator,
            mass,
            n_steps,
            safety,
        })
    }

    /// Build a simulation from a validated configuration, with the normalized
    /// Gaussian wavepacket it describes as initial state.
    pub fn from_config(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = config.build_grid()?;
        let psi0: nd::Array1<C64>
            = config.packet.eval_normalized(&grid.x, grid.dx, grid.hbar);
        let sim = Self::new(
            grid,
            &psi0,
            config.time.dt,
            config.time.n_steps,
            config.physics.mass,
            config.time.safety,
        )?;
        Ok(sim)
    }

    /// Build a simulation starting from a normalized Gaussian wavepacket.
    pub fn gaussian(
        grid: Grid,
        packet: Gaussian,
        dt: f64,
        n_steps: usize,
        mass: f64,
    ) -> TResult<Self>
    {
        let psi0 = packet.eval_normalized(&grid.x, grid.dx, grid.hbar);
        Self::new(grid, &psi0, dt, n_steps, mass, DEF_SAFETY)
    }

    pub fn grid(&self) -> &Grid { &self.grid }

    pub fn psi0(&self) -> &nd::Array1<C64> { &self.psi0 }

    /// Position and momentum moments of the initial state.
    pub fn moments(&self) -> &PacketMoments { &self.moments }

    pub fn mass(&self) -> f64 { self.mass }

    pub fn dt(&self) -> f64 { self.propagator.dt() }

    pub fn n_steps(&self) -> usize { self.n_steps }

    /// Check the run's duration against the spectral and position-space time
    /// limits for fields up to `g_max`, logging a warning if either is
    /// exceeded.
    pub fn check_validity(&self, g_max: f64) -> Validity {
        check_spectral_validity(
            &self.grid,
            &self.moments,
            self.mass,
            g_max,
            self.safety,
            self.dt(),
            self.n_steps,
        )
    }

    /// Evolve the initial state in the potential `V`.
    pub fn evolve<S>(
        &self,
        V: &Arr1<S>,
        store_wavefunction: bool,
        cancel: Option<&CancelToken>,
    ) -> TResult<EvolutionRecord>
    where S: nd::Data<Elem = f64>
    {
        self.propagator.evolve(
            &self.grid, &self.psi0, V, self.n_steps, store_wavefunction, cancel)
    }

    /// Evolve the initial state in `potential` at field strength `field` and
    /// return the time series of a single observable.
    pub fn observable_series<P>(
        &self,
        potential: &P,
        field: f64,
        obs: Observable,
        cancel: Option<&CancelToken>,
    ) -> TResult<nd::Array1<f64>>
    where P: Potential + ?Sized
    {
        let V = potential.eval(self.grid.x.view(), field);
        let store = obs == Observable::MomentumFft;
        let rec = self.evolve(&V, store, cancel)?;
        Ok(rec.series(obs, &self.grid)?)
    }
}
