#![allow(non_snake_case)]

//! Provides a pseudo-spectral split-operator solver for the one-dimensional,
//! time-dependent Schrödinger equation in linear gravitational potentials,
//! along with a Monte Carlo harness comparing a probability-weighted mixture
//! of "branch" evolutions against a single evolution in the probability-
//! weighted average ("effective") field.
//!
//! Components, leaves first:
//! - [`grid`]: conjugate position and momentum grids
//! - [`states`]: Gaussian wavepackets and normalization
//! - [`potential`]: potentials sampled on a grid
//! - [`timedep`]: the split-operator propagator and time evolution driver
//! - [`observables`]: expectation values and norms
//! - [`sampler`]: noisy branch-weight sampling
//! - [`effective`]: effective field reduction
//! - [`simulation`]: shared, immutable per-run context
//! - [`ensemble`]: evolution strategies and the ensemble runner
//! - [`metrics`]: deviation statistics over ensembles
//!
//! ```
//! use branchgrav::{ grid::Grid, potential, states, timedep };
//!
//! let grid = Grid::new(512, 40.0, 1.0).unwrap();
//! let psi0 = states::normalize(
//!     &states::gaussian_wavepacket(&grid.x, 0.0, 1.0, 1.0, grid.hbar),
//!     grid.dx,
//! );
//! let V = potential::linear_gravity(&grid.x, 1.0, 2.0);
//! let rec = timedep::time_evolution(&psi0, &V, &grid, 0.01, 100, 1.0, false)
//!     .unwrap();
//! assert_eq!(rec.len(), 100);
//! assert!(rec.norm_drift() < 1e-8);
//! ```
//!
//! See [`docs`] for theoretical background.

use std::sync::{ Arc, atomic::{ AtomicBool, Ordering } };

pub mod error;
pub mod config;
pub mod grid;
pub mod utils;
pub mod states;
pub mod potential;
pub mod observables;
pub mod timedep;
pub mod sampler;
pub mod effective;
pub mod simulation;
pub mod ensemble;
pub mod metrics;

pub mod docs;

pub type Arr1<S> = ndarray::ArrayBase<S, ndarray::Ix1>;
pub type Arr2<S> = ndarray::ArrayBase<S, ndarray::Ix2>;

/// Cooperative cancellation flag shared between a controller and running
/// evolutions or ensembles.
///
/// Clones share the same flag. Cancellation is observed between time steps and
/// between ensemble realizations; it never interrupts a step in progress.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, unset token.
    pub fn new() -> Self { Self::default() }

    /// Request cancellation.
    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed); }

    /// Return `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}
