//! Potential energy functions sampled on a spatial grid.
//!
//! Every potential is parameterized by a particle mass (where relevant) and a
//! single scalar field strength, so that the same potential can be evaluated
//! for each gravitational branch or for an effective field.

use std::f64::consts::TAU;
use ndarray as nd;
use crate::Arr1;

/// A potential energy function that can be evaluated on a spatial grid for a
/// given scalar field strength.
pub trait Potential: Send + Sync {
    /// Evaluate the potential at every point of `x`.
    fn eval(&self, x: nd::ArrayView1<f64>, field: f64) -> nd::Array1<f64>;
}

/// `V(x) = 0`.
#[derive(Copy, Clone, Debug, Default)]
pub struct FreeParticle;

impl Potential for FreeParticle {
    fn eval(&self, x: nd::ArrayView1<f64>, _field: f64) -> nd::Array1<f64> {
        free_particle(&x)
    }
}

/// `V(x) = m g x`, with `g` the field strength.
#[derive(Copy, Clone, Debug)]
pub struct LinearGravity {
    pub mass: f64,
}

impl Potential for LinearGravity {
    fn eval(&self, x: nd::ArrayView1<f64>, field: f64) -> nd::Array1<f64> {
        linear_gravity(&x, self.mass, field)
    }
}

/// `V(x) = m ω² x² / 2`, with `ω` the field strength.
#[derive(Copy, Clone, Debug)]
pub struct Harmonic {
    pub mass: f64,
}

impl Potential for Harmonic {
    fn eval(&self, x: nd::ArrayView1<f64>, field: f64) -> nd::Array1<f64> {
        x.mapv(|xk| 0.5 * self.mass * (field * xk).powi(2))
    }
}

/// `V(x) = V₀ cos(2π x / a)`, with `V₀` the field strength and `a` the lattice
/// period.
///
/// The period should divide the domain length for the potential to be smooth
/// across the periodic boundary.
#[derive(Copy, Clone, Debug)]
pub struct Periodic {
    pub period: f64,
}

impl Potential for Periodic {
    fn eval(&self, x: nd::ArrayView1<f64>, field: f64) -> nd::Array1<f64> {
        x.mapv(|xk| field * (TAU * xk / self.period).cos())
    }
}

/// Free particle potential, identically zero.
pub fn free_particle<S>(x: &Arr1<S>) -> nd::Array1<f64>
where S: nd::Data<Elem = f64>
{
    nd::Array1::zeros(x.len())
}

/// Linear gravitational potential `V(x) = m g x`.
pub fn linear_gravity<S>(x: &Arr1<S>, mass: f64, g: f64) -> nd::Array1<f64>
where S: nd::Data<Elem = f64>
{
    x.mapv(|xk| mass * g * xk)
}
