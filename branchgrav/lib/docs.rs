//! Theoretical background.
//!
//! # Contents
//! - [Split-operator method](#split-operator-method)
//! - [Fourier conventions](#fourier-conventions)
//! - [Spectral validity](#spectral-validity)
//! - [Branch and effective evolutions](#branch-and-effective-evolutions)
//!
//! # Split-operator method
//! The time-dependent Schrödinger equation for a particle of mass *m* in a
//! static potential *V*(*x*),
//! ```text
//!   ∂ψ
//! iħ -- = (T + V) ψ,     T = p² / 2m
//!   ∂t
//! ```
//! has the formal solution ψ(*t* + *δt*) = exp(-i (*T* + *V*) *δt* / ħ) ψ(*t*).
//! *T* is diagonal in momentum space and *V* is diagonal in position space, but
//! the two do not commute, so the exponential cannot simply be factored.
//! The symmetrized (Strang) splitting
//! ```text
//! exp(-i (T + V) δt / ħ) ≈ exp(-i V δt / 2ħ) exp(-i T δt / ħ) exp(-i V δt / 2ħ)
//! ```
//! is accurate to *O*(*δt*³) per step (second order overall), and each factor
//! is a pointwise phase in the representation where it is diagonal. A single
//! step is therefore
//! 1. multiply by exp(-i *V*(*x*) *δt* / 2ħ) on the spatial grid,
//! 2. transform to momentum space,
//! 3. multiply by exp(-i *p*² *δt* / 2*m*ħ) on the momentum grid,
//! 4. transform back to position space,
//! 5. multiply by exp(-i *V*(*x*) *δt* / 2ħ) again.
//!
//! Every factor is a pure phase and the transform pair is unitary up to a
//! constant, so the scheme conserves the norm to rounding error regardless of
//! the step size. The norm is nevertheless recorded at every step as a check
//! against inconsistent transform scaling.
//!
//! For a linear potential *V* = *m g x*, the nested commutator
//! [*T*, [*T*, *V*]] vanishes and [*V*, [*T*, *V*]] is a constant, so the
//! splitting error reduces to a global phase: expectation values follow
//! Ehrenfest's theorem, ⟨*x*⟩(*t*) = *x*₀ + *p*₀*t*/*m* - *g t*²/2, to within
//! discretization error.
//!
//! # Fourier conventions
//! On a grid of *N* points *x*ₖ = -*L*/2 + *k δx*, *δx* = *L*/*N*, the discrete
//! Fourier transform pairs *x* with the momenta
//! ```text
//! pⱼ = 2π ħ fⱼ,    fⱼ = j / (N δx)   (j = 0, 1, ..., ⌈N/2⌉ - 1, -⌊N/2⌋, ..., -1)
//! ```
//! so that *δp δx N* = 2πħ. The grid is half-open (the point *x* = *L*/2 is
//! excluded) because the transform treats the domain as exactly one period.
//!
//! A forward/inverse transform pair is only the identity if the product of
//! their scale factors is 1/*N*. The "backward" convention puts the whole 1/*N*
//! on the inverse; the "ortho" convention splits it as 1/√*N* on each side.
//! Since the kinetic factor is a diagonal phase, it commutes with these
//! constants, and a [`Propagator`][crate::timedep::Propagator] simply folds the
//! full 1/*N* into its stored kinetic operator and uses unnormalized
//! transforms.
//!
//! # Spectral validity
//! A constant force *F* = -*m g* shifts the momentum distribution at a rate
//! *m g*. Once the distribution reaches the edge of the momentum grid,
//! |*p*| = πħ/*δx*, it wraps around to the opposite edge and the evolution is
//! silently corrupted. Requiring the shift to stay below a fraction α of the
//! edge gives the bound
//! ```text
//!          α π ħ N
//! t_max = ----------
//!         m g_max L
//! ```
//! evaluated for the largest field in use. The default α = 0.4 is a tunable
//! margin rather than a derived quantity; it leaves room for the momentum
//! spread of the packet on top of the drift.
//!
//! The separate failure mode of the packet reaching the edge of the
//! *spatial* domain wraps it around in position instead. With initial center
//! *x*₀, momentum *p*₀ and widths σ_x, σ_p, the packet's extent is bounded by
//! ```text
//! |x0| + |p0| t / m + g_max t² / 2 + k (σ_x + σ_p t / m)
//! ```
//! where the last term uses the free-spreading bound σ_x(t) ≤ σ_x + σ_p t/m
//! and *k* = 4 widths is kept clear of the edge. The position-space limit is
//! the time at which this extent reaches *L*/2. A run is valid only if it
//! ends before both limits.
//!
//! # Branch and effective evolutions
//! Given *K* branches with field values *g*ₖ and probabilities *w*ₖ, the
//! branch-mixed observable is the probability-weighted sum of the
//! observable under each deterministic branch evolution,
//! ```text
//! O_branch(t) = Σₖ wₖ ⟨O⟩_{gₖ}(t)
//! ```
//! while the effective observable is that of a single evolution in the field
//! *g*_eff = Σₖ *w*ₖ *g*ₖ. The two coincide whenever ⟨*O*⟩ is linear in *g*, as
//! ⟨*x*⟩ is for a linear potential on an unbounded domain; any deviation
//! measures the nonlinearity of the observable in the field.
//!
//! In a Monte Carlo ensemble the weights *w*ₖ are perturbed per realization
//! by Gaussian noise, clipped at zero and renormalized. The RMS over time of
//! *O*_branch - *O*_eff is computed for every realization, and the fraction of
//! realizations whose RMS exceeds a threshold estimates the probability that
//! the two descriptions are distinguishable, with a sampling error of order
//! 1/√*R* for *R* realizations.
