#![allow(non_snake_case)]

use std::sync::Arc;
use approx::assert_abs_diff_eq;
use ndarray as nd;
use branchgrav::{
    config::SimConfig,
    effective::effective_field,
    ensemble::{
        BranchMixed,
        Effective,
        EnsembleOptions,
        EvolutionStrategy,
        EvolveParams,
        run_ensemble,
    },
    grid::Grid,
    metrics,
    observables::Observable,
    potential::{ self, LinearGravity, Potential },
    simulation::Simulation,
    states,
    timedep,
};

// two branches at g = 1, 3 with equal weight, 400 steps of 0.01 on a 1024-point
// grid of length 40
fn baseline() -> (nd::Array1<f64>, nd::Array1<f64>) {
    let grid = Grid::new(1024, 40.0, 1.0).unwrap();
    let psi0 = states::normalize(
        &states::gaussian_wavepacket(&grid.x, 0.0, 0.0, 1.0, grid.hbar),
        grid.dx,
    );
    let g = nd::array![1.0, 3.0];
    let probs = nd::array![0.5, 0.5];
    let geff = effective_field(&probs, &g).unwrap();
    assert_eq!(geff, 2.0);

    let mut x_branch: nd::Array1<f64> = nd::Array1::zeros(400);
    for (&pk, &gk) in probs.iter().zip(&g) {
        let V = potential::linear_gravity(&grid.x, 1.0, gk);
        let rec = timedep::time_evolution(&psi0, &V, &grid, 0.01, 400, 1.0, false)
            .unwrap();
        assert!(rec.norm_drift() < 1e-10);
        x_branch.scaled_add(pk, &rec.x_expectation);
    }
    let V_eff = potential::linear_gravity(&grid.x, 1.0, geff);
    let x_eff
        = timedep::time_evolution(&psi0, &V_eff, &grid, 0.01, 400, 1.0, false)
        .unwrap()
        .x_expectation;
    (x_branch, x_eff)
}

#[test]
fn branch_and_effective_agree_until_wraparound() {
    let (x_branch, x_eff) = baseline();
    assert_eq!(x_branch.len(), 400);
    let dev = &x_branch - &x_eff;
    assert_abs_diff_eq!(dev[0], 0.0, epsilon = 1e-12);
    // free fall in the effective field: ⟨x⟩ = -g t² / 2
    assert_abs_diff_eq!(x_eff[100], -1.0, epsilon = 1e-4);
    assert!(dev[100].abs() < 1e-3);
    // the g = 3 branch reaches the domain edge near t = 3.6 and reappears on
    // the far side
    assert!(dev[399].abs() > 5.0);
    assert!(dev[399].abs() > dev[100].abs());
}

#[test]
fn strategies_reproduce_the_direct_computation() {
    let (x_branch, x_eff) = baseline();
    let config = SimConfig::default();
    let sim = Arc::new(Simulation::from_config(&config).unwrap());
    // the g = 3 packet leaves the domain before the run ends
    let validity = sim.check_validity(config.ensemble.g_max());
    assert!(!validity.ok);
    assert!(validity.t_max_position < validity.t_total);
    let pot: Arc<dyn Potential> = Arc::new(LinearGravity { mass: 1.0 });
    let g = config.ensemble.g_values();
    let branch
        = BranchMixed::new(sim.clone(), pot.clone(), &g, Observable::Position)
        .unwrap();
    let effective = Effective::new(sim, pot, Observable::Position);
    let b = branch.evolve(EvolveParams::Branch(nd::array![0.5, 0.5].view())).unwrap();
    let e = effective.evolve(EvolveParams::Effective(2.0)).unwrap();
    b.iter().zip(&x_branch)
        .for_each(|(a, b)| assert_abs_diff_eq!(*a, *b, epsilon = 1e-9));
    e.iter().zip(&x_eff)
        .for_each(|(a, b)| assert_abs_diff_eq!(*a, *b, epsilon = 1e-9));
}

#[test]
fn noiseless_ensemble_is_deterministic() {
    let mut config = SimConfig::default();
    config.grid.n = 256;
    config.time.n_steps = 100;
    let sim = Arc::new(Simulation::from_config(&config).unwrap());
    assert!(sim.check_validity(config.ensemble.g_max()).ok);
    let pot: Arc<dyn Potential> = Arc::new(LinearGravity { mass: 1.0 });
    let g = config.ensemble.g_values();
    let branch
        = BranchMixed::new(sim.clone(), pot.clone(), &g, Observable::Position)
        .unwrap();
    let effective = Effective::new(sim, pot, Observable::Position);
    let res = run_ensemble(
        &config.ensemble.mean_probs(),
        &g,
        0.0,
        5,
        &branch,
        &effective,
        Some(1),
        &EnsembleOptions { parallel: true, ..Default::default() },
    ).unwrap();
    assert_eq!(res.geff, nd::Array1::from_elem(5, 2.0));
    for k in 1..5 {
        assert_eq!(res.obs_branch.row(k), res.obs_branch.row(0));
        assert_eq!(res.obs_eff.row(k), res.obs_eff.row(0));
    }
    let dev = metrics::observable_deviation(&res.obs_branch, &res.obs_eff).unwrap();
    let rms = metrics::rms_deviation(&dev);
    assert!(rms.iter().all(|r| *r < 1e-6));
    assert_eq!(metrics::failure_probability(&rms, 0.2), 0.0);
}

#[test]
fn noisy_ensemble_statistics() {
    let mut config = SimConfig::default();
    config.grid.n = 256;
    config.time.n_steps = 100;
    config.ensemble.realizations = 50;
    config.ensemble.seed = Some(42);
    let sim = Arc::new(Simulation::from_config(&config).unwrap());
    let pot: Arc<dyn Potential> = Arc::new(LinearGravity { mass: 1.0 });
    let ens = &config.ensemble;
    let g = ens.g_values();
    let branch
        = BranchMixed::new(sim.clone(), pot.clone(), &g, Observable::Position)
        .unwrap();
    let effective = Effective::new(sim, pot, Observable::Position);
    let res = run_ensemble(
        &ens.mean_probs(), &g, ens.noise, ens.realizations, &branch, &effective,
        ens.seed, &EnsembleOptions::default(),
    ).unwrap();
    assert_eq!(res.realizations(), 50);
    assert!(res.failures.is_empty());

    let stats = metrics::summarize(res.geff.iter());
    assert!(stats.min >= 1.0 && stats.max <= 3.0);
    assert!((stats.mean - 2.0).abs() < 0.05);
    // geff = 1 + 2 w₁ with w₁ ≈ 0.5 + noise
    assert!(stats.std > 0.0 && stats.std < 0.25);

    // ⟨x⟩ stays far from the domain edge, so it is linear in g
    let dev = metrics::observable_deviation(&res.obs_branch, &res.obs_eff).unwrap();
    let (mean, std) = metrics::time_profile(&dev);
    assert_eq!(mean.len(), 100);
    assert!(mean.iter().chain(&std).all(|v| v.abs() < 1e-6));
}
