//! Deterministic comparison of the branch-mixed and effective-field ⟨x⟩ at
//! the mean branch probabilities.

use std::{ path::PathBuf, sync::Arc };
use anyhow::Context;
use clap::Parser;
use ndarray as nd;
use branchgrav::{
    config::{ self, SimConfig },
    effective::effective_field,
    ensemble::{ BranchMixed, Effective, EvolutionStrategy, EvolveParams },
    metrics,
    observables::Observable,
    potential::{ LinearGravity, Potential },
    simulation::Simulation,
};

#[derive(Parser, Debug)]
#[command(name = "baseline", about = "Branch-mixed vs effective-field evolution")]
struct Args {
    /// TOML configuration; defaults are used for anything it omits.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print every n-th time step.
    #[arg(long, default_value_t = 20)]
    every: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_secs().init();
    let args = Args::parse();

    let config: SimConfig
        = match args.config.as_ref() {
            Some(path) => config::read_toml(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => SimConfig::default(),
        };
    let sim = Arc::new(Simulation::from_config(&config)?);
    sim.check_validity(config.ensemble.g_max());

    let g = config.ensemble.g_values();
    let probs = config.ensemble.mean_probs();
    let geff = effective_field(&probs, &g)?;
    log::info!("g = {g}, probabilities = {probs}, geff = {geff:.6}");

    let potential: Arc<dyn Potential>
        = Arc::new(LinearGravity { mass: config.physics.mass });
    let branch
        = BranchMixed::new(sim.clone(), potential.clone(), &g, Observable::Position)?;
    let effective = Effective::new(sim.clone(), potential, Observable::Position);
    let x_branch = branch.evolve(EvolveParams::Branch(probs.view()))?;
    let x_eff = effective.evolve(EvolveParams::Effective(geff))?;

    let dev = metrics::observable_deviation(
        &x_branch.view().insert_axis(nd::Axis(0)),
        &x_eff.view().insert_axis(nd::Axis(0)),
    )?;
    let rms = metrics::rms_deviation(&dev)[0];

    println!("{:>10} {:>14} {:>14} {:>14}", "t", "<x> branch", "<x> eff", "deviation");
    let every = args.every.max(1);
    let rows
        = x_branch.iter().zip(&x_eff).enumerate()
        .filter(|(k, _)| k % every == 0 || k + 1 == sim.n_steps());
    for (k, (xb, xe)) in rows {
        let t = k as f64 * sim.dt();
        println!("{:>10.4} {:>14.6} {:>14.6} {:>14.6e}", t, xb, xe, xb - xe);
    }
    println!("\nRMS deviation: {rms:.6e}");
    Ok(())
}
