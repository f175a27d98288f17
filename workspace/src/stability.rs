//! Monte Carlo stability study: how often does noise in the branch weights
//! make the branch-mixed and effective-field ⟨x⟩ distinguishable?

use std::{ path::PathBuf, sync::Arc };
use anyhow::Context;
use clap::Parser;
use branchgrav::{
    config::{ self, SimConfig },
    ensemble::{ BranchMixed, Effective, EnsembleOptions, run_ensemble },
    metrics,
    observables::Observable,
    potential::{ LinearGravity, Potential },
    simulation::Simulation,
};

#[derive(Parser, Debug)]
#[command(name = "stability", about = "Monte Carlo branch-weight stability study")]
struct Args {
    /// TOML configuration; defaults are used for anything it omits.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured random seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Override the configured number of realizations.
    #[arg(long)]
    realizations: Option<usize>,
    /// Run realizations on a single thread.
    #[arg(long)]
    sequential: bool,
    /// Print the deviation profile at every n-th time step.
    #[arg(long, default_value_t = 50)]
    every: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_secs().init();
    let args = Args::parse();

    let mut config: SimConfig
        = match args.config.as_ref() {
            Some(path) => config::read_toml(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => SimConfig::default(),
        };
    if let Some(seed) = args.seed { config.ensemble.seed = Some(seed); }
    if let Some(r) = args.realizations { config.ensemble.realizations = r; }
    if args.sequential { config.ensemble.parallel = false; }
    config.validate()?;

    let sim = Arc::new(Simulation::from_config(&config)?);
    let validity = sim.check_validity(config.ensemble.g_max());
    log::info!(
        "t_total = {:.3}, spectral limit = {:.3}, position limit = {:.3}",
        validity.t_total, validity.t_max, validity.t_max_position,
    );
    if !validity.ok {
        println!(
            "WARNING: simulated time {:.3} exceeds the validity limit {:.3}; \
            deviations below include wrap-around artifacts\n",
            validity.t_total,
            validity.t_limit(),
        );
    }

    let ens = &config.ensemble;
    let g = ens.g_values();
    let potential: Arc<dyn Potential>
        = Arc::new(LinearGravity { mass: config.physics.mass });
    let branch
        = BranchMixed::new(sim.clone(), potential.clone(), &g, Observable::Position)?;
    let effective = Effective::new(sim.clone(), potential, Observable::Position);
    let options = EnsembleOptions {
        parallel: ens.parallel,
        degenerate: ens.degenerate,
        cancel: None,
    };
    let res = run_ensemble(
        &ens.mean_probs(),
        &g,
        ens.noise,
        ens.realizations,
        &branch,
        &effective,
        ens.seed,
        &options,
    )?;

    let dev = metrics::observable_deviation(&res.obs_branch, &res.obs_eff)?;
    let rms = metrics::rms_deviation(&dev);
    let fail_prob = metrics::failure_probability(&rms, ens.threshold);
    let geff_stats = metrics::summarize(res.geff.iter());
    let (dev_mean, dev_std) = metrics::summarize_deviation(&dev);

    println!("Effective field statistics:");
    println!("{:>6}: {:.4}", "mean", geff_stats.mean);
    println!("{:>6}: {:.4}", "std", geff_stats.std);
    println!("{:>6}: {:.4}", "min", geff_stats.min);
    println!("{:>6}: {:.4}", "max", geff_stats.max);
    println!("\nDeviation over all realizations and times: {dev_mean:.4e} ± {dev_std:.4e}");
    println!(
        "Failure probability (Δ<x> RMS > {}): {:.3} ({} of {} realizations completed)",
        ens.threshold,
        fail_prob,
        res.completed().len(),
        res.realizations(),
    );

    let (profile_mean, profile_std) = metrics::time_profile(&dev);
    println!("\n{:>10} {:>14} {:>14}", "t", "mean Δ<x>", "std Δ<x>");
    let every = args.every.max(1);
    let n_times = profile_mean.len();
    let rows
        = profile_mean.iter().zip(&profile_std).enumerate()
        .filter(|(k, _)| k % every == 0 || k + 1 == n_times);
    for (k, (m, s)) in rows {
        println!("{:>10.4} {:>14.6e} {:>14.6e}", k as f64 * sim.dt(), m, s);
    }
    Ok(())
}
