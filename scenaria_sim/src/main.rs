//! Scenaria scenario harness CLI
//!
//! Replays the built-in crossing scenario once per sampled parameter
//! combination and reports each run's outcome.

use clap::Parser;
use scenaria_core::{
    Deterministic, DeterministicParameterDistribution, DistributionDefinition, DistributionRange,
    DistributionSet, ParameterValue, ParameterValueDistribution, Scope, SingleParameterKind,
    SingleParameterDistribution,
};
use scenaria_env::SimError;
use scenaria_sim::{RunConfig, ScenarioRunner};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "scenaria-sim")]
#[command(about = "Replay the crossing scenario over a parameter distribution", long_about = None)]
struct Args {
    /// Scenario file the runs are attributed to in logs
    #[arg(short, long, default_value = "crossing.xosc")]
    scenario: String,

    /// Lowest npc cruise speed to sample, m/s
    #[arg(long, default_value = "4.0")]
    npc_speed_min: f64,

    /// Highest npc cruise speed to sample, m/s
    #[arg(long, default_value = "12.0")]
    npc_speed_max: f64,

    /// Sampling step for the npc cruise speed, m/s
    #[arg(long, default_value = "4.0")]
    npc_speed_step: f64,

    /// Also sample runs without the crossing pedestrian
    #[arg(long)]
    baseline: bool,

    /// Maximum simulated duration per run in seconds
    #[arg(short, long, default_value = "20")]
    duration: f64,

    /// Frame step in seconds
    #[arg(long, default_value = "0.1")]
    step_time: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn build_distribution(args: &Args) -> Result<Deterministic, SimError> {
    let mut members = vec![DeterministicParameterDistribution::Single(
        SingleParameterDistribution::new(
            "npc_speed",
            SingleParameterKind::Range(DistributionRange::new(
                args.npc_speed_min,
                args.npc_speed_max,
                args.npc_speed_step,
            )?),
        ),
    )];
    if args.baseline {
        members.push(DeterministicParameterDistribution::Single(
            SingleParameterDistribution::new(
                "with_pedestrian",
                SingleParameterKind::Set(DistributionSet::new(vec![
                    ParameterValue::Boolean(true),
                    ParameterValue::Boolean(false),
                ])?),
            ),
        ));
    }
    Ok(Deterministic::new(members))
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Scenaria scenario harness v0.1.0");

    let distribution = match build_distribution(&args) {
        Ok(distribution) => distribution,
        Err(e) => {
            error!("invalid distribution: {}", e);
            std::process::exit(1);
        }
    };

    let mut driver = ParameterValueDistribution::new(
        args.scenario.clone(),
        DistributionDefinition::deterministic(distribution),
    );

    let base = RunConfig {
        duration: args.duration,
        step_time: args.step_time,
        verbose: args.verbose,
        ..RunConfig::default()
    };

    let global = Arc::new(Scope::new());
    let outcome = driver.run(&global, |scope: &Scope| {
        let config = base.clone().apply_scope(scope);
        let mut runner = ScenarioRunner::new(config.clone());
        let result = runner.run()?;
        if result.ego_stopped {
            info!(
                npc_speed = config.npc_speed,
                with_pedestrian = config.with_pedestrian,
                min_ego_speed = result.min_ego_speed,
                "run complete: ego stopped for the crossing"
            );
        } else {
            info!(
                npc_speed = config.npc_speed,
                with_pedestrian = config.with_pedestrian,
                min_ego_speed = result.min_ego_speed,
                final_ego_s = result.final_ego_s,
                "run complete"
            );
        }
        Ok(())
    });

    match outcome {
        Ok(runs) => info!("executed {} scenario runs", runs),
        Err(e) => {
            error!("scenario execution failed: {}", e);
            std::process::exit(1);
        }
    }
}
