//! Distribution driver: one scenario execution per drawn sample.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::distribution::DistributionDefinition;
use crate::scope::Scope;
use scenaria_env::SimError;

/// Binds a target scenario to a distribution root and replays the
/// scenario once per sample.
///
/// Sampling and execution alternate strictly: one full scenario
/// execution completes before the next sample is drawn, because a
/// user-defined generator or scenario side effects may depend on prior
/// runs' completion.
pub struct ParameterValueDistribution {
    scenario_file: PathBuf,
    distribution: DistributionDefinition,
}

impl ParameterValueDistribution {
    /// Creates a driver for the given scenario file and distribution.
    pub fn new(scenario_file: impl Into<PathBuf>, distribution: DistributionDefinition) -> Self {
        Self {
            scenario_file: scenario_file.into(),
            distribution,
        }
    }

    /// The scenario file this driver replays.
    pub fn scenario_file(&self) -> &Path {
        &self.scenario_file
    }

    /// Samples until exhausted, executing the scenario once per sample.
    ///
    /// Each iteration binds the sample into a fresh child of `global`,
    /// so no bindings leak between executions. Returns the number of
    /// executions, or the first execution error.
    pub fn run<E>(&mut self, global: &Arc<Scope>, mut execute: E) -> Result<u32, SimError>
    where
        E: FnMut(&Scope) -> Result<(), SimError>,
    {
        let mut runs = 0u32;
        loop {
            let mut scope = global.child();
            if !self.distribution.sample(&mut scope) {
                break;
            }
            debug!(
                run = runs,
                parameters = scope.len(),
                "executing scenario with sampled parameters"
            );
            execute(&scope)?;
            runs += 1;
        }
        info!(
            "scenario {} executed {} times",
            self.scenario_file.display(),
            runs
        );
        Ok(runs)
    }
}
