//! Many independent runs at once.
//!
//! Runs share nothing, so they are farmed out to rayon without locking.
//! Results come back in the order of the input parameters.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::SimulationError;
use crate::output::SimulationOutput;
use crate::parameters::Parameters;
use crate::simulation::simulate_with;
use crate::solver::SolverOptions;

/// Simulates every parameter set on the global rayon pool.
pub fn sweep(parameter_sets: &[Parameters]) -> Vec<Result<SimulationOutput, SimulationError>> {
    run_all(parameter_sets, &SolverOptions::default())
}

/// Like [`sweep`], with explicit solver options and, optionally, a dedicated
/// pool of `n_threads` workers.
pub fn sweep_with(
    parameter_sets: &[Parameters],
    options: &SolverOptions,
    n_threads: Option<usize>,
) -> Result<Vec<Result<SimulationOutput, SimulationError>>, SimulationError> {
    match n_threads {
        Some(n) => Ok(ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| SimulationError::ThreadPool(e.to_string()))?
            .install(|| run_all(parameter_sets, options))),
        None => Ok(run_all(parameter_sets, options)),
    }
}

fn run_all(
    parameter_sets: &[Parameters],
    options: &SolverOptions,
) -> Vec<Result<SimulationOutput, SimulationError>> {
    parameter_sets
        .par_iter()
        .map(|parameters| simulate_with(parameters, options))
        .collect()
}
