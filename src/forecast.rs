//! Blocking forecasts: one-shot and a parallel sweep over probability maps.

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::aggregate::{SimulationResult, summarize};
use crate::claims::ClaimLedger;
use crate::config::ForecastConfig;
use crate::error::Result;
use crate::probabilities::ProbabilityMap;
use crate::sampler::{sample_trials, seeded_rng};

/// Run every trial on the calling thread and summarize.
///
/// Consumes `rng` exactly as an incremental run with the same seed would, so
/// the two produce identical results. An empty ledger or zero iterations
/// yields the all-zero degenerate result.
pub fn simulate(
    ledger: &ClaimLedger,
    probabilities: &ProbabilityMap,
    iterations: usize,
    rng: &mut impl Rng,
) -> Result<SimulationResult> {
    if iterations == 0 || ledger.is_empty() {
        return Ok(SimulationResult::degenerate(0));
    }
    let mut trials = Vec::with_capacity(iterations);
    sample_trials(ledger.claims(), probabilities, iterations, rng, &mut trials)?;
    summarize(&trials)
}

/// Forecast the same ledger under several probability maps in parallel.
///
/// Map `i` runs with seed `config.seed + i` when a seed is set, otherwise with
/// its own OS seed. Results come back in input order; the first error wins.
pub fn sweep(
    ledger: &ClaimLedger,
    maps: &[ProbabilityMap],
    config: &ForecastConfig,
) -> Result<Vec<SimulationResult>> {
    info!(scenarios = maps.len(), trials = config.total_iterations, "starting sweep");
    maps.par_iter()
        .enumerate()
        .map(|(i, probabilities)| {
            let mut rng = seeded_rng(config.seed.map(|s| s.wrapping_add(i as u64)));
            simulate(ledger, probabilities, config.total_iterations, &mut rng)
        })
        .collect()
}
