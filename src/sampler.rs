use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::claims::Claim;
use crate::error::{ForecastError, Result};
use crate::probabilities::ProbabilityMap;

/// Revenue realized in one trial, in cents.
pub type TrialRevenue = u64;

/// The random source for one run. A fixed seed makes the run reproducible;
/// `None` seeds from the OS.
pub fn seeded_rng(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_os_rng(),
    }
}

/// Draw one stochastic outcome for every claim and return the revenue it
/// realizes.
///
/// Each claim consumes exactly one uniform draw in [0, 1); it is paid iff the
/// draw is strictly below its status probability, so a probability of 0.0
/// never pays and 1.0 always does. Claims are visited in ledger order, which
/// keeps seeded runs reproducible.
pub fn sample_one_trial(
    claims: &[Claim],
    probabilities: &ProbabilityMap,
    rng: &mut impl Rng,
) -> Result<TrialRevenue> {
    let mut revenue: TrialRevenue = 0;
    for claim in claims {
        let p = probabilities.get(claim.status)?;
        if rng.random::<f64>() < p {
            revenue = revenue.checked_add(claim.amount).ok_or(ForecastError::RevenueOverflow)?;
        }
    }
    Ok(revenue)
}

/// Run `n` trials back to back, appending each revenue to `out`.
///
/// On error, trials already appended in this call are left in `out`; the
/// runners discard the whole buffer on failure.
pub fn sample_trials(
    claims: &[Claim],
    probabilities: &ProbabilityMap,
    n: usize,
    rng: &mut impl Rng,
    out: &mut Vec<TrialRevenue>,
) -> Result<()> {
    out.reserve(n);
    for _ in 0..n {
        out.push(sample_one_trial(claims, probabilities, rng)?);
    }
    Ok(())
}
