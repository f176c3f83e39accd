use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claims::PaymentStatus;
use crate::error::{ForecastError, Result};

/// Chance that a claim in a given status ends up contributing its amount to
/// realized revenue. Caller-supplied; nothing here is calibrated.
///
/// Deserialized maps may omit statuses. A run that meets a claim whose status
/// has no entry fails with [`ForecastError::InvalidStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<PaymentStatus, f64>", into = "BTreeMap<PaymentStatus, f64>")]
pub struct ProbabilityMap {
    entries: BTreeMap<PaymentStatus, f64>,
}

impl ProbabilityMap {
    /// Build a map from explicit `(status, probability)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (PaymentStatus, f64)>) -> Result<Self> {
        let entries: BTreeMap<PaymentStatus, f64> = entries.into_iter().collect();
        for (&status, &value) in &entries {
            if !(0.0..=1.0).contains(&value) {
                return Err(ForecastError::InvalidProbability { status, value });
            }
        }
        Ok(Self { entries })
    }

    /// All three statuses set from positional arguments.
    pub fn complete(pending: f64, approved: f64, denied: f64) -> Result<Self> {
        Self::new([
            (PaymentStatus::Pending, pending),
            (PaymentStatus::Approved, approved),
            (PaymentStatus::Denied, denied),
        ])
    }

    /// The same probability for every status.
    pub fn uniform(p: f64) -> Result<Self> {
        Self::complete(p, p, p)
    }

    pub fn get(&self, status: PaymentStatus) -> Result<f64> {
        self.entries.get(&status).copied().ok_or(ForecastError::InvalidStatus(status))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PaymentStatus, f64)> + '_ {
        self.entries.iter().map(|(&s, &p)| (s, p))
    }
}

impl Default for ProbabilityMap {
    /// Even odds for every status, the dashboard's starting position.
    fn default() -> Self {
        Self { entries: PaymentStatus::ALL.iter().map(|&s| (s, 0.5)).collect() }
    }
}

impl TryFrom<BTreeMap<PaymentStatus, f64>> for ProbabilityMap {
    type Error = ForecastError;

    fn try_from(entries: BTreeMap<PaymentStatus, f64>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<ProbabilityMap> for BTreeMap<PaymentStatus, f64> {
    fn from(map: ProbabilityMap) -> Self {
        map.entries
    }
}
