use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a claim as issued by the billing system (e.g. `"P17"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub String);

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequence number assigned to each run started on an event loop or worker.
/// Only used to correlate log lines; carries no ordering guarantee across loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// All monetary values are integer cents. Amounts arrive as decimal currency
/// units in JSON and are rounded to the nearest cent on the way in.
pub const CENTS_PER_UNIT: f64 = 100.0;

/// Largest single claim amount accepted from JSON: 10 trillion units. Keeps
/// sums over any realistic ledger well inside `u64`.
pub const MAX_CLAIM_CENTS: u64 = 1_000_000_000_000_000;

pub fn cents_to_units(cents: f64) -> f64 {
    cents / CENTS_PER_UNIT
}
