use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::claims::{Claim, ClaimLedger, PaymentStatus};
use crate::error::{ForecastError, Result};
use crate::types::ClaimId;

pub const DEFAULT_TOTAL_ITERATIONS: usize = 2_000;
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Run parameters shared by every runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of trials per run.
    pub total_iterations: usize,
    /// Trials per scheduling slice. Bounds the work done between yields.
    pub chunk_size: usize,
    /// Seed for the run's `ChaCha20Rng`. `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            total_iterations: DEFAULT_TOTAL_ITERATIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            seed: None,
        }
    }
}

impl ForecastConfig {
    pub fn with_iterations(mut self, n: usize) -> Self {
        self.total_iterations = n;
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ForecastError::InvalidConfig("chunk_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(std::io::Error::other)
    }
}

type SampleRow = (&'static str, &'static str, &'static str, u64, &'static str, PaymentStatus, NaiveDate);

/// Dates are built at compile time, so a bad literal fails the build.
const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid sample ledger date"),
    }
}

// Amounts in cents.
#[rustfmt::skip]
const SAMPLE_ROWS: [SampleRow; 12] = {
    use PaymentStatus::{Approved, Denied, Pending};
    [
        ("P1",  "John Smith",      "B1001", 167_550, "Blue Shield",  Pending,  ymd(2025, 3, 25)),
        ("P2",  "Sarah Johnson",   "B2002", 231_009, "Medicare",     Approved, ymd(2025, 1, 5)),
        ("P3",  "Robert Chen",     "B3003", 494_557, "Aetna",        Pending,  ymd(2025, 3, 4)),
        ("P4",  "Lisa Williams",   "B4004", 833_889, "UnitedHealth", Denied,   ymd(2025, 3, 20)),
        ("P5",  "Michael Garcia",  "B5005", 322_005, "Cigna",        Denied,   ymd(2025, 2, 21)),
        ("P6",  "Emily Rodriguez", "B6006", 125_075, "Blue Shield",  Approved, ymd(2025, 3, 15)),
        ("P7",  "David Kim",       "B7007", 375_025, "Medicare",     Pending,  ymd(2025, 2, 28)),
        ("P8",  "Jennifer Lee",    "B8008", 512_550, "Aetna",        Approved, ymd(2025, 1, 22)),
        ("P9",  "Thomas Brown",    "B9009", 287_530, "UnitedHealth", Denied,   ymd(2025, 3, 10)),
        ("P10", "Maria Martinez",  "B1010", 422_580, "Cigna",        Pending,  ymd(2025, 2, 15)),
        ("P11", "James Wilson",    "B1011", 187_545, "Blue Shield",  Approved, ymd(2025, 1, 30)),
        ("P12", "Patricia Taylor", "B1012", 635_020, "Medicare",     Denied,   ymd(2025, 3, 5)),
    ]
};

/// The twelve-claim book the dashboard ships with, used when no ledger is
/// supplied on the command line.
pub fn sample_ledger() -> ClaimLedger {
    SAMPLE_ROWS
        .iter()
        .map(|&(id, name, code, amount, payer, status, date)| Claim {
            id: ClaimId(id.to_string()),
            name: name.to_string(),
            billing_code: code.to_string(),
            amount,
            payer: payer.to_string(),
            status,
            date,
        })
        .collect()
}
