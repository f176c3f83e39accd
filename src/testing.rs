//! Shared fixtures for unit tests.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::aggregate::SimulationResult;
use crate::claims::{Claim, ClaimLedger, PaymentStatus};
use crate::error::ForecastError;
use crate::runner::RunObserver;
use crate::types::ClaimId;

pub fn claim(amount: u64, status: PaymentStatus) -> Claim {
    payer_claim(&format!("C{amount}"), amount, "Medicare", status)
}

pub fn payer_claim(id: &str, amount: u64, payer: &str, status: PaymentStatus) -> Claim {
    Claim {
        id: ClaimId(id.to_string()),
        name: format!("Patient {id}"),
        billing_code: "B1000".to_string(),
        amount,
        payer: payer.to_string(),
        status,
        date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    }
}

/// Two claims whose amounts sum past `u64::MAX`.
pub fn overflowing_ledger() -> Arc<ClaimLedger> {
    let huge = u64::MAX / 2 + 1;
    ledger_of(vec![claim(huge, PaymentStatus::Approved), claim(huge, PaymentStatus::Approved)])
}

pub fn ledger_of(claims: Vec<Claim>) -> Arc<ClaimLedger> {
    Arc::new(ClaimLedger::new(claims))
}

/// 100 Approved + 200 Denied.
pub fn two_claim_ledger() -> Arc<ClaimLedger> {
    ledger_of(vec![claim(100, PaymentStatus::Approved), claim(200, PaymentStatus::Denied)])
}

/// Observer that keeps everything it is told.
#[derive(Debug, Default)]
pub struct Recorder {
    pub progress: Vec<f64>,
    pub completed: Vec<SimulationResult>,
    pub failed: Vec<ForecastError>,
}

impl Recorder {
    pub fn single_result(&self) -> SimulationResult {
        assert_eq!(self.completed.len(), 1, "expected exactly one completion");
        assert!(self.failed.is_empty(), "unexpected failure: {:?}", self.failed);
        self.completed[0].clone()
    }
}

impl RunObserver for Recorder {
    fn on_progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }

    fn on_complete(&mut self, result: SimulationResult) {
        self.completed.push(result);
    }

    fn on_failed(&mut self, error: ForecastError) {
        self.failed.push(error);
    }
}
