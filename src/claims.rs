use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::types::ClaimId;

/// Adjudication state of a claim. The set is closed; probability maps are
/// keyed by these three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Denied,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] =
        [PaymentStatus::Pending, PaymentStatus::Approved, PaymentStatus::Denied];
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Approved => "Approved",
            PaymentStatus::Denied => "Denied",
        };
        f.pad(s)
    }
}

/// A single billing claim. Field names on the wire follow the billing
/// system's export (`patient_id`, `insurance_provider`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "patient_id")]
    pub id: ClaimId,
    #[serde(rename = "patient_name")]
    pub name: String,
    pub billing_code: String,
    /// Claimed amount in cents.
    #[serde(with = "money")]
    pub amount: u64,
    #[serde(rename = "insurance_provider")]
    pub payer: String,
    #[serde(rename = "payment_status")]
    pub status: PaymentStatus,
    #[serde(rename = "claim_date")]
    pub date: NaiveDate,
}

/// The finite, read-only set of claims a forecast runs over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimLedger {
    claims: Vec<Claim>,
}

impl ClaimLedger {
    pub fn new(claims: Vec<Claim>) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    /// Sum of every claim's amount: the revenue if everything were paid.
    pub fn total_amount(&self) -> Result<u64> {
        self.claims.iter().try_fold(0u64, |acc, c| {
            acc.checked_add(c.amount).ok_or(ForecastError::RevenueOverflow)
        })
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Headline figures for the ledger, broken down by status and by payer.
    pub fn summary(&self) -> Result<LedgerSummary> {
        let mut by_status: BTreeMap<PaymentStatus, Totals> =
            PaymentStatus::ALL.iter().map(|&s| (s, Totals::default())).collect();
        let mut by_payer: BTreeMap<&str, Totals> = BTreeMap::new();

        for claim in &self.claims {
            by_status.entry(claim.status).or_default().add(claim.amount)?;
            by_payer.entry(claim.payer.as_str()).or_default().add(claim.amount)?;
        }

        Ok(LedgerSummary {
            total_amount: self.total_amount()?,
            total_claims: self.claims.len(),
            by_status,
            by_payer: by_payer
                .into_iter()
                .map(|(payer, totals)| PayerTotals { payer: payer.to_string(), totals })
                .collect(),
        })
    }
}

impl FromIterator<Claim> for ClaimLedger {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self { claims: iter.into_iter().collect() }
    }
}

/// Count and summed amount (cents) of a group of claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub count: usize,
    pub amount: u64,
}

impl Totals {
    fn add(&mut self, amount: u64) -> Result<()> {
        self.amount = self.amount.checked_add(amount).ok_or(ForecastError::RevenueOverflow)?;
        self.count += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayerTotals {
    pub payer: String,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total_amount: u64,
    pub total_claims: usize,
    /// Always holds all three statuses, zero-filled when absent from the ledger.
    pub by_status: BTreeMap<PaymentStatus, Totals>,
    /// Sorted by payer name.
    pub by_payer: Vec<PayerTotals>,
}

/// Decimal currency units on the wire, integer cents in memory. Amounts
/// above [`MAX_CLAIM_CENTS`](crate::types::MAX_CLAIM_CENTS) are rejected.
mod money {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::{CENTS_PER_UNIT, MAX_CLAIM_CENTS};

    pub fn serialize<S: Serializer>(cents: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(*cents as f64 / CENTS_PER_UNIT)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let units = f64::deserialize(d)?;
        if !units.is_finite() || units < 0.0 {
            return Err(D::Error::custom(format!(
                "claim amount must be a non-negative number, got {units}"
            )));
        }
        let cents = (units * CENTS_PER_UNIT).round();
        if cents > MAX_CLAIM_CENTS as f64 {
            return Err(D::Error::custom(format!(
                "claim amount {units} exceeds the maximum of {} units",
                MAX_CLAIM_CENTS / 100
            )));
        }
        Ok(cents as u64)
    }
}
