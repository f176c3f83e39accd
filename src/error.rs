//! Error types for forecasting runs.

use thiserror::Error;

use crate::claims::PaymentStatus;

/// Errors raised while sampling, summarizing or configuring a forecast.
///
/// Cancellation is deliberately absent: a cancelled run is a normal terminal
/// state (`RunState::Cancelled`), not a failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// A claim's payment status has no entry in the probability map.
    #[error("no payment probability for status {0}")]
    InvalidStatus(PaymentStatus),

    /// Aggregation was asked to summarize zero trials.
    #[error("cannot summarize an empty trial set")]
    EmptyTrialSet,

    /// Summing claim amounts exceeded the range of `u64` cents.
    #[error("revenue overflowed u64 cents")]
    RevenueOverflow,

    /// A probability outside [0, 1] (or NaN) was supplied for a status.
    #[error("probability {value} for status {status} is outside [0, 1]")]
    InvalidProbability { status: PaymentStatus, value: f64 },

    /// Run parameters that cannot drive a simulation.
    #[error("invalid forecast config: {0}")]
    InvalidConfig(String),

    /// The OS refused to start a worker thread.
    #[error("failed to start forecast worker: {0}")]
    WorkerSpawn(String),

    /// The worker went away without reporting an outcome.
    #[error("forecast worker exited without a result")]
    WorkerDisconnected,
}

pub type Result<T> = std::result::Result<T, ForecastError>;
