//! Monte Carlo revenue forecasting over a ledger of billing claims.
//!
//! Each trial decides, claim by claim, whether the claim gets paid, using a
//! caller-supplied probability per payment status, and records the revenue
//! realized. Many trials are summarized into an expected value, percentiles
//! and a histogram. Runs execute in bounded slices so they can share a thread
//! with a UI loop ([`runner`]) or move to a worker thread ([`worker`]).

pub mod aggregate;
pub mod claims;
pub mod config;
pub mod error;
pub mod forecast;
pub mod probabilities;
pub mod runner;
pub mod sampler;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{Percentiles, SimulationResult};
pub use claims::{Claim, ClaimLedger, PaymentStatus};
pub use config::ForecastConfig;
pub use error::ForecastError;
pub use probabilities::ProbabilityMap;
pub use runner::{Callbacks, EventLoop, RunHandle, RunObserver, RunOutcome, RunState};
pub use worker::WorkerRun;
