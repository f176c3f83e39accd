//! Offloaded runs: the same slice stepper, driven on a dedicated thread.
//!
//! The worker owns the run and reports back over an mpsc channel carrying
//! [`WorkerMessage`]s. The controller side never samples; it only drains
//! messages into an observer, either non-blocking ([`WorkerRun::dispatch`])
//! or blocking ([`WorkerRun::wait`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::aggregate::SimulationResult;
use crate::claims::ClaimLedger;
use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::probabilities::ProbabilityMap;
use crate::runner::{IncrementalRun, RunHandle, RunObserver, RunOutcome, Step};
use crate::types::RunId;

static NEXT_WORKER_RUN: AtomicU64 = AtomicU64::new(0);

/// Everything a worker can tell its controller.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Progress(f64),
    Complete(SimulationResult),
    Failed(ForecastError),
}

/// Worker-side observer: forwards every callback as a message.
struct ChannelObserver {
    tx: Sender<WorkerMessage>,
}

impl ChannelObserver {
    fn send(&self, msg: WorkerMessage) {
        // A dropped controller has already cancelled the run.
        let _ = self.tx.send(msg);
    }
}

impl RunObserver for ChannelObserver {
    fn on_progress(&mut self, fraction: f64) {
        self.send(WorkerMessage::Progress(fraction));
    }

    fn on_complete(&mut self, result: SimulationResult) {
        self.send(WorkerMessage::Complete(result));
    }

    fn on_failed(&mut self, error: ForecastError) {
        self.send(WorkerMessage::Failed(error));
    }
}

/// Controller for a run executing on its own thread.
///
/// Dropping the controller cancels the run and joins the thread, so the
/// worker is torn down on every exit path.
pub struct WorkerRun {
    handle: RunHandle,
    rx: Receiver<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
    finished: bool,
}

impl WorkerRun {
    pub fn spawn(
        ledger: Arc<ClaimLedger>,
        probabilities: ProbabilityMap,
        config: &ForecastConfig,
    ) -> Result<Self> {
        let id = RunId(NEXT_WORKER_RUN.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel();
        let mut run =
            IncrementalRun::new(id, ledger, probabilities, config, ChannelObserver { tx })?;
        let handle = run.handle();

        Self::launch(handle, rx, move || {
            debug!(run = %id, "worker started");
            while run.step() == Step::Yield {}
            debug!(run = %id, "worker exiting");
        })
    }

    /// Start `body` on a named thread. The channel disconnects when `body`
    /// returns or unwinds, which is how the controller learns it is gone.
    fn launch(
        handle: RunHandle,
        rx: Receiver<WorkerMessage>,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("claimcast-{}", handle.id()))
            .spawn(body)
            .map_err(|e| ForecastError::WorkerSpawn(e.to_string()))?;

        Ok(Self { handle, rx, thread: Some(thread), finished: false })
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Deliver every message already received, without blocking. Returns
    /// true once the run has ended (completed, failed or cancelled) and the
    /// worker has been joined.
    pub fn dispatch(&mut self, observer: &mut impl RunObserver) -> bool {
        while !self.finished {
            match self.rx.try_recv() {
                Ok(msg) => {
                    self.deliver(msg, observer);
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected(observer);
                }
            }
        }
        true
    }

    /// Block until the run ends, delivering messages as they arrive.
    pub fn wait(mut self, observer: &mut impl RunObserver) -> RunOutcome {
        let mut outcome = None;
        while !self.finished {
            match self.rx.recv() {
                Ok(msg) => {
                    if let Some(end) = self.deliver(msg, observer) {
                        outcome = Some(end);
                    }
                }
                Err(_) => outcome = self.disconnected(observer),
            }
        }
        outcome.unwrap_or(RunOutcome::Cancelled)
    }

    /// Hand one message to the observer unless the run has been cancelled.
    /// Returns the outcome when the message was terminal.
    fn deliver(
        &mut self,
        msg: WorkerMessage,
        observer: &mut impl RunObserver,
    ) -> Option<RunOutcome> {
        if self.handle.is_cancelled() {
            return None;
        }
        match msg {
            WorkerMessage::Progress(fraction) => {
                observer.on_progress(fraction);
                None
            }
            WorkerMessage::Complete(result) => {
                observer.on_complete(result.clone());
                self.finish();
                Some(RunOutcome::Completed(result))
            }
            WorkerMessage::Failed(error) => {
                observer.on_failed(error.clone());
                self.finish();
                Some(RunOutcome::Failed(error))
            }
        }
    }

    /// The channel closed before a terminal message arrived. Unless the run
    /// was cancelled, the worker died: settle it as failed and tell the
    /// observer.
    fn disconnected(&mut self, observer: &mut impl RunObserver) -> Option<RunOutcome> {
        self.finish();
        if !self.handle.mark_failed() {
            return None;
        }
        warn!(run = %self.handle.id(), "forecast worker exited without a result");
        let error = ForecastError::WorkerDisconnected;
        observer.on_failed(error.clone());
        Some(RunOutcome::Failed(error))
    }

    fn finish(&mut self) {
        self.finished = true;
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(run = %self.handle.id(), "forecast worker panicked");
        }
    }
}

impl Drop for WorkerRun {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.cancel();
            self.join();
        }
    }
}
