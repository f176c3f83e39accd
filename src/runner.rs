//! Incremental, cancellable execution of a forecast.
//!
//! A run is a sequence of slices. Each slice samples at most `chunk_size`
//! trials and then yields back to whoever is driving it: the [`EventLoop`]
//! here, a host's own scheduler calling [`IncrementalRun::step`], or the
//! worker thread in [`crate::worker`]. Cancellation is cooperative and is only
//! observed between slices.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

use crate::aggregate::{SimulationResult, summarize};
use crate::claims::ClaimLedger;
use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::probabilities::ProbabilityMap;
use crate::sampler::{TrialRevenue, sample_trials, seeded_rng};
use crate::types::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Created, no slice has run yet.
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled | RunState::Failed)
    }
}

/// How a run ended, for callers that block on it.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(SimulationResult),
    Cancelled,
    Failed(ForecastError),
}

/// Receives a run's progress stream and exactly one terminal signal.
///
/// A cancelled run calls nothing further once the cancellation is observed,
/// so cancellation is told apart from failure by which callback never fires
/// and by [`RunHandle::state`].
pub trait RunObserver {
    /// Fraction of trials completed, non-decreasing, ending at 1.0.
    fn on_progress(&mut self, fraction: f64);
    fn on_complete(&mut self, result: SimulationResult);
    fn on_failed(&mut self, error: ForecastError);
}

/// Closure-backed observer.
pub struct Callbacks<P, C, F> {
    pub on_progress: P,
    pub on_complete: C,
    pub on_failed: F,
}

impl<P, C, F> RunObserver for Callbacks<P, C, F>
where
    P: FnMut(f64),
    C: FnMut(SimulationResult),
    F: FnMut(ForecastError),
{
    fn on_progress(&mut self, fraction: f64) {
        (self.on_progress)(fraction)
    }

    fn on_complete(&mut self, result: SimulationResult) {
        (self.on_complete)(result)
    }

    fn on_failed(&mut self, error: ForecastError) {
        (self.on_failed)(error)
    }
}

/// Lets a host keep reading an observer after handing it to the event loop.
impl<T: RunObserver> RunObserver for Rc<RefCell<T>> {
    fn on_progress(&mut self, fraction: f64) {
        self.borrow_mut().on_progress(fraction)
    }

    fn on_complete(&mut self, result: SimulationResult) {
        self.borrow_mut().on_complete(result)
    }

    fn on_failed(&mut self, error: ForecastError) {
        self.borrow_mut().on_failed(error)
    }
}

#[derive(Debug)]
struct Shared {
    state: RunState,
    cancel_requested: bool,
}

/// Cloneable, thread-safe handle to one run.
///
/// State and the cancel flag live under one lock so that a `cancel()` racing
/// with the final slice resolves one way only: either the run had already
/// settled (cancel is a no-op and the result stands) or it had not (no result
/// is ever delivered).
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    shared: Arc<Mutex<Shared>>,
}

impl RunHandle {
    pub(crate) fn new(id: RunId) -> Self {
        Self {
            id,
            shared: Arc::new(Mutex::new(Shared { state: RunState::Idle, cancel_requested: false })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    /// Request cancellation. Takes effect at the run's next yield point; a
    /// slice already executing finishes first. No-op once the run is terminal.
    pub fn cancel(&self) {
        let mut s = self.lock();
        if !s.state.is_terminal() {
            s.cancel_requested = true;
        }
    }

    /// True once `cancel()` has been accepted, even if not yet observed.
    pub fn is_cancelled(&self) -> bool {
        let s = self.lock();
        s.cancel_requested || s.state == RunState::Cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Yield point on entry to a slice. Returns false when the run must not
    /// proceed, having moved it to `Cancelled` if a cancel was pending.
    fn enter_slice(&self) -> bool {
        let mut s = self.lock();
        if s.state.is_terminal() {
            return false;
        }
        if s.cancel_requested {
            s.state = RunState::Cancelled;
            return false;
        }
        s.state = RunState::Running;
        true
    }

    /// Yield point after a slice's sampling. True if the run was cancelled.
    fn observe_cancel(&self) -> bool {
        let mut s = self.lock();
        if s.cancel_requested && !s.state.is_terminal() {
            s.state = RunState::Cancelled;
        }
        s.state == RunState::Cancelled
    }

    /// Settle as `Failed` on behalf of a stepper that can no longer report,
    /// such as a worker thread that died. Same rules as [`Self::settle`].
    pub(crate) fn mark_failed(&self) -> bool {
        self.settle(RunState::Failed)
    }

    /// Move to a terminal state. Returns false (and lands on `Cancelled`)
    /// when a cancel got there first; the caller then delivers nothing.
    fn settle(&self, outcome: RunState) -> bool {
        let mut s = self.lock();
        if s.state.is_terminal() {
            return false;
        }
        if s.cancel_requested {
            s.state = RunState::Cancelled;
            return false;
        }
        s.state = outcome;
        true
    }
}

/// What a slice left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More slices to run; schedule a continuation.
    Yield,
    /// Terminal. Drop the run.
    Done,
}

/// One forecast, advanced a slice at a time by [`IncrementalRun::step`].
pub struct IncrementalRun<O> {
    handle: RunHandle,
    ledger: Arc<ClaimLedger>,
    probabilities: ProbabilityMap,
    total: usize,
    chunk_size: usize,
    rng: ChaCha20Rng,
    trials: Vec<TrialRevenue>,
    observer: O,
}

impl<O: RunObserver> IncrementalRun<O> {
    pub fn new(
        id: RunId,
        ledger: Arc<ClaimLedger>,
        probabilities: ProbabilityMap,
        config: &ForecastConfig,
        observer: O,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            handle: RunHandle::new(id),
            ledger,
            probabilities,
            total: config.total_iterations,
            chunk_size: config.chunk_size,
            rng: seeded_rng(config.seed),
            trials: Vec::new(),
            observer,
        })
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn completed_trials(&self) -> usize {
        self.trials.len()
    }

    /// Run one slice: at most `chunk_size` trials, one progress report, and
    /// on the last slice the summary.
    ///
    /// An empty ledger or a zero trial count completes on the first slice
    /// with the all-zero degenerate result, after a single progress of 1.0.
    pub fn step(&mut self) -> Step {
        let run = self.handle.id();
        if !self.enter_slice() {
            return Step::Done;
        }

        if self.total == 0 || self.ledger.is_empty() {
            debug!(%run, "nothing to sample, completing with zero revenue");
            self.observer.on_progress(1.0);
            self.complete(SimulationResult::degenerate(0));
            return Step::Done;
        }

        let n = self.chunk_size.min(self.total - self.trials.len());
        if let Err(error) = sample_trials(
            self.ledger.claims(),
            &self.probabilities,
            n,
            &mut self.rng,
            &mut self.trials,
        ) {
            self.fail(error);
            return Step::Done;
        }

        if self.handle.observe_cancel() {
            debug!(%run, completed = self.trials.len(), "cancelled after slice");
            self.release();
            return Step::Done;
        }

        let completed = self.trials.len();
        debug!(%run, completed, total = self.total, "slice done");
        self.observer.on_progress(completed as f64 / self.total as f64);

        if completed < self.total {
            return Step::Yield;
        }

        let trials = mem::take(&mut self.trials);
        match summarize(&trials) {
            Ok(result) => self.complete(result),
            Err(error) => self.fail(error),
        }
        Step::Done
    }

    fn enter_slice(&mut self) -> bool {
        if self.handle.enter_slice() {
            return true;
        }
        if self.handle.state() == RunState::Cancelled {
            debug!(run = %self.handle.id(), "cancelled at yield point");
        }
        self.release();
        false
    }

    fn complete(&mut self, result: SimulationResult) {
        if self.handle.settle(RunState::Completed) {
            info!(
                run = %self.handle.id(),
                trials = self.total,
                expected = result.expected_revenue,
                "forecast complete"
            );
            self.observer.on_complete(result);
        }
        self.release();
    }

    fn fail(&mut self, error: ForecastError) {
        // Partial trials never reach the aggregator.
        self.release();
        if self.handle.settle(RunState::Failed) {
            warn!(run = %self.handle.id(), %error, "forecast failed");
            self.observer.on_failed(error);
        }
    }

    fn release(&mut self) {
        self.trials = Vec::new();
    }
}

/// A unit of host work the [`EventLoop`] can interleave with forecasts.
pub trait Task {
    fn poll_slice(&mut self) -> Step;
}

impl<O: RunObserver> Task for IncrementalRun<O> {
    fn poll_slice(&mut self) -> Step {
        self.step()
    }
}

impl<F: FnMut() -> Step> Task for F {
    fn poll_slice(&mut self) -> Step {
        self()
    }
}

/// Single-threaded cooperative scheduler.
///
/// Each [`turn`](EventLoop::turn) polls the task at the front of the queue
/// once and re-queues it at the back if it yielded, so concurrent runs and
/// host tasks share the thread round-robin and no turn does more than one
/// slice of sampling.
#[derive(Default)]
pub struct EventLoop {
    queue: VecDeque<Box<dyn Task>>,
    next_run_id: u64,
    turns: u64,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, task: Box<dyn Task>) {
        self.queue.push_back(task);
    }

    /// Queue a forecast. No sampling happens until the loop turns, so a
    /// `cancel()` issued right after `start` guarantees no callbacks at all.
    pub fn start<O: RunObserver + 'static>(
        &mut self,
        ledger: Arc<ClaimLedger>,
        probabilities: ProbabilityMap,
        config: &ForecastConfig,
        observer: O,
    ) -> Result<RunHandle> {
        let id = RunId(self.next_run_id);
        let run = IncrementalRun::new(id, ledger, probabilities, config, observer)?;
        self.next_run_id += 1;
        let handle = run.handle();
        debug!(run = %id, total = config.total_iterations, chunk = config.chunk_size, "run queued");
        self.spawn(Box::new(run));
        Ok(handle)
    }

    /// Poll one task. Returns false when the queue was empty.
    pub fn turn(&mut self) -> bool {
        let Some(mut task) = self.queue.pop_front() else {
            return false;
        };
        self.turns += 1;
        if task.poll_slice() == Step::Yield {
            self.queue.push_back(task);
        }
        true
    }

    /// Turn until every task is done. Returns the number of turns taken.
    pub fn run_until_idle(&mut self) -> u64 {
        let start = self.turns;
        while self.turn() {}
        self.turns - start
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn turns(&self) -> u64 {
        self.turns
    }
}

/// Holds the one run a view cares about. Installing a new run cancels the
/// previous one first, so stale results never land.
#[derive(Debug, Default)]
pub struct RunSlot {
    current: Option<RunHandle>,
}

impl RunSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, handle: RunHandle) -> Option<RunHandle> {
        let previous = self.current.replace(handle);
        if let Some(prev) = &previous {
            prev.cancel();
        }
        previous
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.cancel();
        }
    }

    pub fn current(&self) -> Option<&RunHandle> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::claims::PaymentStatus;
    use crate::forecast::simulate;
    use crate::testing::{Recorder, claim, ledger_of, overflowing_ledger, two_claim_ledger};

    fn start_recorded(
        el: &mut EventLoop,
        ledger: Arc<ClaimLedger>,
        probs: ProbabilityMap,
        config: &ForecastConfig,
    ) -> (RunHandle, Rc<RefCell<Recorder>>) {
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let handle = el.start(ledger, probs, config, rec.clone()).unwrap();
        (handle, rec)
    }

    fn seeded(total: usize, chunk: usize) -> ForecastConfig {
        ForecastConfig::default().with_iterations(total).with_chunk_size(chunk).with_seed(42)
    }

    // ── Scenarios ─────────────────────────────────────────────────────────────

    #[test]
    fn approved_only_single_iteration() {
        let mut el = EventLoop::new();
        let probs =
            ProbabilityMap::new([(PaymentStatus::Approved, 1.0), (PaymentStatus::Denied, 0.0)])
                .unwrap();
        let (handle, rec) = start_recorded(&mut el, two_claim_ledger(), probs, &seeded(1, 200));
        el.run_until_idle();

        let r = rec.borrow().single_result();
        assert_eq!(r.expected_revenue, 100.0);
        assert_eq!(r.min_revenue, 100);
        assert_eq!(r.max_revenue, 100);
        assert_eq!(handle.state(), RunState::Completed);
    }

    #[test]
    fn denied_only_single_iteration() {
        let mut el = EventLoop::new();
        let probs =
            ProbabilityMap::new([(PaymentStatus::Approved, 0.0), (PaymentStatus::Denied, 1.0)])
                .unwrap();
        let (_, rec) = start_recorded(&mut el, two_claim_ledger(), probs, &seeded(1, 200));
        el.run_until_idle();
        assert_eq!(rec.borrow().single_result().expected_revenue, 200.0);
    }

    #[test]
    fn all_zero_probabilities_collapse_to_zero() {
        let mut el = EventLoop::new();
        let (_, rec) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::uniform(0.0).unwrap(),
            &seeded(2_000, 200),
        );
        el.run_until_idle();
        assert_eq!(rec.borrow().single_result(), SimulationResult::degenerate(0));
    }

    #[test]
    fn all_certain_probabilities_collapse_to_total() {
        let mut el = EventLoop::new();
        let (_, rec) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::uniform(1.0).unwrap(),
            &seeded(500, 64),
        );
        el.run_until_idle();
        assert_eq!(rec.borrow().single_result(), SimulationResult::degenerate(300));
    }

    // ── Slicing and progress ──────────────────────────────────────────────────

    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let mut el = EventLoop::new();
        let (_, rec) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::default(),
            &seeded(1_000, 300),
        );
        el.run_until_idle();

        let rec = rec.borrow();
        assert_eq!(rec.progress, vec![0.3, 0.6, 0.9, 1.0]);
        assert!(rec.progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(rec.completed.len(), 1);
    }

    #[test]
    fn one_turn_per_slice() {
        let mut el = EventLoop::new();
        start_recorded(&mut el, two_claim_ledger(), ProbabilityMap::default(), &seeded(2_000, 200));
        assert_eq!(el.run_until_idle(), 10);
    }

    #[test]
    fn final_partial_slice() {
        let mut el = EventLoop::new();
        let (_, rec) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::default(),
            &seeded(250, 100),
        );
        assert_eq!(el.run_until_idle(), 3);
        assert_eq!(rec.borrow().progress, vec![0.4, 0.8, 1.0]);
    }

    /// A host task interleaved with a run sees at most one chunk of sampling
    /// between its own ticks.
    #[test]
    fn host_task_interleaves_with_slices() {
        let mut el = EventLoop::new();
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let handle = el
            .start(two_claim_ledger(), ProbabilityMap::default(), &seeded(1_000, 100), rec.clone())
            .unwrap();

        let ticks = Rc::new(Cell::new(0u32));
        let max_gap = Rc::new(Cell::new(0usize));
        let last_seen = Rc::new(Cell::new(0usize));
        {
            let (ticks, max_gap, last_seen, rec, handle) =
                (ticks.clone(), max_gap.clone(), last_seen.clone(), rec.clone(), handle.clone());
            el.spawn(Box::new(move || {
                ticks.set(ticks.get() + 1);
                let done = rec.borrow().progress.last().map_or(0, |p| (p * 1_000.0).round() as usize);
                max_gap.set(max_gap.get().max(done - last_seen.get()));
                last_seen.set(done);
                if handle.is_finished() { Step::Done } else { Step::Yield }
            }));
        }

        el.run_until_idle();
        assert!(max_gap.get() <= 100, "host starved for {} trials", max_gap.get());
        assert!(ticks.get() >= 10);
        assert_eq!(rec.borrow().completed.len(), 1);
    }

    #[test]
    fn concurrent_runs_are_independent() {
        let mut el = EventLoop::new();
        let (a, rec_a) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::uniform(1.0).unwrap(),
            &seeded(400, 100),
        );
        let (b, rec_b) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::uniform(0.0).unwrap(),
            &seeded(300, 100),
        );
        assert_ne!(a.id(), b.id());
        el.run_until_idle();
        assert_eq!(rec_a.borrow().single_result().expected_revenue, 300.0);
        assert_eq!(rec_b.borrow().single_result().expected_revenue, 0.0);
    }

    #[test]
    fn seeded_run_matches_blocking_simulation() {
        let mut el = EventLoop::new();
        let ledger = two_claim_ledger();
        let config = seeded(2_000, 150);
        let (_, rec) = start_recorded(&mut el, ledger.clone(), ProbabilityMap::default(), &config);
        el.run_until_idle();

        let mut rng = seeded_rng(Some(42));
        let expected = simulate(&ledger, &ProbabilityMap::default(), 2_000, &mut rng).unwrap();
        assert_eq!(rec.borrow().single_result(), expected);
    }

    // ── Cancellation ──────────────────────────────────────────────────────────

    #[test]
    fn cancel_before_first_turn_fires_nothing() {
        let mut el = EventLoop::new();
        let (handle, rec) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::default(),
            &seeded(2_000, 200),
        );
        assert_eq!(handle.state(), RunState::Idle);
        handle.cancel();
        el.run_until_idle();

        let rec = rec.borrow();
        assert!(rec.progress.is_empty());
        assert!(rec.completed.is_empty());
        assert!(rec.failed.is_empty());
        assert_eq!(handle.state(), RunState::Cancelled);
    }

    #[test]
    fn cancel_mid_run_stops_at_next_yield() {
        let mut el = EventLoop::new();
        let (handle, rec) = start_recorded(
            &mut el,
            two_claim_ledger(),
            ProbabilityMap::default(),
            &seeded(1_000, 100),
        );
        el.turn();
        el.turn();
        assert_eq!(handle.state(), RunState::Running);
        handle.cancel();
        assert!(handle.is_cancelled());
        el.run_until_idle();

        let rec = rec.borrow();
        assert_eq!(rec.progress, vec![0.1, 0.2]);
        assert!(rec.completed.is_empty());
        assert_eq!(handle.state(), RunState::Cancelled);
        assert!(el.is_idle(), "continuation must be dropped");
    }

    #[test]
    fn cancel_from_progress_callback_suppresses_completion() {
        let mut el = EventLoop::new();
        let slot: Rc<RefCell<Option<RunHandle>>> = Rc::new(RefCell::new(None));
        let completions = Rc::new(Cell::new(0));
        let progress_calls = Rc::new(Cell::new(0));
        let observer = {
            let (slot, completions, progress_calls) =
                (slot.clone(), completions.clone(), progress_calls.clone());
            Callbacks {
                on_progress: move |_: f64| {
                    progress_calls.set(progress_calls.get() + 1);
                    if let Some(h) = slot.borrow().as_ref() {
                        h.cancel();
                    }
                },
                on_complete: move |_: SimulationResult| completions.set(completions.get() + 1),
                on_failed: |e: ForecastError| panic!("unexpected failure: {e}"),
            }
        };
        // One slice covers the whole run: cancel lands during the final
        // progress report, before the run settles.
        let handle =
            el.start(two_claim_ledger(), ProbabilityMap::default(), &seeded(100, 100), observer).unwrap();
        *slot.borrow_mut() = Some(handle.clone());
        el.run_until_idle();

        assert_eq!(progress_calls.get(), 1);
        assert_eq!(completions.get(), 0);
        assert_eq!(handle.state(), RunState::Cancelled);
    }

    #[test]
    fn cancel_after_completion_is_noop() {
        let mut el = EventLoop::new();
        let (handle, rec) =
            start_recorded(&mut el, two_claim_ledger(), ProbabilityMap::default(), &seeded(10, 5));
        el.run_until_idle();
        handle.cancel();
        assert_eq!(handle.state(), RunState::Completed);
        assert!(!handle.is_cancelled());
        assert_eq!(rec.borrow().completed.len(), 1);
    }

    #[test]
    fn run_slot_cancels_previous_run() {
        let mut el = EventLoop::new();
        let mut slot = RunSlot::new();
        let (first, rec_first) =
            start_recorded(&mut el, two_claim_ledger(), ProbabilityMap::default(), &seeded(400, 100));
        slot.replace(first.clone());
        el.turn();

        let (second, rec_second) =
            start_recorded(&mut el, two_claim_ledger(), ProbabilityMap::default(), &seeded(400, 100));
        let prev = slot.replace(second.clone()).unwrap();
        assert_eq!(prev.id(), first.id());
        el.run_until_idle();

        assert_eq!(first.state(), RunState::Cancelled);
        assert!(rec_first.borrow().completed.is_empty());
        assert_eq!(second.state(), RunState::Completed);
        assert_eq!(rec_second.borrow().completed.len(), 1);
        assert_eq!(slot.current().map(RunHandle::id), Some(second.id()));
    }

    // ── Failure ───────────────────────────────────────────────────────────────

    #[test]
    fn missing_status_fails_observably() {
        let mut el = EventLoop::new();
        let probs = ProbabilityMap::new([(PaymentStatus::Approved, 0.5)]).unwrap();
        let (handle, rec) = start_recorded(&mut el, two_claim_ledger(), probs, &seeded(1_000, 100));
        el.run_until_idle();

        let rec = rec.borrow();
        assert_eq!(rec.failed, vec![ForecastError::InvalidStatus(PaymentStatus::Denied)]);
        assert!(rec.completed.is_empty());
        assert!(rec.progress.is_empty());
        assert_eq!(handle.state(), RunState::Failed);
    }

    #[test]
    fn revenue_overflow_fails_the_run() {
        let mut el = EventLoop::new();
        let (handle, rec) = start_recorded(
            &mut el,
            overflowing_ledger(),
            ProbabilityMap::uniform(1.0).unwrap(),
            &seeded(10, 5),
        );
        el.run_until_idle();

        let rec = rec.borrow();
        assert_eq!(rec.failed, vec![ForecastError::RevenueOverflow]);
        assert!(rec.completed.is_empty());
        assert_eq!(handle.state(), RunState::Failed);
    }

    #[test]
    fn zero_chunk_size_rejected_at_start() {
        let mut el = EventLoop::new();
        let config = ForecastConfig::default().with_chunk_size(0);
        let res = el.start(two_claim_ledger(), ProbabilityMap::default(), &config, Recorder::default());
        assert!(matches!(res, Err(ForecastError::InvalidConfig(_))));
        assert!(el.is_idle());
    }

    // ── Empty inputs ──────────────────────────────────────────────────────────

    #[test]
    fn zero_iterations_completes_with_zero_result() {
        let mut el = EventLoop::new();
        let (handle, rec) =
            start_recorded(&mut el, two_claim_ledger(), ProbabilityMap::default(), &seeded(0, 100));
        assert_eq!(el.run_until_idle(), 1);
        let rec = rec.borrow();
        assert_eq!(rec.progress, vec![1.0]);
        assert_eq!(rec.single_result(), SimulationResult::degenerate(0));
        assert_eq!(handle.state(), RunState::Completed);
    }

    #[test]
    fn empty_ledger_completes_with_zero_result() {
        let mut el = EventLoop::new();
        let (_, rec) =
            start_recorded(&mut el, ledger_of(vec![]), ProbabilityMap::default(), &seeded(2_000, 200));
        assert_eq!(el.run_until_idle(), 1);
        assert_eq!(rec.borrow().single_result(), SimulationResult::degenerate(0));
    }

    // ── Direct stepping ───────────────────────────────────────────────────────

    #[test]
    fn host_can_drive_steps_directly() {
        let ledger = ledger_of(vec![claim(500, PaymentStatus::Pending)]);
        let mut run = IncrementalRun::new(
            RunId(9),
            ledger,
            ProbabilityMap::uniform(1.0).unwrap(),
            &seeded(30, 10),
            Recorder::default(),
        )
        .unwrap();

        assert_eq!(run.step(), Step::Yield);
        assert_eq!(run.completed_trials(), 10);
        assert_eq!(run.step(), Step::Yield);
        assert_eq!(run.step(), Step::Done);
        assert_eq!(run.handle().state(), RunState::Completed);
        // Stepping a finished run does nothing.
        assert_eq!(run.step(), Step::Done);
        assert_eq!(run.observer.completed.len(), 1);
        assert_eq!(run.observer.completed[0].expected_revenue, 500.0);
    }
}
