//! Outstanding-request bookkeeping for one rover.

use std::collections::VecDeque;

use rover_primitives::{constants, ChainTag};
use tracing::{debug, info, warn};

use crate::{
    driver::ChainDriver,
    errors::DriverError,
    planner::{clamp_recent, Batch},
    state::SyncState,
};

/// Tracks the batch pipeline of a resync session plus ad-hoc gap fills.
///
/// One batch is in flight at a time; the next one waits until the shared
/// requested set drains. Dispatch failures leave the active batch armed so
/// the watchdog retries it.
#[derive(Debug)]
pub struct RequestTracker {
    chain: ChainTag,
    remaining: VecDeque<Batch>,
    active: Option<Batch>,
    dispatched: bool,
    /// A session is the span between a resync directive and its status
    /// report; gap fills outside a session never report.
    session_open: bool,
}

/// Outcome of one pump pass, for the control loop to act on.
#[derive(Debug, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Nothing to do.
    Idle,
    /// A batch was handed to the driver.
    Dispatched,
    /// Dispatch must be retried on a later tick.
    Postponed,
    /// The session finished; report success upstream exactly once.
    SessionComplete,
    /// The driver hit an unrecoverable condition.
    Fatal(String),
}

impl RequestTracker {
    pub fn new(chain: ChainTag) -> Self {
        Self {
            chain,
            remaining: VecDeque::new(),
            active: None,
            dispatched: false,
            session_open: false,
        }
    }

    pub fn chain(&self) -> ChainTag {
        self.chain
    }

    /// Starts a resync session, discarding whatever was queued before.
    pub fn begin_session(&mut self, batches: VecDeque<Batch>) {
        info!(chain = %self.chain, batches = batches.len(), "resync session start");
        self.remaining = batches;
        self.active = None;
        self.dispatched = false;
        self.session_open = true;
    }

    /// Queues an ad-hoc batch (gap fill or fetch-block), clamped to the
    /// chain's batch limit preferring recency.
    pub fn enqueue_gap(&mut self, from: u64, to: u64) {
        let batch = clamp_recent(from, to, constants::max_batch(self.chain));
        debug!(chain = %self.chain, from = batch.from, to = batch.to, "gap batch queued");
        self.remaining.push_back(batch);
    }

    pub fn has_work(&self) -> bool {
        self.active.is_some() || !self.remaining.is_empty()
    }

    /// Advances the pipeline: completes the active batch once the requested
    /// set drains, dispatches the next one, and detects session completion.
    pub async fn pump(&mut self, state: &SyncState, driver: &dyn ChainDriver) -> PumpOutcome {
        if let Some(batch) = self.active {
            if !self.dispatched {
                return self.try_dispatch(batch, state, driver).await;
            }
            if !state.is_drained() {
                return PumpOutcome::Idle;
            }
            debug!(chain = %self.chain, from = batch.from, to = batch.to, "batch complete");
            self.active = None;
            self.dispatched = false;
        }

        if let Some(next) = self.remaining.pop_front() {
            state.request_batch(&next);
            self.active = Some(next);
            self.dispatched = false;
            return self.try_dispatch(next, state, driver).await;
        }

        if self.session_open && state.is_drained() {
            self.session_open = false;
            info!(chain = %self.chain, "resync session complete");
            return PumpOutcome::SessionComplete;
        }

        PumpOutcome::Idle
    }

    async fn try_dispatch(
        &mut self,
        batch: Batch,
        _state: &SyncState,
        driver: &dyn ChainDriver,
    ) -> PumpOutcome {
        match driver.dispatch_batch(batch).await {
            Ok(()) => {
                self.dispatched = true;
                debug!(chain = %self.chain, from = batch.from, to = batch.to, "batch dispatched");
                PumpOutcome::Dispatched
            }
            Err(err) if err.is_retriable() => {
                warn!(chain = %self.chain, %err, "batch dispatch postponed");
                PumpOutcome::Postponed
            }
            Err(DriverError::Fatal(reason)) => PumpOutcome::Fatal(reason),
            Err(_) => unreachable!("non-retriable errors are fatal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;

    use super::*;

    /// Driver stub that counts dispatches and can be switched to starve.
    struct StubDriver {
        dispatches: AtomicUsize,
        starve: std::sync::atomic::AtomicBool,
    }

    impl StubDriver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                dispatches: AtomicUsize::new(0),
                starve: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl ChainDriver for StubDriver {
        fn chain(&self) -> ChainTag {
            ChainTag::Eth
        }

        async fn remote_tip(&self) -> Result<u64, DriverError> {
            Ok(1000)
        }

        async fn dispatch_batch(&self, _batch: Batch) -> Result<(), DriverError> {
            if self.starve.load(Ordering::Relaxed) {
                return Err(DriverError::NotEnoughPeers(1, 2));
            }
            self.dispatches.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn drain_batch(state: &SyncState, batch: Batch) {
        for h in batch.heights() {
            state.complete_height(h);
        }
    }

    #[tokio::test]
    async fn session_runs_batches_in_order_and_completes_once() {
        let state = SyncState::new(ChainTag::Eth);
        let driver = StubDriver::new();
        let mut tracker = RequestTracker::new(ChainTag::Eth);

        let first = Batch::new(200, 250);
        let second = Batch::new(100, 150);
        tracker.begin_session(VecDeque::from(vec![first, second]));

        assert_eq!(
            tracker.pump(&state, driver.as_ref()).await,
            PumpOutcome::Dispatched
        );
        assert!(state.is_requested(200));

        // second batch must wait for the first to drain
        assert_eq!(tracker.pump(&state, driver.as_ref()).await, PumpOutcome::Idle);
        assert!(!state.is_requested(100));

        drain_batch(&state, first);
        assert_eq!(
            tracker.pump(&state, driver.as_ref()).await,
            PumpOutcome::Dispatched
        );
        assert!(state.is_requested(100));

        drain_batch(&state, second);
        assert_eq!(
            tracker.pump(&state, driver.as_ref()).await,
            PumpOutcome::SessionComplete
        );
        // completion reported exactly once
        assert_eq!(tracker.pump(&state, driver.as_ref()).await, PumpOutcome::Idle);
        assert_eq!(driver.dispatches.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn starved_dispatch_is_retried_by_later_pumps() {
        let state = SyncState::new(ChainTag::Eth);
        let driver = StubDriver::new();
        driver.starve.store(true, Ordering::Relaxed);
        let mut tracker = RequestTracker::new(ChainTag::Eth);

        let batch = Batch::new(10, 20);
        tracker.begin_session(VecDeque::from(vec![batch]));

        assert_eq!(
            tracker.pump(&state, driver.as_ref()).await,
            PumpOutcome::Postponed
        );
        // heights are reserved even while starving, so nothing re-plans them
        assert!(state.is_requested(15));

        driver.starve.store(false, Ordering::Relaxed);
        assert_eq!(
            tracker.pump(&state, driver.as_ref()).await,
            PumpOutcome::Dispatched
        );
        assert_eq!(driver.dispatches.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn gap_fill_outside_session_never_reports() {
        let state = SyncState::new(ChainTag::Eth);
        let driver = StubDriver::new();
        let mut tracker = RequestTracker::new(ChainTag::Eth);

        tracker.enqueue_gap(101, 109);
        assert_eq!(
            tracker.pump(&state, driver.as_ref()).await,
            PumpOutcome::Dispatched
        );
        drain_batch(&state, Batch::new(101, 109));
        assert_eq!(tracker.pump(&state, driver.as_ref()).await, PumpOutcome::Idle);
    }

    #[tokio::test]
    async fn oversized_gap_keeps_only_newest_blocks() {
        let mut tracker = RequestTracker::new(ChainTag::Eth);
        tracker.enqueue_gap(0, 1000);

        let state = SyncState::new(ChainTag::Eth);
        let driver = StubDriver::new();
        tracker.pump(&state, driver.as_ref()).await;

        assert!(state.is_requested(1000));
        assert!(state.is_requested(873));
        assert!(!state.is_requested(872));
    }
}
