//! The rover control loop: directives in, unified blocks out.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use rover_primitives::{constants, UnifiedBlock};
use rover_rpc_api::{FetchBlockData, ResyncData, RoverDirective, RoverSyncStatus};
use rover_unify::{build_unified, mark_transactions, ForeignBlock, SettlementOracle, TxMarker};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    driver::{ChainDriver, RoverEvent},
    errors::{DriverError, UpstreamError},
    planner::plan_resync,
    state::SyncState,
    tracker::{PumpOutcome, RequestTracker},
};

/// Client interface to the parent coordinator's unary methods.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    async fn collect_block(&self, block: UnifiedBlock) -> Result<(), UpstreamError>;
    async fn report_sync_status(&self, status: RoverSyncStatus) -> Result<(), UpstreamError>;
}

/// Everything one rover's control loop owns.
pub struct RoverCtx<B, D, C> {
    pub driver: Arc<D>,
    /// Absent in standalone mode; blocks are then logged, not sent.
    pub coordinator: Option<Arc<C>>,
    pub marker: TxMarker,
    /// Absent in standalone mode; settlement marks are then skipped.
    pub oracle: Option<Arc<dyn SettlementOracle>>,
    pub state: Arc<SyncState>,
    pub directives_rx: mpsc::Receiver<RoverDirective>,
    pub events_rx: mpsc::Receiver<RoverEvent<B>>,
}

impl<B, D, C> std::fmt::Debug for RoverCtx<B, D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoverCtx")
            .field("standalone", &self.coordinator.is_none())
            .finish_non_exhaustive()
    }
}

/// Runs one rover until its directive stream or io layer goes away.
///
/// Returns `Err` only for unrecoverable local conditions; the caller is
/// expected to exit the process then.
pub async fn rover_task<B, D, C>(
    mut tracker: RequestTracker,
    ctx: RoverCtx<B, D, C>,
) -> Result<(), DriverError>
where
    B: ForeignBlock + Send + Sync + 'static,
    B::Tx: Sync,
    D: ChainDriver,
    C: CoordinatorClient,
{
    let RoverCtx {
        driver,
        coordinator,
        marker,
        oracle,
        state,
        mut directives_rx,
        mut events_rx,
    } = ctx;

    let mut watchdog =
        tokio::time::interval(Duration::from_secs(constants::WATCHDOG_INTERVAL_SECS));
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_directive = directives_rx.recv() => {
                let Some(directive) = maybe_directive else {
                    info!(chain = %tracker.chain(), "directive stream closed, rover stopping");
                    return Ok(());
                };
                handle_directive(
                    directive,
                    &mut tracker,
                    &state,
                    driver.as_ref(),
                    coordinator.as_deref(),
                )
                .await?;
            }
            maybe_event = events_rx.recv() => {
                let Some(event) = maybe_event else {
                    info!(chain = %tracker.chain(), "io layer gone, rover stopping");
                    return Ok(());
                };
                handle_event(
                    event,
                    &mut tracker,
                    &state,
                    driver.as_ref(),
                    coordinator.as_deref(),
                    &marker,
                    oracle.as_deref(),
                )
                .await?;
            }
            _ = watchdog.tick() => {
                pump(&mut tracker, &state, driver.as_ref(), coordinator.as_deref()).await?;
            }
        }
    }
}

async fn handle_directive<C: CoordinatorClient>(
    directive: RoverDirective,
    tracker: &mut RequestTracker,
    state: &SyncState,
    driver: &dyn ChainDriver,
    coordinator: Option<&C>,
) -> Result<(), DriverError> {
    match directive {
        RoverDirective::RequestResync(data) => {
            handle_resync(data, tracker, state, driver, coordinator).await
        }
        RoverDirective::FetchBlock(data) => {
            handle_fetch_block(data, tracker, state, driver, coordinator).await
        }
    }
}

async fn handle_resync<C: CoordinatorClient>(
    data: ResyncData,
    tracker: &mut RequestTracker,
    state: &SyncState,
    driver: &dyn ChainDriver,
    coordinator: Option<&C>,
) -> Result<(), DriverError> {
    let tip = match driver.remote_tip().await {
        Ok(tip) => tip,
        Err(DriverError::Fatal(reason)) => return Err(DriverError::Fatal(reason)),
        Err(err) => {
            warn!(chain = %tracker.chain(), %err, "cannot resolve remote tip, resync failed");
            report_status(coordinator, tracker, false).await;
            return Ok(());
        }
    };

    let batches = plan_resync(&data, tip, now_ms(), tracker.chain());
    tracker.begin_session(batches);
    pump(tracker, state, driver, coordinator).await
}

async fn handle_fetch_block<C: CoordinatorClient>(
    data: FetchBlockData,
    tracker: &mut RequestTracker,
    state: &SyncState,
    driver: &dyn ChainDriver,
    coordinator: Option<&C>,
) -> Result<(), DriverError> {
    let from = data.previous_last.height + 1;
    let to = data.current_last.height;
    if to < from {
        debug!(chain = %tracker.chain(), from, to, "fetch-block covers nothing, ignored");
        return Ok(());
    }
    tracker.enqueue_gap(from, to);
    pump(tracker, state, driver, coordinator).await
}

async fn handle_event<B, C>(
    event: RoverEvent<B>,
    tracker: &mut RequestTracker,
    state: &SyncState,
    driver: &dyn ChainDriver,
    coordinator: Option<&C>,
    marker: &TxMarker,
    oracle: Option<&dyn SettlementOracle>,
) -> Result<(), DriverError>
where
    B: ForeignBlock + Send + 'static,
    C: CoordinatorClient,
{
    match event {
        RoverEvent::Block {
            block,
            from_initial_sync,
        } => {
            emit_block(&block, tracker, state, coordinator, marker, oracle).await;
            if from_initial_sync {
                // batch completion is only observable after a fetched block
                pump(tracker, state, driver, coordinator).await?;
            }
            Ok(())
        }
        RoverEvent::Gap { from, to } => {
            info!(chain = %tracker.chain(), from, to, "live gap detected");
            tracker.enqueue_gap(from, to);
            pump(tracker, state, driver, coordinator).await
        }
    }
}

async fn emit_block<B, C>(
    block: &B,
    tracker: &RequestTracker,
    state: &SyncState,
    coordinator: Option<&C>,
    marker: &TxMarker,
    oracle: Option<&dyn SettlementOracle>,
) where
    B: ForeignBlock,
    C: CoordinatorClient,
{
    let block_id = block.block_id();
    if state.knows_block(&block_id) {
        debug!(chain = %tracker.chain(), %block_id, "block already emitted, dropped");
        return;
    }

    let marked = mark_transactions(marker, oracle, block).await;
    let unified = build_unified(tracker.chain(), block, marked);
    if !unified.is_well_formed() {
        error!(chain = %tracker.chain(), %block_id, "unified block invariant broken, dropped");
        debug_assert!(unified.is_well_formed(), "unified block invariant broken");
        return;
    }

    match coordinator {
        Some(coordinator) => {
            if let Err(err) = coordinator.collect_block(unified).await {
                warn!(chain = %tracker.chain(), %block_id, %err, "collect failed, backing off");
                state.push_skip();
                return;
            }
        }
        None => {
            info!(
                chain = %tracker.chain(),
                height = unified.height,
                %block_id,
                marked = unified.transactions.len(),
                "collected block (standalone)"
            );
        }
    }

    state.check_and_note_block(&block_id);
}

async fn pump<C: CoordinatorClient>(
    tracker: &mut RequestTracker,
    state: &SyncState,
    driver: &dyn ChainDriver,
    coordinator: Option<&C>,
) -> Result<(), DriverError> {
    match tracker.pump(state, driver).await {
        PumpOutcome::SessionComplete => {
            report_status(coordinator, tracker, true).await;
            Ok(())
        }
        PumpOutcome::Fatal(reason) => Err(DriverError::Fatal(reason)),
        _ => Ok(()),
    }
}

async fn report_status<C: CoordinatorClient>(
    coordinator: Option<&C>,
    tracker: &RequestTracker,
    ok: bool,
) {
    let status = RoverSyncStatus {
        chain: tracker.chain(),
        ok,
    };
    match coordinator {
        Some(coordinator) => {
            // no retry here: a later resync emits a fresh status
            if let Err(err) = coordinator.report_sync_status(status).await {
                warn!(chain = %tracker.chain(), %err, "sync status report failed");
            }
        }
        None => info!(chain = %tracker.chain(), ok, "sync status (standalone)"),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
