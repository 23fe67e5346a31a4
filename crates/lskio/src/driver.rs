//! The lsk-side [`ChainDriver`]: offset/limit pagination plus a live tip
//! poll, feeding the shared control loop.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rover_primitives::{constants, BlockRef, ChainTag};
use rover_sync::{Batch, ChainDriver, DriverError, RoverEvent, SyncState};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, warn};

use crate::{
    block::{validate_block, LskBlockData},
    client::{LskApi, LskClientError, PAGE_LIMIT},
    types::LskBlock,
};

/// Pause between attempts at a failed batch fetch.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Pages batches out of the http api in the background; the control loop
/// sees the same event stream the eth peer sessions produce.
#[derive(Debug)]
pub struct LskDriver<A> {
    client: Arc<A>,
    state: Arc<SyncState>,
    rover_tx: mpsc::Sender<RoverEvent<LskBlockData>>,
}

impl<A: LskApi> LskDriver<A> {
    pub fn new(
        client: Arc<A>,
        state: Arc<SyncState>,
        rover_tx: mpsc::Sender<RoverEvent<LskBlockData>>,
    ) -> Self {
        Self {
            client,
            state,
            rover_tx,
        }
    }
}

#[async_trait]
impl<A: LskApi> ChainDriver for LskDriver<A> {
    fn chain(&self) -> ChainTag {
        ChainTag::Lsk
    }

    async fn remote_tip(&self) -> Result<u64, DriverError> {
        self.client
            .latest_block()
            .await
            .map(|block| block.height)
            .map_err(|err| DriverError::Unavailable(err.to_string()))
    }

    async fn dispatch_batch(&self, batch: Batch) -> Result<(), DriverError> {
        // paging can take a while; keep the control loop responsive
        tokio::spawn(fetch_batch(
            self.client.clone(),
            self.state.clone(),
            self.rover_tx.clone(),
            batch,
        ));
        Ok(())
    }
}

async fn fetch_batch<A: LskApi>(
    client: Arc<A>,
    state: Arc<SyncState>,
    rover_tx: mpsc::Sender<RoverEvent<LskBlockData>>,
    batch: Batch,
) {
    loop {
        match try_fetch_batch(&*client, &state, &rover_tx, batch).await {
            Ok(()) => return,
            Err(err) => {
                warn!(from = batch.from, to = batch.to, %err, "batch fetch failed, retrying");
                if rover_tx.is_closed() {
                    return;
                }
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
            }
        }
    }
}

async fn try_fetch_batch<A: LskApi>(
    client: &A,
    state: &SyncState,
    rover_tx: &mpsc::Sender<RoverEvent<LskBlockData>>,
    batch: Batch,
) -> Result<(), LskClientError> {
    let tip = client.latest_block().await?.height;
    let offset = tip.saturating_sub(batch.to);
    let blocks = client.blocks(batch.count().min(PAGE_LIMIT), offset).await?;
    if blocks.is_empty() {
        return Err(LskClientError::EmptyListing);
    }

    for block in blocks {
        if !batch.contains(block.height) {
            continue;
        }
        if emit_block(client, state, rover_tx, block, true).await.is_err() {
            // control loop gone, nothing left to fetch for
            return Ok(());
        }
    }
    Ok(())
}

/// Validates, decorates and forwards one block. A structurally broken
/// block is conclusively dropped: its height still completes so the batch
/// can finish.
async fn emit_block<A: LskApi>(
    client: &A,
    state: &SyncState,
    rover_tx: &mpsc::Sender<RoverEvent<LskBlockData>>,
    block: LskBlock,
    initial_sync_path: bool,
) -> Result<(), ()> {
    let height = block.height;
    if let Err(err) = validate_block(&block) {
        warn!(height, %err, "malformed block listing, dropped");
        state.complete_height(height);
        return Ok(());
    }

    let txs = if block.number_of_transactions > 0 {
        match client.transactions(&block.id).await {
            Ok(txs) => txs,
            Err(err) => {
                warn!(height, %err, "transaction listing failed, block dropped");
                state.complete_height(height);
                return Ok(());
            }
        }
    } else {
        vec![]
    };

    let from_initial_sync = initial_sync_path && state.complete_height(height);
    let data = LskBlockData::new(block, txs);
    rover_tx
        .send(RoverEvent::Block {
            block: data,
            from_initial_sync,
        })
        .await
        .map_err(|_| ())
}

/// Follows the live tip by polling at the chain's block interval.
///
/// Skip ticks queued by the control loop's upstream back-off are honored
/// here, one poll cycle per tick.
pub async fn lsk_poll_task<A: LskApi>(
    client: Arc<A>,
    state: Arc<SyncState>,
    rover_tx: mpsc::Sender<RoverEvent<LskBlockData>>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(constants::seconds_per_block(
        ChainTag::Lsk,
    )));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if rover_tx.is_closed() {
            debug!("control loop gone, poll task stopping");
            return;
        }
        if state.take_skip() {
            debug!("poll cycle skipped for upstream back-off");
            continue;
        }
        if let Err(err) = poll_once(&*client, &state, &rover_tx).await {
            warn!(%err, "tip poll failed");
        }
    }
}

async fn poll_once<A: LskApi>(
    client: &A,
    state: &SyncState,
    rover_tx: &mpsc::Sender<RoverEvent<LskBlockData>>,
) -> Result<(), LskClientError> {
    let latest = client.latest_block().await?;
    let best_height = state.best_seen().map(|best| best.height);

    if best_height.is_some_and(|best| latest.height <= best) {
        return Ok(());
    }
    if let Some(best) = best_height {
        if latest.height > best + 1 {
            debug!(best, tip = latest.height, "tip jumped, requesting fill");
            let _ = rover_tx
                .send(RoverEvent::Gap {
                    from: best + 1,
                    to: latest.height - 1,
                })
                .await;
        }
    }

    let height = latest.height;
    let id = latest.id.clone();
    let timestamp_ms = (constants::LSK_GENESIS_UNIX_SECONDS + latest.timestamp) * 1000;
    if emit_block(client, state, rover_tx, latest, false).await.is_ok() {
        state.observe_best(BlockRef::new(height, id, timestamp_ms));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::time::timeout;

    use super::*;
    use crate::block::test_utils::{make_block, make_tx};
    use crate::types::LskTransaction;

    /// Canned chain serving the listing endpoints from memory.
    struct StubApi {
        chain: Vec<LskBlock>,
        txs: HashMap<String, Vec<LskTransaction>>,
        tip: std::sync::atomic::AtomicU64,
    }

    impl StubApi {
        fn with_heights(heights: std::ops::RangeInclusive<u64>) -> Self {
            let chain: Vec<LskBlock> = heights.map(make_block).collect();
            let tip = chain.last().map(|b| b.height).unwrap_or(0);
            Self {
                chain,
                txs: HashMap::new(),
                tip: std::sync::atomic::AtomicU64::new(tip),
            }
        }

        fn set_tip(&self, height: u64) {
            self.tip.store(height, std::sync::atomic::Ordering::Relaxed);
        }

        fn visible(&self) -> Vec<LskBlock> {
            let tip = self.tip.load(std::sync::atomic::Ordering::Relaxed);
            self.chain
                .iter()
                .filter(|block| block.height <= tip)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl LskApi for StubApi {
        async fn latest_block(&self) -> Result<LskBlock, LskClientError> {
            self.visible()
                .last()
                .cloned()
                .ok_or(LskClientError::EmptyListing)
        }

        async fn blocks(&self, limit: u64, offset: u64) -> Result<Vec<LskBlock>, LskClientError> {
            let mut listing = self.visible();
            listing.reverse(); // newest first
            Ok(listing
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }

        async fn transactions(
            &self,
            block_id: &str,
        ) -> Result<Vec<LskTransaction>, LskClientError> {
            Ok(self.txs.get(block_id).cloned().unwrap_or_default())
        }
    }

    fn harness(
        api: StubApi,
    ) -> (
        Arc<StubApi>,
        Arc<SyncState>,
        LskDriver<StubApi>,
        mpsc::Receiver<RoverEvent<LskBlockData>>,
    ) {
        let client = Arc::new(api);
        let state = Arc::new(SyncState::new(ChainTag::Lsk));
        let (rover_tx, rover_rx) = mpsc::channel(512);
        let driver = LskDriver::new(client.clone(), state.clone(), rover_tx);
        (client, state, driver, rover_rx)
    }

    #[tokio::test]
    async fn remote_tip_reads_latest_listing() {
        let (_client, _state, driver, _rx) = harness(StubApi::with_heights(1..=300));
        assert_eq!(driver.remote_tip().await.unwrap(), 300);
    }

    #[tokio::test]
    async fn batch_fetch_completes_every_height() {
        let (_client, state, driver, mut rover_rx) = harness(StubApi::with_heights(1..=300));

        let batch = Batch::new(100, 150);
        state.request_batch(&batch);
        driver.dispatch_batch(batch).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..51 {
            match timeout(Duration::from_secs(5), rover_rx.recv()).await {
                Ok(Some(RoverEvent::Block {
                    block,
                    from_initial_sync,
                })) => {
                    assert!(from_initial_sync);
                    seen.push(block.raw().height);
                }
                other => panic!("expected block, got {other:?}"),
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (100..=150).collect::<Vec<_>>());
        assert!(state.is_drained());
    }

    #[tokio::test]
    async fn batch_attaches_transactions() {
        let mut api = StubApi::with_heights(1..=20);
        let target = api.chain[9].clone(); // height 10
        api.chain[9].number_of_transactions = 1;
        api.txs
            .insert(target.id.clone(), vec![make_tx("t1", 0, "k1")]);

        let (_client, state, driver, mut rover_rx) = harness(api);
        let batch = Batch::new(10, 10);
        state.request_batch(&batch);
        driver.dispatch_batch(batch).await.unwrap();

        match timeout(Duration::from_secs(5), rover_rx.recv()).await {
            Ok(Some(RoverEvent::Block { block, .. })) => {
                use rover_unify::ForeignBlock;
                assert_eq!(block.raw().height, 10);
                assert_eq!(block.transactions().len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_reports_gap_then_tip() {
        let (client, state, _driver, mut rover_rx) = {
            let api = StubApi::with_heights(1..=105);
            api.set_tip(100);
            harness(api)
        };
        state.observe_best(BlockRef::new(100, "seen", 1_000));

        tokio::spawn(lsk_poll_task(
            client.clone(),
            state.clone(),
            poll_sender(&_driver),
        ));

        client.set_tip(105);
        match timeout(Duration::from_secs(60), rover_rx.recv()).await {
            Ok(Some(RoverEvent::Gap { from, to })) => assert_eq!((from, to), (101, 104)),
            other => panic!("expected gap, got {other:?}"),
        }
        match timeout(Duration::from_secs(60), rover_rx.recv()).await {
            Ok(Some(RoverEvent::Block {
                block,
                from_initial_sync,
            })) => {
                assert_eq!(block.raw().height, 105);
                assert!(!from_initial_sync);
            }
            other => panic!("expected block, got {other:?}"),
        }
        assert_eq!(state.best_seen().unwrap().height, 105);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_tick_suppresses_one_poll_cycle() {
        let (client, state, _driver, mut rover_rx) = {
            let api = StubApi::with_heights(1..=101);
            api.set_tip(100);
            harness(api)
        };
        state.observe_best(BlockRef::new(100, "seen", 1_000));
        state.push_skip();

        tokio::spawn(lsk_poll_task(
            client.clone(),
            state.clone(),
            poll_sender(&_driver),
        ));
        client.set_tip(101);

        // the first cycle is consumed by the skip; the tip still arrives on
        // the next one
        match timeout(Duration::from_secs(60), rover_rx.recv()).await {
            Ok(Some(RoverEvent::Block { block, .. })) => assert_eq!(block.raw().height, 101),
            other => panic!("expected block, got {other:?}"),
        }
        assert!(!state.take_skip());
    }

    fn poll_sender(driver: &LskDriver<StubApi>) -> mpsc::Sender<RoverEvent<LskBlockData>> {
        driver.rover_tx.clone()
    }
}
