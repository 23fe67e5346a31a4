//! The eth-side [`ChainDriver`]: batch fan-out over the peer pool.

use std::sync::Arc;

use async_trait::async_trait;
use rover_primitives::ChainTag;
use rover_sync::{Batch, ChainDriver, DriverError, SyncState};
use tracing::{debug, warn};

use crate::{
    pool::PoolHandle,
    wire::{EthMessage, GetBlockHeaders, HashOrNumber},
};

/// Fans batch requests out to verified peers; blocks flow back through the
/// sessions' event channel.
#[derive(Debug, Clone)]
pub struct EthDriver {
    pool: PoolHandle,
    state: Arc<SyncState>,
}

impl EthDriver {
    pub fn new(pool: PoolHandle, state: Arc<SyncState>) -> Self {
        Self { pool, state }
    }
}

#[async_trait]
impl ChainDriver for EthDriver {
    fn chain(&self) -> ChainTag {
        ChainTag::Eth
    }

    async fn remote_tip(&self) -> Result<u64, DriverError> {
        self.state
            .best_seen()
            .map(|best| best.height)
            .ok_or_else(|| DriverError::Unavailable("no live tip observed yet".to_string()))
    }

    async fn dispatch_batch(&self, batch: Batch) -> Result<(), DriverError> {
        let peers = self.pool.select_request_peers()?;
        let request = EthMessage::GetBlockHeaders(GetBlockHeaders {
            start: HashOrNumber::Number(batch.from),
            max_headers: batch.count(),
            skip: 0,
            reverse: 0,
        });

        let chosen = peers.len();
        for (peer, outbound) in peers {
            if outbound.send(request.clone()).await.is_err() {
                // session went away between selection and send
                warn!(%peer, "request fan-out hit a dead session");
                continue;
            }
            debug!(%peer, from = batch.from, to = batch.to, "batch requested");
        }
        debug!(chosen, from = batch.from, to = batch.to, "batch fan-out done");
        Ok(())
    }
}
