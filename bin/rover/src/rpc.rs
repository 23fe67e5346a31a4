//! Parent coordinator plumbing over the jsonrpsee ws client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use rover_primitives::{ChainTag, UnifiedBlock};
use rover_rpc_api::{RoverApiClient, RoverDirective, RoverIdent, RoverSyncStatus};
use rover_sync::{CoordinatorClient, UpstreamError};
use rover_unify::{OracleError, SettlementOracle};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Pause before rejoining a dropped directive stream.
const REJOIN_DELAY: Duration = Duration::from_secs(10);

/// One ws connection to the parent, serving both the coordinator calls and
/// the settlement lookups.
#[derive(Debug)]
pub(crate) struct ParentCoordinator {
    client: WsClient,
}

impl ParentCoordinator {
    pub(crate) async fn connect(url: &str) -> anyhow::Result<Arc<Self>> {
        let client = WsClientBuilder::default().build(url).await?;
        info!(url, "connected to parent coordinator");
        Ok(Arc::new(Self { client }))
    }
}

#[async_trait]
impl CoordinatorClient for ParentCoordinator {
    async fn collect_block(&self, block: UnifiedBlock) -> Result<(), UpstreamError> {
        self.client
            .collect_block(block)
            .await
            .map_err(|err| UpstreamError::Rpc(err.to_string()))
    }

    async fn report_sync_status(&self, status: RoverSyncStatus) -> Result<(), UpstreamError> {
        self.client
            .report_sync_status(status)
            .await
            .map_err(|err| UpstreamError::Rpc(err.to_string()))
    }
}

#[async_trait]
impl SettlementOracle for ParentCoordinator {
    async fn is_before_settle_height(
        &self,
        from: String,
        to: String,
        chain: ChainTag,
    ) -> Result<bool, OracleError> {
        self.client
            .is_before_settle_height(from, to, chain)
            .await
            .map_err(|err| OracleError::Transport(err.to_string()))
    }
}

/// Pumps the parent's `join` stream into the rover's directive channel,
/// rejoining whenever the subscription drops.
pub(crate) async fn directive_stream_task(
    parent: Arc<ParentCoordinator>,
    chain: ChainTag,
    directives_tx: mpsc::Sender<RoverDirective>,
) {
    loop {
        let mut subscription = match parent.client.join(RoverIdent { chain }).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(%err, "cannot join directive stream, retrying");
                tokio::time::sleep(REJOIN_DELAY).await;
                continue;
            }
        };
        info!(%chain, "joined parent directive stream");

        while let Some(item) = subscription.next().await {
            match item {
                Ok(directive) => {
                    if directives_tx.send(directive).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    // unknown or malformed directives are dropped, the
                    // stream itself stays up
                    warn!(%err, "undecodable directive, ignored");
                }
            }
        }
        warn!(%chain, "directive stream ended, rejoining");
        tokio::time::sleep(REJOIN_DELAY).await;
    }
}
