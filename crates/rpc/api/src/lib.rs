//! RPC surface between a rover and its parent coordinator.
//!
//! The parent serves this api; rovers consume it through the generated
//! client (enable the `client` feature). `join` is the directive stream,
//! the unary methods flow block data and status back up.

mod types;

use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use rover_primitives::{ChainTag, UnifiedBlock};

pub use crate::types::{
    FetchBlockData, ResyncData, ResyncInterval, RoverDirective, RoverIdent, RoverSyncStatus,
};

#[cfg_attr(not(feature = "client"), rpc(server, namespace = "rover"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "rover"))]
pub trait RoverApi {
    /// Delivers one validated unified block to the coordinator.
    #[method(name = "collectBlock")]
    async fn collect_block(&self, block: UnifiedBlock) -> RpcResult<()>;

    /// Reports the terminal outcome of one resync session.
    #[method(name = "reportSyncStatus")]
    async fn report_sync_status(&self, status: RoverSyncStatus) -> RpcResult<()>;

    /// Asks whether a counterparty pair is inside a settlement window.
    #[method(name = "isBeforeSettleHeight")]
    async fn is_before_settle_height(
        &self,
        from_addr: String,
        to_addr: String,
        chain: ChainTag,
    ) -> RpcResult<bool>;

    /// Attaches a rover to the coordinator's directive stream.
    #[subscription(name = "join", unsubscribe = "leave", item = RoverDirective)]
    async fn join(&self, ident: RoverIdent) -> jsonrpsee::core::SubscriptionResult;
}
