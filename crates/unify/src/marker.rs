use async_trait::async_trait;
use rover_primitives::{ChainTag, MarkedTx, TokenTag};
use thiserror::Error;
use tracing::warn;

use crate::traits::{ForeignBlock, ForeignTx};

/// Failures from the settlement lookup. All of them degrade to "not in a
/// window"; none may stall block translation.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("settlement lookup transport: {0}")]
    Transport(String),
}

/// Client interface for the parent's settlement-window service.
#[async_trait]
pub trait SettlementOracle: Send + Sync {
    /// Whether the (from, to) pair is currently inside a settlement window
    /// on the given chain.
    async fn is_before_settle_height(
        &self,
        from: String,
        to: String,
        chain: ChainTag,
    ) -> Result<bool, OracleError>;
}

/// Per-chain marking policy.
#[derive(Debug, Clone)]
pub struct TxMarker {
    chain: ChainTag,
    designated_wallet: Option<String>,
}

impl TxMarker {
    pub fn new(chain: ChainTag, designated_wallet: Option<String>) -> Self {
        Self {
            chain,
            designated_wallet,
        }
    }

    pub fn chain(&self) -> ChainTag {
        self.chain
    }

    /// Classifies one transaction. The designated-asset rule wins over the
    /// settlement window when both apply.
    async fn classify<T: ForeignTx>(
        &self,
        tx: &T,
        oracle: Option<&dyn SettlementOracle>,
    ) -> Option<TokenTag> {
        if self.is_designated_transfer(tx) {
            return Some(TokenTag::Emb);
        }

        let recipient = tx.recipient()?;
        let oracle = oracle?;
        match oracle
            .is_before_settle_height(tx.sender(), recipient, self.chain)
            .await
        {
            Ok(true) => Some(TokenTag::Chain(self.chain)),
            Ok(false) => None,
            Err(error) => {
                warn!(%error, tx_id = %tx.tx_id(), "settlement lookup failed, tx not marked");
                None
            }
        }
    }

    fn is_designated_transfer<T: ForeignTx>(&self, tx: &T) -> bool {
        let Some(designated) = &self.designated_wallet else {
            return false;
        };
        tx.is_value_transfer() && tx.sender_key().as_deref() == Some(designated.as_str())
    }
}

/// Runs the marking policy over a block's transactions in block order,
/// assigning dense indices starting at 0.
///
/// `oracle` is `None` in standalone mode; only designated-asset marks are
/// produced then.
pub async fn mark_transactions<B: ForeignBlock>(
    marker: &TxMarker,
    oracle: Option<&dyn SettlementOracle>,
    block: &B,
) -> Vec<MarkedTx> {
    let mut marked = Vec::new();
    for tx in block.transactions() {
        let Some(token) = marker.classify(tx, oracle).await else {
            continue;
        };
        marked.push(MarkedTx {
            chain: marker.chain,
            token,
            from: tx.sender(),
            to: tx.recipient().unwrap_or_default(),
            value: tx.value_bytes(),
            block_height: block.height(),
            index: marked.len() as u32,
            tx_hash: tx.tx_id(),
        });
    }
    marked
}
