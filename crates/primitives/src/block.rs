use serde::{Deserialize, Serialize};

use crate::chain::{ChainTag, TokenTag};

/// Canonical cross-chain block representation emitted upstream.
///
/// A rover translates every foreign block it accepts into this shape; the
/// parent coordinator never sees chain-native encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedBlock {
    /// Origin chain.
    pub chain: ChainTag,
    /// Chain-native block identifier, rendered as a string (hex for
    /// Ethereum, numeric id for Lisk).
    pub hash: String,
    /// Identifier of the parent block in the same rendering.
    pub previous_hash: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Block height on the foreign chain.
    pub height: u64,
    /// Chain-specific transaction digest, hex encoded.
    pub merkle_root: String,
    /// Transactions selected for cross-chain relevance, dense-indexed.
    pub transactions: Vec<MarkedTx>,
}

impl UnifiedBlock {
    /// A block is emittable once it carries a hash, a height and a real
    /// timestamp, and its marked transactions are indexed 0..n without gaps.
    pub fn is_well_formed(&self) -> bool {
        !self.hash.is_empty()
            && self.timestamp_ms > 0
            && self
                .transactions
                .iter()
                .enumerate()
                .all(|(i, tx)| tx.index as usize == i)
    }
}

/// A transaction selected by the marking policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedTx {
    /// Origin chain.
    pub chain: ChainTag,
    /// Asset classification ("emb" or the origin chain tag).
    pub token: TokenTag,
    /// Sender identity in chain-native rendering.
    pub from: String,
    /// Recipient identity in chain-native rendering.
    pub to: String,
    /// Transferred amount as big-endian bytes in chain-native units.
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
    /// Height of the containing block.
    pub block_height: u64,
    /// Position within the marked list, dense from 0.
    pub index: u32,
    /// Chain-native transaction identifier.
    pub tx_hash: String,
}

/// Lightweight reference to a block: enough to anchor resync decisions
/// without carrying the body around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub height: u64,
    pub hash: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl BlockRef {
    pub fn new(height: u64, hash: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            height,
            hash: hash.into(),
            timestamp_ms,
        }
    }
}
