//! Lisk blocks in the shape the shared translation layer expects.

use blake2::{digest::consts::U32, Blake2b, Digest};
use rover_primitives::constants::LSK_GENESIS_UNIX_SECONDS;
use rover_unify::{ForeignBlock, ForeignTx};
use thiserror::Error;

use crate::types::{LskBlock, LskTransaction};

type Blake2b256 = Blake2b<U32>;

/// Structural defects in a listed block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LskBlockError {
    #[error("block without id")]
    MissingId,
    #[error("block {0} without signature")]
    MissingSignature(String),
    #[error("block {0} without generator key")]
    MissingGenerator(String),
}

/// Structural checks on a listed block. The http api gives us no cheap way
/// to re-verify the payload hash, so this guards the fields the digest
/// chain and translation depend on.
pub fn validate_block(block: &LskBlock) -> Result<(), LskBlockError> {
    if block.id.is_empty() {
        return Err(LskBlockError::MissingId);
    }
    if block.block_signature.is_empty() {
        return Err(LskBlockError::MissingSignature(block.id.clone()));
    }
    if block.generator_public_key.is_empty() {
        return Err(LskBlockError::MissingGenerator(block.id.clone()));
    }
    Ok(())
}

fn blake2b_hex(data: &[u8]) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The transaction digest carried in the unified block.
///
/// An empty block digests its signature; otherwise the transaction ids are
/// left-folded as `acc := blake2b(acc || id)` starting from the empty
/// string, with `acc` kept in hex between rounds.
pub fn lsk_merkle_root(block: &LskBlock, txs: &[LskTransaction]) -> String {
    if txs.is_empty() {
        return blake2b_hex(block.block_signature.as_bytes());
    }
    let mut acc = String::new();
    for tx in txs {
        acc = blake2b_hex(format!("{acc}{}", tx.id).as_bytes());
    }
    acc
}

/// A validated block with its transactions attached.
#[derive(Debug, Clone)]
pub struct LskBlockData {
    block: LskBlock,
    merkle_root: String,
    txs: Vec<LskTransaction>,
}

impl LskBlockData {
    pub fn new(block: LskBlock, txs: Vec<LskTransaction>) -> Self {
        let merkle_root = lsk_merkle_root(&block, &txs);
        Self {
            block,
            merkle_root,
            txs,
        }
    }

    pub fn raw(&self) -> &LskBlock {
        &self.block
    }
}

impl ForeignTx for LskTransaction {
    fn tx_id(&self) -> String {
        self.id.clone()
    }

    fn sender(&self) -> String {
        self.sender_id.clone()
    }

    fn sender_key(&self) -> Option<String> {
        (!self.sender_public_key.is_empty()).then(|| self.sender_public_key.clone())
    }

    fn recipient(&self) -> Option<String> {
        self.recipient_id.clone().filter(|id| !id.is_empty())
    }

    fn value_bytes(&self) -> Vec<u8> {
        let amount: u128 = self.amount.parse().unwrap_or(0);
        let raw = amount.to_be_bytes();
        let first = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
        raw[first..].to_vec()
    }

    fn is_value_transfer(&self) -> bool {
        self.tx_type == 0
    }
}

impl ForeignBlock for LskBlockData {
    type Tx = LskTransaction;

    fn height(&self) -> u64 {
        self.block.height
    }

    fn block_id(&self) -> String {
        self.block.id.clone()
    }

    fn parent_id(&self) -> String {
        self.block.previous_block.clone()
    }

    fn timestamp_ms(&self) -> u64 {
        (LSK_GENESIS_UNIX_SECONDS + self.block.timestamp) * 1000
    }

    fn merkle_root(&self) -> String {
        self.merkle_root.clone()
    }

    fn transactions(&self) -> &[LskTransaction] {
        &self.txs
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    pub(crate) fn make_block(height: u64) -> LskBlock {
        LskBlock {
            id: format!("90000000000000{height}"),
            height,
            previous_block: format!("90000000000000{}", height.saturating_sub(1)),
            timestamp: height * 10,
            number_of_transactions: 0,
            payload_hash: "00".repeat(32),
            payload_length: 0,
            generator_public_key: "aa".repeat(32),
            block_signature: "bb".repeat(32),
        }
    }

    pub(crate) fn make_tx(id: &str, tx_type: u8, sender_key: &str) -> LskTransaction {
        LskTransaction {
            id: id.to_string(),
            tx_type,
            amount: "110000000".to_string(),
            sender_id: "3193243468262692513L".to_string(),
            sender_public_key: sender_key.to_string(),
            recipient_id: Some("16313739661670634666L".to_string()),
        }
    }
}
