//! Validated eth blocks in the shape the shared translation layer expects.

use alloy_primitives::{Address, TxKind, B256};
use rover_unify::{ForeignBlock, ForeignTx};

use crate::types::{Block, TransactionSigned};

fn hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// One transaction with its recovered sender.
#[derive(Debug, Clone)]
pub struct EthTxData {
    tx: TransactionSigned,
    hash: B256,
    sender: Address,
}

impl EthTxData {
    pub fn sender_address(&self) -> Address {
        self.sender
    }
}

impl ForeignTx for EthTxData {
    fn tx_id(&self) -> String {
        hex_bytes(self.hash.as_slice())
    }

    fn sender(&self) -> String {
        hex_bytes(self.sender.as_slice())
    }

    fn sender_key(&self) -> Option<String> {
        Some(self.sender())
    }

    fn recipient(&self) -> Option<String> {
        match self.tx.to {
            TxKind::Call(address) => Some(hex_bytes(address.as_slice())),
            TxKind::Create => None,
        }
    }

    fn value_bytes(&self) -> Vec<u8> {
        let raw = self.tx.value.to_be_bytes::<32>();
        let first = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
        raw[first..].to_vec()
    }

    fn is_value_transfer(&self) -> bool {
        matches!(self.tx.to, TxKind::Call(_))
    }
}

/// A validated block plus everything derived during validation.
#[derive(Debug, Clone)]
pub struct EthBlockData {
    hash: B256,
    parent_hash: B256,
    number: u64,
    timestamp: u64,
    transactions_root: B256,
    txs: Vec<EthTxData>,
}

impl EthBlockData {
    /// Packages a block after [`crate::validate_block`] succeeded;
    /// `senders` is that call's output, in transaction order.
    pub fn new(block: Block, senders: Vec<Address>) -> Self {
        debug_assert_eq!(block.transactions.len(), senders.len());
        let hash = block.hash();
        let txs = block
            .transactions
            .into_iter()
            .zip(senders)
            .map(|(tx, sender)| EthTxData {
                hash: tx.hash(),
                tx,
                sender,
            })
            .collect();
        Self {
            hash,
            parent_hash: block.header.parent_hash,
            number: block.header.number,
            timestamp: block.header.timestamp,
            transactions_root: block.header.transactions_root,
            txs,
        }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }
}

impl ForeignBlock for EthBlockData {
    type Tx = EthTxData;

    fn height(&self) -> u64 {
        self.number
    }

    fn block_id(&self) -> String {
        hex_bytes(self.hash.as_slice())
    }

    fn parent_id(&self) -> String {
        hex_bytes(self.parent_hash.as_slice())
    }

    fn timestamp_ms(&self) -> u64 {
        self.timestamp * 1000
    }

    fn merkle_root(&self) -> String {
        hex_bytes(self.transactions_root.as_slice())
    }

    fn transactions(&self) -> &[EthTxData] {
        &self.txs
    }
}
