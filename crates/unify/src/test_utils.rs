//! In-memory fakes of the foreign-chain traits for tests.

use crate::traits::{ForeignBlock, ForeignTx};

#[derive(Debug, Clone)]
pub struct FakeTx {
    pub id: String,
    pub sender: String,
    pub sender_key: String,
    pub recipient: Option<String>,
    pub value: Vec<u8>,
    pub transfer: bool,
}

impl ForeignTx for FakeTx {
    fn tx_id(&self) -> String {
        self.id.clone()
    }

    fn sender(&self) -> String {
        self.sender.clone()
    }

    fn sender_key(&self) -> Option<String> {
        Some(self.sender_key.clone())
    }

    fn recipient(&self) -> Option<String> {
        self.recipient.clone()
    }

    fn value_bytes(&self) -> Vec<u8> {
        self.value.clone()
    }

    fn is_value_transfer(&self) -> bool {
        self.transfer
    }
}

#[derive(Debug, Clone)]
pub struct FakeBlock {
    pub height: u64,
    pub id: String,
    pub parent: String,
    pub timestamp_ms: u64,
    pub merkle_root: String,
    pub txs: Vec<FakeTx>,
}

impl ForeignBlock for FakeBlock {
    type Tx = FakeTx;

    fn height(&self) -> u64 {
        self.height
    }

    fn block_id(&self) -> String {
        self.id.clone()
    }

    fn parent_id(&self) -> String {
        self.parent.clone()
    }

    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    fn merkle_root(&self) -> String {
        self.merkle_root.clone()
    }

    fn transactions(&self) -> &[FakeTx] {
        &self.txs
    }
}

/// A transfer-shaped fake tx whose `sender_key` doubles as the designated
/// wallet hook for marker tests.
pub fn make_tx(id: &str, sender_key: &str, transfer: bool) -> FakeTx {
    FakeTx {
        id: id.to_string(),
        sender: format!("addr-of-{sender_key}"),
        sender_key: sender_key.to_string(),
        recipient: Some("recipient".to_string()),
        value: vec![0x0f, 0x42, 0x40],
        transfer,
    }
}

pub fn make_block(height: u64, txs: Vec<FakeTx>) -> FakeBlock {
    FakeBlock {
        height,
        id: format!("block-{height}"),
        parent: format!("block-{}", height.saturating_sub(1)),
        timestamp_ms: 1_600_000_000_000 + height * 1000,
        merkle_root: "aa".repeat(32),
        txs,
    }
}
