//! REST api shapes of the Lisk node.

use serde::Deserialize;

/// A block as listed by `GET /api/blocks`.
///
/// Transactions are not embedded; the driver fills them in from the
/// transactions endpoint when the block carries any.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LskBlock {
    pub id: String,
    pub height: u64,
    #[serde(default)]
    pub previous_block: String,
    /// Seconds since the Lisk genesis instant.
    pub timestamp: u64,
    #[serde(default)]
    pub number_of_transactions: u32,
    #[serde(default)]
    pub payload_hash: String,
    #[serde(default)]
    pub payload_length: u64,
    #[serde(default)]
    pub generator_public_key: String,
    #[serde(default)]
    pub block_signature: String,
}

/// A transaction as returned by `GET /api/transactions?blockId=`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LskTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: u8,
    /// Beddows, as a decimal string.
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_public_key: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_listing_deserializes() {
        let raw = r#"{
            "id": "6524861224470851795",
            "height": 7217145,
            "previousBlock": "1349213844499460766",
            "timestamp": 72716170,
            "numberOfTransactions": 2,
            "payloadHash": "1a871a9ef9bc23f3f0f8b4b6fbbe1246c0f542b1b7b2a171b4e6a4ab3f04b1cd",
            "payloadLength": 234,
            "generatorPublicKey": "01389197bbaf1afb0acd47bbfeabb34aca80fb372a8f694a1c0716b3398db746",
            "blockSignature": "a3733254aad600fa787d6223002278c3400be5e8ed4763ae27f9a15b80e20c22"
        }"#;
        let block: LskBlock = serde_json::from_str(raw).unwrap();
        assert_eq!(block.height, 7_217_145);
        assert_eq!(block.number_of_transactions, 2);
        assert_eq!(block.previous_block, "1349213844499460766");
    }

    #[test]
    fn transaction_deserializes() {
        let raw = r#"{
            "id": "7557698655865866098",
            "type": 0,
            "amount": "110000000",
            "senderId": "3193243468262692513L",
            "senderPublicKey": "5059876081639179984b4a4d3a2b5b7a1e2b4a4e1f2f3b4c5d6e7f8091a2b3c4",
            "recipientId": "16313739661670634666L"
        }"#;
        let tx: LskTransaction = serde_json::from_str(raw).unwrap();
        assert_eq!(tx.tx_type, 0);
        assert_eq!(tx.amount, "110000000");
        assert_eq!(tx.recipient_id.as_deref(), Some("16313739661670634666L"));
    }

    #[test]
    fn missing_optionals_default() {
        let raw = r#"{"id": "1", "height": 5, "timestamp": 10, "type": 0}"#;
        let block: LskBlock = serde_json::from_str(raw).unwrap();
        assert!(block.block_signature.is_empty());

        let tx: LskTransaction = serde_json::from_str(raw).unwrap();
        assert!(tx.recipient_id.is_none());
    }
}
