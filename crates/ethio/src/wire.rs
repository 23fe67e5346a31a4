//! The eth subprotocol message set (versions 62 and 63), as a tagged
//! variant with exhaustive dispatch.

use alloy_primitives::{Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};

use crate::{
    errors::WireError,
    types::{Block, BlockBody, Header, TransactionSigned},
};

/// Message ids within the eth capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EthMessageId {
    Status = 0x00,
    NewBlockHashes = 0x01,
    Transactions = 0x02,
    GetBlockHeaders = 0x03,
    BlockHeaders = 0x04,
    GetBlockBodies = 0x05,
    BlockBodies = 0x06,
    NewBlock = 0x07,
    GetNodeData = 0x0d,
    NodeData = 0x0e,
    GetReceipts = 0x0f,
    Receipts = 0x10,
}

impl TryFrom<u8> for EthMessageId {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::Status,
            0x01 => Self::NewBlockHashes,
            0x02 => Self::Transactions,
            0x03 => Self::GetBlockHeaders,
            0x04 => Self::BlockHeaders,
            0x05 => Self::GetBlockBodies,
            0x06 => Self::BlockBodies,
            0x07 => Self::NewBlock,
            0x0d => Self::GetNodeData,
            0x0e => Self::NodeData,
            0x0f => Self::GetReceipts,
            0x10 => Self::Receipts,
            other => return Err(WireError::UnknownMessageId(other)),
        })
    }
}

/// The eth status handshake payload.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Status {
    pub protocol_version: u8,
    pub network_id: u64,
    pub total_difficulty: U256,
    pub best_hash: B256,
    pub genesis_hash: B256,
}

/// One entry of a `NewBlockHashes` announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockHashNumber {
    pub hash: B256,
    pub number: u64,
}

/// Start marker of a header request: either a concrete hash or a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOrNumber {
    Hash(B256),
    Number(u64),
}

impl Encodable for HashOrNumber {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        match self {
            HashOrNumber::Hash(hash) => hash.encode(out),
            HashOrNumber::Number(number) => number.encode(out),
        }
    }

    fn length(&self) -> usize {
        match self {
            HashOrNumber::Hash(hash) => hash.length(),
            HashOrNumber::Number(number) => number.length(),
        }
    }
}

impl Decodable for HashOrNumber {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        // a 32-byte string is a hash, anything shorter is a scalar
        let mut peek = *buf;
        let header = alloy_rlp::Header::decode(&mut peek)?;
        if !header.list && header.payload_length == 32 {
            Ok(HashOrNumber::Hash(B256::decode(buf)?))
        } else {
            Ok(HashOrNumber::Number(u64::decode(buf)?))
        }
    }
}

/// A `GetBlockHeaders` request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct GetBlockHeaders {
    pub start: HashOrNumber,
    pub max_headers: u64,
    pub skip: u64,
    pub reverse: u8,
}

impl GetBlockHeaders {
    /// Single-header probe at a hash or height.
    pub fn probe(start: HashOrNumber) -> Self {
        Self {
            start,
            max_headers: 1,
            skip: 0,
            reverse: 0,
        }
    }
}

/// A `NewBlock` announcement body.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct NewBlockPayload {
    pub block: Block,
    pub total_difficulty: U256,
}

/// Every message this client understands, by wire id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EthMessage {
    Status(Status),
    NewBlockHashes(Vec<BlockHashNumber>),
    Transactions(Vec<TransactionSigned>),
    GetBlockHeaders(GetBlockHeaders),
    BlockHeaders(Vec<Header>),
    GetBlockBodies(Vec<B256>),
    BlockBodies(Vec<BlockBody>),
    NewBlock(Box<NewBlockPayload>),
    GetNodeData(Vec<B256>),
    NodeData(Vec<Bytes>),
    GetReceipts(Vec<B256>),
    /// Receipt payloads are never interpreted; kept raw.
    Receipts(Bytes),
}

impl EthMessage {
    pub fn id(&self) -> EthMessageId {
        match self {
            EthMessage::Status(_) => EthMessageId::Status,
            EthMessage::NewBlockHashes(_) => EthMessageId::NewBlockHashes,
            EthMessage::Transactions(_) => EthMessageId::Transactions,
            EthMessage::GetBlockHeaders(_) => EthMessageId::GetBlockHeaders,
            EthMessage::BlockHeaders(_) => EthMessageId::BlockHeaders,
            EthMessage::GetBlockBodies(_) => EthMessageId::GetBlockBodies,
            EthMessage::BlockBodies(_) => EthMessageId::BlockBodies,
            EthMessage::NewBlock(_) => EthMessageId::NewBlock,
            EthMessage::GetNodeData(_) => EthMessageId::GetNodeData,
            EthMessage::NodeData(_) => EthMessageId::NodeData,
            EthMessage::GetReceipts(_) => EthMessageId::GetReceipts,
            EthMessage::Receipts(_) => EthMessageId::Receipts,
        }
    }

    /// An empty receipts reply.
    pub fn empty_receipts() -> Self {
        EthMessage::Receipts(Bytes::from_static(&[alloy_rlp::EMPTY_LIST_CODE]))
    }

    /// Encodes the message body (without the id).
    pub fn encode_payload(&self) -> Bytes {
        let mut out = Vec::new();
        match self {
            EthMessage::Status(status) => status.encode(&mut out),
            EthMessage::NewBlockHashes(hashes) => hashes.encode(&mut out),
            EthMessage::Transactions(txs) => txs.encode(&mut out),
            EthMessage::GetBlockHeaders(request) => request.encode(&mut out),
            EthMessage::BlockHeaders(headers) => headers.encode(&mut out),
            EthMessage::GetBlockBodies(hashes) => hashes.encode(&mut out),
            EthMessage::BlockBodies(bodies) => bodies.encode(&mut out),
            EthMessage::NewBlock(payload) => payload.encode(&mut out),
            EthMessage::GetNodeData(hashes) => hashes.encode(&mut out),
            EthMessage::NodeData(items) => items.encode(&mut out),
            EthMessage::GetReceipts(hashes) => hashes.encode(&mut out),
            EthMessage::Receipts(raw) => out.extend_from_slice(raw),
        }
        Bytes::from(out)
    }

    /// Decodes a message body for a known id.
    pub fn decode(id: EthMessageId, mut payload: &[u8]) -> Result<Self, WireError> {
        let buf = &mut payload;
        Ok(match id {
            EthMessageId::Status => EthMessage::Status(Status::decode(buf)?),
            EthMessageId::NewBlockHashes => EthMessage::NewBlockHashes(Vec::decode(buf)?),
            EthMessageId::Transactions => EthMessage::Transactions(Vec::decode(buf)?),
            EthMessageId::GetBlockHeaders => {
                EthMessage::GetBlockHeaders(GetBlockHeaders::decode(buf)?)
            }
            EthMessageId::BlockHeaders => EthMessage::BlockHeaders(Vec::decode(buf)?),
            EthMessageId::GetBlockBodies => EthMessage::GetBlockBodies(Vec::decode(buf)?),
            EthMessageId::BlockBodies => EthMessage::BlockBodies(Vec::decode(buf)?),
            EthMessageId::NewBlock => EthMessage::NewBlock(Box::new(NewBlockPayload::decode(buf)?)),
            EthMessageId::GetNodeData => EthMessage::GetNodeData(Vec::decode(buf)?),
            EthMessageId::NodeData => EthMessage::NodeData(Vec::decode(buf)?),
            EthMessageId::GetReceipts => EthMessage::GetReceipts(Vec::decode(buf)?),
            EthMessageId::Receipts => EthMessage::Receipts(Bytes::copy_from_slice(payload)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: EthMessage) {
        let id = message.id();
        let payload = message.encode_payload();
        let decoded = EthMessage::decode(id, &payload).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn status_roundtrip() {
        roundtrip(EthMessage::Status(Status {
            protocol_version: 63,
            network_id: 1,
            total_difficulty: U256::from(17_179_869_184u64),
            best_hash: B256::repeat_byte(0xaa),
            genesis_hash: B256::repeat_byte(0xbb),
        }));
    }

    #[test]
    fn get_block_headers_by_number_roundtrip() {
        roundtrip(EthMessage::GetBlockHeaders(GetBlockHeaders {
            start: HashOrNumber::Number(1_920_000),
            max_headers: 128,
            skip: 0,
            reverse: 0,
        }));
    }

    #[test]
    fn get_block_headers_by_hash_roundtrip() {
        roundtrip(EthMessage::GetBlockHeaders(GetBlockHeaders::probe(
            HashOrNumber::Hash(B256::repeat_byte(0x42)),
        )));
    }

    #[test]
    fn new_block_hashes_roundtrip() {
        roundtrip(EthMessage::NewBlockHashes(vec![
            BlockHashNumber {
                hash: B256::repeat_byte(0x01),
                number: 100,
            },
            BlockHashNumber {
                hash: B256::repeat_byte(0x02),
                number: 101,
            },
        ]));
    }

    #[test]
    fn empty_replies_roundtrip() {
        roundtrip(EthMessage::BlockHeaders(vec![]));
        roundtrip(EthMessage::BlockBodies(vec![]));
        roundtrip(EthMessage::NodeData(vec![]));
        roundtrip(EthMessage::empty_receipts());
    }

    #[test]
    fn unknown_id_rejected() {
        assert!(matches!(
            EthMessageId::try_from(0x20),
            Err(WireError::UnknownMessageId(0x20))
        ));
    }
}
