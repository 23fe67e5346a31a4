//! Chain-native block primitives and their rlp forms.

use alloy_primitives::{keccak256, Address, Bloom, Bytes, TxKind, B256, B64, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

use crate::errors::ValidationError;

/// An eth block header, pre-merge shape (15 fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Header {
    pub parent_hash: B256,
    pub ommers_hash: B256,
    pub beneficiary: Address,
    pub state_root: B256,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: B256,
    pub nonce: B64,
}

impl Header {
    /// Keccak of the rlp encoding; the block's identity on the wire.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

/// A signed legacy transaction (the only shape eth/62-63 carries).
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct TransactionSigned {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl TransactionSigned {
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    /// Chain id encoded in `v`, if the signature is eip-155 protected.
    pub fn chain_id(&self) -> Option<u64> {
        (self.v >= 35).then(|| (self.v - 35) / 2)
    }

    /// The digest the sender actually signed: the unsigned fields, with the
    /// `(chain_id, 0, 0)` suffix when the signature is eip-155 protected.
    pub fn signature_hash(&self) -> Result<B256, ValidationError> {
        use alloy_rlp::Encodable;

        let chain_id = match self.chain_id() {
            Some(id) => Some(id),
            None if self.v == 27 || self.v == 28 => None,
            None => return Err(ValidationError::InvalidSignatureV(self.v)),
        };

        let mut payload_length = self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.input.length();
        if let Some(id) = chain_id {
            payload_length += id.length() + 0u8.length() + 0u8.length();
        }

        let mut out = Vec::with_capacity(payload_length + 3);
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.nonce.encode(&mut out);
        self.gas_price.encode(&mut out);
        self.gas_limit.encode(&mut out);
        self.to.encode(&mut out);
        self.value.encode(&mut out);
        self.input.encode(&mut out);
        if let Some(id) = chain_id {
            id.encode(&mut out);
            0u8.encode(&mut out);
            0u8.encode(&mut out);
        }
        Ok(keccak256(out))
    }

    /// Recovers the sending address from the signature. No balance or
    /// nonce checks happen here.
    pub fn recover_sender(&self) -> Result<Address, ValidationError> {
        use secp256k1::{
            ecdsa::{RecoverableSignature, RecoveryId},
            Message, SECP256K1,
        };

        let recovery_id = match self.v {
            27 | 28 => (self.v - 27) as i32,
            v if v >= 35 => ((v - 35) % 2) as i32,
            v => return Err(ValidationError::InvalidSignatureV(v)),
        };

        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        compact[32..].copy_from_slice(&self.s.to_be_bytes::<32>());

        let signature = RecoverableSignature::from_compact(
            &compact,
            RecoveryId::from_i32(recovery_id).map_err(|_| ValidationError::BadSignature)?,
        )
        .map_err(|_| ValidationError::BadSignature)?;

        let digest = self.signature_hash()?;
        let message = Message::from_digest(digest.0);
        let public_key = SECP256K1
            .recover_ecdsa(&message, &signature)
            .map_err(|_| ValidationError::BadSignature)?;

        let key_hash = keccak256(&public_key.serialize_uncompressed()[1..]);
        Ok(Address::from_slice(&key_hash[12..]))
    }
}

/// Transactions and uncles of one block, as carried by `BlockBodies`.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockBody {
    pub transactions: Vec<TransactionSigned>,
    pub ommers: Vec<Header>,
}

/// A reassembled full block.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<TransactionSigned>,
    pub ommers: Vec<Header>,
}

impl Block {
    pub fn new(header: Header, body: BlockBody) -> Self {
        Self {
            header,
            transactions: body.transactions,
            ommers: body.ommers,
        }
    }

    pub fn hash(&self) -> B256 {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}

#[cfg(test)]
mod tests {
    use alloy_rlp::Decodable;
    use secp256k1::{PublicKey, SecretKey, SECP256K1};

    use super::*;

    fn test_key() -> (SecretKey, Address) {
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let public = PublicKey::from_secret_key(SECP256K1, &secret);
        let hash = keccak256(&public.serialize_uncompressed()[1..]);
        (secret, Address::from_slice(&hash[12..]))
    }

    fn sign_tx(mut tx: TransactionSigned, secret: &SecretKey, chain_id: Option<u64>) -> TransactionSigned {
        tx.v = match chain_id {
            Some(id) => 35 + id * 2,
            None => 27,
        };
        let digest = tx.signature_hash().unwrap();
        let message = secp256k1::Message::from_digest(digest.0);
        let signature = SECP256K1.sign_ecdsa_recoverable(&message, secret);
        let (rec_id, compact) = signature.serialize_compact();
        tx.r = U256::from_be_slice(&compact[..32]);
        tx.s = U256::from_be_slice(&compact[32..]);
        tx.v = match chain_id {
            Some(id) => 35 + id * 2 + rec_id.to_i32() as u64,
            None => 27 + rec_id.to_i32() as u64,
        };
        tx
    }

    fn make_tx() -> TransactionSigned {
        TransactionSigned {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: TxKind::Call(Address::repeat_byte(0x35)),
            value: U256::from(1_000_000_000u64),
            input: Bytes::new(),
            ..Default::default()
        }
    }

    #[test]
    fn header_rlp_roundtrip() {
        let header = Header {
            number: 1_920_000,
            gas_limit: 4_712_384,
            timestamp: 1_469_020_840,
            difficulty: U256::from(62_413_376_722_602u64),
            ..Default::default()
        };
        let encoded = alloy_rlp::encode(&header);
        let decoded = Header::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.hash(), header.hash());
    }

    #[test]
    fn recover_sender_legacy() {
        let (secret, address) = test_key();
        let tx = sign_tx(make_tx(), &secret, None);
        assert_eq!(tx.recover_sender().unwrap(), address);
        assert_eq!(tx.chain_id(), None);
    }

    #[test]
    fn recover_sender_eip155() {
        let (secret, address) = test_key();
        let tx = sign_tx(make_tx(), &secret, Some(1));
        assert_eq!(tx.recover_sender().unwrap(), address);
        assert_eq!(tx.chain_id(), Some(1));
    }

    #[test]
    fn tampered_tx_recovers_other_sender() {
        let (secret, address) = test_key();
        let mut tx = sign_tx(make_tx(), &secret, Some(1));
        tx.value = U256::from(2u8);
        // recovery either fails or yields a different address
        match tx.recover_sender() {
            Ok(recovered) => assert_ne!(recovered, address),
            Err(err) => assert!(matches!(err, ValidationError::BadSignature)),
        }
    }

    #[test]
    fn invalid_v_rejected() {
        let mut tx = make_tx();
        tx.v = 3;
        assert!(matches!(
            tx.recover_sender(),
            Err(ValidationError::InvalidSignatureV(3))
        ));
    }

    #[test]
    fn block_body_rlp_roundtrip() {
        let (secret, _) = test_key();
        let body = BlockBody {
            transactions: vec![sign_tx(make_tx(), &secret, Some(1))],
            ommers: vec![],
        };
        let encoded = alloy_rlp::encode(&body);
        let decoded = BlockBody::decode(&mut encoded.as_slice()).unwrap();
        assert_eq!(decoded, body);
    }
}
