//! Stateless block integrity checks and the live-tip difficulty gate.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::Encodable;
use alloy_trie::root::ordered_trie_root_with_encoder;
use parking_lot::RwLock;

use crate::{
    errors::ValidationError,
    types::{Block, Header},
};

/// Consecutive live difficulty failures tolerated before disconnecting the
/// offending peer.
pub const MAX_INVALID_COUNT: u32 = 8;

/// Difficulty floor of the chain.
const MIN_DIFFICULTY: u64 = 131_072;

/// Bomb delay introduced with the byzantium fork.
const BOMB_DELAY_BLOCKS: u64 = 3_000_000;

/// Validates a reassembled block: uncle hash, per-transaction signatures,
/// and the transactions trie root. Returns the recovered senders in
/// transaction order. No balance or state checks happen here.
pub fn validate_block(block: &Block) -> Result<Vec<Address>, ValidationError> {
    let ommers_hash = keccak256(alloy_rlp::encode(&block.ommers));
    if ommers_hash != block.header.ommers_hash {
        return Err(ValidationError::OmmersHashMismatch);
    }

    let transactions_root =
        ordered_trie_root_with_encoder(&block.transactions, |tx, buf| tx.encode(buf));
    if transactions_root != block.header.transactions_root {
        return Err(ValidationError::TransactionsRootMismatch);
    }

    block
        .transactions
        .iter()
        .map(|tx| tx.recover_sender())
        .collect()
}

/// The session's view of the live chain head, shared across peers.
#[derive(Debug, Default)]
pub struct ChainView {
    best: RwLock<Option<(B256, Header)>>,
}

impl ChainView {
    pub fn best(&self) -> Option<(B256, Header)> {
        self.best.read().clone()
    }

    pub fn best_height(&self) -> Option<u64> {
        self.best.read().as_ref().map(|(_, header)| header.number)
    }

    /// Advances the head if `header` is higher than the current one.
    pub fn observe(&self, hash: B256, header: Header) {
        let mut best = self.best.write();
        let improved = best
            .as_ref()
            .is_none_or(|(_, current)| header.number > current.number);
        if improved {
            *best = Some((hash, header));
        }
    }
}

/// Verdict on a block announced on the live tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveVerdict {
    /// Extends the head with a plausible difficulty.
    Valid,
    /// Higher than head+1; `[from, to]` needs a fill before it can be
    /// judged.
    GapAhead { from: u64, to: u64 },
    /// Difficulty or ancestry cannot be right.
    Invalid,
}

/// Judges a live header against the current chain view.
///
/// Before any head is known every block is acceptable; afterwards a block
/// jumping ahead turns into a gap request rather than a rejection, since
/// its difficulty cannot be checked without the intervening headers.
pub fn check_live(header: &Header, view: &ChainView) -> LiveVerdict {
    let Some((best_hash, best)) = view.best() else {
        return LiveVerdict::Valid;
    };

    if header.number > best.number + 1 {
        return LiveVerdict::GapAhead {
            from: best.number + 1,
            to: header.number - 1,
        };
    }
    if header.number <= best.number {
        return LiveVerdict::Invalid;
    }

    let expected = canonical_difficulty(&best, header.timestamp);
    if header.parent_hash == best_hash && header.difficulty == expected {
        LiveVerdict::Valid
    } else {
        LiveVerdict::Invalid
    }
}

/// The byzantium-era difficulty adjustment: parent difficulty nudged by
/// elapsed time in 9 s buckets, floored, plus the delayed difficulty bomb.
pub fn canonical_difficulty(parent: &Header, timestamp: u64) -> U256 {
    let adjustment = parent.difficulty / U256::from(2048u64);
    let elapsed = timestamp.saturating_sub(parent.timestamp);
    let sigma = (1i64 - (elapsed / 9) as i64).max(-99);

    let mut difficulty = if sigma >= 0 {
        parent.difficulty + adjustment * U256::from(sigma as u64)
    } else {
        parent
            .difficulty
            .saturating_sub(adjustment * U256::from((-sigma) as u64))
    };

    let floor = U256::from(MIN_DIFFICULTY);
    if difficulty < floor {
        difficulty = floor;
    }

    let fake_number = (parent.number + 1).saturating_sub(BOMB_DELAY_BLOCKS);
    let period = fake_number / 100_000;
    if period > 1 {
        difficulty += U256::from(2u64).pow(U256::from(period - 2));
    }

    difficulty
}
