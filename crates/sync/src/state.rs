use std::{
    collections::HashSet,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use rover_primitives::{constants, BlockRef, ChainTag};

use crate::{cache::BoundedCache, planner::Batch};

/// Time-to-live of the emitted-block dedup cache.
const BLOCK_CACHE_TTL: Duration = Duration::from_secs(3600);

/// State shared between the control loop and the chain io layer.
///
/// The control loop's dispatcher and the io receive handlers are the only
/// writers; every field is independently locked so no component holds more
/// than one lock at a time.
#[derive(Debug)]
pub struct SyncState {
    /// Heights currently requested from the network.
    requested: Mutex<HashSet<u64>>,
    /// Best block observed on the live tip.
    best_seen: RwLock<Option<BlockRef>>,
    /// Consecutive live blocks failing the difficulty check.
    invalid_streak: AtomicU32,
    /// Pending poll-cycle skips after upstream emit failures.
    skip_ticks: AtomicU32,
    /// Block identifiers already seen or emitted.
    block_cache: Mutex<BoundedCache<String, ()>>,
    /// Announced transaction identifiers already admitted.
    tx_cache: Mutex<BoundedCache<String, ()>>,
}

impl SyncState {
    pub fn new(chain: ChainTag) -> Self {
        Self {
            requested: Mutex::new(HashSet::new()),
            best_seen: RwLock::new(None),
            invalid_streak: AtomicU32::new(0),
            skip_ticks: AtomicU32::new(0),
            block_cache: Mutex::new(BoundedCache::new(
                constants::block_cache_size(chain),
                Some(BLOCK_CACHE_TTL),
            )),
            tx_cache: Mutex::new(BoundedCache::new(constants::TX_CACHE_SIZE, None)),
        }
    }

    /// Adds every height of `batch` to the requested set.
    pub fn request_batch(&self, batch: &Batch) {
        let mut requested = self.requested.lock();
        requested.extend(batch.heights());
    }

    /// Whether `height` is currently outstanding.
    pub fn is_requested(&self, height: u64) -> bool {
        self.requested.lock().contains(&height)
    }

    /// Marks `height` as satisfied; returns whether it was outstanding.
    pub fn complete_height(&self, height: u64) -> bool {
        self.requested.lock().remove(&height)
    }

    /// Whether no heights remain outstanding.
    pub fn is_drained(&self) -> bool {
        self.requested.lock().is_empty()
    }

    pub fn requested_count(&self) -> usize {
        self.requested.lock().len()
    }

    pub fn best_seen(&self) -> Option<BlockRef> {
        self.best_seen.read().clone()
    }

    /// Advances the best-seen block if `candidate` is higher.
    pub fn observe_best(&self, candidate: BlockRef) {
        let mut best = self.best_seen.write();
        let improved = best
            .as_ref()
            .is_none_or(|current| candidate.height > current.height);
        if improved {
            *best = Some(candidate);
        }
    }

    /// Counts one live block failing the difficulty check; returns the new
    /// streak length.
    pub fn note_invalid(&self) -> u32 {
        self.invalid_streak.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset_invalid(&self) {
        self.invalid_streak.store(0, Ordering::Relaxed);
    }

    /// Queues one skipped poll cycle.
    pub fn push_skip(&self) {
        self.skip_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Consumes one queued skip, if any. Drivers call this per poll cycle
    /// and stand down when it returns true.
    pub fn take_skip(&self) -> bool {
        self.skip_ticks
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Whether `block_id` was already seen; records it either way.
    pub fn check_and_note_block(&self, block_id: &str) -> bool {
        let mut cache = self.block_cache.lock();
        if cache.contains(&block_id.to_string()) {
            return true;
        }
        cache.insert(block_id.to_string(), ());
        false
    }

    /// Whether `block_id` has been seen, without recording it.
    pub fn knows_block(&self, block_id: &str) -> bool {
        self.block_cache.lock().contains(&block_id.to_string())
    }

    /// Whether `tx_id` was already admitted; records it either way.
    pub fn check_and_note_tx(&self, tx_id: &str) -> bool {
        let mut cache = self.tx_cache.lock();
        if cache.contains(&tx_id.to_string()) {
            return true;
        }
        cache.insert(tx_id.to_string(), ());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_complete_heights() {
        let state = SyncState::new(ChainTag::Eth);
        state.request_batch(&Batch::new(10, 12));

        assert!(state.is_requested(11));
        assert!(!state.is_drained());

        assert!(state.complete_height(10));
        assert!(state.complete_height(11));
        // completing twice reads as not-outstanding
        assert!(!state.complete_height(11));
        assert!(state.complete_height(12));
        assert!(state.is_drained());
    }

    #[test]
    fn best_seen_only_advances() {
        let state = SyncState::new(ChainTag::Eth);
        state.observe_best(BlockRef::new(100, "0xaa", 1));
        state.observe_best(BlockRef::new(90, "0xbb", 2));
        assert_eq!(state.best_seen().unwrap().height, 100);

        state.observe_best(BlockRef::new(101, "0xcc", 3));
        assert_eq!(state.best_seen().unwrap().height, 101);
    }

    #[test]
    fn invalid_streak_counts_and_resets() {
        let state = SyncState::new(ChainTag::Eth);
        assert_eq!(state.note_invalid(), 1);
        assert_eq!(state.note_invalid(), 2);
        state.reset_invalid();
        assert_eq!(state.note_invalid(), 1);
    }

    #[test]
    fn skip_ticks_drain_one_per_take() {
        let state = SyncState::new(ChainTag::Lsk);
        assert!(!state.take_skip());

        state.push_skip();
        state.push_skip();
        assert!(state.take_skip());
        assert!(state.take_skip());
        assert!(!state.take_skip());
    }

    #[test]
    fn block_dedup_notes_first_sighting() {
        let state = SyncState::new(ChainTag::Eth);
        assert!(!state.check_and_note_block("0xaa"));
        assert!(state.check_and_note_block("0xaa"));
        assert!(state.knows_block("0xaa"));
        assert!(!state.knows_block("0xbb"));
    }
}
