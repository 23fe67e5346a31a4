//! Turns resync directives into an ordered sequence of bounded batches.

use std::collections::VecDeque;

use rover_primitives::{constants, ChainTag};
use rover_rpc_api::ResyncData;

/// An inclusive `[from, to]` height range small enough for one fan-out.
/// Always stored low-to-high; drivers decide request ordering on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub from: u64,
    pub to: u64,
}

impl Batch {
    pub fn new(from: u64, to: u64) -> Self {
        debug_assert!(from <= to);
        Self { from, to }
    }

    pub fn count(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn contains(&self, height: u64) -> bool {
        (self.from..=self.to).contains(&height)
    }

    pub fn heights(&self) -> impl Iterator<Item = u64> {
        self.from..=self.to
    }
}

/// Splits `[from, to]` into consecutive step-range chunks of at most
/// `max` heights, newest chunk first. The final (oldest) chunk may be
/// shorter.
pub fn split_interval(from: u64, to: u64, max: u64) -> Vec<Batch> {
    debug_assert!(max > 0);
    let (from, to) = if from <= to { (from, to) } else { (to, from) };

    let mut chunks = Vec::new();
    let mut lo = from;
    while lo <= to {
        let hi = lo.saturating_add(max - 1).min(to);
        chunks.push(Batch::new(lo, hi));
        if hi == u64::MAX {
            break;
        }
        lo = hi + 1;
    }
    chunks.reverse();
    chunks
}

/// Keeps the newest `max` heights of `[from, to]`, dropping older blocks.
pub fn clamp_recent(from: u64, to: u64, max: u64) -> Batch {
    let (from, to) = if from <= to { (from, to) } else { (to, from) };
    if to - from + 1 > max {
        Batch::new(to - (max - 1), to)
    } else {
        Batch::new(from, to)
    }
}

/// Plans one resync session.
///
/// Explicit intervals are processed in descending from-block order and
/// split to the chain's batch limit. A stale known-latest block (older
/// than two block times) prepends a gap fill up to the remote tip. With no
/// intervals at all, the default window covers one resync period back from
/// the tip.
pub fn plan_resync(data: &ResyncData, tip: u64, now_ms: u64, chain: ChainTag) -> VecDeque<Batch> {
    let max = constants::max_batch(chain);
    let mut batches = VecDeque::new();

    if let Some(latest) = &data.known_latest {
        let stale_after_ms = constants::seconds_per_block(chain) * 2 * 1000;
        if now_ms.saturating_sub(latest.timestamp_ms) > stale_after_ms && latest.height < tip {
            batches.extend(split_interval(latest.height, tip, max));
        }
    }

    match &data.intervals {
        Some(intervals) => {
            let mut ordered: Vec<_> = intervals.clone();
            ordered.sort_by(|a, b| b.from.cmp(&a.from));
            for interval in ordered {
                batches.extend(split_interval(interval.from, interval.to, max));
            }
        }
        None => {
            let window = constants::ROVER_RESYNC_PERIOD_SECS / constants::seconds_per_block(chain);
            let from = tip.saturating_sub(window.saturating_sub(1));
            batches.extend(split_interval(from, tip, max));
        }
    }

    batches
}
