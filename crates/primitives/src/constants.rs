//! Chain parameters shared across the rover workers.

use crate::chain::ChainTag;

/// How far back a default resync reaches, in seconds of chain time.
pub const ROVER_RESYNC_PERIOD_SECS: u64 = 1770;

/// Interval of the request-tracker watchdog.
pub const WATCHDOG_INTERVAL_SECS: u64 = 10;

/// Lisk mainnet genesis instant, 2016-05-24T17:00:00Z.
pub const LSK_GENESIS_UNIX_SECONDS: u64 = 1_464_109_200;

/// Largest block-number span a single batch may cover.
pub fn max_batch(chain: ChainTag) -> u64 {
    match chain {
        ChainTag::Eth => 128,
        ChainTag::Lsk => 100,
    }
}

/// Nominal block interval of the foreign chain.
pub fn seconds_per_block(chain: ChainTag) -> u64 {
    match chain {
        ChainTag::Eth => 15,
        ChainTag::Lsk => 10,
    }
}

/// Capacity of the per-rover emitted-block dedup cache.
pub fn block_cache_size(chain: ChainTag) -> usize {
    match chain {
        ChainTag::Eth => 118,
        ChainTag::Lsk => 200,
    }
}

/// Capacity of the announced-transaction cache.
pub const TX_CACHE_SIZE: usize = 2000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_matches_cache_size_for_eth() {
        // The eth dedup cache is sized to hold one default resync window.
        assert_eq!(
            ROVER_RESYNC_PERIOD_SECS / seconds_per_block(ChainTag::Eth),
            block_cache_size(ChainTag::Eth) as u64
        );
    }
}
