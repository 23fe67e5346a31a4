use rover_primitives::{BlockRef, ChainTag};
use serde::{Deserialize, Serialize};

/// Identifies the rover attaching to the directive stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverIdent {
    pub chain: ChainTag,
}

/// One instruction pushed down the `join` stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RoverDirective {
    #[serde(rename = "REQUEST_RESYNC")]
    RequestResync(ResyncData),
    #[serde(rename = "FETCH_BLOCK")]
    FetchBlock(FetchBlockData),
}

/// What to resynchronize.
///
/// `intervals` of `None` means "follow the tip"; the rover then derives its
/// own default window. `known_latest` is the parent's view of the newest
/// block it has from this chain, used to detect staleness gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResyncData {
    pub intervals: Option<Vec<ResyncInterval>>,
    pub known_latest: Option<BlockRef>,
}

/// An inclusive `[from, to]` height interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncInterval {
    pub from: u64,
    pub to: u64,
}

/// Ad-hoc gap fill between two blocks the parent already holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchBlockData {
    pub current_last: BlockRef,
    pub previous_last: BlockRef,
}

/// Terminal outcome of a resync session, sent exactly once per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoverSyncStatus {
    pub chain: ChainTag,
    pub ok: bool,
}
