//! Translation of foreign blocks into the unified upstream representation.
//!
//! Chain io crates implement [`ForeignBlock`]/[`ForeignTx`] over their
//! native types; everything above that seam is chain-agnostic: the marking
//! policy picks out cross-chain-relevant transactions and the builder
//! assembles the final [`rover_primitives::UnifiedBlock`].

mod block;
mod marker;
mod traits;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use block::build_unified;
pub use marker::{mark_transactions, OracleError, SettlementOracle, TxMarker};
pub use traits::{ForeignBlock, ForeignTx};
