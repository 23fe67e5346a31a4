//! Lisk io layer: an https polling driver over the node REST api.
//!
//! No peer-to-peer machinery here; the shared sync stack runs unchanged on
//! top of offset/limit pagination. Blocks are validated structurally,
//! decorated with their transactions and handed to the control loop in the
//! same shape the eth rover produces.

mod block;
mod client;
mod driver;
mod types;

pub use block::{lsk_merkle_root, validate_block, LskBlockData, LskBlockError};
pub use client::{LskApi, LskApiClient, LskClientError};
pub use driver::{lsk_poll_task, LskDriver};
pub use types::{LskBlock, LskTransaction};
