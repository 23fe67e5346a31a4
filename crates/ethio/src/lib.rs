//! Ethereum io layer: a devp2p-facing client speaking the eth wire
//! protocol (v62/63) against a pool of fork-verified peers.
//!
//! The encrypted transport itself sits behind the [`transport`] seam; this
//! crate owns everything above it: discovery bootstrap, peer lifecycle and
//! fork probing, wire codec, stateless block validation, and the
//! [`rover_sync::ChainDriver`] implementation the shared control loop runs
//! against.

mod block;
mod discovery;
mod driver;
mod errors;
mod params;
mod pool;
mod session;
mod transport;
mod types;
mod validate;
mod wire;

pub use block::{EthBlockData, EthTxData};
pub use discovery::{
    find_free_udp_port, parse_enode, BanList, BootNode, BAN_DURATION, DISCOVERY_PORT_RANGE,
};
pub use driver::EthDriver;
pub use errors::{EthIoError, ValidationError, WireError};
pub use params::{dao_fork_header, ForkProbe, NetworkParams, DAO_FORK_HASH, DAO_FORK_HEIGHT};
pub use pool::{spawn_peer_pool, PoolCtx, PoolHandle};
pub use session::PeerState;
pub use transport::{
    DisconnectReason, PeerId, PeerLink, TransportCommand, TransportErrorKind, TransportEvent,
};
pub use types::{Block, BlockBody, Header, TransactionSigned};
pub use validate::{
    canonical_difficulty, check_live, validate_block, ChainView, LiveVerdict, MAX_INVALID_COUNT,
};
pub use wire::{
    BlockHashNumber, EthMessage, EthMessageId, GetBlockHeaders, HashOrNumber, NewBlockPayload,
    Status,
};
