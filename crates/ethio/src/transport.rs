//! Seam between the peer pool and the encrypted devp2p transport.
//!
//! The rlpx framing and its handshake crypto live behind this boundary;
//! the pool sees authenticated peers as message channels plus a command
//! channel back into the transport. Tests drive sessions through the same
//! channels.

use std::{net::SocketAddr, time::Duration};

use alloy_primitives::B512;
use tokio::sync::mpsc;

use crate::wire::EthMessage;

/// A peer's devp2p node id (uncompressed public key).
pub type PeerId = B512;

/// devp2p disconnect codes this client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DisconnectReason {
    Requested = 0x00,
    UselessPeer = 0x03,
    TooManyPeers = 0x04,
}

/// Message channels for one authenticated peer.
#[derive(Debug)]
pub struct PeerLink {
    /// Outbound eth messages toward the peer.
    pub outbound: mpsc::Sender<EthMessage>,
    /// Inbound eth messages from the peer.
    pub inbound: mpsc::Receiver<EthMessage>,
}

/// What the transport reports to the pool.
#[derive(Debug)]
pub enum TransportEvent {
    /// Transport handshake finished; the eth handshake is now ours.
    PeerAdded {
        peer: PeerId,
        addr: SocketAddr,
        link: PeerLink,
    },
    /// Connection went away.
    PeerRemoved { peer: PeerId, reason: String },
    /// Transport-level trouble attributable to one peer.
    PeerError {
        peer: PeerId,
        kind: TransportErrorKind,
    },
}

/// Classified transport errors; the pool's reaction differs per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Protocol assertion tripped; the peer earns a discovery ban.
    Assertion(String),
    /// Connection reset; dropped silently.
    ConnectionReset,
    /// Anything else; logged, peer disconnected.
    Other(String),
}

/// Instructions from the pool back into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Disconnect {
        peer: PeerId,
        reason: DisconnectReason,
    },
    Ban {
        peer: PeerId,
        duration: Duration,
    },
}
