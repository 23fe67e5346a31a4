//! Discovery bootstrap helpers: port selection, boot-node parsing and the
//! short-lived peer ban list.

use std::{
    collections::HashMap,
    net::{SocketAddr, UdpSocket},
    ops::RangeInclusive,
    time::{Duration, Instant},
};

use crate::{errors::EthIoError, transport::PeerId};

/// Ports probed for the udp discovery socket.
pub const DISCOVERY_PORT_RANGE: RangeInclusive<u16> = 30304..=33663;

/// How long a transport-assertion ban lasts.
pub const BAN_DURATION: Duration = Duration::from_secs(5 * 60);

/// Finds the first free udp port in [`DISCOVERY_PORT_RANGE`].
///
/// Exhausting the range is a fatal local condition; the caller is expected
/// to terminate the process.
pub fn find_free_udp_port() -> Result<u16, EthIoError> {
    let range = DISCOVERY_PORT_RANGE;
    for port in range.clone() {
        if UdpSocket::bind(("0.0.0.0", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(EthIoError::PortsExhausted(*range.start(), *range.end()))
}

/// A parsed `enode://` url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootNode {
    /// Node id: 64 bytes of uncompressed public key, hex.
    pub id: String,
    pub addr: SocketAddr,
}

/// Parses an `enode://<id>@<ip>:<port>` url.
pub fn parse_enode(url: &str) -> Result<BootNode, EthIoError> {
    let malformed = || EthIoError::MalformedEnode(url.to_string());

    let rest = url.strip_prefix("enode://").ok_or_else(malformed)?;
    let (id, addr) = rest.split_once('@').ok_or_else(malformed)?;
    if id.len() != 128 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }
    let addr: SocketAddr = addr.parse().map_err(|_| malformed())?;
    Ok(BootNode {
        id: id.to_ascii_lowercase(),
        addr,
    })
}

/// Peers temporarily excluded from discovery.
#[derive(Debug, Default)]
pub struct BanList {
    entries: HashMap<PeerId, Instant>,
}

impl BanList {
    pub fn ban(&mut self, peer: PeerId, duration: Duration) {
        self.entries.insert(peer, Instant::now() + duration);
    }

    /// Checks a peer, pruning its entry once expired.
    pub fn is_banned(&mut self, peer: &PeerId) -> bool {
        match self.entries.get(peer) {
            Some(until) if Instant::now() < *until => true,
            Some(_) => {
                self.entries.remove(peer);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
