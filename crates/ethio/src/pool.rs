//! Peer pool: transport intake, session spawning, verified-peer
//! bookkeeping and request fan-out selection.

use std::{collections::HashMap, future::Future, net::SocketAddr, sync::Arc};

use parking_lot::{Mutex, RwLock};
use rand::{seq::SliceRandom, Rng};
use rover_sync::{DriverError, RoverEvent, SyncState};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    block::EthBlockData,
    discovery::{BanList, BAN_DURATION},
    params::NetworkParams,
    session::{peer_session_task, SessionCtx, SessionEvent},
    transport::{DisconnectReason, PeerId, TransportCommand, TransportErrorKind, TransportEvent},
    validate::ChainView,
    wire::EthMessage,
};

/// Startup jitter applied to the configured peer target, chosen once.
const MAX_PEER_JITTER: i32 = 9;

/// Everything the pool task owns.
#[derive(Debug)]
pub struct PoolCtx {
    pub params: Arc<NetworkParams>,
    pub state: Arc<SyncState>,
    pub view: Arc<ChainView>,
    /// Peer target before jitter.
    pub maximum_peers: u32,
    pub events_rx: mpsc::Receiver<TransportEvent>,
    pub commands_tx: mpsc::Sender<TransportCommand>,
    pub rover_tx: mpsc::Sender<RoverEvent<EthBlockData>>,
}

#[derive(Debug)]
struct PeerEntry {
    addr: SocketAddr,
    verified: bool,
    outbound: mpsc::Sender<EthMessage>,
}

#[derive(Debug, Default)]
struct PoolShared {
    peers: RwLock<HashMap<PeerId, PeerEntry>>,
    bans: Mutex<BanList>,
}

/// Read access to the pool for the driver and status reporting.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    shared: Arc<PoolShared>,
}

impl PoolHandle {
    pub fn peer_count(&self) -> usize {
        self.shared.peers.read().len()
    }

    pub fn verified_count(&self) -> usize {
        self.shared
            .peers
            .read()
            .values()
            .filter(|entry| entry.verified)
            .count()
    }

    /// Outbound channels of every verified peer.
    pub fn verified_peers(&self) -> Vec<(PeerId, mpsc::Sender<EthMessage>)> {
        self.shared
            .peers
            .read()
            .iter()
            .filter(|(_, entry)| entry.verified)
            .map(|(peer, entry)| (*peer, entry.outbound.clone()))
            .collect()
    }

    /// Picks a random subset of verified peers for one request fan-out.
    /// At least two peers must be available.
    pub fn select_request_peers(
        &self,
    ) -> Result<Vec<(PeerId, mpsc::Sender<EthMessage>)>, DriverError> {
        let mut verified = self.verified_peers();
        if verified.len() < 2 {
            return Err(DriverError::NotEnoughPeers(verified.len(), 2));
        }
        let fanout = request_fanout(verified.len());
        verified.shuffle(&mut rand::thread_rng());
        verified.truncate(fanout);
        Ok(verified)
    }
}

/// Square-root fan-out, floored at the two-peer minimum.
fn request_fanout(verified: usize) -> usize {
    ((verified as f64).sqrt().ceil() as usize).max(2)
}

fn jittered_max_peers(configured: u32) -> usize {
    let jitter = rand::thread_rng().gen_range(-MAX_PEER_JITTER..=MAX_PEER_JITTER);
    (configured as i32 + jitter).max(1) as usize
}

/// Builds the pool and its task: the handle reads, the task owns all
/// mutation.
pub fn spawn_peer_pool(ctx: PoolCtx) -> (PoolHandle, impl Future<Output = ()>) {
    let shared = Arc::new(PoolShared::default());
    let handle = PoolHandle {
        shared: shared.clone(),
    };
    let task = pool_task(shared, ctx);
    (handle, task)
}

async fn pool_task(shared: Arc<PoolShared>, mut ctx: PoolCtx) {
    let max_peers = jittered_max_peers(ctx.maximum_peers);
    let (session_tx, mut session_rx) = mpsc::channel::<SessionEvent>(256);
    info!(max_peers, "peer pool started");

    loop {
        tokio::select! {
            maybe_event = ctx.events_rx.recv() => {
                let Some(event) = maybe_event else {
                    info!("transport gone, peer pool stopping");
                    break;
                };
                handle_transport_event(event, &shared, &ctx, &session_tx, max_peers).await;
            }
            maybe_event = session_rx.recv() => {
                // never closed while we hold session_tx
                if let Some(event) = maybe_event {
                    handle_session_event(event, &shared, &ctx).await;
                }
            }
        }
    }
}

async fn handle_transport_event(
    event: TransportEvent,
    shared: &Arc<PoolShared>,
    ctx: &PoolCtx,
    session_tx: &mpsc::Sender<SessionEvent>,
    max_peers: usize,
) {
    match event {
        TransportEvent::PeerAdded { peer, addr, link } => {
            if shared.bans.lock().is_banned(&peer) {
                debug!(%peer, "banned peer reconnected, dropping");
                send_command(
                    ctx,
                    TransportCommand::Disconnect {
                        peer,
                        reason: DisconnectReason::UselessPeer,
                    },
                )
                .await;
                return;
            }
            if shared.peers.read().len() >= max_peers {
                debug!(%peer, "peer cap reached, dropping");
                send_command(
                    ctx,
                    TransportCommand::Disconnect {
                        peer,
                        reason: DisconnectReason::TooManyPeers,
                    },
                )
                .await;
                return;
            }

            debug!(%peer, %addr, "peer connected");
            shared.peers.write().insert(
                peer,
                PeerEntry {
                    addr,
                    verified: false,
                    outbound: link.outbound.clone(),
                },
            );
            let session_ctx = SessionCtx {
                peer,
                params: ctx.params.clone(),
                state: ctx.state.clone(),
                view: ctx.view.clone(),
                outbound: link.outbound,
                pool_tx: session_tx.clone(),
                rover_tx: ctx.rover_tx.clone(),
            };
            tokio::spawn(peer_session_task(session_ctx, link.inbound));
        }
        TransportEvent::PeerRemoved { peer, reason } => {
            debug!(%peer, %reason, "peer removed by transport");
            shared.peers.write().remove(&peer);
        }
        TransportEvent::PeerError { peer, kind } => match kind {
            TransportErrorKind::Assertion(message) => {
                warn!(%peer, %message, "transport assertion, banning peer");
                shared.bans.lock().ban(peer, BAN_DURATION);
                shared.peers.write().remove(&peer);
                send_command(
                    ctx,
                    TransportCommand::Ban {
                        peer,
                        duration: BAN_DURATION,
                    },
                )
                .await;
                send_command(
                    ctx,
                    TransportCommand::Disconnect {
                        peer,
                        reason: DisconnectReason::UselessPeer,
                    },
                )
                .await;
            }
            TransportErrorKind::ConnectionReset => {
                // common churn, not worth a log line
                shared.peers.write().remove(&peer);
            }
            TransportErrorKind::Other(message) => {
                warn!(%peer, %message, "transport error");
                shared.peers.write().remove(&peer);
                send_command(
                    ctx,
                    TransportCommand::Disconnect {
                        peer,
                        reason: DisconnectReason::Requested,
                    },
                )
                .await;
            }
        },
    }
}

async fn handle_session_event(event: SessionEvent, shared: &Arc<PoolShared>, ctx: &PoolCtx) {
    match event {
        SessionEvent::Verified(peer) => {
            let mut peers = shared.peers.write();
            if let Some(entry) = peers.get_mut(&peer) {
                info!(%peer, addr = %entry.addr, "peer verified");
                entry.verified = true;
            }
        }
        SessionEvent::Disconnect { peer, reason, ban } => {
            shared.peers.write().remove(&peer);
            if ban {
                shared.bans.lock().ban(peer, BAN_DURATION);
                send_command(
                    ctx,
                    TransportCommand::Ban {
                        peer,
                        duration: BAN_DURATION,
                    },
                )
                .await;
            }
            send_command(ctx, TransportCommand::Disconnect { peer, reason }).await;
        }
        SessionEvent::Closed(peer) => {
            shared.peers.write().remove(&peer);
        }
    }
}

async fn send_command(ctx: &PoolCtx, command: TransportCommand) {
    if ctx.commands_tx.send(command).await.is_err() {
        debug!("transport command channel closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rover_config::Network;
    use rover_primitives::ChainTag;
    use tokio::time::timeout;

    use super::*;
    use crate::wire::Status;
    use crate::PeerLink;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    struct PoolHarness {
        handle: PoolHandle,
        events_tx: mpsc::Sender<TransportEvent>,
        commands_rx: mpsc::Receiver<TransportCommand>,
        params: Arc<NetworkParams>,
        /// Kept open so sessions can forward blocks.
        _rover_rx: mpsc::Receiver<RoverEvent<EthBlockData>>,
    }

    struct FakePeer {
        peer: PeerId,
        outbound_rx: mpsc::Receiver<EthMessage>,
        inbound_tx: mpsc::Sender<EthMessage>,
    }

    fn spawn_pool(maximum_peers: u32) -> PoolHarness {
        let params = Arc::new(NetworkParams::for_network(Network::Test, &[]));
        let (events_tx, events_rx) = mpsc::channel(64);
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (rover_tx, rover_rx) = mpsc::channel(64);

        let ctx = PoolCtx {
            params: params.clone(),
            state: Arc::new(SyncState::new(ChainTag::Eth)),
            view: Arc::new(ChainView::default()),
            maximum_peers,
            events_rx,
            commands_tx,
            rover_tx,
        };
        let (handle, task) = spawn_peer_pool(ctx);
        tokio::spawn(task);

        PoolHarness {
            handle,
            events_tx,
            commands_rx,
            params,
            _rover_rx: rover_rx,
        }
    }

    async fn add_peer(harness: &PoolHarness, id: u8) -> FakePeer {
        let peer = PeerId::repeat_byte(id);
        let (out_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        harness
            .events_tx
            .send(TransportEvent::PeerAdded {
                peer,
                addr: ([127, 0, 0, 1], 30300 + id as u16).into(),
                link: PeerLink {
                    outbound: out_tx,
                    inbound: inbound_rx,
                },
            })
            .await
            .unwrap();
        FakePeer {
            peer,
            outbound_rx,
            inbound_tx,
        }
    }

    /// Drives a fake peer through the status exchange to verification.
    async fn verify_peer(harness: &PoolHarness, fake: &mut FakePeer) {
        match timeout(RECV_TIMEOUT, fake.outbound_rx.recv()).await {
            Ok(Some(EthMessage::Status(_))) => {}
            other => panic!("expected status, got {other:?}"),
        }
        let status = Status {
            protocol_version: 63,
            network_id: harness.params.network_id,
            total_difficulty: harness.params.genesis_difficulty,
            best_hash: harness.params.genesis_hash,
            genesis_hash: harness.params.genesis_hash,
        };
        fake.inbound_tx
            .send(EthMessage::Status(status))
            .await
            .unwrap();
    }

    async fn wait_verified(handle: &PoolHandle, count: usize) {
        for _ in 0..200 {
            if handle.verified_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pool never reached {count} verified peers");
    }

    #[test]
    fn fanout_is_sqrt_with_floor_of_two() {
        assert_eq!(request_fanout(2), 2);
        assert_eq!(request_fanout(4), 2);
        assert_eq!(request_fanout(9), 3);
        assert_eq!(request_fanout(25), 5);
        assert_eq!(request_fanout(26), 6);
    }

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..200 {
            let max_peers = jittered_max_peers(25);
            assert!((16..=34).contains(&max_peers), "out of band: {max_peers}");
        }
        // the floor holds even for tiny targets
        assert!(jittered_max_peers(1) >= 1);
    }

    #[tokio::test]
    async fn peers_verify_and_get_selected() {
        let harness = spawn_pool(25);

        let mut first = add_peer(&harness, 1).await;
        let mut second = add_peer(&harness, 2).await;
        verify_peer(&harness, &mut first).await;
        verify_peer(&harness, &mut second).await;
        wait_verified(&harness.handle, 2).await;

        let chosen = harness.handle.select_request_peers().unwrap();
        assert_eq!(chosen.len(), 2);
    }

    #[tokio::test]
    async fn selection_needs_two_verified_peers() {
        let harness = spawn_pool(25);

        let mut only = add_peer(&harness, 1).await;
        verify_peer(&harness, &mut only).await;
        wait_verified(&harness.handle, 1).await;

        assert!(matches!(
            harness.handle.select_request_peers(),
            Err(DriverError::NotEnoughPeers(1, 2))
        ));
    }

    #[tokio::test]
    async fn assertion_error_bans_and_blocks_reconnect() {
        let mut harness = spawn_pool(25);

        let fake = add_peer(&harness, 7).await;
        harness
            .events_tx
            .send(TransportEvent::PeerError {
                peer: fake.peer,
                kind: TransportErrorKind::Assertion("bad frame".into()),
            })
            .await
            .unwrap();

        let mut saw_ban = false;
        let mut saw_disconnect = false;
        for _ in 0..2 {
            match timeout(RECV_TIMEOUT, harness.commands_rx.recv()).await {
                Ok(Some(TransportCommand::Ban { peer, duration })) => {
                    assert_eq!(peer, fake.peer);
                    assert_eq!(duration, BAN_DURATION);
                    saw_ban = true;
                }
                Ok(Some(TransportCommand::Disconnect { peer, .. })) => {
                    assert_eq!(peer, fake.peer);
                    saw_disconnect = true;
                }
                other => panic!("expected commands, got {other:?}"),
            }
        }
        assert!(saw_ban && saw_disconnect);

        // reconnect attempt is refused while the ban lasts
        let _fake2 = add_peer(&harness, 7).await;
        match timeout(RECV_TIMEOUT, harness.commands_rx.recv()).await {
            Ok(Some(TransportCommand::Disconnect { peer, reason })) => {
                assert_eq!(peer, fake.peer);
                assert_eq!(reason, DisconnectReason::UselessPeer);
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert_eq!(harness.handle.peer_count(), 0);
    }

    #[tokio::test]
    async fn peer_cap_is_enforced() {
        // configured target 1: even with maximum jitter the cap is 10
        let mut harness = spawn_pool(1);

        for id in 1..=12u8 {
            add_peer(&harness, id).await;
        }

        let mut bounced = false;
        for _ in 0..200 {
            match timeout(Duration::from_millis(50), harness.commands_rx.recv()).await {
                Ok(Some(TransportCommand::Disconnect {
                    reason: DisconnectReason::TooManyPeers,
                    ..
                })) => {
                    bounced = true;
                    break;
                }
                Ok(Some(_)) => continue,
                _ => continue,
            }
        }
        assert!(bounced, "no peer was bounced over the cap");
        assert!(harness.handle.peer_count() <= 10);
    }
}
