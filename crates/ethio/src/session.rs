//! One peer's lifecycle: the eth status handshake, the fork-identity
//! probe, message dispatch and per-peer request bookkeeping.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use alloy_primitives::{Address, B256};
use rover_primitives::BlockRef;
use rover_sync::{RoverEvent, SyncState};
use tokio::{
    sync::mpsc,
    time::{sleep, timeout, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    block::EthBlockData,
    params::{dao_fork_header, NetworkParams},
    transport::{DisconnectReason, PeerId},
    types::{Block, BlockBody, Header, TransactionSigned},
    validate::{check_live, validate_block, ChainView, LiveVerdict, MAX_INVALID_COUNT},
    wire::{BlockHashNumber, EthMessage, GetBlockHeaders, HashOrNumber, Status},
};

/// Grace the peer gets to answer the fork probe.
pub(crate) const FORK_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a verified peer serves before the refresh disconnect.
pub(crate) const PEER_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Outbound pause between a header sighting and its follow-up request.
pub(crate) const REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Loop wait when no timer is armed.
const IDLE_WAIT: Duration = Duration::from_secs(60);

const ETH_PROTOCOL_VERSION: u8 = 63;

/// Handshake progress of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connected,
    StatusSent,
    ForkProbe,
    Verified,
    Refreshing,
    Rejected,
}

/// What a session reports back to the pool.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Verified(PeerId),
    Disconnect {
        peer: PeerId,
        reason: DisconnectReason,
        ban: bool,
    },
    Closed(PeerId),
}

/// Everything a session borrows from the pool at spawn time.
#[derive(Debug)]
pub(crate) struct SessionCtx {
    pub(crate) peer: PeerId,
    pub(crate) params: Arc<NetworkParams>,
    pub(crate) state: Arc<SyncState>,
    pub(crate) view: Arc<ChainView>,
    pub(crate) outbound: mpsc::Sender<EthMessage>,
    pub(crate) pool_tx: mpsc::Sender<SessionEvent>,
    pub(crate) rover_tx: mpsc::Sender<RoverEvent<EthBlockData>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Session {
    ctx: SessionCtx,
    phase: PeerState,
    /// Hashes announced via `NewBlockHashes`, probe sent, header pending.
    pending_hashes: VecDeque<B256>,
    /// Headers awaiting their body.
    pending_headers: VecDeque<Header>,
    fork_deadline: Option<Instant>,
    refresh_at: Option<Instant>,
}

/// Runs one peer session to completion.
pub(crate) async fn peer_session_task(ctx: SessionCtx, mut inbound: mpsc::Receiver<EthMessage>) {
    let mut session = Session {
        ctx,
        phase: PeerState::Connected,
        pending_hashes: VecDeque::new(),
        pending_headers: VecDeque::new(),
        fork_deadline: None,
        refresh_at: None,
    };

    if session.send_status().await == Flow::Stop {
        return;
    }

    loop {
        let wait = session
            .next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        match timeout(wait, inbound.recv()).await {
            Ok(Some(message)) => {
                if session.handle_message(message).await == Flow::Stop {
                    return;
                }
            }
            Ok(None) => {
                debug!(peer = %session.ctx.peer, "transport closed the session");
                let _ = session
                    .ctx
                    .pool_tx
                    .send(SessionEvent::Closed(session.ctx.peer))
                    .await;
                return;
            }
            Err(_) => {
                if session.handle_deadline().await == Flow::Stop {
                    return;
                }
            }
        }
    }
}

impl Session {
    fn next_deadline(&self) -> Option<Instant> {
        match (self.fork_deadline, self.refresh_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn send(&self, message: EthMessage) -> Flow {
        match self.ctx.outbound.send(message).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }

    async fn send_status(&mut self) -> Flow {
        let params = &self.ctx.params;
        let status = Status {
            protocol_version: ETH_PROTOCOL_VERSION,
            network_id: params.network_id,
            total_difficulty: params.genesis_difficulty,
            best_hash: params.genesis_hash,
            genesis_hash: params.genesis_hash,
        };
        self.phase = PeerState::StatusSent;
        self.send(EthMessage::Status(status)).await
    }

    async fn disconnect(&mut self, reason: DisconnectReason, ban: bool) -> Flow {
        let _ = self
            .ctx
            .pool_tx
            .send(SessionEvent::Disconnect {
                peer: self.ctx.peer,
                reason,
                ban,
            })
            .await;
        Flow::Stop
    }

    async fn handle_deadline(&mut self) -> Flow {
        let now = Instant::now();
        if self.fork_deadline.is_some_and(|at| at <= now) {
            info!(peer = %self.ctx.peer, "fork probe timed out");
            self.phase = PeerState::Rejected;
            return self.disconnect(DisconnectReason::UselessPeer, false).await;
        }
        if self.refresh_at.is_some_and(|at| at <= now) {
            debug!(peer = %self.ctx.peer, "refreshing long-lived peer");
            self.phase = PeerState::Refreshing;
            return self.disconnect(DisconnectReason::Requested, false).await;
        }
        Flow::Continue
    }

    async fn handle_message(&mut self, message: EthMessage) -> Flow {
        match message {
            EthMessage::Status(status) => self.handle_status(status).await,
            EthMessage::NewBlockHashes(hashes) => self.handle_new_block_hashes(hashes).await,
            EthMessage::NewBlock(payload) => self.handle_new_block(payload.block).await,
            EthMessage::BlockHeaders(headers) => self.handle_block_headers(headers).await,
            EthMessage::BlockBodies(bodies) => self.handle_block_bodies(bodies).await,
            EthMessage::Transactions(txs) => {
                self.handle_transactions(txs);
                Flow::Continue
            }
            EthMessage::GetBlockHeaders(request) => self.serve_block_headers(request).await,
            EthMessage::GetBlockBodies(_) => self.send(EthMessage::BlockBodies(vec![])).await,
            EthMessage::GetNodeData(_) => self.send(EthMessage::NodeData(vec![])).await,
            EthMessage::GetReceipts(_) => self.send(EthMessage::empty_receipts()).await,
            EthMessage::NodeData(_) | EthMessage::Receipts(_) => Flow::Continue,
        }
    }

    async fn handle_status(&mut self, status: Status) -> Flow {
        if self.phase != PeerState::StatusSent {
            debug!(peer = %self.ctx.peer, "unexpected status, dropped");
            return Flow::Continue;
        }
        let params = self.ctx.params.clone();
        if status.network_id != params.network_id || status.genesis_hash != params.genesis_hash {
            info!(
                peer = %self.ctx.peer,
                network_id = status.network_id,
                "peer on a different network"
            );
            return self.disconnect(DisconnectReason::UselessPeer, false).await;
        }

        match &params.fork_probe {
            Some(probe) => {
                self.phase = PeerState::ForkProbe;
                self.fork_deadline = Some(Instant::now() + FORK_PROBE_TIMEOUT);
                self.send(EthMessage::GetBlockHeaders(GetBlockHeaders::probe(
                    HashOrNumber::Number(probe.height),
                )))
                .await
            }
            None => self.mark_verified().await,
        }
    }

    async fn mark_verified(&mut self) -> Flow {
        self.phase = PeerState::Verified;
        self.refresh_at = Some(Instant::now() + PEER_REFRESH_INTERVAL);
        match self
            .ctx
            .pool_tx
            .send(SessionEvent::Verified(self.ctx.peer))
            .await
        {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }

    async fn handle_fork_probe_reply(&mut self, headers: Vec<Header>) -> Flow {
        self.fork_deadline = None;
        let Some(probe) = self.ctx.params.fork_probe else {
            // probe phase is only entered when probe params exist
            return Flow::Continue;
        };

        let confirmed = headers.len() == 1 && headers[0].hash() == probe.hash;
        if !confirmed {
            info!(
                peer = %self.ctx.peer,
                replied = headers.len(),
                "fork probe mismatch, rejecting peer"
            );
            self.phase = PeerState::Rejected;
            return self.disconnect(DisconnectReason::UselessPeer, false).await;
        }

        debug!(peer = %self.ctx.peer, "fork probe confirmed");
        self.mark_verified().await
    }

    async fn handle_new_block_hashes(&mut self, hashes: Vec<BlockHashNumber>) -> Flow {
        if self.phase != PeerState::Verified {
            debug!(peer = %self.ctx.peer, "block hashes from unverified peer, dropped");
            return Flow::Continue;
        }
        for BlockHashNumber { hash, number } in hashes {
            if self.ctx.state.knows_block(&hex_hash(&hash)) {
                continue;
            }
            debug!(peer = %self.ctx.peer, number, "probing announced block");
            self.pending_hashes.push_back(hash);
            sleep(REQUEST_DELAY).await;
            let flow = self
                .send(EthMessage::GetBlockHeaders(GetBlockHeaders::probe(
                    HashOrNumber::Hash(hash),
                )))
                .await;
            if flow == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    async fn handle_new_block(&mut self, block: Block) -> Flow {
        if self.phase != PeerState::Verified {
            debug!(peer = %self.ctx.peer, "new block from unverified peer, dropped");
            return Flow::Continue;
        }

        let hash = block.hash();
        let senders = match validate_block(&block) {
            Ok(senders) => senders,
            Err(err) => {
                warn!(peer = %self.ctx.peer, %err, "invalid live block");
                return self.disconnect(DisconnectReason::UselessPeer, false).await;
            }
        };

        match check_live(&block.header, &self.ctx.view) {
            LiveVerdict::Valid => {
                self.ctx.view.observe(hash, block.header.clone());
                self.ctx.state.observe_best(BlockRef::new(
                    block.number(),
                    hex_hash(&hash),
                    block.header.timestamp * 1000,
                ));
                self.ctx.state.reset_invalid();
                self.forward_block(block, senders, false).await
            }
            LiveVerdict::GapAhead { from, to } => {
                debug!(peer = %self.ctx.peer, from, to, "tip jumped ahead");
                match self.ctx.rover_tx.send(RoverEvent::Gap { from, to }).await {
                    Ok(()) => Flow::Continue,
                    Err(_) => Flow::Stop,
                }
            }
            LiveVerdict::Invalid => {
                let streak = self.ctx.state.note_invalid();
                warn!(peer = %self.ctx.peer, streak, "live difficulty check failed");
                if streak >= MAX_INVALID_COUNT {
                    self.ctx.state.reset_invalid();
                    return self.disconnect(DisconnectReason::UselessPeer, false).await;
                }
                Flow::Continue
            }
        }
    }

    async fn handle_block_headers(&mut self, headers: Vec<Header>) -> Flow {
        match self.phase {
            PeerState::ForkProbe => return self.handle_fork_probe_reply(headers).await,
            PeerState::Verified => {}
            _ => {
                debug!(peer = %self.ctx.peer, "headers in wrong phase, dropped");
                return Flow::Continue;
            }
        }

        for header in headers {
            let hash = header.hash();
            if self.ctx.state.knows_block(&hex_hash(&hash)) {
                continue;
            }

            let wanted = if self.ctx.state.is_requested(header.number) {
                true
            } else {
                match self.pending_hashes.pop_front() {
                    Some(expected) if expected == hash => true,
                    Some(_) | None => false,
                }
            };
            if !wanted {
                debug!(peer = %self.ctx.peer, number = header.number, "unmatched header, dropped");
                continue;
            }

            sleep(REQUEST_DELAY).await;
            self.pending_headers.push_back(header);
            if self.send(EthMessage::GetBlockBodies(vec![hash])).await == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    async fn handle_block_bodies(&mut self, bodies: Vec<BlockBody>) -> Flow {
        if self.phase != PeerState::Verified {
            debug!(peer = %self.ctx.peer, "bodies in wrong phase, dropped");
            return Flow::Continue;
        }
        if bodies.len() != 1 {
            warn!(peer = %self.ctx.peer, count = bodies.len(), "unexpected body count");
            return self.disconnect(DisconnectReason::UselessPeer, false).await;
        }
        let Some(header) = self.pending_headers.pop_front() else {
            debug!(peer = %self.ctx.peer, "body without a pending header, dropped");
            return Flow::Continue;
        };
        let Some(body) = bodies.into_iter().next() else {
            return Flow::Continue;
        };

        let number = header.number;
        let block = Block::new(header, body);
        match validate_block(&block) {
            Ok(senders) => {
                let from_initial_sync = self.ctx.state.complete_height(number);
                self.forward_block(block, senders, from_initial_sync).await
            }
            Err(err) => {
                warn!(peer = %self.ctx.peer, number, %err, "invalid block body");
                self.disconnect(DisconnectReason::UselessPeer, false).await
            }
        }
    }

    fn handle_transactions(&mut self, txs: Vec<TransactionSigned>) {
        for tx in txs {
            match tx.recover_sender() {
                Ok(_) => {
                    self.ctx.state.check_and_note_tx(&hex_hash(&tx.hash()));
                }
                Err(err) => {
                    debug!(peer = %self.ctx.peer, %err, "announced tx with bad signature");
                }
            }
        }
    }

    async fn serve_block_headers(&mut self, request: GetBlockHeaders) -> Flow {
        let serves_probe = self.ctx.params.fork_probe.as_ref().is_some_and(|probe| {
            matches!(request.start, HashOrNumber::Number(n) if n == probe.height)
                || matches!(request.start, HashOrNumber::Hash(h) if h == probe.hash)
        });
        let reply = if serves_probe {
            vec![dao_fork_header()]
        } else {
            vec![]
        };
        self.send(EthMessage::BlockHeaders(reply)).await
    }

    async fn forward_block(
        &mut self,
        block: Block,
        senders: Vec<Address>,
        from_initial_sync: bool,
    ) -> Flow {
        let data = EthBlockData::new(block, senders);
        match self
            .ctx
            .rover_tx
            .send(RoverEvent::Block {
                block: data,
                from_initial_sync,
            })
            .await
        {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Stop,
        }
    }
}

fn hex_hash(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash))
}
