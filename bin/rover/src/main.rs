//! Rover binary entrypoint: one worker process per observed chain.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use argh::from_env;
use rover_config::Config;
use rover_ethio::{find_free_udp_port, spawn_peer_pool, ChainView, EthDriver, NetworkParams, PoolCtx};
use rover_lskio::{lsk_poll_task, LskApiClient, LskDriver};
use rover_primitives::ChainTag;
use rover_sync::{rover_task, ChainDriver, RequestTracker, RoverCtx, RoverEvent, SyncState};
use rover_unify::{ForeignBlock, SettlementOracle, TxMarker};
use tokio::{runtime, sync::mpsc};
use tracing::{error, info};

use crate::{
    args::Args,
    rpc::{directive_stream_task, ParentCoordinator},
};

mod args;
mod config;
mod errors;
mod logging;
mod rpc;

fn main() {
    let args: Args = from_env();

    // Load config early to initialize logging with config settings
    let config = match config::load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(3);
        }
    };
    logging::init_logging(&config.logging);

    let rt = match runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("rover-rt")
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to build runtime: {err}");
            std::process::exit(3);
        }
    };

    if let Err(err) = rt.block_on(run(args.chain, config)) {
        error!(%err, "rover failed");
        std::process::exit(3);
    }
    info!("exiting rover");
}

async fn run(chain: ChainTag, config: Config) -> Result<()> {
    info!(%chain, network = ?config.client.network, "starting rover");
    match chain {
        ChainTag::Eth => run_eth(config).await,
        ChainTag::Lsk => run_lsk(config).await,
    }
}

async fn run_eth(config: Config) -> Result<()> {
    let params = Arc::new(NetworkParams::for_network(
        config.client.network,
        &config.eth.alt_boot_nodes,
    ));

    // port exhaustion here is the one unrecoverable local startup error
    let discovery_port = find_free_udp_port()?;
    info!(
        discovery_port,
        boot_nodes = params.boot_nodes.len(),
        "discovery bootstrap ready"
    );

    let state = Arc::new(SyncState::new(ChainTag::Eth));
    let view = Arc::new(ChainView::default());
    let (transport_events_tx, transport_events_rx) = mpsc::channel(256);
    let (transport_commands_tx, transport_commands_rx) = mpsc::channel(256);
    let (rover_tx, rover_rx) = mpsc::channel(1024);

    let (pool, pool_task) = spawn_peer_pool(PoolCtx {
        params: params.clone(),
        state: state.clone(),
        view,
        maximum_peers: config.eth.maximum_peers,
        events_rx: transport_events_rx,
        commands_tx: transport_commands_tx,
        rover_tx,
    });
    tokio::spawn(pool_task);

    // TODO: attach the rlpx dialer on the discovery port to the transport
    // seam: feed transport_events_tx from authenticated connections and
    // drain transport_commands_rx for disconnects and bans
    let _transport_seam = (transport_events_tx, transport_commands_rx);

    spawn_status_log(ChainTag::Eth, Some(pool.clone()), state.clone());

    let driver = Arc::new(EthDriver::new(pool, state.clone()));
    let designated = config.eth.designated_wallet.clone();
    run_rover(ChainTag::Eth, driver, state, rover_rx, config, designated).await
}

async fn run_lsk(config: Config) -> Result<()> {
    let client = Arc::new(LskApiClient::new(&config.lsk, config.client.network)?);
    let state = Arc::new(SyncState::new(ChainTag::Lsk));
    let (rover_tx, rover_rx) = mpsc::channel(1024);

    let driver = Arc::new(LskDriver::new(
        client.clone(),
        state.clone(),
        rover_tx.clone(),
    ));
    tokio::spawn(lsk_poll_task(client, state.clone(), rover_tx));
    spawn_status_log(ChainTag::Lsk, None, state.clone());

    let designated = config.lsk.designated_wallet.clone();
    run_rover(ChainTag::Lsk, driver, state, rover_rx, config, designated).await
}

/// Periodic one-line health snapshot of the running rover.
fn spawn_status_log(
    chain: ChainTag,
    pool: Option<rover_ethio::PoolHandle>,
    state: Arc<SyncState>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let best = state.best_seen().map(|block| block.height);
            match &pool {
                Some(pool) => info!(
                    %chain,
                    peers = pool.peer_count(),
                    verified = pool.verified_count(),
                    ?best,
                    requested = state.requested_count(),
                    "rover status"
                ),
                None => info!(
                    %chain,
                    ?best,
                    requested = state.requested_count(),
                    "rover status"
                ),
            }
        }
    });
}

async fn run_rover<B, D>(
    chain: ChainTag,
    driver: Arc<D>,
    state: Arc<SyncState>,
    events_rx: mpsc::Receiver<RoverEvent<B>>,
    config: Config,
    designated_wallet: Option<String>,
) -> Result<()>
where
    B: ForeignBlock + Send + Sync + 'static,
    B::Tx: Sync,
    D: ChainDriver,
{
    let (directives_tx, directives_rx) = mpsc::channel(64);

    let (coordinator, oracle): (
        Option<Arc<ParentCoordinator>>,
        Option<Arc<dyn SettlementOracle>>,
    ) = if config.client.standalone {
        info!(%chain, "standalone mode: blocks are logged, not emitted");
        (None, None)
    } else {
        let parent = ParentCoordinator::connect(&config.client.parent_url).await?;
        tokio::spawn(directive_stream_task(
            parent.clone(),
            chain,
            directives_tx.clone(),
        ));
        (Some(parent.clone()), Some(parent))
    };

    let ctx = RoverCtx {
        driver,
        coordinator,
        marker: TxMarker::new(chain, designated_wallet),
        oracle,
        state,
        directives_rx,
        events_rx,
    };
    let rover = tokio::spawn(rover_task(RequestTracker::new(chain), ctx));

    // held open so a standalone rover idles instead of stopping
    let _directives_guard = directives_tx;

    tokio::select! {
        _ = shutdown_signal() => {
            info!(%chain, "shutdown signal received");
            Ok(())
        }
        joined = rover => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(anyhow!("rover task panicked: {err}")),
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("init: install sigterm handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
