//! velvet-daemon: the off-chain coordination daemon for the Velvet
//! NFT collection.
//!
//! Single OS process running a Tokio async runtime. It watches the
//! issuance and rewards chains, keeps the local SQLite cache
//! consistent, serializes all admin transactions through one queue,
//! and answers queries over JSON-RPC on a Unix socket.

mod commands;
mod config;
mod events;
mod rpc;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};
use velvet_chain::{HttpIssuanceChain, HttpRewardsChain, IssuanceChain, RewardsChain};
use velvet_sync::earnings_sync::{EarningsSyncConfig, EarningsSyncService};
use velvet_sync::listener::{EventListener, ListenerConfig};
use velvet_sync::oracle::StubPriceOracle;
use velvet_sync::owner_sync::{OwnerSyncConfig, OwnerSyncService};
use velvet_sync::reconcile::{PendingMintReconciler, ReconcilerConfig};
use velvet_sync::reward_listener::{RewardEventListener, RewardListenerConfig};
use velvet_sync::Db;
use velvet_timereward::TimeRewardTracker;
use velvet_txqueue::{AdminTxQueue, QueueConfig};
use velvet_types::event::EventType;
use velvet_types::{Clock, SystemClock};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Db,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing notifications to subscribers.
    pub event_bus: EventBus,
    /// Issuance chain client.
    pub issuance: Arc<dyn IssuanceChain>,
    /// Rewards chain client.
    pub rewards: Arc<dyn RewardsChain>,
    /// The serialized admin transaction queue.
    pub queue: AdminTxQueue,
    /// Time reward tracker for the special range.
    pub tracker: TimeRewardTracker,
    /// Stub price oracle (APY denomination).
    pub oracle: Arc<StubPriceOracle>,
    /// Owner sync service (shared for forced resyncs).
    pub owner_sync: Arc<OwnerSyncService>,
    /// Earnings sync service (shared for forced recomputes).
    pub earnings_sync: Arc<EarningsSyncService>,
    /// Clock used by RPC handlers.
    pub clock: Arc<dyn Clock>,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("velvet=info".parse()?),
        )
        .init();

    info!("Velvet daemon starting");

    // 1. Load config
    let config = DaemonConfig::load()?;
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("velvet.db");
    let conn = velvet_db::open(&db_path)?;
    let db: Db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Chain clients
    let issuance: Arc<dyn IssuanceChain> =
        Arc::new(HttpIssuanceChain::new(&config.chains.issuance_endpoint)?);
    let rewards: Arc<dyn RewardsChain> =
        Arc::new(HttpRewardsChain::new(&config.chains.rewards_endpoint)?);

    // 4. Event bus, clock, shutdown channel
    let event_bus = EventBus::new(1000);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 5. Admin transaction queue
    let admin = config.admin_address();
    if admin.is_none() {
        info!("admin identity not configured; admin operations will be rejected");
    }
    let queue = AdminTxQueue::new(
        rewards.clone(),
        admin,
        QueueConfig {
            inter_tx_delay: std::time::Duration::from_secs(config.admin.inter_tx_delay_secs),
            confirm_timeout: std::time::Duration::from_secs(config.admin.confirm_timeout_secs),
            ..QueueConfig::default()
        },
    );

    // 6. Tracker and oracle
    let tracker = TimeRewardTracker::new(config.special.range_start, config.special.range_end);
    let oracle = Arc::new(StubPriceOracle::new());

    // 7. Sync services
    let batch_delay = std::time::Duration::from_millis(config.sync.batch_delay_ms);

    let listener = Arc::new(EventListener::new(
        db.clone(),
        issuance.clone(),
        queue.clone(),
        tracker,
        event_bus.sender(),
        clock.clone(),
        ListenerConfig {
            poll_interval: std::time::Duration::from_secs(config.sync.event_poll_secs),
            max_block_range: config.sync.max_block_range,
            start_block: 0,
        },
    ));
    let reconciler = Arc::new(PendingMintReconciler::new(
        listener.clone(),
        ReconcilerConfig::default(),
    ));
    let reward_listener = Arc::new(RewardEventListener::new(
        db.clone(),
        rewards.clone(),
        tracker,
        event_bus.sender(),
        clock.clone(),
        RewardListenerConfig {
            poll_interval: std::time::Duration::from_secs(config.sync.reward_poll_secs),
            max_block_range: config.sync.max_block_range,
            start_block: 0,
        },
    ));
    let owner_sync = Arc::new(OwnerSyncService::new(
        db.clone(),
        issuance.clone(),
        clock.clone(),
        OwnerSyncConfig {
            full_interval: std::time::Duration::from_secs(config.sync.owner_full_secs),
            incremental_interval: std::time::Duration::from_secs(
                config.sync.owner_incremental_secs,
            ),
            batch_size: config.sync.owner_batch_size,
            batch_delay,
        },
    ));
    let earnings_sync = Arc::new(EarningsSyncService::new(
        db.clone(),
        rewards.clone(),
        oracle.clone(),
        event_bus.sender(),
        clock.clone(),
        EarningsSyncConfig {
            interval: std::time::Duration::from_secs(config.sync.earnings_secs),
            batch_size: config.sync.earnings_batch_size,
            batch_delay,
        },
    ));

    tokio::spawn(listener.clone().run(shutdown_tx.subscribe()));
    tokio::spawn(reconciler.run(shutdown_tx.subscribe()));
    tokio::spawn(reward_listener.run(shutdown_tx.subscribe()));
    tokio::spawn(owner_sync.clone().run(shutdown_tx.subscribe()));
    tokio::spawn(earnings_sync.clone().run(shutdown_tx.subscribe()));

    // 8. Build daemon state and start the RPC server
    let state = Arc::new(DaemonState {
        db,
        config,
        event_bus,
        issuance,
        rewards,
        queue,
        tracker,
        oracle,
        owner_sync,
        earnings_sync,
        clock: clock.clone(),
        shutdown_tx: shutdown_tx.clone(),
    });

    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    state.event_bus.emit(
        EventType::DaemonStarted,
        clock.now(),
        serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    );

    // 9. Run until shutdown
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown: clear service timers; in-flight RPC calls
    // complete or fail on their own.
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
