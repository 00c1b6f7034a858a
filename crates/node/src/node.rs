use std::fs::File;
use std::future::IntoFuture;
use std::io::BufReader;
use std::net::SocketAddr;

use ledger_consensus::storage::{MemLogStore, RaftLogStorage, RocksLogStore};
use ledger_consensus::{RaftEngine, TypeConfig};
use ledger_state_machine::LedgerStateMachine;
use ledger_store::Store;
use ledger_store_memory::MemoryStore;
use ledger_store_rocksdb::{RocksStore, RocksStoreConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::NodeConfig;
use crate::error::{Error, Result};
use crate::handlers::router;
use crate::state::AppState;

/// A running node: raft engine plus both listeners.
pub struct LedgerNode<S: Store> {
    engine: RaftEngine<S>,
    http_addr: SocketAddr,
    raft_addr: SocketAddr,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl<S: Store> LedgerNode<S> {
    /// Restores the local store if asked to, starts raft on `log_store` and
    /// begins serving both listeners.
    ///
    /// # Errors
    ///
    /// Fails if the restore stream is unreadable, a listener cannot bind or
    /// raft cannot start.
    pub async fn start<L>(config: &NodeConfig, store: S, log_store: L) -> Result<Self>
    where
        L: RaftLogStorage<TypeConfig>,
    {
        let ledger = LedgerStateMachine::new(store);

        if let Some(path) = &config.restore_from {
            let file = File::open(path).map_err(|source| Error::RestoreFile {
                path: path.clone(),
                source,
            })?;
            let restored = ledger.restore(BufReader::new(file)).await?;
            info!(path = %path.display(), restored, "restored local store");
        }

        let raft_listener = TcpListener::bind(config.raft_addr)
            .await
            .map_err(|e| Error::Io("failed to bind cluster listener", e))?;
        let raft_addr = raft_listener
            .local_addr()
            .map_err(|e| Error::Io("failed to read cluster listener address", e))?;

        let http_listener = TcpListener::bind(config.http_addr)
            .await
            .map_err(|e| Error::Io("failed to bind client listener", e))?;
        let http_addr = http_listener
            .local_addr()
            .map_err(|e| Error::Io("failed to read client listener address", e))?;

        let engine = RaftEngine::new(
            config.node_id.clone(),
            &config.consensus,
            log_store,
            ledger.clone(),
        )
        .await?;

        let advertise_addr = config
            .advertise_addr
            .clone()
            .unwrap_or_else(|| http_addr.to_string());
        let state = AppState::new(
            engine.clone(),
            ledger,
            advertise_addr,
            config.apply_timeout,
            config.join_timeout,
        );

        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        spawn_server(
            &task_tracker,
            &shutdown_token,
            "cluster",
            raft_listener,
            engine.rpc_router(),
        );
        spawn_server(
            &task_tracker,
            &shutdown_token,
            "client",
            http_listener,
            router(state),
        );
        task_tracker.close();

        if config.bootstrap {
            let raft_address = config
                .advertise_raft_addr
                .clone()
                .unwrap_or_else(|| raft_addr.to_string());
            engine.bootstrap(raft_address).await?;
        }

        info!(node_id = %config.node_id, %http_addr, %raft_addr, "node started");

        Ok(Self {
            engine,
            http_addr,
            raft_addr,
            shutdown_token,
            task_tracker,
        })
    }

    /// The raft engine.
    pub const fn engine(&self) -> &RaftEngine<S> {
        &self.engine
    }

    /// Bound client listener address.
    pub const fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Bound cluster listener address.
    pub const fn raft_addr(&self) -> SocketAddr {
        self.raft_addr
    }

    /// Stops both listeners and the raft engine.
    pub async fn shutdown(&self) {
        info!("node shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        if let Err(e) = self.engine.shutdown().await {
            error!("raft shutdown failed: {e}");
        }

        info!("node shutdown");
    }
}

fn spawn_server(
    task_tracker: &TaskTracker,
    shutdown_token: &CancellationToken,
    name: &'static str,
    listener: TcpListener,
    app: axum::Router,
) {
    let shutdown_token = shutdown_token.clone();
    task_tracker.spawn(async move {
        tokio::select! {
            e = axum::serve(listener, app.into_make_service()).into_future() => {
                info!("{name} listener exited {:?}", e);
            }
            () = shutdown_token.cancelled() => {}
        }
    });
}

/// Runs a node until `shutdown_token` is cancelled.
///
/// With a data directory the ledger and raft log live in RocksDB under
/// `store/` and `raft/`; otherwise both are kept in memory.
///
/// # Errors
///
/// Returns the startup error if the node cannot start.
pub async fn run_node(config: NodeConfig, shutdown_token: CancellationToken) -> Result<()> {
    match &config.data_dir {
        Some(dir) => {
            let store = RocksStore::open(&RocksStoreConfig::new(dir.join("store")))?;
            let log_store = RocksLogStore::open(dir.join("raft"))?;
            let node = LedgerNode::start(&config, store, log_store).await?;
            shutdown_token.cancelled().await;
            node.shutdown().await;
        }
        None => {
            let node = LedgerNode::start(&config, MemoryStore::new(), MemLogStore::new()).await?;
            shutdown_token.cancelled().await;
            node.shutdown().await;
        }
    }

    Ok(())
}
