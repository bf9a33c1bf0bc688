use std::sync::{Arc, Mutex};

use color_eyre::eyre::{self, WrapErr};
use laminar_block::Manager;
use laminar_da::{DaClient, LocalDaClient};
use laminar_executor::{Application, InMemoryMempool, Mempool};
use laminar_p2p::{GossipClient, InProcessGossip};
use laminar_settlement::{LocalSettlementClient, SettlementClient};
use laminar_store::{open_database, Store};
use laminar_types::{genesis::Genesis, signing::Ed25519Signer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::NodeConfig;

/// A laminar node: connects all the components and runs the block manager
/// loops.
///
/// The default wiring is fully in-process (local DA, local settlement,
/// loopback gossip); [`Node::with_clients`] lets an embedder swap any of the
/// external layers for real ones.
pub struct Node {
    config: NodeConfig,
    cancel: CancellationToken,
    manager: Arc<Manager>,
    store: Store,
    mempool: Arc<dyn Mempool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    pub async fn new(
        config: NodeConfig,
        genesis: Genesis,
        proposer_key: Ed25519Signer,
        app: Arc<dyn Application>,
    ) -> eyre::Result<Self> {
        let db = open_database(&config.db_path)
            .wrap_err_with(|| format!("failed to open database at {}", config.db_path.display()))?;

        let store = Store::new(Arc::clone(&db)).wrap_err("failed to open store")?;
        let dalc: Arc<dyn DaClient> = Arc::new(
            LocalDaClient::new(db).wrap_err("failed to initialize the local DA client")?,
        );
        let settlement: Arc<dyn SettlementClient> =
            Arc::new(LocalSettlementClient::new(proposer_key.public_key()));
        let gossip: Arc<dyn GossipClient> = Arc::new(InProcessGossip::new());
        let mempool: Arc<dyn Mempool> = Arc::new(InMemoryMempool::new());

        Self::with_clients(config, genesis, proposer_key, app, store, mempool, dalc, settlement, gossip)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn with_clients(
        config: NodeConfig,
        genesis: Genesis,
        proposer_key: Ed25519Signer,
        app: Arc<dyn Application>,
        store: Store,
        mempool: Arc<dyn Mempool>,
        dalc: Arc<dyn DaClient>,
        settlement: Arc<dyn SettlementClient>,
        gossip: Arc<dyn GossipClient>,
    ) -> eyre::Result<Self> {
        let manager = Manager::new(
            proposer_key,
            config.block_manager.clone(),
            genesis,
            store.clone(),
            Arc::clone(&mempool),
            app,
            dalc,
            settlement,
            gossip,
        )
        .await
        .wrap_err("failed to initialize the block manager")?;

        Ok(Self {
            config,
            cancel: CancellationToken::new(),
            manager: Arc::new(manager),
            store,
            mempool,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Launch the manager loops. The producer loop runs only on aggregators.
    pub fn start(&self) {
        let span = tracing::info_span!("node", moniker = %self.config.moniker);
        let _enter = span.enter();
        info!(aggregator = self.config.block_manager.aggregator, "starting node");

        let mut handles = self.handles.lock().expect("handle list poisoned");

        if self.config.block_manager.aggregator {
            let manager = Arc::clone(&self.manager);
            handles.push(tokio::spawn(manager.produce_block_loop(self.cancel.clone())));
        }
        let manager = Arc::clone(&self.manager);
        handles.push(tokio::spawn(manager.retrieve_loop(self.cancel.clone())));
        let manager = Arc::clone(&self.manager);
        handles.push(tokio::spawn(manager.apply_block_loop(self.cancel.clone())));
        let manager = Arc::clone(&self.manager);
        handles.push(tokio::spawn(manager.sync_target_loop(self.cancel.clone())));
    }

    /// Cancel every loop and wait for them to wind down.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.handles.lock().expect("handle list poisoned").drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("node stopped");
    }

    pub fn manager(&self) -> Arc<Manager> {
        Arc::clone(&self.manager)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn mempool(&self) -> Arc<dyn Mempool> {
        Arc::clone(&self.mempool)
    }
}
