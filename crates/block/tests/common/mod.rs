#![allow(dead_code)] // not every scenario binary uses every helper

//! Shared helpers for the block manager scenarios.
//!
//! Every test owns a temporary environment and spins real managers over
//! mocked external layers; several nodes in one test share the same DA,
//! settlement and gossip instances, which is exactly the topology of one
//! sequencer chain.

pub mod mocks;

use std::{sync::Arc, time::Duration};

use laminar_block::{BlockManagerConfig, Manager};
use laminar_executor::InMemoryMempool;
use laminar_p2p::InProcessGossip;
use laminar_store::Store;
use laminar_types::{
    genesis::Genesis,
    signing::Ed25519Signer,
    validator::{Validator, ValidatorSet},
};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use self::mocks::{HashChainApp, MockDaClient, MockSettlementClient};

pub const PROPOSER_SEED: [u8; 32] = [11; 32];

pub fn proposer() -> Ed25519Signer {
    Ed25519Signer::from_bytes(PROPOSER_SEED)
}

pub fn test_genesis() -> Genesis {
    Genesis {
        chain_id: "test-chain".to_owned(),
        initial_height: 1,
        validator_set: ValidatorSet::new(vec![Validator::new(proposer().public_key(), 1)]),
        app_state: Vec::new(),
    }
}

/// One chain-wide environment: shared DA, settlement and gossip.
pub struct Harness {
    pub dir: TempDir,
    pub da: Arc<MockDaClient>,
    pub settlement: Arc<MockSettlementClient>,
    pub gossip: Arc<InProcessGossip>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settlement(MockSettlementClient::new(proposer().public_key()))
    }

    pub fn manual_acceptance() -> Self {
        Self::with_settlement(MockSettlementClient::manual(proposer().public_key()))
    }

    fn with_settlement(settlement: MockSettlementClient) -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            da: Arc::new(MockDaClient::new()),
            settlement: Arc::new(settlement),
            gossip: Arc::new(InProcessGossip::new()),
        }
    }

    /// Open (or re-open) the store for a named node without starting it.
    ///
    /// redb holds an exclusive lock per database file, and a stopped node
    /// may still be winding down a spawned submitter that pins its handle;
    /// retry briefly instead of racing it.
    pub async fn open_store(&self, name: &str) -> Store {
        let path = self.dir.path().join(format!("{name}.db"));
        for _ in 0..500 {
            if let Ok(store) = Store::open(&path) {
                return store;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("could not open store for node {name}");
    }

    /// Build and launch a manager for a named node. Reusing a name reuses
    /// its database, which is how restarts are simulated.
    pub async fn start_node(&self, name: &str, conf: BlockManagerConfig) -> RunningNode {
        let store = self.open_store(name).await;
        let mempool = Arc::new(InMemoryMempool::new());
        let aggregator = conf.aggregator;

        let manager = Manager::new(
            proposer(),
            conf,
            test_genesis(),
            store.clone(),
            mempool.clone(),
            Arc::new(HashChainApp),
            self.da.clone(),
            self.settlement.clone(),
            self.gossip.clone(),
        )
        .await
        .expect("initialize manager");
        let manager = Arc::new(manager);

        let cancel = CancellationToken::new();
        let mut handles = Vec::new();
        if aggregator {
            handles.push(tokio::spawn(
                Arc::clone(&manager).produce_block_loop(cancel.clone()),
            ));
        }
        handles.push(tokio::spawn(Arc::clone(&manager).retrieve_loop(cancel.clone())));
        handles.push(tokio::spawn(Arc::clone(&manager).apply_block_loop(cancel.clone())));
        handles.push(tokio::spawn(Arc::clone(&manager).sync_target_loop(cancel.clone())));

        RunningNode { manager, store, mempool, cancel, handles: std::sync::Mutex::new(handles) }
    }
}

pub struct RunningNode {
    pub manager: Arc<Manager>,
    pub store: Store,
    pub mempool: Arc<InMemoryMempool>,
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl RunningNode {
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub async fn wait_for_height(&self, height: u64) {
        let store = self.store.clone();
        wait_until(format!("height {height}"), move || store.height() >= height).await;
    }
}

pub fn aggregator_config(block_time_ms: u64, block_batch_size: u64) -> BlockManagerConfig {
    BlockManagerConfig {
        block_time_ms,
        da_block_time_ms: 100,
        block_batch_size,
        namespace_id: [0; 8],
        aggregator: true,
    }
}

pub fn follower_config(block_batch_size: u64) -> BlockManagerConfig {
    BlockManagerConfig { aggregator: false, ..aggregator_config(0, block_batch_size) }
}

/// Poll `cond` until it holds, with a generous ceiling so slow CI does not
/// flake.
pub async fn wait_until(what: impl Into<String>, mut cond: impl FnMut() -> bool) {
    let what = what.into();
    tokio::time::timeout(Duration::from_secs(15), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}
