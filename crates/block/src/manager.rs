use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use laminar_da::DaClient;
use laminar_executor::{Application, BlockExecutor, ExecutorError, InitChainResponse, Mempool};
use laminar_p2p::{GossipClient, GossipError, GossipedBlock};
use laminar_settlement::{SettlementClient, SettlementError};
use laminar_store::{Store, StoreError};
use laminar_types::{
    block::Block,
    commit::Commit,
    genesis::Genesis,
    hash::{Hashable, ZERO_HASH},
    signing::Ed25519Signer,
    state::{BlockResponses, State},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, watch, Notify},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BlockManagerConfig, DEFAULT_DA_BLOCK_TIME_MS};

#[derive(Debug, Error)]
pub enum BlockManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Gossip(#[from] GossipError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("DA layer: {0}")]
    DaLayer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cancelled")]
    Cancelled,
}

/// Where a block arriving at the apply path came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSource {
    Produced,
    Gossip,
    Da,
}

impl fmt::Display for BlockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSource::Produced => f.write_str("produced"),
            BlockSource::Gossip => f.write_str("gossip"),
            BlockSource::Da => f.write_str("da"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockMetaData {
    pub(crate) source: BlockSource,
    pub(crate) da_height: u64,
}

/// Aggregates transactions into blocks and keeps the node synced against the
/// settlement layer.
///
/// All height-advancing writes go through [`Manager::apply_block`], which
/// serializes them behind one mutex; `sync_target` and `batch_in_process`
/// are shared with the loops as atomics.
pub struct Manager {
    pub(crate) conf: BlockManagerConfig,
    pub(crate) genesis: Genesis,
    signer: Ed25519Signer,
    pub(crate) store: Store,
    pub(crate) executor: BlockExecutor,
    pub(crate) dalc: Arc<dyn DaClient>,
    pub(crate) settlement: Arc<dyn SettlementClient>,
    gossip: Arc<dyn GossipClient>,

    pub(crate) last_state: RwLock<State>,
    /// Serializes every apply; the single logical writer to height and state.
    apply_guard: tokio::sync::Mutex<()>,
    pub(crate) sync_target: AtomicU64,
    pub(crate) batch_in_process: AtomicBool,
    pub(crate) sync_target_tx: watch::Sender<u64>,
    pub(crate) sync_target_rx: watch::Receiver<u64>,
    pub(crate) synced: Notify,
    /// Reserved for out-of-order block buffering; not populated yet.
    #[allow(dead_code)]
    sync_cache: Mutex<HashMap<u64, Block>>,
}

impl Manager {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        proposer_key: Ed25519Signer,
        conf: BlockManagerConfig,
        genesis: Genesis,
        store: Store,
        mempool: Arc<dyn Mempool>,
        app: Arc<dyn Application>,
        dalc: Arc<dyn DaClient>,
        settlement: Arc<dyn SettlementClient>,
        gossip: Arc<dyn GossipClient>,
    ) -> Result<Self, BlockManagerError> {
        let mut conf = conf;
        if conf.block_batch_size == 0 {
            return Err(BlockManagerError::InvalidConfig(
                "block_batch_size must be at least 1".to_owned(),
            ));
        }
        if conf.da_block_time_ms == 0 {
            warn!(da_block_time_ms = DEFAULT_DA_BLOCK_TIME_MS, "using default DA block time");
            conf.da_block_time_ms = DEFAULT_DA_BLOCK_TIME_MS;
        }

        let mut state = match store.load_state() {
            Ok(state) => state,
            Err(_) => State::from_genesis(&genesis),
        };

        let executor = BlockExecutor::new(
            proposer_key.address(),
            conf.namespace_id,
            genesis.chain_id.clone(),
            mempool,
            app,
        );

        if state.last_block_height + 1 == genesis.initial_height {
            let response = executor.init_chain(&genesis).await?;
            update_state_from_init(&mut state, &response);
            store.update_state(&state)?;
        }

        store.set_height(state.last_block_height);

        let (sync_target_tx, sync_target_rx) = watch::channel(0);

        Ok(Self {
            conf,
            genesis,
            signer: proposer_key,
            store,
            executor,
            dalc,
            settlement,
            gossip,
            last_state: RwLock::new(state),
            apply_guard: tokio::sync::Mutex::new(()),
            sync_target: AtomicU64::new(0),
            batch_in_process: AtomicBool::new(false),
            sync_target_tx,
            sync_target_rx,
            synced: Notify::new(),
            sync_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Current chain height as visible to the rest of the node.
    pub fn height(&self) -> u64 {
        self.store.height()
    }

    /// End height of the most recent settlement batch known to this node.
    pub fn sync_target(&self) -> u64 {
        self.sync_target.load(Ordering::SeqCst)
    }

    /// Snapshot of the manager's state after the last applied block.
    pub fn last_state(&self) -> State {
        self.last_state.read().expect("state lock poisoned").clone()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Producer loop. Blocks until the node has caught up with the
    /// settlement layer, then produces on the configured cadence.
    pub async fn produce_block_loop(self: Arc<Self>, cancel: CancellationToken) {
        match self.wait_for_sync(&cancel).await {
            Err(BlockManagerError::Cancelled) => return,
            Err(e) => error!(error = %e, "failed to wait for sync"),
            Ok(()) => {}
        }

        if self.conf.block_time().is_zero() {
            // Back-to-back production; the operator pairs this with mempool
            // backpressure.
            while !cancel.is_cancelled() {
                if let Err(e) = self.produce_block(&cancel).await {
                    error!(error = %e, "error while producing block");
                }
            }
            return;
        }

        let mut ticker = tokio::time::interval(self.conf.block_time());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately; consume it so the
        // first block lands one period from now.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = self.produce_block(&cancel).await {
                        error!(error = %e, "error while producing block");
                    }
                }
            }
        }
    }

    /// Applier loop: the followers' primary path. Applies every decodable
    /// gossiped block; per-event failures are skipped.
    pub async fn apply_block_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut subscription = self.gossip.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = subscription.recv() => match event {
                    Ok(frame) => {
                        let gossiped = match GossipedBlock::from_bytes(&frame) {
                            Ok(gossiped) => gossiped,
                            Err(e) => {
                                warn!(error = %e, "discarding undecodable gossip frame");
                                continue;
                            }
                        };
                        debug!(height = gossiped.block.header.height, "received gossiped block");
                        let meta = BlockMetaData { source: BlockSource::Gossip, da_height: 0 };
                        if let Err(e) =
                            self.apply_block(&gossiped.block, &gossiped.commit, meta).await
                        {
                            debug!(
                                height = gossiped.block.header.height,
                                error = %e,
                                "skipping gossiped block"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "gossip subscription lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("gossip subscription closed");
                        return;
                    }
                }
            }
        }
    }

    pub(crate) async fn produce_block(
        self: &Arc<Self>,
        cancel: &CancellationToken,
    ) -> Result<(), BlockManagerError> {
        let height = self.store.height();
        let new_height = height + 1;

        // The first block has no predecessor to point at.
        let (last_commit, last_header_hash) = if new_height == self.genesis.initial_height {
            (Commit::genesis_predecessor(height), ZERO_HASH)
        } else {
            let last_commit = self.store.load_commit(height)?;
            let last_block = self.store.load_block(height)?;
            (last_commit, last_block.header.hash())
        };

        // A block already stored at the new height means a previous run went
        // down between saving and advancing; reuse it, do not re-sign.
        let (block, commit) = match self.store.load_block(new_height) {
            Ok(pending) => {
                info!(height = new_height, "using pending block");
                let commit = self.store.load_commit(new_height).map_err(|e| {
                    error!(
                        height = new_height,
                        error = %e,
                        "loaded pending block but failed to load its commit"
                    );
                    e
                })?;
                (pending, commit)
            }
            Err(StoreError::NotFound { .. }) => {
                info!(height = new_height, "creating block");
                let state = self.last_state();
                let block =
                    self.executor.create_block(new_height, &last_commit, last_header_hash, &state);
                debug!(height = new_height, num_txs = block.data.txs.len(), "block info");

                let signature = self.signer.sign(&block.header.canonical_bytes());
                let commit = Commit {
                    height: new_height,
                    header_hash: block.header.hash(),
                    signatures: vec![signature],
                };
                (block, commit)
            }
            Err(e) => return Err(e.into()),
        };

        // Gossip the block as soon as it is produced.
        self.gossip_block(&block, &commit).await?;

        let meta = BlockMetaData { source: BlockSource::Produced, da_height: 0 };
        self.apply_block(&block, &commit, meta).await?;

        // Submit a batch once enough blocks have accumulated past the sync
        // target and no other submission is in flight. The flag is released
        // by the sync-target loop when the SL acceptance event arrives.
        let sync_target = self.sync_target.load(Ordering::SeqCst);
        if block.header.height.saturating_sub(sync_target) >= self.conf.block_batch_size
            && self
                .batch_in_process
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            let manager = Arc::clone(self);
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.submit_next_batch(cancel).await });
        }

        Ok(())
    }

    /// The single chokepoint for height advancement, shared by the producer,
    /// applier and retrieve paths.
    ///
    /// The application commit and the store batch commit are separate
    /// durability points: a crash between them leaves the application one
    /// block ahead of the store, and recovery relies on the duplicate guard
    /// plus idempotent re-apply rather than a reconciliation routine.
    pub(crate) async fn apply_block(
        &self,
        block: &Block,
        commit: &Commit,
        meta: BlockMetaData,
    ) -> Result<(), BlockManagerError> {
        let _guard = self.apply_guard.lock().await;

        let height = block.header.height;
        if height <= self.store.height() {
            // Duplicate; another path already applied it.
            return Ok(());
        }

        match meta.source {
            BlockSource::Da => {
                info!(height, source = %meta.source, da_height = meta.da_height, "applying block");
            }
            _ => info!(height, source = %meta.source, "applying block"),
        }

        self.store.save_block(block, commit).map_err(|e| {
            error!(height, error = %e, "failed to save block");
            e
        })?;

        let last_state = self.last_state();
        let proposer = self.settlement.proposer();

        // Apply the block but do not commit the application yet.
        let (mut new_state, responses) = self
            .executor
            .apply_block(&last_state, block, commit, &proposer)
            .await
            .map_err(|e| {
                error!(height, error = %e, "failed to apply block");
                e
            })?;

        // Instruct the application to persist.
        self.executor.commit(&mut new_state, block, &responses).await.map_err(|e| {
            error!(height, error = %e, "failed to commit block to the application");
            e
        })?;

        if let Err(e) = self.persist_apply(height, &new_state, &responses) {
            error!(height, error = %e, "failed to persist batch to disk");
            return Err(e);
        }

        // The visible height advances only after the store batch committed.
        self.store.set_height(height);

        Ok(())
    }

    /// One atomic store batch: responses, state, validators. `last_state`
    /// is replaced here, after the executor accepted the block.
    fn persist_apply(
        &self,
        height: u64,
        new_state: &State,
        responses: &BlockResponses,
    ) -> Result<(), BlockManagerError> {
        let mut batch = self.store.new_batch()?;

        if let Err(e) = batch.save_block_responses(height, responses) {
            batch.discard();
            return Err(e.into());
        }

        *self.last_state.write().expect("state lock poisoned") = new_state.clone();

        if let Err(e) = batch.update_state(new_state) {
            batch.discard();
            return Err(e.into());
        }
        if let Err(e) = batch.save_validators(height, &new_state.validators) {
            batch.discard();
            return Err(e.into());
        }

        batch.commit()?;
        Ok(())
    }

    async fn gossip_block(&self, block: &Block, commit: &Commit) -> Result<(), BlockManagerError> {
        let frame =
            GossipedBlock { block: block.clone(), commit: commit.clone() }.to_bytes();
        self.gossip.gossip_block(frame).await.map_err(|e| {
            error!(height = block.header.height, error = %e, "failed to gossip block");
            e
        })?;
        Ok(())
    }
}

/// Fold the application's `init_chain` response into the genesis state.
fn update_state_from_init(state: &mut State, response: &InitChainResponse) {
    if let Some(app_hash) = response.app_hash {
        state.app_hash = app_hash;
    }
    if let Some(params) = response.consensus_params {
        state.consensus_params = params;
    }
    if !response.validators.is_empty() {
        let set = laminar_types::validator::ValidatorSet::new(response.validators.clone());
        state.validators = set.clone();
        state.next_validators = set;
    }
    state.last_results_hash = BlockResponses::default().hash();
}
