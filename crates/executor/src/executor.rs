use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use laminar_types::{
    block::{Block, Data, Header, NamespaceId},
    commit::{Commit, CommitError},
    genesis::Genesis,
    hash::{Hash, Hashable},
    signing::PublicKey,
    state::{BlockResponses, State},
};
use thiserror::Error;
use tracing::debug;

use crate::{
    app::{AppError, Application, InitChainResponse},
    mempool::Mempool,
};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("block is for chain {got}, expected {expected}")]
    ChainIdMismatch { expected: String, got: String },
    #[error("block height {got} does not follow current height {current}")]
    HeightMismatch { current: u64, got: u64 },
    #[error("block data hash does not match its transactions")]
    DataHashMismatch,
    #[error("invalid commit: {0}")]
    InvalidCommit(#[from] CommitError),
    #[error(transparent)]
    App(#[from] AppError),
}

/// Creates blocks from mempool contents and applies them to the application.
///
/// One executor instance exists per node, owned by the block manager.
pub struct BlockExecutor {
    proposer_address: Vec<u8>,
    namespace_id: NamespaceId,
    chain_id: String,
    mempool: Arc<dyn Mempool>,
    app: Arc<dyn Application>,
}

impl BlockExecutor {
    pub fn new(
        proposer_address: Vec<u8>,
        namespace_id: NamespaceId,
        chain_id: String,
        mempool: Arc<dyn Mempool>,
        app: Arc<dyn Application>,
    ) -> Self {
        Self { proposer_address, namespace_id, chain_id, mempool, app }
    }

    pub async fn init_chain(&self, genesis: &Genesis) -> Result<InitChainResponse, ExecutorError> {
        Ok(self.app.init_chain(genesis).await?)
    }

    /// Build a block at `height` from current mempool contents, bound by the
    /// state's block size limits.
    pub fn create_block(
        &self,
        height: u64,
        last_commit: &Commit,
        last_header_hash: Hash,
        state: &State,
    ) -> Block {
        let txs = self.mempool.reap(state.consensus_params.block.max_bytes);
        debug!(height, num_txs = txs.len(), "assembling block from mempool");

        let data = Data { txs };
        let header = Header {
            chain_id: self.chain_id.clone(),
            height,
            time: unix_now_nanos(),
            namespace_id: self.namespace_id,
            last_header_hash,
            data_hash: data.hash(),
            app_hash: state.app_hash,
            last_results_hash: state.last_results_hash,
            proposer_address: self.proposer_address.clone(),
        };

        Block { header, data, last_commit: last_commit.clone() }
    }

    /// Validate and execute a block against `state`. Pure: neither the store
    /// nor the application is persisted here.
    pub async fn apply_block(
        &self,
        state: &State,
        block: &Block,
        commit: &Commit,
        proposer: &PublicKey,
    ) -> Result<(State, BlockResponses), ExecutorError> {
        self.validate(state, block, commit, proposer)?;

        let responses = self.app.execute_block(state, block).await?;
        let new_state = Self::next_state(state, block, &responses);

        Ok((new_state, responses))
    }

    /// Instruct the application to durably commit the block, then prune its
    /// transactions from the mempool. The returned app hash lands in `state`
    /// and thus in the next block's header.
    pub async fn commit(
        &self,
        state: &mut State,
        block: &Block,
        responses: &BlockResponses,
    ) -> Result<Hash, ExecutorError> {
        let app_hash = self.app.commit(state, block, responses).await?;
        state.app_hash = app_hash;
        self.mempool.remove(&block.data.txs);
        Ok(app_hash)
    }

    fn validate(
        &self,
        state: &State,
        block: &Block,
        commit: &Commit,
        proposer: &PublicKey,
    ) -> Result<(), ExecutorError> {
        if block.header.chain_id != state.chain_id {
            return Err(ExecutorError::ChainIdMismatch {
                expected: state.chain_id.clone(),
                got: block.header.chain_id.clone(),
            });
        }
        if block.header.height != state.last_block_height + 1 {
            return Err(ExecutorError::HeightMismatch {
                current: state.last_block_height,
                got: block.header.height,
            });
        }
        if block.header.data_hash != block.data.hash() {
            return Err(ExecutorError::DataHashMismatch);
        }
        commit.verify(&block.header, proposer)?;
        Ok(())
    }

    fn next_state(state: &State, block: &Block, responses: &BlockResponses) -> State {
        State {
            chain_id: state.chain_id.clone(),
            initial_height: state.initial_height,
            last_block_height: block.header.height,
            consensus_params: state.consensus_params,
            validators: state.next_validators.clone(),
            next_validators: state.next_validators.clone(),
            // The app hash only moves on commit.
            app_hash: state.app_hash,
            last_results_hash: responses.hash(),
            sl_state_index: state.sl_state_index,
        }
    }
}

fn unix_now_nanos() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;
    use laminar_types::{
        hash::keccak256,
        signing::Ed25519Signer,
        validator::{Validator, ValidatorSet},
    };

    use super::*;
    use crate::mempool::InMemoryMempool;

    /// Deterministic app: hashes the chain of applied blocks.
    struct HashChainApp;

    #[async_trait]
    impl Application for HashChainApp {
        async fn init_chain(&self, _genesis: &Genesis) -> Result<InitChainResponse, AppError> {
            Ok(InitChainResponse { app_hash: Some(keccak256(b"genesis")), ..Default::default() })
        }

        async fn execute_block(
            &self,
            _state: &State,
            block: &Block,
        ) -> Result<BlockResponses, AppError> {
            Ok(BlockResponses {
                tx_results: block.data.txs.iter().map(|_| Default::default()).collect(),
            })
        }

        async fn commit(
            &self,
            state: &State,
            block: &Block,
            _responses: &BlockResponses,
        ) -> Result<Hash, AppError> {
            let mut seed = state.app_hash.to_vec();
            seed.extend_from_slice(&block.header.hash());
            Ok(keccak256(&seed))
        }
    }

    fn fixture() -> (BlockExecutor, State, Ed25519Signer, Arc<InMemoryMempool>) {
        let signer = Ed25519Signer::from_bytes([1; 32]);
        let genesis = Genesis {
            chain_id: "test-chain".to_owned(),
            initial_height: 1,
            validator_set: ValidatorSet::new(vec![Validator::new(signer.public_key(), 1)]),
            app_state: Vec::new(),
        };
        let state = State::from_genesis(&genesis);
        let mempool = Arc::new(InMemoryMempool::new());
        let executor = BlockExecutor::new(
            signer.address(),
            [0; 8],
            "test-chain".to_owned(),
            mempool.clone(),
            Arc::new(HashChainApp),
        );
        (executor, state, signer, mempool)
    }

    fn sign_commit(signer: &Ed25519Signer, block: &Block) -> Commit {
        Commit {
            height: block.header.height,
            header_hash: block.header.hash(),
            signatures: vec![signer.sign(&block.header.canonical_bytes())],
        }
    }

    #[tokio::test]
    async fn create_and_apply_first_block() {
        let (executor, state, signer, mempool) = fixture();
        mempool.add_tx(Bytes::from_static(b"tx-1"));
        mempool.add_tx(Bytes::from_static(b"tx-2"));

        let last_commit = Commit::genesis_predecessor(0);
        let block =
            executor.create_block(1, &last_commit, laminar_types::hash::ZERO_HASH, &state);
        assert_eq!(block.data.txs.len(), 2);
        assert_eq!(block.header.data_hash, block.data.hash());

        let commit = sign_commit(&signer, &block);
        let (mut new_state, responses) =
            executor.apply_block(&state, &block, &commit, &signer.public_key()).await.unwrap();

        assert_eq!(new_state.last_block_height, 1);
        assert_eq!(new_state.last_results_hash, responses.hash());
        // App hash moves only on commit.
        assert_eq!(new_state.app_hash, state.app_hash);

        executor.commit(&mut new_state, &block, &responses).await.unwrap();
        assert_ne!(new_state.app_hash, state.app_hash);
        // Committed transactions leave the mempool.
        assert_eq!(mempool.size(), 0);
    }

    #[tokio::test]
    async fn rejects_height_gap() {
        let (executor, state, signer, _mempool) = fixture();
        let block = executor.create_block(
            3,
            &Commit::genesis_predecessor(2),
            laminar_types::hash::ZERO_HASH,
            &state,
        );
        let commit = sign_commit(&signer, &block);

        let err =
            executor.apply_block(&state, &block, &commit, &signer.public_key()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::HeightMismatch { current: 0, got: 3 }));
    }

    #[tokio::test]
    async fn rejects_foreign_proposer() {
        let (executor, state, signer, _mempool) = fixture();
        let block = executor.create_block(
            1,
            &Commit::genesis_predecessor(0),
            laminar_types::hash::ZERO_HASH,
            &state,
        );
        let commit = sign_commit(&signer, &block);
        let other = Ed25519Signer::from_bytes([9; 32]);

        let err =
            executor.apply_block(&state, &block, &commit, &other.public_key()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidCommit(CommitError::InvalidSignature)));
    }
}
