use bytes::Bytes;

use crate::{
    codec,
    genesis::Genesis,
    hash::{Hash, Hashable, ZERO_HASH},
    validator::ValidatorSet,
};

/// Block-level limits handed to the application when building blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockParams {
    pub max_bytes: i64,
    pub max_gas: i64,
}

impl Default for BlockParams {
    fn default() -> Self {
        // 21 MiB block ceiling, unmetered gas.
        Self { max_bytes: 22_020_096, max_gas: -1 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsensusParams {
    pub block: BlockParams,
    pub app_version: u64,
}

/// Result of executing a single transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxResult {
    pub code: u32,
    pub data: Bytes,
    pub log: String,
}

impl TxResult {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Per-block execution results, persisted next to the block they belong to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockResponses {
    pub tx_results: Vec<TxResult>,
}

impl Hashable for BlockResponses {
    type Output = Hash;

    fn hash(&self) -> Hash {
        crate::hash::keccak256(&codec::responses_to_bytes(self))
    }
}

/// Application-facing summary of the chain after the last applied block.
///
/// Owned exclusively by the block manager; every mutation flows through the
/// apply path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    pub chain_id: String,
    pub initial_height: u64,
    pub last_block_height: u64,
    pub consensus_params: ConsensusParams,
    pub validators: ValidatorSet,
    pub next_validators: ValidatorSet,
    pub app_hash: Hash,
    pub last_results_hash: Hash,
    /// Index of the most recently applied settlement batch. Monotonic.
    pub sl_state_index: u64,
}

impl State {
    /// Fresh state for a chain that has never applied a block. The first
    /// block to apply is `genesis.initial_height`.
    pub fn from_genesis(genesis: &Genesis) -> Self {
        Self {
            chain_id: genesis.chain_id.clone(),
            initial_height: genesis.initial_height,
            last_block_height: genesis.initial_height.saturating_sub(1),
            consensus_params: ConsensusParams::default(),
            validators: genesis.validator_set.clone(),
            next_validators: genesis.validator_set.clone(),
            app_hash: ZERO_HASH,
            last_results_hash: ZERO_HASH,
            sl_state_index: 0,
        }
    }
}
