use async_trait::async_trait;
use laminar_types::{
    block::Block,
    genesis::Genesis,
    hash::Hash,
    state::{BlockResponses, ConsensusParams, State},
    validator::Validator,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("application rejected the block: {0}")]
    Rejected(String),
    #[error("application unavailable: {0}")]
    Unavailable(String),
}

/// What the application hands back from `init_chain`. `None` fields keep the
/// genesis-derived defaults.
#[derive(Debug, Default)]
pub struct InitChainResponse {
    pub app_hash: Option<Hash>,
    pub consensus_params: Option<ConsensusParams>,
    pub validators: Vec<Validator>,
}

/// The opaque deterministic state transition function of the chain.
///
/// `execute_block` must be a pure transition: same state and block, same
/// results, no persistence. Durability happens only in `commit`, which
/// returns the application hash that the *next* block's header carries.
#[async_trait]
pub trait Application: Send + Sync {
    async fn init_chain(&self, genesis: &Genesis) -> Result<InitChainResponse, AppError>;

    async fn execute_block(&self, state: &State, block: &Block)
        -> Result<BlockResponses, AppError>;

    async fn commit(
        &self,
        state: &State,
        block: &Block,
        responses: &BlockResponses,
    ) -> Result<Hash, AppError>;
}
