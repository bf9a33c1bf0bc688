#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Settlement layer contract.
//!
//! The settlement layer is the canonical commitment of the chain: a batch
//! exists once the SL has accepted it, and the acceptance event is the
//! authoritative "batch finalized" signal every node keys its sync target
//! off.

mod local;

use async_trait::async_trait;
use laminar_da::SubmitBatchResult as DaSubmitResult;
use laminar_types::{batch::Batch, signing::PublicKey};
use thiserror::Error;
use tokio::sync::broadcast;

pub use local::LocalSettlementClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    Timeout,
    Error,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

#[derive(Clone, Debug)]
pub struct SubmitBatchResult {
    pub code: StatusCode,
    pub message: String,
}

/// Metadata of a batch accepted on the settlement layer. `state_index` is
/// the SL-assigned monotonic index (1-based) used to walk batches in order
/// during sync; `da_height` addresses the batch bytes on the DA layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementBatch {
    pub start_height: u64,
    pub end_height: u64,
    pub state_index: u64,
    pub da_height: u64,
    pub da_client: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementEvent {
    NewBatchAccepted { start_height: u64, end_height: u64, state_index: u64 },
}

#[derive(Debug, Error)]
pub enum SettlementError {
    /// The SL has no batch for this chain (yet). Cold-start signal for the
    /// producer, not a failure.
    #[error("batch not found")]
    BatchNotFound,
    #[error("settlement layer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Record a batch commitment, referencing where its bytes live on DA.
    async fn submit_batch(
        &self,
        batch: &Batch,
        da_client: &str,
        da_result: &DaSubmitResult,
    ) -> SubmitBatchResult;

    async fn retrieve_latest(&self) -> Result<SettlementBatch, SettlementError>;

    async fn retrieve_batch(&self, state_index: u64) -> Result<SettlementBatch, SettlementError>;

    /// Subscribe to batch acceptance events.
    fn subscribe(&self) -> broadcast::Receiver<SettlementEvent>;

    /// Public key of the chain's designated proposer.
    fn proposer(&self) -> PublicKey;
}
