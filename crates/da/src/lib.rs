#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Data availability layer contract.
//!
//! The DA layer durably stores batch bytes addressable by a DA height. The
//! block manager treats it as a status-code interface rather than a `Result`
//! one: a non-success code is a retriable condition, not a type error.

mod local;

use async_trait::async_trait;
use laminar_types::batch::Batch;

pub use local::{LocalDaClient, LocalDaError};

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

/// Outcome of submitting a batch: on success, `da_height` addresses the
/// batch for later retrieval and is recorded on the settlement layer.
#[derive(Clone, Debug)]
pub struct SubmitBatchResult {
    pub code: StatusCode,
    pub message: String,
    pub da_height: u64,
}

/// Outcome of retrieval. One DA height may hold several batches; they are
/// returned in submission order.
#[derive(Clone, Debug)]
pub struct RetrieveBatchesResult {
    pub code: StatusCode,
    pub message: String,
    pub batches: Vec<Batch>,
}

#[async_trait]
pub trait DaClient: Send + Sync {
    async fn submit_batch(&self, batch: &Batch) -> SubmitBatchResult;

    async fn retrieve_batches(&self, da_height: u64) -> RetrieveBatchesResult;

    /// Opaque tag identifying the DA backend, recorded with every settlement
    /// submission.
    fn client_type(&self) -> &'static str;
}
