use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use laminar_types::{
    batch::Batch,
    codec::{self, CodecError},
};
use redb::{ReadableTable, TableDefinition};
use thiserror::Error;
use tracing::debug;

use crate::{DaClient, RetrieveBatchesResult, StatusCode, SubmitBatchResult};

const DA_BATCHES_TABLE: TableDefinition<u64, Vec<u8>> = TableDefinition::new("da_batches");

#[derive(Debug, Error)]
pub enum LocalDaError {
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("failed to decode stored batch: {0}")]
    Codec(#[from] CodecError),
}

/// In-process DA client backed by its own table in the shared node database.
///
/// Every submission is assigned the next DA height. Mirrors the contract of
/// a remote DA network closely enough for single-node deployments and tests:
/// submissions are durable and retrievable by height after restart.
pub struct LocalDaClient {
    db: Arc<redb::Database>,
    head: AtomicU64,
}

impl LocalDaClient {
    pub fn new(db: Arc<redb::Database>) -> Result<Self, LocalDaError> {
        let tx = db.begin_write()?;
        let head = {
            let table = tx.open_table(DA_BATCHES_TABLE)?;
            let last = table.last()?.map(|(key, _)| key.value()).unwrap_or(0);
            last
        };
        tx.commit()?;

        Ok(Self { db, head: AtomicU64::new(head) })
    }

    fn store_batch(&self, batch: &Batch) -> Result<u64, LocalDaError> {
        let da_height = self.head.load(Ordering::SeqCst) + 1;
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(DA_BATCHES_TABLE)?;
            table.insert(da_height, codec::batch_to_bytes(batch).to_vec())?;
        }
        tx.commit()?;
        self.head.store(da_height, Ordering::SeqCst);
        Ok(da_height)
    }

    fn load_batches(&self, da_height: u64) -> Result<Option<Batch>, LocalDaError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(DA_BATCHES_TABLE)?;
        let Some(value) = table.get(&da_height)? else {
            return Ok(None);
        };
        Ok(Some(codec::batch_from_bytes(&value.value())?))
    }
}

#[async_trait]
impl DaClient for LocalDaClient {
    async fn submit_batch(&self, batch: &Batch) -> SubmitBatchResult {
        match self.store_batch(batch) {
            Ok(da_height) => {
                debug!(
                    start_height = batch.start_height,
                    end_height = batch.end_height,
                    da_height,
                    "stored batch"
                );
                SubmitBatchResult { code: StatusCode::Success, message: String::new(), da_height }
            }
            Err(e) => SubmitBatchResult {
                code: StatusCode::Error,
                message: e.to_string(),
                da_height: 0,
            },
        }
    }

    async fn retrieve_batches(&self, da_height: u64) -> RetrieveBatchesResult {
        match self.load_batches(da_height) {
            Ok(Some(batch)) => RetrieveBatchesResult {
                code: StatusCode::Success,
                message: String::new(),
                batches: vec![batch],
            },
            Ok(None) => RetrieveBatchesResult {
                code: StatusCode::Error,
                message: format!("no batch stored at DA height {da_height}"),
                batches: Vec::new(),
            },
            Err(e) => RetrieveBatchesResult {
                code: StatusCode::Error,
                message: e.to_string(),
                batches: Vec::new(),
            },
        }
    }

    fn client_type(&self) -> &'static str {
        "local"
    }
}
