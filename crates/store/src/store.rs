use std::{
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use laminar_types::{
    block::Block,
    codec::{self, CodecError},
    commit::Commit,
    state::{BlockResponses, State},
    validator::ValidatorSet,
};
use redb::{ReadableTable, TableDefinition};
use thiserror::Error;

const BLOCKS_TABLE: TableDefinition<u64, Vec<u8>> = TableDefinition::new("blocks");
const COMMITS_TABLE: TableDefinition<u64, Vec<u8>> = TableDefinition::new("commits");
const RESPONSES_TABLE: TableDefinition<u64, Vec<u8>> = TableDefinition::new("block_responses");
const VALIDATORS_TABLE: TableDefinition<u64, Vec<u8>> = TableDefinition::new("validators");
const STATE_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("state");

const STATE_KEY: &str = "state";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("failed to encode/decode stored value: {0}")]
    Codec(#[from] CodecError),

    #[error("no {what} found at height {height}")]
    NotFound { what: &'static str, height: u64 },

    #[error("no state stored")]
    NoState,
}

/// Open (or create) the shared node database.
pub fn open_database(path: impl AsRef<Path>) -> Result<Arc<redb::Database>, StoreError> {
    Ok(Arc::new(redb::Database::create(path)?))
}

/// Typed facade over the block manager's tables.
///
/// The visible chain height is an in-memory atomic: it is advanced by the
/// apply path only after a successful batch commit and re-seeded from the
/// persisted state on startup.
#[derive(Clone)]
pub struct Store {
    db: Arc<redb::Database>,
    height: Arc<AtomicU64>,
}

impl Store {
    pub fn new(db: Arc<redb::Database>) -> Result<Self, StoreError> {
        let store = Self { db, height: Arc::new(AtomicU64::new(0)) };
        store.create_tables()?;
        Ok(store)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(open_database(path)?)
    }

    /// Handle to the underlying database, for components that keep their own
    /// tables next to the manager's.
    pub fn database(&self) -> Arc<redb::Database> {
        Arc::clone(&self.db)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;

        // Implicitly creates the tables if they do not exist yet
        let _ = tx.open_table(BLOCKS_TABLE)?;
        let _ = tx.open_table(COMMITS_TABLE)?;
        let _ = tx.open_table(RESPONSES_TABLE)?;
        let _ = tx.open_table(VALIDATORS_TABLE)?;
        let _ = tx.open_table(STATE_TABLE)?;

        tx.commit()?;

        Ok(())
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Persist a block and its commit in one write transaction.
    pub fn save_block(&self, block: &Block, commit: &Commit) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut blocks = tx.open_table(BLOCKS_TABLE)?;
            blocks.insert(block.header.height, codec::block_to_bytes(block).to_vec())?;

            let mut commits = tx.open_table(COMMITS_TABLE)?;
            commits.insert(commit.height, codec::commit_to_bytes(commit).to_vec())?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_block(&self, height: u64) -> Result<Block, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(BLOCKS_TABLE)?;
        let value =
            table.get(&height)?.ok_or(StoreError::NotFound { what: "block", height })?;
        Ok(codec::block_from_bytes(&value.value())?)
    }

    pub fn load_commit(&self, height: u64) -> Result<Commit, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(COMMITS_TABLE)?;
        let value =
            table.get(&height)?.ok_or(StoreError::NotFound { what: "commit", height })?;
        Ok(codec::commit_from_bytes(&value.value())?)
    }

    pub fn load_block_responses(&self, height: u64) -> Result<BlockResponses, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RESPONSES_TABLE)?;
        let value =
            table.get(&height)?.ok_or(StoreError::NotFound { what: "block responses", height })?;
        Ok(codec::responses_from_bytes(&value.value())?)
    }

    pub fn load_validators(&self, height: u64) -> Result<ValidatorSet, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(VALIDATORS_TABLE)?;
        let value =
            table.get(&height)?.ok_or(StoreError::NotFound { what: "validators", height })?;
        Ok(codec::validator_set_from_bytes(&value.value())?)
    }

    pub fn load_state(&self) -> Result<State, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(STATE_TABLE)?;
        let value = table.get(STATE_KEY)?.ok_or(StoreError::NoState)?;
        Ok(codec::state_from_bytes(&value.value())?)
    }

    /// Persist state outside of a batch, in its own transaction.
    pub fn update_state(&self, state: &State) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(STATE_TABLE)?;
            table.insert(STATE_KEY, codec::state_to_bytes(state).to_vec())?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Begin a write batch covering multiple saves. Dropping the batch
    /// without calling [`StoreBatch::commit`] discards every write in it.
    pub fn new_batch(&self) -> Result<StoreBatch, StoreError> {
        Ok(StoreBatch { tx: self.db.begin_write()? })
    }
}

/// A single atomic write transaction over the manager's tables.
pub struct StoreBatch {
    tx: redb::WriteTransaction,
}

impl StoreBatch {
    pub fn save_block(&mut self, block: &Block, commit: &Commit) -> Result<(), StoreError> {
        let mut blocks = self.tx.open_table(BLOCKS_TABLE)?;
        blocks.insert(block.header.height, codec::block_to_bytes(block).to_vec())?;

        let mut commits = self.tx.open_table(COMMITS_TABLE)?;
        commits.insert(commit.height, codec::commit_to_bytes(commit).to_vec())?;
        Ok(())
    }

    pub fn save_block_responses(
        &mut self,
        height: u64,
        responses: &BlockResponses,
    ) -> Result<(), StoreError> {
        let mut table = self.tx.open_table(RESPONSES_TABLE)?;
        table.insert(height, codec::responses_to_bytes(responses).to_vec())?;
        Ok(())
    }

    pub fn update_state(&mut self, state: &State) -> Result<(), StoreError> {
        let mut table = self.tx.open_table(STATE_TABLE)?;
        table.insert(STATE_KEY, codec::state_to_bytes(state).to_vec())?;
        Ok(())
    }

    pub fn save_validators(
        &mut self,
        height: u64,
        validators: &ValidatorSet,
    ) -> Result<(), StoreError> {
        let mut table = self.tx.open_table(VALIDATORS_TABLE)?;
        table.insert(height, codec::validator_set_to_bytes(validators).to_vec())?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    /// Explicitly drop the batch. Dropping without commit has the same
    /// effect; this spells it out at call sites.
    pub fn discard(self) {
        drop(self.tx);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use laminar_types::{
        block::{Data, Header},
        genesis::Genesis,
        hash::Hashable,
        signing::Ed25519Signer,
        validator::{Validator, ValidatorSet},
    };

    use super::*;

    fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Store::open(dir.path().join("store.db")).expect("open store");
        (store, dir)
    }

    fn sample_block(height: u64) -> (Block, Commit) {
        let signer = Ed25519Signer::from_bytes([2; 32]);
        let data = Data { txs: vec![Bytes::from_static(b"tx")] };
        let header = Header {
            chain_id: "test-chain".to_owned(),
            height,
            data_hash: data.hash(),
            proposer_address: signer.address(),
            ..Default::default()
        };
        let commit = Commit {
            height,
            header_hash: header.hash(),
            signatures: vec![signer.sign(&header.canonical_bytes())],
        };
        (Block { header, data, last_commit: Commit::default() }, commit)
    }

    fn sample_state() -> State {
        let key = Ed25519Signer::from_bytes([2; 32]).public_key();
        State::from_genesis(&Genesis {
            chain_id: "test-chain".to_owned(),
            initial_height: 1,
            validator_set: ValidatorSet::new(vec![Validator::new(key, 1)]),
            app_state: Vec::new(),
        })
    }

    #[test]
    fn save_and_load_block() {
        let (store, _dir) = test_store();
        let (block, commit) = sample_block(5);

        store.save_block(&block, &commit).unwrap();

        assert_eq!(store.load_block(5).unwrap(), block);
        assert_eq!(store.load_commit(5).unwrap(), commit);
    }

    #[test]
    fn missing_block_is_not_found() {
        let (store, _dir) = test_store();
        assert!(matches!(
            store.load_block(9),
            Err(StoreError::NotFound { what: "block", height: 9 })
        ));
    }

    #[test]
    fn state_roundtrip() {
        let (store, _dir) = test_store();
        assert!(matches!(store.load_state(), Err(StoreError::NoState)));

        let mut state = sample_state();
        state.last_block_height = 3;
        state.sl_state_index = 1;
        store.update_state(&state).unwrap();

        assert_eq!(store.load_state().unwrap(), state);
    }

    #[test]
    fn batch_commit_is_atomic() {
        let (store, _dir) = test_store();
        let state = sample_state();

        // A discarded batch leaves no trace.
        let mut batch = store.new_batch().unwrap();
        batch.save_block_responses(1, &BlockResponses::default()).unwrap();
        batch.update_state(&state).unwrap();
        batch.discard();

        assert!(store.load_block_responses(1).is_err());
        assert!(matches!(store.load_state(), Err(StoreError::NoState)));

        // A committed batch persists every write.
        let mut batch = store.new_batch().unwrap();
        batch.save_block_responses(1, &BlockResponses::default()).unwrap();
        batch.update_state(&state).unwrap();
        batch.save_validators(1, &state.validators).unwrap();
        batch.commit().unwrap();

        assert_eq!(store.load_block_responses(1).unwrap(), BlockResponses::default());
        assert_eq!(store.load_state().unwrap(), state);
        assert_eq!(store.load_validators(1).unwrap(), state.validators);
    }

    #[test]
    fn height_is_in_memory_until_set() {
        let (store, _dir) = test_store();
        assert_eq!(store.height(), 0);
        store.set_height(4);
        assert_eq!(store.height(), 4);
    }

    #[test]
    fn blocks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let (block, commit) = sample_block(2);

        {
            let store = Store::open(&path).unwrap();
            store.save_block(&block, &commit).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.load_block(2).unwrap(), block);
    }
}
