//! Test doubles for the external layers the manager talks to.
//!
//! These mocks record every call and allow scripted fault injection, so the
//! scenarios can exercise partial failures without any network in the loop.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use laminar_da::{
    DaClient, RetrieveBatchesResult, StatusCode as DaStatusCode,
    SubmitBatchResult as DaSubmitResult,
};
use laminar_executor::{AppError, Application, InitChainResponse};
use laminar_settlement::{
    SettlementBatch, SettlementClient, SettlementError, SettlementEvent,
    StatusCode as SlStatusCode, SubmitBatchResult as SlSubmitResult,
};
use laminar_types::{
    batch::Batch,
    block::Block,
    genesis::Genesis,
    hash::{keccak256, Hash, Hashable},
    signing::PublicKey,
    state::{BlockResponses, State},
};
use tokio::sync::broadcast;

/// Deterministic application: the app hash is a digest chained over every
/// committed block, so producer and follower arrive at identical hashes.
pub struct HashChainApp;

#[async_trait]
impl Application for HashChainApp {
    async fn init_chain(&self, _genesis: &Genesis) -> Result<InitChainResponse, AppError> {
        Ok(InitChainResponse::default())
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

/// In-memory DA layer with scripted failures.
pub struct MockDaClient {
    stored: Mutex<HashMap<u64, Vec<Batch>>>,
    head: AtomicU64,
    fail_submissions: AtomicU32,
    fail_retrievals: AtomicU32,
    retrieval_calls: AtomicU32,
    submissions: Mutex<Vec<Batch>>,
}

impl MockDaClient {
    pub fn new() -> Self {
        Self {
            stored: Mutex::new(HashMap::new()),
            head: AtomicU64::new(0),
            fail_submissions: AtomicU32::new(0),
            fail_retrievals: AtomicU32::new(0),
            retrieval_calls: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `n` submissions time out.
    pub fn fail_next_submissions(&self, n: u32) {
        self.fail_submissions.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` retrievals time out.
    pub fn fail_next_retrievals(&self, n: u32) {
        self.fail_retrievals.store(n, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Batch> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn retrieval_calls(&self) -> u32 {
        self.retrieval_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DaClient for MockDaClient {
    async fn submit_batch(&self, batch: &Batch) -> DaSubmitResult {
        if Self::take_failure(&self.fail_submissions) {
            return DaSubmitResult {
                code: DaStatusCode::Timeout,
                message: "injected submission timeout".to_owned(),
                da_height: 0,
            };
        }

        let da_height = self.head.fetch_add(1, Ordering::SeqCst) + 1;
        self.stored.lock().unwrap().entry(da_height).or_default().push(batch.clone());
        self.submissions.lock().unwrap().push(batch.clone());
        DaSubmitResult { code: DaStatusCode::Success, message: String::new(), da_height }
    }

    async fn retrieve_batches(&self, da_height: u64) -> RetrieveBatchesResult {
        self.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_retrievals) {
            return RetrieveBatchesResult {
                code: DaStatusCode::Timeout,
                message: "injected retrieval timeout".to_owned(),
                batches: Vec::new(),
            };
        }

        match self.stored.lock().unwrap().get(&da_height) {
            Some(batches) => RetrieveBatchesResult {
                code: DaStatusCode::Success,
                message: String::new(),
                batches: batches.clone(),
            },
            None => RetrieveBatchesResult {
                code: DaStatusCode::Error,
                message: format!("nothing stored at DA height {da_height}"),
                batches: Vec::new(),
            },
        }
    }

    fn client_type(&self) -> &'static str {
        "mock"
    }
}

/// Settlement hub with either immediate or manually driven acceptance.
///
/// Manual mode holds every submission in a pending queue until the test
/// calls [`MockSettlementClient::accept_next`], which is how the scenarios
/// delay the acceptance event relative to block production.
pub struct MockSettlementClient {
    proposer: PublicKey,
    auto_accept: bool,
    accepted: Mutex<Vec<SettlementBatch>>,
    pending: Mutex<VecDeque<SettlementBatch>>,
    events: broadcast::Sender<SettlementEvent>,
    submissions: Mutex<Vec<Batch>>,
}

impl MockSettlementClient {
    pub fn new(proposer: PublicKey) -> Self {
        Self::with_mode(proposer, true)
    }

    pub fn manual(proposer: PublicKey) -> Self {
        Self::with_mode(proposer, false)
    }

    fn with_mode(proposer: PublicKey, auto_accept: bool) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            proposer,
            auto_accept,
            accepted: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            events,
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn submissions(&self) -> Vec<Batch> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn accepted_len(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }

    /// Accept the oldest pending submission and publish its event.
    pub fn accept_next(&self) -> bool {
        let Some(mut batch) = self.pending.lock().unwrap().pop_front() else {
            return false;
        };
        let mut accepted = self.accepted.lock().unwrap();
        batch.state_index = accepted.len() as u64 + 1;
        accepted.push(batch.clone());
        drop(accepted);

        let _ = self.events.send(SettlementEvent::NewBatchAccepted {
            start_height: batch.start_height,
            end_height: batch.end_height,
            state_index: batch.state_index,
        });
        true
    }

    /// Re-announce the latest accepted batch. Stands in for whatever
    /// re-drives a stalled follower in production (a fresh acceptance event
    /// or an operator nudge).
    pub fn republish_latest(&self) {
        if let Some(batch) = self.accepted.lock().unwrap().last() {
            let _ = self.events.send(SettlementEvent::NewBatchAccepted {
                start_height: batch.start_height,
                end_height: batch.end_height,
                state_index: batch.state_index,
            });
        }
    }

    fn record(&self, batch: &Batch, da_client: &str, da_height: u64) {
        self.submissions.lock().unwrap().push(batch.clone());
        let meta = SettlementBatch {
            start_height: batch.start_height,
            end_height: batch.end_height,
            state_index: 0,
            da_height,
            da_client: da_client.to_owned(),
        };
        self.pending.lock().unwrap().push_back(meta);
        if self.auto_accept {
            self.accept_next();
        }
    }
}

#[async_trait]
impl SettlementClient for MockSettlementClient {
    async fn submit_batch(
        &self,
        batch: &Batch,
        da_client: &str,
        da_result: &DaSubmitResult,
    ) -> SlSubmitResult {
        if let Err(e) = batch.validate() {
            return SlSubmitResult { code: SlStatusCode::Error, message: e.to_string() };
        }
        self.record(batch, da_client, da_result.da_height);
        SlSubmitResult { code: SlStatusCode::Success, message: String::new() }
    }

    async fn retrieve_latest(&self) -> Result<SettlementBatch, SettlementError> {
        self.accepted.lock().unwrap().last().cloned().ok_or(SettlementError::BatchNotFound)
    }

    async fn retrieve_batch(&self, state_index: u64) -> Result<SettlementBatch, SettlementError> {
        let accepted = self.accepted.lock().unwrap();
        state_index
            .checked_sub(1)
            .and_then(|i| accepted.get(i as usize))
            .cloned()
            .ok_or(SettlementError::BatchNotFound)
    }

    fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.events.subscribe()
    }

    fn proposer(&self) -> PublicKey {
        self.proposer
    }
}
