use std::sync::Mutex;

use async_trait::async_trait;
use laminar_da::SubmitBatchResult as DaSubmitResult;
use laminar_types::{batch::Batch, signing::PublicKey};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    SettlementBatch, SettlementClient, SettlementError, SettlementEvent, StatusCode,
    SubmitBatchResult,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// In-process settlement client: accepts every structurally valid batch,
/// assigns monotonic state indexes and publishes acceptance events on a
/// broadcast bus.
pub struct LocalSettlementClient {
    proposer: PublicKey,
    batches: Mutex<Vec<SettlementBatch>>,
    events: broadcast::Sender<SettlementEvent>,
}

impl LocalSettlementClient {
    pub fn new(proposer: PublicKey) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { proposer, batches: Mutex::new(Vec::new()), events }
    }
}

#[async_trait]
impl SettlementClient for LocalSettlementClient {
    async fn submit_batch(
        &self,
        batch: &Batch,
        da_client: &str,
        da_result: &DaSubmitResult,
    ) -> SubmitBatchResult {
        if let Err(e) = batch.validate() {
            return SubmitBatchResult { code: StatusCode::Error, message: e.to_string() };
        }

        let accepted = {
            let mut batches = self.batches.lock().expect("settlement state poisoned");
            let accepted = SettlementBatch {
                start_height: batch.start_height,
                end_height: batch.end_height,
                state_index: batches.len() as u64 + 1,
                da_height: da_result.da_height,
                da_client: da_client.to_owned(),
            };
            batches.push(accepted.clone());
            accepted
        };

        info!(
            start_height = accepted.start_height,
            end_height = accepted.end_height,
            state_index = accepted.state_index,
            "accepted batch"
        );

        // No subscribers is fine; acceptance is already recorded.
        let _ = self.events.send(SettlementEvent::NewBatchAccepted {
            start_height: accepted.start_height,
            end_height: accepted.end_height,
            state_index: accepted.state_index,
        });

        SubmitBatchResult { code: StatusCode::Success, message: String::new() }
    }

    async fn retrieve_latest(&self) -> Result<SettlementBatch, SettlementError> {
        self.batches
            .lock()
            .expect("settlement state poisoned")
            .last()
            .cloned()
            .ok_or(SettlementError::BatchNotFound)
    }

    async fn retrieve_batch(&self, state_index: u64) -> Result<SettlementBatch, SettlementError> {
        let batches = self.batches.lock().expect("settlement state poisoned");
        state_index
            .checked_sub(1)
            .and_then(|i| batches.get(i as usize))
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
