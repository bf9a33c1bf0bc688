use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use laminar_da::SubmitBatchResult as DaSubmitResult;
use laminar_settlement::SubmitBatchResult as SlSubmitResult;
use laminar_types::batch::Batch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::manager::{BlockManagerError, Manager};

/// First retry delay; doubles per attempt up to the DA block time.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

impl Manager {
    /// Carry the next finished batch to DA and then to the settlement
    /// layer. Runs as a short-lived spawned task; `batch_in_process` stays
    /// set for its whole lifetime and beyond, until the SL acceptance event
    /// is observed by the sync-target loop.
    pub(crate) async fn submit_next_batch(self: Arc<Self>, cancel: CancellationToken) {
        let start_height = self.sync_target.load(Ordering::SeqCst) + 1;
        let end_height = start_height + self.conf.block_batch_size - 1;
        info!(start_height, end_height, "submitting next batch");

        let batch = match self.create_next_da_batch(start_height, end_height) {
            Ok(batch) => batch,
            Err(e) => {
                error!(start_height, end_height, error = %e, "failed to create next batch");
                return;
            }
        };

        let Some(da_result) = self.submit_batch_to_da(&cancel, &batch).await else {
            return;
        };

        self.submit_batch_to_sl(&cancel, &batch, &da_result).await;
    }

    /// Load `[start_height..=end_height]` out of the store. Every block in
    /// the range is already applied and persisted; a missing one is a bug,
    /// so this fails fast instead of retrying.
    fn create_next_da_batch(
        &self,
        start_height: u64,
        end_height: u64,
    ) -> Result<Batch, BlockManagerError> {
        let capacity = self.conf.block_batch_size as usize;
        let mut batch = Batch {
            start_height,
            end_height,
            blocks: Vec::with_capacity(capacity),
            commits: Vec::with_capacity(capacity),
        };

        for height in start_height..=end_height {
            debug!(height, "adding block to batch");
            let block = self.store.load_block(height).map_err(|e| {
                error!(height, error = %e, "failed to load block");
                e
            })?;
            let commit = self.store.load_commit(height).map_err(|e| {
                error!(height, error = %e, "failed to load commit");
                e
            })?;
            batch.blocks.push(block);
            batch.commits.push(commit);
        }

        Ok(batch)
    }

    /// Submit to DA, retrying any non-success status until cancelled.
    /// Returns `None` only on cancellation.
    async fn submit_batch_to_da(
        &self,
        cancel: &CancellationToken,
        batch: &Batch,
    ) -> Option<DaSubmitResult> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.dalc.submit_batch(batch).await;
            if result.code.is_success() {
                info!(
                    start_height = batch.start_height,
                    end_height = batch.end_height,
                    da_height = result.da_height,
                    "batch submitted to DA layer"
                );
                return Some(result);
            }

            warn!(
                start_height = batch.start_height,
                end_height = batch.end_height,
                code = ?result.code,
                message = %result.message,
                "failed to submit batch to DA layer, retrying"
            );
            if !self.submission_backoff(cancel, attempt).await {
                return None;
            }
            attempt += 1;
        }
    }

    /// Submit the batch reference to the settlement layer, retrying any
    /// non-success status until cancelled. The SL is the canonical
    /// commitment: a producer that cannot record its batch has no safe way
    /// to continue, so there is no give-up path short of cancellation.
    async fn submit_batch_to_sl(
        &self,
        cancel: &CancellationToken,
        batch: &Batch,
        da_result: &DaSubmitResult,
    ) -> Option<SlSubmitResult> {
        let mut attempt: u32 = 0;
        loop {
            let result =
                self.settlement.submit_batch(batch, self.dalc.client_type(), da_result).await;
            if result.code.is_success() {
                info!(
                    start_height = batch.start_height,
                    end_height = batch.end_height,
                    "batch submitted to settlement layer"
                );
                return Some(result);
            }

            error!(
                start_height = batch.start_height,
                end_height = batch.end_height,
                code = ?result.code,
                message = %result.message,
                "failed to submit batch to settlement layer, retrying"
            );
            if !self.submission_backoff(cancel, attempt).await {
                return None;
            }
            attempt += 1;
        }
    }

    /// Exponential backoff capped at the DA block time. Returns `false`
    /// when cancelled.
    async fn submission_backoff(&self, cancel: &CancellationToken, attempt: u32) -> bool {
        let delay = RETRY_BASE_DELAY
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
            .min(self.conf.da_block_time());
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
