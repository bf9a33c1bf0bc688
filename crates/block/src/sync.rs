use std::sync::{atomic::Ordering, Arc};

use laminar_settlement::{SettlementError, SettlementEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::manager::{BlockManagerError, BlockMetaData, BlockSource, Manager};

impl Manager {
    /// Block until the local height has caught up with the settlement
    /// layer's end height. An empty settlement layer is the cold-start case:
    /// the node is about to write the chain's first batch.
    pub(crate) async fn wait_for_sync(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), BlockManagerError> {
        match self.settlement.retrieve_latest().await {
            Err(SettlementError::BatchNotFound) => {
                info!("no batches for chain found on the settlement layer, starting fresh");
                self.sync_target.store(self.genesis.initial_height - 1, Ordering::SeqCst);
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "failed to retrieve latest batch from settlement layer");
                return Err(e.into());
            }
            Ok(batch) => {
                self.sync_target.store(batch.end_height, Ordering::SeqCst);
            }
        }

        loop {
            // Arm the notification before checking the condition so a signal
            // between check and wait is not lost.
            let notified = self.synced.notified();
            let target = self.sync_target.load(Ordering::SeqCst);
            if self.store.height() >= target {
                break;
            }
            info!(current_height = self.store.height(), sync_target = target, "waiting for sync");
            tokio::select! {
                _ = cancel.cancelled() => return Err(BlockManagerError::Cancelled),
                _ = notified => {}
            }
        }

        info!(
            current_height = self.store.height(),
            sync_target = self.sync_target.load(Ordering::SeqCst),
            "synced, starting to produce"
        );
        Ok(())
    }

    /// Track the settlement layer's end height: seed once from the latest
    /// batch, then follow acceptance events. Every update overwrites the
    /// single-slot channel the retrieve loop reads from.
    pub async fn sync_target_loop(self: Arc<Self>, cancel: CancellationToken) {
        info!("started sync target loop");
        let mut events = self.settlement.subscribe();

        match self.settlement.retrieve_latest().await {
            Ok(batch) => self.update_sync_params(batch.end_height),
            Err(SettlementError::BatchNotFound) => {
                debug!("no batches on the settlement layer yet");
            }
            Err(e) => error!(error = %e, "failed to retrieve latest batch from settlement layer"),
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Ok(SettlementEvent::NewBatchAccepted { end_height, state_index, .. }) => {
                        info!(end_height, state_index, "received settlement batch accepted event");
                        self.update_sync_params(end_height);
                        // The accepted batch was ours (single producer):
                        // release the submitter slot so the next batch can
                        // start accumulating.
                        self.batch_in_process.store(false, Ordering::SeqCst);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "settlement event subscription lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("settlement event subscription closed");
                        return;
                    }
                }
            }
        }
    }

    fn update_sync_params(&self, end_height: u64) {
        info!(sync_target = end_height, "received new sync target");
        self.sync_target.store(end_height, Ordering::SeqCst);
        self.sync_target_tx.send_replace(end_height);
    }

    /// Drive retrieval toward the newest sync target. The watch channel has
    /// latest-wins semantics on purpose: if the tracker fires three times
    /// while a sync is in progress, only the newest height is pursued.
    pub async fn retrieve_loop(self: Arc<Self>, cancel: CancellationToken) {
        info!("started retrieve loop");
        let mut targets = self.sync_target_rx.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = targets.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let target = *targets.borrow_and_update();
                    self.sync_until_target(&cancel, target).await;

                    // A new target may have landed while syncing; only signal
                    // once we are truly caught up.
                    if self.store.height() >= self.sync_target.load(Ordering::SeqCst) {
                        info!(height = self.store.height(), "synced");
                        self.synced.notify_waiters();
                    }
                }
            }
        }
    }

    /// Walk settlement batches by state index and apply their blocks from
    /// DA until `target` is reached. SL failures retry in place; a DA
    /// failure abandons this pass, to be retried on the next target tick.
    async fn sync_until_target(&self, cancel: &CancellationToken, target: u64) {
        let mut current_height = self.store.height();
        while current_height < target {
            if cancel.is_cancelled() {
                return;
            }
            info!(current_height, sync_target = target, "syncing until target");

            let state_index = self.last_state().sl_state_index;
            let batch = match self.settlement.retrieve_batch(state_index + 1).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        state_index = state_index + 1,
                        error = %e,
                        "failed to sync until target: error while retrieving batch"
                    );
                    continue;
                }
            };

            if let Err(e) = self.process_next_da_batch(batch.da_height).await {
                error!(
                    da_height = batch.da_height,
                    error = %e,
                    "failed to sync until target: error while processing next DA batch"
                );
                break;
            }

            if self.update_state_index(batch.state_index).is_err() {
                return;
            }
            current_height = self.store.height();
        }
    }

    /// Fetch everything committed at `da_height` and apply it in order. The
    /// first failure aborts; the caller retries from the same settlement
    /// index.
    async fn process_next_da_batch(&self, da_height: u64) -> Result<(), BlockManagerError> {
        debug!(da_height, "trying to retrieve batch from DA");
        let result = self.dalc.retrieve_batches(da_height).await;
        if !result.code.is_success() {
            return Err(BlockManagerError::DaLayer(result.message));
        }

        debug!(n = result.batches.len(), da_height, "retrieved batches");
        for batch in &result.batches {
            for (block, commit) in batch.blocks.iter().zip(&batch.commits) {
                let meta = BlockMetaData { source: BlockSource::Da, da_height };
                self.apply_block(block, commit, meta).await?;
            }
        }
        Ok(())
    }

    fn update_state_index(&self, state_index: u64) -> Result<(), BlockManagerError> {
        let state = {
            let mut state = self.last_state.write().expect("state lock poisoned");
            state.sl_state_index = state_index;
            state.clone()
        };
        self.store.update_state(&state).map_err(|e| {
            error!(error = %e, "failed to update state");
            BlockManagerError::from(e)
        })?;
        Ok(())
    }
}
