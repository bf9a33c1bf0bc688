use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bytes::Bytes;

/// Transaction source for block creation.
///
/// `reap` copies without consuming; transactions leave the pool only through
/// `remove`, after the block carrying them has been committed.
pub trait Mempool: Send + Sync {
    fn add_tx(&self, tx: Bytes);

    /// Front of the pool, bounded by `max_bytes` (negative means unbounded).
    fn reap(&self, max_bytes: i64) -> Vec<Bytes>;

    fn remove(&self, txs: &[Bytes]);

    fn size(&self) -> usize;
}

#[derive(Clone, Default)]
pub struct InMemoryMempool {
    txs: Arc<Mutex<VecDeque<Bytes>>>,
}

impl InMemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mempool for InMemoryMempool {
    fn add_tx(&self, tx: Bytes) {
        self.txs.lock().expect("mempool poisoned").push_back(tx);
    }

    fn reap(&self, max_bytes: i64) -> Vec<Bytes> {
        let txs = self.txs.lock().expect("mempool poisoned");
        let mut reaped = Vec::new();
        let mut total = 0i64;
        for tx in txs.iter() {
            total += tx.len() as i64;
            if max_bytes >= 0 && total > max_bytes {
                break;
            }
            reaped.push(tx.clone());
        }
        reaped
    }

    fn remove(&self, remove: &[Bytes]) {
        let mut txs = self.txs.lock().expect("mempool poisoned");
        txs.retain(|tx| !remove.contains(tx));
    }

    fn size(&self) -> usize {
        self.txs.lock().expect("mempool poisoned").len()
    }
}
