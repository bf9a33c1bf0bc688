use std::time::Duration;

use laminar_types::block::NamespaceId;
use serde::{Deserialize, Serialize};

/// Used when `da_block_time_ms` is left unset.
pub const DEFAULT_DA_BLOCK_TIME_MS: u64 = 30_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockManagerConfig {
    /// Target interval between produced blocks. `0` disables the ticker and
    /// produces blocks back to back.
    pub block_time_ms: u64,
    /// Expected block interval of the DA layer; paces submission retries.
    /// `0` means the 30s default.
    #[serde(default)]
    pub da_block_time_ms: u64,
    /// Blocks per DA/SL batch. Must be at least 1.
    pub block_batch_size: u64,
    /// Opaque DA namespace tag, stamped into every header.
    #[serde(default)]
    pub namespace_id: NamespaceId,
    /// Whether this node is the designated producer.
    #[serde(default)]
    pub aggregator: bool,
}

impl BlockManagerConfig {
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    pub fn da_block_time(&self) -> Duration {
        Duration::from_millis(self.da_block_time_ms)
    }
}
