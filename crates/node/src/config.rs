use std::path::PathBuf;

use laminar_block::BlockManagerConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// Embedder-facing node configuration. Parsing this from files or flags is
/// the embedder's business; the node only consumes the typed struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable instance name, used in log spans.
    pub moniker: String,
    /// Path of the shared node database.
    pub db_path: PathBuf,
    pub block_manager: BlockManagerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
