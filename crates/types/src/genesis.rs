use serde::{Deserialize, Serialize};

use crate::validator::ValidatorSet;

/// Genesis document: everything a fresh node needs to boot a chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: String,
    pub initial_height: u64,
    pub validator_set: ValidatorSet,
    /// Opaque application genesis payload, handed to the application in
    /// `init_chain` untouched.
    #[serde(default)]
    pub app_state: Vec<u8>,
}
