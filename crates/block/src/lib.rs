#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! The block manager of the sequencer node.
//!
//! Four long-lived loops share one [`Manager`]: the producer creates, signs,
//! gossips and applies blocks; the applier consumes peer gossip; the
//! sync-target loop tracks settlement acceptance; the retrieve loop pulls
//! accepted batches back out of DA. A short-lived submitter task carries
//! each finished batch to DA and then to the settlement layer.

mod config;
mod manager;
mod submit;
mod sync;

pub use config::{BlockManagerConfig, DEFAULT_DA_BLOCK_TIME_MS};
pub use manager::{BlockManagerError, BlockSource, Manager};
