#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Typed persistence facade for the sequencer node.
//!
//! A single [`redb`] database backs the whole node. The block manager's
//! tables live here; other components (the local DA client) open their own
//! tables in the same database, which partitions the file by table namespace
//! the way a prefix-partitioned key-value store would by key prefix.

mod store;

pub use store::{open_database, Store, StoreBatch, StoreError};
