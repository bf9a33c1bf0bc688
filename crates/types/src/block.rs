use bytes::Bytes;

use crate::{
    codec,
    commit::Commit,
    hash::{Hash, Hashable},
};

/// Width of the opaque DA namespace tag carried in every header.
pub const NAMESPACE_ID_LEN: usize = 8;

pub type NamespaceId = [u8; NAMESPACE_ID_LEN];

/// Block header. Hashing and signing operate on the canonical protobuf
/// encoding of this struct, see [`Header::canonical_bytes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub chain_id: String,
    pub height: u64,
    /// Creation time in nanoseconds since the unix epoch.
    pub time: u64,
    pub namespace_id: NamespaceId,
    /// Hash of the header at `height - 1`, all-zero for the first block.
    pub last_header_hash: Hash,
    pub data_hash: Hash,
    /// Application state root after the previous block was committed.
    pub app_hash: Hash,
    pub last_results_hash: Hash,
    pub proposer_address: Vec<u8>,
}

impl Header {
    /// The byte string the proposer signs and the header hash is taken over.
    pub fn canonical_bytes(&self) -> Bytes {
        codec::header_to_bytes(self)
    }
}

impl Hashable for Header {
    type Output = Hash;

    fn hash(&self) -> Hash {
        crate::hash::keccak256(&self.canonical_bytes())
    }
}

/// Transactions carried by a block, in application-determined order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Data {
    pub txs: Vec<Bytes>,
}

impl Hashable for Data {
    type Output = Hash;

    fn hash(&self) -> Hash {
        crate::hash::keccak256(&codec::data_to_bytes(self))
    }
}

/// A block is immutable once saved to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub data: Data,
    /// Commit for the block at `header.height - 1`.
    pub last_commit: Commit,
}

impl Hashable for Block {
    type Output = Hash;

    fn hash(&self) -> Hash {
        self.header.hash()
    }
}
