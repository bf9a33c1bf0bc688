#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Block gossip contract.
//!
//! The manager publishes `(block, commit)` pairs as length-delimited
//! protobuf frames and consumes peer frames from a subscription. The wire
//! encoding must stay stable across nodes: followers verify signatures over
//! exactly the bytes the producer signed.

use async_trait::async_trait;
use bytes::Bytes;
use laminar_types::{
    block::Block,
    codec::{self, CodecError},
    commit::Commit,
    proto,
};
use prost::Message;
use thiserror::Error;
use tokio::sync::broadcast;

/// Queue capacity of a gossip subscription.
pub const GOSSIP_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("failed to publish block: {0}")]
    Publish(String),
    #[error("failed to decode gossiped block: {0}")]
    Decode(#[from] CodecError),
    #[error("failed to decode gossip frame: {0}")]
    Frame(#[from] prost::DecodeError),
}

/// A produced block and its commit, as gossiped to peers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GossipedBlock {
    pub block: Block,
    pub commit: Commit,
}

impl GossipedBlock {
    /// Length-delimited protobuf frame.
    pub fn to_bytes(&self) -> Bytes {
        let pb = proto::GossipedBlock {
            block: Some(codec::block_to_proto(&self.block)),
            commit: Some(codec::commit_to_proto(&self.commit)),
        };
        Bytes::from(pb.encode_length_delimited_to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GossipError> {
        let pb = proto::GossipedBlock::decode_length_delimited(bytes)?;
        Ok(Self {
            block: codec::block_from_proto(
                pb.block.ok_or(CodecError::MissingField("block"))?,
            )?,
            commit: codec::commit_from_proto(
                pb.commit.ok_or(CodecError::MissingField("commit"))?,
            )?,
        })
    }
}

#[async_trait]
pub trait GossipClient: Send + Sync {
    /// Broadcast an encoded block frame to peers.
    async fn gossip_block(&self, frame: Bytes) -> Result<(), GossipError>;

    /// Subscribe to peer-gossiped frames.
    fn subscribe(&self) -> broadcast::Receiver<Bytes>;
}

/// Loopback gossip bus for single-process wiring and tests. Published frames
/// are delivered to every local subscriber, the publisher's own applier
/// included; the apply path's duplicate guard makes self-delivery harmless.
pub struct InProcessGossip {
    bus: broadcast::Sender<Bytes>,
}

impl Default for InProcessGossip {
    fn default() -> Self {
        let (bus, _) = broadcast::channel(GOSSIP_QUEUE_CAPACITY);
        Self { bus }
    }
}

impl InProcessGossip {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GossipClient for InProcessGossip {
    async fn gossip_block(&self, frame: Bytes) -> Result<(), GossipError> {
        // A send with no subscribers is not a failure: a single-node chain
        // has nobody listening.
        let _ = self.bus.send(frame);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.bus.subscribe()
    }
}
