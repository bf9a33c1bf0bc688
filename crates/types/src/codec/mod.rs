//! Conversions between the domain types and their protobuf wire form.
//!
//! The protobuf encoding is canonical: header hashes and proposer signatures
//! are computed over these bytes, and the store persists them unchanged.

use bytes::Bytes;
use prost::Message;
use thiserror::Error;

use crate::{
    batch::Batch,
    block::{Block, Data, Header, NamespaceId, NAMESPACE_ID_LEN},
    commit::Commit,
    hash::Hash,
    proto,
    signing::{PublicKey, Signature},
    state::{BlockParams, BlockResponses, ConsensusParams, State, TxResult},
    validator::{Validator, ValidatorSet},
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode protobuf: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("field {field} has length {got}, expected {expected}")]
    InvalidLength { field: &'static str, expected: usize, got: usize },
    #[error("invalid ed25519 public key")]
    InvalidPublicKey,
    #[error("invalid ed25519 signature")]
    InvalidSignature,
}

fn hash_field(field: &'static str, bytes: &[u8]) -> Result<Hash, CodecError> {
    bytes
        .try_into()
        .map_err(|_| CodecError::InvalidLength { field, expected: 32, got: bytes.len() })
}

fn namespace_field(bytes: &[u8]) -> Result<NamespaceId, CodecError> {
    bytes.try_into().map_err(|_| CodecError::InvalidLength {
        field: "namespace_id",
        expected: NAMESPACE_ID_LEN,
        got: bytes.len(),
    })
}

// --- Header / Data ---

pub fn header_to_proto(header: &Header) -> proto::Header {
    proto::Header {
        chain_id: header.chain_id.clone(),
        height: header.height,
        time: header.time,
        namespace_id: Bytes::copy_from_slice(&header.namespace_id),
        last_header_hash: Bytes::copy_from_slice(&header.last_header_hash),
        data_hash: Bytes::copy_from_slice(&header.data_hash),
        app_hash: Bytes::copy_from_slice(&header.app_hash),
        last_results_hash: Bytes::copy_from_slice(&header.last_results_hash),
        proposer_address: Bytes::copy_from_slice(&header.proposer_address),
    }
}

pub fn header_from_proto(pb: proto::Header) -> Result<Header, CodecError> {
    Ok(Header {
        chain_id: pb.chain_id,
        height: pb.height,
        time: pb.time,
        namespace_id: namespace_field(&pb.namespace_id)?,
        last_header_hash: hash_field("last_header_hash", &pb.last_header_hash)?,
        data_hash: hash_field("data_hash", &pb.data_hash)?,
        app_hash: hash_field("app_hash", &pb.app_hash)?,
        last_results_hash: hash_field("last_results_hash", &pb.last_results_hash)?,
        proposer_address: pb.proposer_address.to_vec(),
    })
}

/// Canonical header bytes: the signing and hashing surface.
pub fn header_to_bytes(header: &Header) -> Bytes {
    Bytes::from(header_to_proto(header).encode_to_vec())
}

pub fn data_to_proto(data: &Data) -> proto::Data {
    proto::Data { txs: data.txs.clone() }
}

pub fn data_to_bytes(data: &Data) -> Bytes {
    Bytes::from(data_to_proto(data).encode_to_vec())
}

// --- Commit ---

pub fn commit_to_proto(commit: &Commit) -> proto::Commit {
    proto::Commit {
        height: commit.height,
        header_hash: Bytes::copy_from_slice(&commit.header_hash),
        signatures: commit
            .signatures
            .iter()
            .map(|s| Bytes::copy_from_slice(&s.to_bytes()))
            .collect(),
    }
}

pub fn commit_from_proto(pb: proto::Commit) -> Result<Commit, CodecError> {
    let signatures = pb
        .signatures
        .iter()
        .map(|raw| Signature::from_slice(raw).map_err(|_| CodecError::InvalidSignature))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Commit { height: pb.height, header_hash: hash_field("header_hash", &pb.header_hash)?, signatures })
}

pub fn commit_to_bytes(commit: &Commit) -> Bytes {
    Bytes::from(commit_to_proto(commit).encode_to_vec())
}

pub fn commit_from_bytes(bytes: &[u8]) -> Result<Commit, CodecError> {
    commit_from_proto(proto::Commit::decode(bytes)?)
}

// --- Block ---

pub fn block_to_proto(block: &Block) -> proto::Block {
    proto::Block {
        header: Some(header_to_proto(&block.header)),
        data: Some(data_to_proto(&block.data)),
        last_commit: Some(commit_to_proto(&block.last_commit)),
    }
}

pub fn block_from_proto(pb: proto::Block) -> Result<Block, CodecError> {
    Ok(Block {
        header: header_from_proto(pb.header.ok_or(CodecError::MissingField("header"))?)?,
        data: Data { txs: pb.data.ok_or(CodecError::MissingField("data"))?.txs },
        last_commit: commit_from_proto(
            pb.last_commit.ok_or(CodecError::MissingField("last_commit"))?,
        )?,
    })
}

pub fn block_to_bytes(block: &Block) -> Bytes {
    Bytes::from(block_to_proto(block).encode_to_vec())
}

pub fn block_from_bytes(bytes: &[u8]) -> Result<Block, CodecError> {
    block_from_proto(proto::Block::decode(bytes)?)
}

// --- Batch ---

pub fn batch_to_proto(batch: &Batch) -> proto::Batch {
    proto::Batch {
        start_height: batch.start_height,
        end_height: batch.end_height,
        blocks: batch.blocks.iter().map(block_to_proto).collect(),
        commits: batch.commits.iter().map(commit_to_proto).collect(),
    }
}

pub fn batch_from_proto(pb: proto::Batch) -> Result<Batch, CodecError> {
    Ok(Batch {
        start_height: pb.start_height,
        end_height: pb.end_height,
        blocks: pb.blocks.into_iter().map(block_from_proto).collect::<Result<_, _>>()?,
        commits: pb.commits.into_iter().map(commit_from_proto).collect::<Result<_, _>>()?,
    })
}

pub fn batch_to_bytes(batch: &Batch) -> Bytes {
    Bytes::from(batch_to_proto(batch).encode_to_vec())
}

pub fn batch_from_bytes(bytes: &[u8]) -> Result<Batch, CodecError> {
    batch_from_proto(proto::Batch::decode(bytes)?)
}

// --- Validators ---

pub fn validator_set_to_proto(set: &ValidatorSet) -> proto::ValidatorSet {
    proto::ValidatorSet {
        validators: set
            .validators
            .iter()
            .map(|v| proto::Validator {
                public_key: Bytes::copy_from_slice(v.public_key.as_bytes()),
                voting_power: v.voting_power,
            })
            .collect(),
    }
}

pub fn validator_set_from_proto(pb: proto::ValidatorSet) -> Result<ValidatorSet, CodecError> {
    let validators = pb
        .validators
        .into_iter()
        .map(|v| {
            let raw: [u8; 32] = v.public_key.as_ref().try_into().map_err(|_| {
                CodecError::InvalidLength { field: "public_key", expected: 32, got: v.public_key.len() }
            })?;
            let public_key =
                PublicKey::from_bytes(&raw).map_err(|_| CodecError::InvalidPublicKey)?;
            Ok(Validator { public_key, voting_power: v.voting_power })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;
    Ok(ValidatorSet { validators })
}

pub fn validator_set_to_bytes(set: &ValidatorSet) -> Bytes {
    Bytes::from(validator_set_to_proto(set).encode_to_vec())
}

pub fn validator_set_from_bytes(bytes: &[u8]) -> Result<ValidatorSet, CodecError> {
    validator_set_from_proto(proto::ValidatorSet::decode(bytes)?)
}

// --- State ---

pub fn state_to_bytes(state: &State) -> Bytes {
    let pb = proto::State {
        chain_id: state.chain_id.clone(),
        initial_height: state.initial_height,
        last_block_height: state.last_block_height,
        consensus_params: Some(proto::ConsensusParams {
            block: Some(proto::BlockParams {
                max_bytes: state.consensus_params.block.max_bytes,
                max_gas: state.consensus_params.block.max_gas,
            }),
            app_version: state.consensus_params.app_version,
        }),
        validators: Some(validator_set_to_proto(&state.validators)),
        next_validators: Some(validator_set_to_proto(&state.next_validators)),
        app_hash: Bytes::copy_from_slice(&state.app_hash),
        last_results_hash: Bytes::copy_from_slice(&state.last_results_hash),
        sl_state_index: state.sl_state_index,
    };
    Bytes::from(pb.encode_to_vec())
}

pub fn state_from_bytes(bytes: &[u8]) -> Result<State, CodecError> {
    let pb = proto::State::decode(bytes)?;
    let params = pb.consensus_params.ok_or(CodecError::MissingField("consensus_params"))?;
    let block = params.block.ok_or(CodecError::MissingField("consensus_params.block"))?;
    Ok(State {
        chain_id: pb.chain_id,
        initial_height: pb.initial_height,
        last_block_height: pb.last_block_height,
        consensus_params: ConsensusParams {
            block: BlockParams { max_bytes: block.max_bytes, max_gas: block.max_gas },
            app_version: params.app_version,
        },
        validators: validator_set_from_proto(
            pb.validators.ok_or(CodecError::MissingField("validators"))?,
        )?,
        next_validators: validator_set_from_proto(
            pb.next_validators.ok_or(CodecError::MissingField("next_validators"))?,
        )?,
        app_hash: hash_field("app_hash", &pb.app_hash)?,
        last_results_hash: hash_field("last_results_hash", &pb.last_results_hash)?,
        sl_state_index: pb.sl_state_index,
    })
}

// --- Block responses ---

pub fn responses_to_bytes(responses: &BlockResponses) -> Bytes {
    let pb = proto::BlockResponses {
        tx_results: responses
            .tx_results
            .iter()
            .map(|r| proto::TxResult { code: r.code, data: r.data.clone(), log: r.log.clone() })
            .collect(),
    };
    Bytes::from(pb.encode_to_vec())
}

pub fn responses_from_bytes(bytes: &[u8]) -> Result<BlockResponses, CodecError> {
    let pb = proto::BlockResponses::decode(bytes)?;
    Ok(BlockResponses {
        tx_results: pb
            .tx_results
            .into_iter()
            .map(|r| TxResult { code: r.code, data: r.data, log: r.log })
            .collect(),
    })
}
