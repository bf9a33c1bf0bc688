use thiserror::Error;

use crate::{
    block::Header,
    hash::{Hash, Hashable, ZERO_HASH},
    signing::{verify_signature, PublicKey, Signature},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("commit is for height {commit} but header has height {header}")]
    HeightMismatch { commit: u64, header: u64 },
    #[error("commit header hash does not match the header")]
    HeaderHashMismatch,
    #[error("expected exactly one signature, got {0}")]
    SignatureCount(usize),
    #[error("signature verification failed")]
    InvalidSignature,
}

/// Attestation over a block header. Produced blocks carry exactly one
/// proposer signature over the canonical header bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Commit {
    pub height: u64,
    pub header_hash: Hash,
    pub signatures: Vec<Signature>,
}

impl Commit {
    /// The synthetic commit preceding the first block of the chain: no
    /// signatures, all-zero header hash.
    pub fn genesis_predecessor(height: u64) -> Self {
        Self { height, header_hash: ZERO_HASH, signatures: Vec::new() }
    }

    /// Verify this commit against the header it claims to attest and the
    /// proposer's public key.
    pub fn verify(&self, header: &Header, proposer: &PublicKey) -> Result<(), CommitError> {
        if self.height != header.height {
            return Err(CommitError::HeightMismatch { commit: self.height, header: header.height });
        }
        if self.header_hash != header.hash() {
            return Err(CommitError::HeaderHashMismatch);
        }
        if self.signatures.len() != 1 {
            return Err(CommitError::SignatureCount(self.signatures.len()));
        }
        if !verify_signature(&header.canonical_bytes(), &self.signatures[0], proposer) {
            return Err(CommitError::InvalidSignature);
        }
        Ok(())
    }
}
