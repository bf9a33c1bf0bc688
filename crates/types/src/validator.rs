use serde::{Deserialize, Serialize};

use crate::signing::{address_of, PublicKey};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub public_key: PublicKey,
    pub voting_power: i64,
}

impl Validator {
    pub fn new(public_key: PublicKey, voting_power: i64) -> Self {
        Self { public_key, voting_power }
    }

    pub fn address(&self) -> Vec<u8> {
        address_of(&self.public_key)
    }
}

/// The validator set of a sequencer chain holds a single proposer today, but
/// the set shape is kept so the state layout survives a multi-party future.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// The designated proposer. With a single sequencer this is simply the
    /// first (and only) entry.
    pub fn proposer(&self) -> Option<&Validator> {
        self.validators.first()
    }

    pub fn total_voting_power(&self) -> i64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }
}
