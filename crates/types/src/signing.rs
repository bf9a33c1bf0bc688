use ed25519_dalek::{Signer as _, Verifier as _};
pub use ed25519_dalek::{Signature, SigningKey as PrivateKey, VerifyingKey as PublicKey};

use crate::hash::{keccak256, Hashable};

/// Length of an account address derived from a public key.
pub const ADDRESS_LEN: usize = 20;

impl Hashable for &PublicKey {
    type Output = [u8; 32];

    fn hash(&self) -> [u8; 32] {
        keccak256(self.as_bytes())
    }
}

/// Derive the short account address for a public key: the first 20 bytes of
/// its Keccak-256 digest.
pub fn address_of(public_key: &PublicKey) -> Vec<u8> {
    public_key.hash()[..ADDRESS_LEN].to_vec()
}

/// Holds the proposer's private key and signs canonical byte strings with it.
#[derive(Debug)]
pub struct Ed25519Signer {
    private_key: PrivateKey,
}

impl Ed25519Signer {
    pub fn new(private_key: PrivateKey) -> Self {
        Self { private_key }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { private_key: PrivateKey::from_bytes(&bytes) }
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.verifying_key()
    }

    pub fn address(&self) -> Vec<u8> {
        address_of(&self.public_key())
    }

    pub fn sign(&self, data: &[u8]) -> Signature {
        self.private_key.sign(data)
    }
}

pub fn verify_signature(data: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    public_key.verify(data, signature).is_ok()
}
