//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pairs for participants, the oracle and the authority
//! - Signature verification of submitted instructions
//! - SHA-256 digests used for replay detection

use crate::types::Identity;
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Load from a 32-byte seed or a 64-byte `secret || public` keypair
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(bytes);
                Ok(Self::from_seed(&seed))
            }
            64 => {
                let mut full = [0u8; 64];
                full.copy_from_slice(bytes);
                let signing_key = SigningKey::from_keypair_bytes(&full)
                    .map_err(|e| Error::SignatureError(format!("Invalid keypair: {}", e)))?;
                let verifying_key = signing_key.verifying_key();
                Ok(Self {
                    signing_key,
                    verifying_key,
                })
            }
            n => Err(Error::SignatureError(format!(
                "Invalid key length: {} bytes",
                n
            ))),
        }
    }

    /// Public identity of this key
    pub fn identity(&self) -> Identity {
        Identity::from_bytes(self.verifying_key.to_bytes())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from_bytes(self.signing_key.sign(message).to_bytes())
    }
}

/// Digital signature (Ed25519)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature bytes (64 bytes)
    #[serde(with = "serde_bytes")]
    bytes: [u8; 64],
}

impl Signature {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

/// Verify `signature` over `message` by `signer`
pub fn verify_signature(message: &[u8], signature: &Signature, signer: &Identity) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(signer.as_bytes())
        .map_err(|e| Error::SignatureError(format!("Invalid public key: {}", e)))?;
    let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());

    verifying_key
        .verify(message, &dalek_sig)
        .map_err(|e| Error::SignatureError(format!("Verification failed: {}", e)))
}

/// Hash arbitrary bytes using SHA-256
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
