//! Detached signature verification
//!
//! Configuration payloads from the CDN/API carry a detached, base64-encoded
//! signature over the raw `data` string. Verification is a boolean contract:
//! any decode or verify failure means "not authentic", never a panic or a
//! propagated error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};
use flagsync_core::SetupError;
use std::fmt;
use tracing::debug;

/// Verifies a detached signature over a byte payload
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// Whether `signature_b64` is a valid signature over `payload`
    fn verify(&self, payload: &[u8], signature_b64: &str) -> bool;
}

/// Ed25519 verifier over a fixed trusted public key
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Create a verifier from raw public key bytes
    ///
    /// # Errors
    /// - `SetupError::InvalidVerificationKey` if the bytes are not a valid
    ///   curve point
    pub fn new(key_bytes: &[u8; 32]) -> Result<Self, SetupError> {
        let key = VerifyingKey::from_bytes(key_bytes)
            .map_err(|e| SetupError::InvalidVerificationKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Create a verifier from a base64-encoded public key
    ///
    /// # Errors
    /// - `SetupError::InvalidVerificationKey` on malformed base64 or key
    pub fn from_base64(key_b64: &str) -> Result<Self, SetupError> {
        let bytes = BASE64
            .decode(key_b64)
            .map_err(|e| SetupError::InvalidVerificationKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SetupError::InvalidVerificationKey("wrong key length".to_string()))?;
        Self::new(&bytes)
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, payload: &[u8], signature_b64: &str) -> bool {
        let Ok(signature_bytes) = BASE64.decode(signature_b64) else {
            debug!("signature is not valid base64");
            return false;
        };
        let signature_bytes: [u8; 64] = match signature_bytes.try_into() {
            Ok(bytes) => bytes,
            Err(_) => {
                debug!("signature has wrong length");
                return false;
            }
        };
        let signature = Signature::from_bytes(&signature_bytes);
        self.key.verify_strict(payload, &signature).is_ok()
    }
}

/// Verifier that accepts every signature
///
/// Used by the Roxy development path and in tests; never wire this into a
/// production CDN/API pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledVerifier;

impl SignatureVerifier for DisabledVerifier {
    fn verify(&self, _payload: &[u8], _signature_b64: &str) -> bool {
        true
    }
}
