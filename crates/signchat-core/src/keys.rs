//! Identity management for the local signing key
//!
//! This module handles:
//! - Ed25519 signing key generation
//! - Loading and persisting the private key through the preference store
//! - Signing outgoing message text
//! - Verifying signatures against arbitrary third-party public keys
//!
//! Public keys travel on the wire as standard base64 of the 32-byte verifying
//! key. The private key is persisted as the hex encoded 32-byte seed under the
//! `private_key` preference.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::prefs::{PreferenceStore, PrefsError, PRIVATE_KEY};

/// Length of an encoded Ed25519 signature
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Identity loading errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid key data: {0}")]
    InvalidKeyData(String),

    #[error("Preference store error: {0}")]
    Prefs(#[from] PrefsError),
}

/// A public key string could not be parsed into a verifying key
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyFormatError {
    #[error("public key is not valid base64: {0}")]
    Encoding(String),

    #[error("invalid public key length: expected 32, got {0}")]
    Length(usize),

    #[error("public key is not a valid Ed25519 point: {0}")]
    InvalidPoint(String),
}

/// Identity information for display
#[derive(Debug, Clone, Serialize)]
pub struct IdentityInfo {
    /// Short fingerprint of the public key
    pub fingerprint: String,
    /// Encoded public key as transmitted
    pub public_key: String,
    /// Key algorithm used
    pub key_algorithm: String,
}

/// The local signing identity.
///
/// The public key is always derived from the held signing key.
pub struct Identity {
    signing_key: SigningKey,
    public_key: String,
}

impl Identity {
    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = encode_public_key(&signing_key.verifying_key());
        Self {
            signing_key,
            public_key,
        }
    }

    /// Encoded public key, as attached to outgoing messages
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Raw verifying key bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Fingerprint of the public key
    ///
    /// The first 16 hex characters (8 bytes) of the SHA-256 hash of the raw
    /// verifying key.
    pub fn fingerprint(&self) -> String {
        fingerprint_bytes(&self.public_key_bytes())
    }

    /// Sign data using Ed25519
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(data).to_bytes()
    }

    /// Display identity info
    pub fn info(&self) -> IdentityInfo {
        IdentityInfo {
            fingerprint: self.fingerprint(),
            public_key: self.public_key.clone(),
            key_algorithm: "Ed25519".to_string(),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Creates and loads the local identity
pub struct KeyManager;

impl KeyManager {
    /// Load the persisted identity or create and persist a new one.
    ///
    /// A freshly generated private key is saved before this returns. Present
    /// but unparseable key material is an error and is never replaced.
    pub fn load_or_create_identity(prefs: &dyn PreferenceStore) -> Result<Identity, IdentityError> {
        if let Some(stored) = prefs.get_string(PRIVATE_KEY)? {
            let identity = Self::from_stored(&stored)?;
            tracing::debug!(
                fingerprint = %identity.fingerprint(),
                "Loaded existing identity"
            );
            return Ok(identity);
        }

        let identity = Self::generate();
        prefs.set_string(PRIVATE_KEY, &hex::encode(identity.signing_key.to_bytes()))?;
        prefs.save()?;

        tracing::info!(
            fingerprint = %identity.fingerprint(),
            "Generated new identity"
        );

        Ok(identity)
    }

    /// Create a new identity that is never persisted
    pub fn ephemeral() -> Identity {
        Self::generate()
    }

    fn generate() -> Identity {
        let mut rng = rand_core::OsRng;
        Identity::from_signing_key(SigningKey::generate(&mut rng))
    }

    fn from_stored(stored: &str) -> Result<Identity, IdentityError> {
        let seed_bytes = hex::decode(stored.trim())
            .map_err(|e| IdentityError::InvalidKeyData(format!("Invalid private key hex: {e}")))?;

        let seed: [u8; 32] = seed_bytes.as_slice().try_into().map_err(|_| {
            IdentityError::InvalidKeyData(format!(
                "Invalid private key length: expected 32, got {}",
                seed_bytes.len()
            ))
        })?;

        Ok(Identity::from_signing_key(SigningKey::from_bytes(&seed)))
    }
}

/// Encode a verifying key for the wire
pub fn encode_public_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.to_bytes())
}

/// Parse an encoded public key
pub fn decode_public_key(public_key: &str) -> Result<VerifyingKey, KeyFormatError> {
    let bytes = STANDARD
        .decode(public_key.trim())
        .map_err(|e| KeyFormatError::Encoding(e.to_string()))?;

    let key_bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyFormatError::Length(bytes.len()))?;

    VerifyingKey::from_bytes(&key_bytes).map_err(|e| KeyFormatError::InvalidPoint(e.to_string()))
}

/// Verify `signature` over `message` under an encoded public key.
///
/// A signature that is well formed but does not match, or has the wrong
/// length, yields `Ok(false)`. Only an unparseable public key is an error.
pub fn verify(message: &[u8], signature: &[u8], public_key: &str) -> Result<bool, KeyFormatError> {
    let verifying_key = decode_public_key(public_key)?;

    let Ok(signature) = Signature::from_slice(signature) else {
        return Ok(false);
    };

    Ok(verifying_key.verify_strict(message, &signature).is_ok())
}

/// Fingerprint of raw public key bytes
pub fn fingerprint_bytes(public_key: &[u8]) -> String {
    let hash = Sha256::digest(public_key);
    hex::encode(&hash[..8])
}

/// Fingerprint of an encoded public key, `None` if it does not parse
pub fn fingerprint(public_key: &str) -> Option<String> {
    decode_public_key(public_key)
        .ok()
        .map(|key| fingerprint_bytes(key.as_bytes()))
}
