//! Trust store for verified message authors
//!
//! The trust store records which public keys have been accepted for which
//! usernames. A username may have several trusted keys at once (for example one
//! per device), so entries form an insertion-ordered multimap. Entries are only
//! ever appended; nothing is deduplicated or removed.
//!
//! Trust is established explicitly by the application (trust-on-first-use).
//! Receiving a message never adds an entry by itself.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::keys::{self, KeyFormatError};
use crate::message::Message;
use crate::prefs::{PreferenceStore, PrefsError, TRUSTED_USERS};

/// Trust store errors
#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("Invalid trusted users value in config: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Preference store error: {0}")]
    Prefs(#[from] PrefsError),
}

/// A recorded association between a username and a public key.
///
/// Serialized as a two element array `["username", "publicKey"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct TrustEntry {
    pub username: String,
    pub public_key: String,
}

impl TrustEntry {
    pub fn new(username: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            public_key: public_key.into(),
        }
    }

    /// Entry for the author and key presented by a message
    pub fn from_message(msg: &Message) -> Self {
        Self::new(msg.creator_name.clone(), msg.public_key.clone())
    }
}

impl From<(String, String)> for TrustEntry {
    fn from((username, public_key): (String, String)) -> Self {
        Self {
            username,
            public_key,
        }
    }
}

impl From<TrustEntry> for (String, String) {
    fn from(entry: TrustEntry) -> Self {
        (entry.username, entry.public_key)
    }
}

/// Insertion-ordered multimap from username to trusted public keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustedKeys {
    entries: Vec<TrustEntry>,
}

impl TrustedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the persisted JSON form
    pub fn from_json(json: &str) -> Result<Self, TrustStoreError> {
        serde_json::from_str(json).map_err(|e| TrustStoreError::Corrupt(e.to_string()))
    }

    /// Serialize to the persisted JSON form
    pub fn to_json(&self) -> Result<String, TrustStoreError> {
        serde_json::to_string(self).map_err(|e| TrustStoreError::Serialization(e.to_string()))
    }

    /// Append an entry
    pub fn push(&mut self, entry: TrustEntry) {
        self.entries.push(entry);
    }

    /// Keys trusted for `username`, in insertion order, duplicates included
    pub fn keys_for<'a>(&'a self, username: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.username == username)
            .map(|e| e.public_key.as_str())
    }

    /// Whether `username` has any trusted key
    pub fn contains_user(&self, username: &str) -> bool {
        self.entries.iter().any(|e| e.username == username)
    }

    /// Whether this exact pair is present
    pub fn contains(&self, entry: &TrustEntry) -> bool {
        self.entries.contains(entry)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrustEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a TrustedKeys {
    type Item = &'a TrustEntry;
    type IntoIter = std::slice::Iter<'a, TrustEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<TrustEntry> for TrustedKeys {
    fn from_iter<I: IntoIterator<Item = TrustEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Reason a matching key failed to verify a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The stored key could not be parsed
    KeyFormat(KeyFormatError),
    /// The signature is not valid base64
    SignatureEncoding(String),
}

impl std::fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyFormat(e) => write!(f, "{e}"),
            Self::SignatureEncoding(e) => write!(f, "signature is not valid base64: {e}"),
        }
    }
}

/// Outcome of a trust check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// Signature verified under a key trusted for the author
    Trusted,
    /// No key is trusted for the author
    UnknownAuthor,
    /// The author is known but the presented key is not one of theirs
    KeyNotTrusted,
    /// The key is trusted but the signature does not match the text
    BadSignature,
    /// The key or signature could not be decoded
    VerificationFailed(VerificationFailure),
}

impl TrustDecision {
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::UnknownAuthor => "unknown author",
            Self::KeyNotTrusted => "untrusted key",
            Self::BadSignature => "bad signature",
            Self::VerificationFailed(_) => "unverifiable",
        }
    }
}

/// Check a message against a set of trusted keys
pub fn evaluate(trusted: &TrustedKeys, msg: &Message) -> TrustDecision {
    let mut candidates = trusted.keys_for(&msg.creator_name).peekable();
    if candidates.peek().is_none() {
        return TrustDecision::UnknownAuthor;
    }

    // The message must present exactly a key trusted for this author. Equal
    // candidates verify identically, so only the first match is checked.
    let Some(key) = candidates.find(|key| *key == msg.public_key) else {
        return TrustDecision::KeyNotTrusted;
    };

    match verify_with(key, msg) {
        Ok(true) => TrustDecision::Trusted,
        Ok(false) => TrustDecision::BadSignature,
        Err(failure) => TrustDecision::VerificationFailed(failure),
    }
}

fn verify_with(public_key: &str, msg: &Message) -> Result<bool, VerificationFailure> {
    let signature = STANDARD
        .decode(msg.signature.trim())
        .map_err(|e| VerificationFailure::SignatureEncoding(e.to_string()))?;

    keys::verify(msg.text.as_bytes(), &signature, public_key).map_err(VerificationFailure::KeyFormat)
}

/// Persistent trust store.
///
/// Not safe for concurrent `add_verified_user` calls on the same preference
/// record; callers serialize writes.
pub struct TrustStore {
    trusted: TrustedKeys,
    prefs: Arc<dyn PreferenceStore>,
}

impl TrustStore {
    /// Load the trusted users sequence; a missing value is an empty store
    pub fn load(prefs: Arc<dyn PreferenceStore>) -> Result<Self, TrustStoreError> {
        let json = prefs.get_string_or(TRUSTED_USERS, "[]")?;
        let trusted = TrustedKeys::from_json(&json)?;

        tracing::debug!(entries = trusted.len(), "Loaded trusted users");

        Ok(Self { trusted, prefs })
    }

    /// Append an entry and persist the full sequence immediately.
    ///
    /// Duplicates are accepted and have no effect on trust decisions.
    pub fn add_verified_user(&mut self, entry: TrustEntry) -> Result<(), TrustStoreError> {
        let fingerprint = keys::fingerprint(&entry.public_key);
        tracing::info!(
            username = %entry.username,
            fingerprint = fingerprint.as_deref().unwrap_or("invalid"),
            "Trusting user key"
        );

        self.trusted.push(entry);
        self.prefs.set_string(TRUSTED_USERS, &self.trusted.to_json()?)?;
        self.prefs.save()?;
        Ok(())
    }

    /// Trust the author and key presented by `msg`
    pub fn trust_author(&mut self, msg: &Message) -> Result<(), TrustStoreError> {
        self.add_verified_user(TrustEntry::from_message(msg))
    }

    /// Whether `msg` is signed under a key trusted for its author
    pub fn check_user(&self, msg: &Message) -> bool {
        self.evaluate(msg).is_trusted()
    }

    /// Full trust decision for `msg`
    pub fn evaluate(&self, msg: &Message) -> TrustDecision {
        let decision = evaluate(&self.trusted, msg);
        match &decision {
            TrustDecision::VerificationFailed(failure) => {
                tracing::warn!(
                    username = %msg.creator_name,
                    message_id = %msg.id,
                    %failure,
                    "Could not verify message"
                );
            }
            other => {
                tracing::debug!(
                    username = %msg.creator_name,
                    message_id = %msg.id,
                    decision = other.label(),
                    "Checked message"
                );
            }
        }
        decision
    }

    pub fn entries(&self) -> &TrustedKeys {
        &self.trusted
    }

    pub fn keys_for<'a>(&'a self, username: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.trusted.keys_for(username)
    }

    pub fn is_known(&self, username: &str) -> bool {
        self.trusted.contains_user(username)
    }
}
