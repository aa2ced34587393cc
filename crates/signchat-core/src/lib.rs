//! SignChat Core - message signing and trust for the SignChat channel protocol.
//!
//! This crate implements:
//! - Local signing identity (generate or load an Ed25519 keypair)
//! - Trust store of accepted (username, public key) pairs
//! - Signing of outgoing messages and trust checks of received ones
//! - The channel client that maps these onto the server's HTTP interface
//!
//! Messages are signed, not encrypted. Trust is established explicitly by the
//! application the first time a key is seen.

#![forbid(unsafe_code)]

// Identity and trust
pub mod keys;
pub mod trust;
pub mod authenticator;

// Wire types and client
pub mod message;
pub mod client;
pub mod transport;

// Local state
pub mod prefs;

#[cfg(test)]
mod proptests;

pub use authenticator::MessageAuthenticator;
pub use client::{ChatClient, ClientConfig, ClientError, ProtocolError, VerifiedMessage};
pub use keys::{Identity, IdentityError, KeyFormatError, KeyManager};
pub use message::{Message, OutgoingMessage};
pub use prefs::{JsonFilePrefs, MemoryPrefs, PreferenceStore, PrefsError};
pub use transport::{HttpRequest, HttpTransport, Method, TransportError};
pub use trust::{TrustDecision, TrustEntry, TrustStore, TrustStoreError, TrustedKeys};

#[cfg(feature = "http-client")]
pub use transport::ReqwestTransport;
