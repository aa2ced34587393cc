//! Signing on the send path and trust checks on the receive path

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::keys::{self, Identity};
use crate::message::Message;
use crate::trust::TrustStore;

/// Stateless glue between the identity, the trust store and the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageAuthenticator;

impl MessageAuthenticator {
    /// Build a signed message ready to send.
    ///
    /// `id` and `created_at` are left for the server to assign.
    pub fn prepare_outgoing(text: &str, identity: &Identity, sender_name: &str) -> Message {
        Message {
            creator_name: sender_name.to_string(),
            text: text.to_string(),
            signature: STANDARD.encode(identity.sign(text.as_bytes())),
            public_key: identity.public_key().to_string(),
            ..Default::default()
        }
    }

    /// Whether `msg` is authentic according to `trust_store`
    pub fn is_authentic(msg: &Message, trust_store: &TrustStore) -> bool {
        trust_store.check_user(msg)
    }

    /// Whether the signature verifies under the key the message itself
    /// presents. Says nothing about who owns that key.
    pub fn is_self_consistent(msg: &Message) -> bool {
        let Ok(signature) = STANDARD.decode(msg.signature.trim()) else {
            return false;
        };
        keys::verify(msg.text.as_bytes(), &signature, &msg.public_key).unwrap_or(false)
    }
}
