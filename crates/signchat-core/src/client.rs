//! Channel client
//!
//! Maps authenticated operations onto the channel server's HTTP interface:
//! - `GET  {base}` connectivity check
//! - `POST {base}/messages/{channel}` send a signed message
//! - `GET  {base}/messages/{channel}?limit=&offset=[&name=]` fetch messages
//! - `GET  {base}/messages/{channel}/online[?name=]` list online users
//!
//! Transport mechanics are delegated to an `HttpTransport`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::authenticator::MessageAuthenticator;
use crate::keys::{Identity, IdentityError, KeyManager};
use crate::message::Message;
use crate::prefs::PreferenceStore;
use crate::transport::{HttpRequest, HttpTransport, TransportError};
use crate::trust::{TrustDecision, TrustStore, TrustStoreError};

/// The server answered with a payload that does not fit the protocol
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Failed to get {0} (null response)")]
    EmptyResponse(&'static str),

    #[error("Malformed {what} response: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Channel client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Trust store error: {0}")]
    TrustStore(#[from] TrustStoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Connection settings for a client session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, `scheme://host:port[/path]`
    pub base_url: String,
    /// Username attached to sent messages
    pub name: String,
    /// Channel to send to and read from
    pub channel: String,
    /// Shared secret for the server, if it requires one
    pub password: Option<String>,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            name: name.into(),
            channel: channel.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// A received message together with its trust decision
#[derive(Debug, Clone)]
pub struct VerifiedMessage {
    pub message: Message,
    pub decision: TrustDecision,
}

impl VerifiedMessage {
    pub fn is_trusted(&self) -> bool {
        self.decision.is_trusted()
    }
}

/// Client for one channel on one server
pub struct ChatClient {
    config: ClientConfig,
    base_url: Url,
    identity: Identity,
    trust_store: TrustStore,
    transport: Arc<dyn HttpTransport>,
}

impl ChatClient {
    /// Create a client session.
    ///
    /// Loads the trusted users and loads or creates the local identity from
    /// `prefs`. Corrupt local state is an error.
    pub fn new(
        config: ClientConfig,
        prefs: Arc<dyn PreferenceStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ClientError> {
        let base_url = parse_base_url(&config.base_url)?;
        let trust_store = TrustStore::load(prefs.clone())?;
        let identity = KeyManager::load_or_create_identity(prefs.as_ref())?;

        tracing::debug!(
            server = %base_url,
            channel = %config.channel,
            name = %config.name,
            "Created chat client"
        );

        Ok(Self {
            config,
            base_url,
            identity,
            trust_store,
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    /// Mutable trust store for promoting authors
    pub fn trust_store_mut(&mut self) -> &mut TrustStore {
        &mut self.trust_store
    }

    /// Probe the server. Any response counts as success; on error the caller
    /// should try a different server.
    pub async fn test_connection(&self) -> Result<(), TransportError> {
        self.transport
            .execute(HttpRequest::get(self.config.base_url.clone()))
            .await
            .map(|_| ())
    }

    /// Sign and send `text` to the channel, returning the stored message
    pub async fn send_message(&self, text: &str) -> Result<Message, ClientError> {
        let msg = MessageAuthenticator::prepare_outgoing(text, &self.identity, &self.config.name);
        let body = serde_json::to_string(&msg.to_outgoing()).map_err(|e| {
            ProtocolError::Malformed {
                what: "send",
                reason: e.to_string(),
            }
        })?;

        let url = self.channel_url(&[])?;
        let request = HttpRequest::post(url, body).with_password(self.config.password.as_deref());
        let response = self.transport.execute(request).await?;

        Ok(parse_body(&response, "send")?)
    }

    /// Fetch up to `amount` messages, skipping the newest `offset`.
    ///
    /// Returned oldest first. With `appear_online` the request carries our
    /// name so the server lists us as online.
    pub async fn get_messages(
        &self,
        amount: u32,
        offset: u32,
        appear_online: bool,
    ) -> Result<Vec<Message>, ClientError> {
        let mut url = self.channel_url(&[])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &amount.to_string())
                .append_pair("offset", &offset.to_string());
            if appear_online {
                query.append_pair("name", &self.config.name);
            }
        }

        let request = HttpRequest::get(url).with_password(self.config.password.as_deref());
        let response = self.transport.execute(request).await?;

        let mut messages: Vec<Message> = parse_body(&response, "messages")?;
        // Server order is newest first
        messages.reverse();
        Ok(messages)
    }

    /// Fetch messages and check each against the trust store
    pub async fn get_verified_messages(
        &self,
        amount: u32,
        offset: u32,
        appear_online: bool,
    ) -> Result<Vec<VerifiedMessage>, ClientError> {
        let messages = self.get_messages(amount, offset, appear_online).await?;
        Ok(messages
            .into_iter()
            .map(|message| VerifiedMessage {
                decision: self.trust_store.evaluate(&message),
                message,
            })
            .collect())
    }

    /// Users currently online in the channel
    pub async fn get_online_users(&self, appear_online: bool) -> Result<Vec<String>, ClientError> {
        let mut url = self.channel_url(&["online"])?;
        if appear_online {
            url.query_pairs_mut().append_pair("name", &self.config.name);
        }

        let request = HttpRequest::get(url).with_password(self.config.password.as_deref());
        let response = self.transport.execute(request).await?;

        Ok(parse_body(&response, "online")?)
    }

    /// Newest message among the last `amount` from `author` whose signature
    /// verifies under its own key. Candidate for trust promotion.
    pub async fn latest_signed_by(
        &self,
        author: &str,
        amount: u32,
    ) -> Result<Option<Message>, ClientError> {
        let messages = self.get_messages(amount, 0, false).await?;
        Ok(messages
            .into_iter()
            .rev()
            .find(|m| m.creator_name == author && MessageAuthenticator::is_self_consistent(m)))
    }

    fn channel_url(&self, extra: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.config.base_url.clone(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push("messages")
            .push(&self.config.channel)
            .extend(extra);
        Ok(url)
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: "cannot be a base".to_string(),
        });
    }

    Ok(url)
}

/// Decode a JSON response. An empty body or JSON `null` is an empty response.
fn parse_body<T: DeserializeOwned>(body: &str, what: &'static str) -> Result<T, ProtocolError> {
    if body.trim().is_empty() {
        return Err(ProtocolError::EmptyResponse(what));
    }

    let parsed: Option<T> = serde_json::from_str(body).map_err(|e| ProtocolError::Malformed {
        what,
        reason: e.to_string(),
    })?;

    parsed.ok_or(ProtocolError::EmptyResponse(what))
}
