//! Integration tests for SignChat client flows.
//!
//! These tests drive complete client sessions against an in-process channel
//! server:
//! - Send, fetch and trust promotion between two users
//! - Fetch ordering and protocol error handling
//! - Identity and trust persistence across sessions

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use signchat_core::{
    ChatClient, ClientConfig, ClientError, HttpRequest, HttpTransport, JsonFilePrefs, MemoryPrefs,
    Message, Method, OutgoingMessage, ProtocolError, TransportError, TrustDecision, TrustEntry,
};
use tempfile::TempDir;
use url::Url;

/// Minimal channel server: stores posted messages per channel and serves them
/// newest first.
#[derive(Default)]
struct ChannelServer {
    channels: Mutex<HashMap<String, Vec<Message>>>,
    online: Mutex<Vec<String>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ChannelServer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a raw message as if another client had posted it
    fn inject(&self, channel: &str, msg: Message) {
        let mut channels = self.channels.lock().unwrap();
        let messages = channels.entry(channel.to_string()).or_default();
        let mut msg = msg;
        msg.id = format!("m{}", messages.len() + 1);
        msg.created_at = 638_396_640_000_000_000 + messages.len() as i64;
        messages.push(msg);
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ChannelServer {
    async fn execute(&self, request: HttpRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let url = Url::parse(&request.url).unwrap();
        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if let Some(name) = query.get("name") {
            let mut online = self.online.lock().unwrap();
            if !online.contains(name) {
                online.push(name.clone());
            }
        }

        match (request.method, segments.as_slice()) {
            (Method::Get, []) => Ok("OK".to_string()),
            (Method::Post, [messages, channel]) if messages == "messages" => {
                let body: OutgoingMessage = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
                self.inject(
                    channel,
                    Message {
                        creator_name: body.creator_name,
                        text: body.text,
                        signature: body.signature,
                        public_key: body.public_key,
                        ..Default::default()
                    },
                );
                let channels = self.channels.lock().unwrap();
                let stored = channels[channel.as_str()].last().unwrap();
                Ok(serde_json::to_string(stored).unwrap())
            }
            (Method::Get, [messages, channel]) if messages == "messages" => {
                let limit: usize = query["limit"].parse().unwrap();
                let offset: usize = query["offset"].parse().unwrap();
                let channels = self.channels.lock().unwrap();
                let page: Vec<Message> = channels
                    .get(channel.as_str())
                    .map(|m| m.iter().rev().skip(offset).take(limit).cloned().collect())
                    .unwrap_or_default();
                Ok(serde_json::to_string(&page).unwrap())
            }
            (Method::Get, [messages, _channel, online]) if messages == "messages" && online == "online" => {
                Ok(serde_json::to_string(&*self.online.lock().unwrap()).unwrap())
            }
            _ => Ok("null".to_string()),
        }
    }
}

/// Transport that always fails to connect
struct Unreachable;

#[async_trait]
impl HttpTransport for Unreachable {
    async fn execute(&self, _request: HttpRequest) -> Result<String, TransportError> {
        Err(TransportError::ConnectionFailed("connection refused".to_string()))
    }
}

/// Transport that answers every request with a fixed body
struct Fixed(&'static str);

#[async_trait]
impl HttpTransport for Fixed {
    async fn execute(&self, _request: HttpRequest) -> Result<String, TransportError> {
        Ok(self.0.to_string())
    }
}

fn session(name: &str, server: Arc<ChannelServer>) -> ChatClient {
    ChatClient::new(
        ClientConfig::new("http://chat.test:5000", name, "general"),
        Arc::new(MemoryPrefs::new()),
        server,
    )
    .unwrap()
}

/// Test: a first-seen author is untrusted until explicitly promoted
#[tokio::test]
async fn integration_trust_on_first_use() {
    let server = ChannelServer::new();
    let alice = session("alice", server.clone());
    let mut bob = session("bob", server.clone());

    let sent = alice.send_message("hello bob").await.unwrap();
    assert_eq!(sent.id, "m1");
    assert_eq!(sent.public_key, alice.identity().public_key());

    let received = bob.get_verified_messages(10, 0, true).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].decision, TrustDecision::UnknownAuthor);

    // Bob promotes alice's key after checking it out of band
    let candidate = bob.latest_signed_by("alice", 10).await.unwrap().unwrap();
    bob.trust_store_mut().trust_author(&candidate).unwrap();

    let received = bob.get_verified_messages(10, 0, true).await.unwrap();
    assert!(received[0].is_trusted());
}

/// Test: an impostor using a trusted name with their own key is rejected
#[tokio::test]
async fn integration_impostor_rejected() {
    let server = ChannelServer::new();
    let alice = session("alice", server.clone());
    let impostor = session("alice", server.clone());
    let mut bob = session("bob", server.clone());

    bob.trust_store_mut()
        .add_verified_user(TrustEntry::new("alice", alice.identity().public_key()))
        .unwrap();

    alice.send_message("real").await.unwrap();
    impostor.send_message("fake").await.unwrap();

    let received = bob.get_verified_messages(10, 0, false).await.unwrap();
    let decisions: Vec<_> = received
        .iter()
        .map(|m| (m.message.text.as_str(), m.decision.clone()))
        .collect();
    assert_eq!(
        decisions,
        vec![
            ("real", TrustDecision::Trusted),
            ("fake", TrustDecision::KeyNotTrusted),
        ]
    );
}

/// Test: a message altered in transit fails verification
#[tokio::test]
async fn integration_tampered_message() {
    let server = ChannelServer::new();
    let alice = session("alice", server.clone());
    let mut bob = session("bob", server.clone());

    let mut sent = alice.send_message("pay 10").await.unwrap();
    bob.trust_store_mut().trust_author(&sent).unwrap();

    sent.text = "pay 1000".to_string();
    server.inject("general", sent);

    let received = bob.get_verified_messages(10, 0, false).await.unwrap();
    assert!(received[0].is_trusted());
    assert_eq!(received[1].decision, TrustDecision::BadSignature);
}

/// Test: server newest-first order is returned oldest first
#[tokio::test]
async fn integration_fetch_ordering() {
    let server = ChannelServer::new();
    let alice = session("alice", server.clone());

    for text in ["one", "two", "three"] {
        alice.send_message(text).await.unwrap();
    }

    let texts: Vec<String> = alice
        .get_messages(10, 0, false)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);

    // Offset skips the newest
    let texts: Vec<String> = alice
        .get_messages(2, 1, false)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["one", "two"]);
}

/// Test: null bodies are protocol errors, not empty lists
#[tokio::test]
async fn integration_null_response() {
    let client = ChatClient::new(
        ClientConfig::new("http://chat.test:5000", "alice", "general"),
        Arc::new(MemoryPrefs::new()),
        Arc::new(Fixed("null")),
    )
    .unwrap();

    assert!(matches!(
        client.get_messages(10, 0, true).await,
        Err(ClientError::Protocol(ProtocolError::EmptyResponse("messages")))
    ));
    assert!(matches!(
        client.get_online_users(false).await,
        Err(ClientError::Protocol(ProtocolError::EmptyResponse("online")))
    ));
}

/// Test: transport failures stay distinguishable from protocol errors
#[tokio::test]
async fn integration_transport_failure() {
    let client = ChatClient::new(
        ClientConfig::new("http://chat.test:5000", "alice", "general"),
        Arc::new(MemoryPrefs::new()),
        Arc::new(Unreachable),
    )
    .unwrap();

    assert!(client.test_connection().await.is_err());
    assert!(matches!(
        client.get_messages(10, 0, true).await,
        Err(ClientError::Transport(TransportError::ConnectionFailed(_)))
    ));
}

/// Test: password is attached to channel requests but not the connectivity check
#[tokio::test]
async fn integration_password_forwarded() {
    let server = ChannelServer::new();
    let client = ChatClient::new(
        ClientConfig::new("http://chat.test:5000", "alice", "general").with_password("s3cret"),
        Arc::new(MemoryPrefs::new()),
        server.clone(),
    )
    .unwrap();

    client.test_connection().await.unwrap();
    client.send_message("hi").await.unwrap();
    client.get_online_users(true).await.unwrap();

    let passwords: Vec<Option<String>> = server.requests().into_iter().map(|r| r.password).collect();
    assert_eq!(
        passwords,
        vec![None, Some("s3cret".to_string()), Some("s3cret".to_string())]
    );
}

/// Test: online listing reflects clients that asked to appear online
#[tokio::test]
async fn integration_online_users() {
    let server = ChannelServer::new();
    let alice = session("alice", server.clone());
    let bob = session("bob", server.clone());

    alice.get_messages(1, 0, true).await.unwrap();
    bob.get_messages(1, 0, false).await.unwrap();

    assert_eq!(alice.get_online_users(false).await.unwrap(), vec!["alice"]);
}

/// Test: identity and trust survive a new session on the same file
#[tokio::test]
async fn integration_state_persists_across_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("chatdata.json");
    let server = ChannelServer::new();

    let (public_key, trusted_key) = {
        let mut client = ChatClient::new(
            ClientConfig::new("http://chat.test:5000", "bob", "general"),
            Arc::new(JsonFilePrefs::new(&path)),
            server.clone(),
        )
        .unwrap();

        let alice = session("alice", server.clone());
        let sent = alice.send_message("hi").await.unwrap();
        client.trust_store_mut().trust_author(&sent).unwrap();

        (
            client.identity().public_key().to_string(),
            alice.identity().public_key().to_string(),
        )
    };

    let client = ChatClient::new(
        ClientConfig::new("http://chat.test:5000", "bob", "general"),
        Arc::new(JsonFilePrefs::new(&path)),
        server.clone(),
    )
    .unwrap();

    assert_eq!(client.identity().public_key(), public_key);
    assert_eq!(client.trust_store().keys_for("alice").collect::<Vec<_>>(), vec![trusted_key]);

    let received = client.get_verified_messages(10, 0, false).await.unwrap();
    assert!(received[0].is_trusted());
}

/// Test: corrupt key material fails client construction instead of replacing it
#[test]
fn integration_corrupt_identity_is_fatal() {
    let prefs = Arc::new(MemoryPrefs::with_values([("private_key", "zz")]));
    let result = ChatClient::new(
        ClientConfig::new("http://chat.test:5000", "alice", "general"),
        prefs,
        Arc::new(Fixed("[]")),
    );
    assert!(matches!(result, Err(ClientError::Identity(_))));
}
