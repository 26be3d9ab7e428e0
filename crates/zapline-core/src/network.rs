use crate::auth::AuthState;
use crate::chats::{ChatUpsert, ContactUpsert, MessageBatchKind};
use crate::error::BridgeError;
use crate::jid::Jid;
use crate::normalize::{MessageContent, MessageKey, RawMessage};
use crate::time::now_ms;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;
use zapline_api::UserInfo;

/// Why the network closed the session. Everything except `LoggedOut`
/// retries with credentials intact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    LoggedOut,
    ConnectionLost,
    TimedOut,
}

/// Raw events the network layer delivers while a session is up.
#[derive(Clone, Debug)]
pub enum NetworkEvent {
    PairingCode(String),
    Open(UserInfo),
    Closed(DisconnectReason),
    /// Batched credential writes (`Some`) and deletes (`None`).
    CredsUpdate(Vec<(String, Option<Vec<u8>>)>),
    ChatsSet {
        chats: Vec<ChatUpsert>,
        is_latest: bool,
    },
    ChatsUpsert(Vec<ChatUpsert>),
    ChatsUpdate(Vec<ChatUpsert>),
    ContactsUpsert(Vec<ContactUpsert>),
    MessagesUpsert {
        messages: Vec<RawMessage>,
        kind: MessageBatchKind,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct ConnectOptions {
    /// Upper bound on the handshake; the network signals an ordinary
    /// closure when it expires.
    pub handshake_timeout_ms: u64,
}

/// A live session: the event feed plus the write half.
pub struct NetworkSession {
    pub events: mpsc::Receiver<NetworkEvent>,
    pub handle: Arc<dyn NetworkHandle>,
}

#[async_trait]
pub trait NetworkHandle: Send + Sync {
    /// Dispatch a text message; returns the echoed sent message.
    async fn send_text(&self, jid: &Jid, text: &str) -> Result<RawMessage, BridgeError>;
    /// Request logout; the network answers with a logged-out closure.
    async fn logout(&self) -> Result<(), BridgeError>;
}

/// The single outbound connection to the messaging network.
#[async_trait]
pub trait Network: Send + Sync {
    async fn connect(
        &self,
        auth: AuthState,
        opts: ConnectOptions,
    ) -> Result<NetworkSession, BridgeError>;
}

#[derive(Default)]
struct MockInner {
    event_tx: Option<mpsc::Sender<NetworkEvent>>,
    sent: Vec<(Jid, String)>,
    connects: u32,
    fail_sends: bool,
}

/// Scripted in-memory network. Tests (and the daemon, until a real
/// transport is wired behind the same trait) inject events with `emit`
/// and observe outbound traffic with `sent`.
#[derive(Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Mutex<MockInner>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an event into the currently open session. Dropped with a log
    /// line when no session is up.
    pub async fn emit(&self, event: NetworkEvent) {
        let tx = self.inner.lock().await.event_tx.clone();
        match tx {
            Some(tx) => {
                let _ = tx.send(event).await;
            }
            None => log::debug!("mock network dropped event: no open session"),
        }
    }

    pub async fn sent(&self) -> Vec<(Jid, String)> {
        self.inner.lock().await.sent.clone()
    }

    pub async fn connect_count(&self) -> u32 {
        self.inner.lock().await.connects
    }

    pub async fn set_fail_sends(&self, fail: bool) {
        self.inner.lock().await.fail_sends = fail;
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn connect(
        &self,
        _auth: AuthState,
        _opts: ConnectOptions,
    ) -> Result<NetworkSession, BridgeError> {
        let (tx, rx) = mpsc::channel(64);
        let mut inner = self.inner.lock().await;
        inner.event_tx = Some(tx);
        inner.connects += 1;
        Ok(NetworkSession {
            events: rx,
            handle: Arc::new(MockHandle {
                inner: self.inner.clone(),
            }),
        })
    }
}

struct MockHandle {
    inner: Arc<Mutex<MockInner>>,
}

#[async_trait]
impl NetworkHandle for MockHandle {
    async fn send_text(&self, jid: &Jid, text: &str) -> Result<RawMessage, BridgeError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_sends {
            return Err(BridgeError::Send("mock send rejected".to_string()));
        }
        inner.sent.push((jid.clone(), text.to_string()));
        Ok(RawMessage {
            key: MessageKey {
                id: Uuid::new_v4().to_string(),
                remote_jid: jid.clone(),
                from_me: true,
            },
            push_name: None,
            content: MessageContent::Text {
                body: text.to_string(),
            },
            timestamp: Some(now_ms() / 1000),
        })
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        let tx = self.inner.lock().await.event_tx.clone();
        if let Some(tx) = tx {
            let _ = tx
                .send(NetworkEvent::Closed(DisconnectReason::LoggedOut))
                .await;
        }
        Ok(())
    }
}
