use crate::auth::{AuthState, CredentialStore};
use crate::chats::{ChatStore, MessageBatchKind};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::event::{BridgeEvent, EventBus, EventReceiver};
use crate::jid::{digits_only, Jid};
use crate::leads::{advance_on_reply, LeadStore};
use crate::network::{
    ConnectOptions, DisconnectReason, Network, NetworkEvent, NetworkHandle,
};
use crate::normalize::{parse_message, RawMessage};
use crate::qr::pairing_data_url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use zapline_api::{ChatSummary, ConnectionStatus, MessageView, UserInfo};

/// Process-wide connection state. Only the session manager writes it.
#[derive(Clone, Debug, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    AwaitingPairing {
        qr: Option<String>,
    },
    Connected {
        user: UserInfo,
    },
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::AwaitingPairing { .. } => ConnectionStatus::Qr,
            ConnectionState::Connected { .. } => ConnectionStatus::Connected,
        }
    }
}

/// Point-in-time view pushed to a UI session when it connects.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    pub status: ConnectionStatus,
    pub qr: Option<String>,
    pub user: Option<UserInfo>,
}

/// Owns the single network session and drives the reconnect loop.
/// Restarts are unconditional: a logged-out closure clears stored
/// credentials and re-pairs after a short delay, anything else retries
/// after a longer one. There is no retry cap.
#[derive(Clone)]
pub struct SessionManager {
    config: BridgeConfig,
    network: Arc<dyn Network>,
    auth: AuthState,
    leads: Arc<dyn LeadStore>,
    chats: ChatStore,
    events: EventBus,
    state: Arc<Mutex<ConnectionState>>,
    handle: Arc<Mutex<Option<Arc<dyn NetworkHandle>>>>,
    shutdown: Arc<Notify>,
}

impl SessionManager {
    pub fn new(
        config: BridgeConfig,
        network: Arc<dyn Network>,
        credentials: Arc<dyn CredentialStore>,
        leads: Arc<dyn LeadStore>,
    ) -> Self {
        let chats = ChatStore::new(&config);
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            network,
            auth: AuthState::new(credentials),
            leads,
            chats,
            events,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            handle: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Spawn the reconnect loop.
    pub fn start(&self) {
        let cloned = self.clone();
        tokio::spawn(async move {
            cloned.run().await;
        });
    }

    /// Stop the loop. Not part of the bridge protocol (an explicit
    /// disconnect re-pairs instead); used on process shutdown.
    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let state = self.state.lock().await;
        match &*state {
            ConnectionState::Disconnected => StateSnapshot {
                status: ConnectionStatus::Disconnected,
                qr: None,
                user: None,
            },
            ConnectionState::AwaitingPairing { qr } => StateSnapshot {
                status: ConnectionStatus::Qr,
                qr: qr.clone(),
                user: None,
            },
            ConnectionState::Connected { user } => StateSnapshot {
                status: ConnectionStatus::Connected,
                qr: None,
                user: Some(user.clone()),
            },
        }
    }

    pub async fn chats(&self) -> Vec<ChatSummary> {
        self.chats.chats().await
    }

    pub async fn chat_messages(&self, jid: &str) -> Vec<MessageView> {
        let jid = Jid::new(jid);
        self.chats
            .messages(&jid)
            .await
            .iter()
            .map(parse_message)
            .collect()
    }

    /// Normalize a phone number to its canonical jid and return whatever
    /// history is cached for it. An empty or unroutable phone yields an
    /// empty history, not an error.
    pub async fn open_by_phone(&self, phone: &str) -> (String, String, Vec<MessageView>) {
        let cleaned = digits_only(phone);
        let jid = Jid::from_phone(&cleaned);
        let messages = self
            .chats
            .messages(&jid)
            .await
            .iter()
            .map(parse_message)
            .collect();
        (jid.to_string(), cleaned, messages)
    }

    /// Send a text message. Sends are serialized in arrival order by the
    /// handle lock; the resulting message is broadcast on success, while
    /// a failure is returned to the caller alone.
    pub async fn send_text(&self, jid: &str, text: &str) -> Result<MessageView, BridgeError> {
        if !matches!(*self.state.lock().await, ConnectionState::Connected { .. }) {
            return Err(BridgeError::NotConnected);
        }
        let target = Jid::normalize(jid);
        let sent = {
            let guard = self.handle.lock().await;
            let handle = guard.as_ref().ok_or(BridgeError::NotConnected)?;
            handle.send_text(&target, text).await?
        };
        let view = parse_message(&sent);
        self.events.publish(BridgeEvent::NewMessage(view.clone()));
        Ok(view)
    }

    /// Explicit user-initiated disconnect: request logout, which comes
    /// back as a logged-out closure and re-pairs with cleared credentials.
    pub async fn disconnect(&self) {
        let handle = self.handle.lock().await.clone();
        if let Some(handle) = handle {
            if let Err(err) = handle.logout().await {
                log::warn!("logout request failed: {}", err);
            }
        }
    }

    pub async fn run(&self) {
        loop {
            let reason = match self.connect_once().await {
                Ok(Some(reason)) => Some(reason),
                Ok(None) => break,
                Err(err) => {
                    log::warn!("connection attempt failed: {}", err);
                    None
                }
            };
            let delay = match reason {
                Some(DisconnectReason::LoggedOut) => {
                    log::info!("logged out, clearing stored credentials");
                    self.auth.clear().await;
                    Duration::from_millis(self.config.logout_retry_delay_ms)
                }
                Some(reason) => {
                    log::info!("session closed ({:?}), reconnecting", reason);
                    Duration::from_millis(self.config.reconnect_delay_ms)
                }
                None => Duration::from_millis(self.config.reconnect_delay_ms),
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.notified() => break,
            }
        }
        log::info!("session manager stopped");
    }

    /// One connection attempt: consume events until closure or shutdown.
    /// `Ok(None)` means shutdown was requested.
    async fn connect_once(&self) -> Result<Option<DisconnectReason>, BridgeError> {
        let opts = ConnectOptions {
            handshake_timeout_ms: self.config.handshake_timeout_ms,
        };
        let session = self.network.connect(self.auth.clone(), opts).await?;
        *self.handle.lock().await = Some(session.handle.clone());
        let mut events = session.events;
        let outcome = loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = self.shutdown.notified() => break None,
            };
            let Some(event) = event else {
                break Some(DisconnectReason::ConnectionLost);
            };
            if let Some(reason) = self.apply_event(event).await {
                break Some(reason);
            }
        };
        *self.handle.lock().await = None;
        if outcome.is_some() {
            *self.state.lock().await = ConnectionState::Disconnected;
            self.events
                .publish(BridgeEvent::ConnectionStatus(ConnectionStatus::Disconnected));
        }
        Ok(outcome)
    }

    /// Returns the closure reason when the event ends the session.
    async fn apply_event(&self, event: NetworkEvent) -> Option<DisconnectReason> {
        match event {
            NetworkEvent::PairingCode(code) => {
                let image = pairing_data_url(&code);
                *self.state.lock().await = ConnectionState::AwaitingPairing { qr: image.clone() };
                if let Some(image) = image {
                    self.events.publish(BridgeEvent::PairingCode { image });
                }
                self.events
                    .publish(BridgeEvent::ConnectionStatus(ConnectionStatus::Qr));
                log::info!("pairing code issued");
                None
            }
            NetworkEvent::Open(user) => {
                *self.state.lock().await = ConnectionState::Connected { user: user.clone() };
                self.events
                    .publish(BridgeEvent::ConnectionStatus(ConnectionStatus::Connected));
                self.events.publish(BridgeEvent::UserInfo(user));
                log::info!("session open");
                None
            }
            NetworkEvent::Closed(reason) => Some(reason),
            NetworkEvent::CredsUpdate(batch) => {
                self.auth.set_keys(&batch).await;
                None
            }
            NetworkEvent::ChatsSet { chats, is_latest } => {
                self.chats.apply_chats_set(&chats, is_latest).await;
                None
            }
            NetworkEvent::ChatsUpsert(chats) => {
                self.chats.apply_chats_upsert(&chats).await;
                None
            }
            NetworkEvent::ChatsUpdate(updates) => {
                self.chats.apply_chats_update(&updates).await;
                None
            }
            NetworkEvent::ContactsUpsert(contacts) => {
                self.chats.apply_contacts_upsert(&contacts).await;
                None
            }
            NetworkEvent::MessagesUpsert { messages, kind } => {
                self.handle_messages(messages, kind).await;
                None
            }
        }
    }

    async fn handle_messages(&self, messages: Vec<RawMessage>, kind: MessageBatchKind) {
        self.chats.apply_messages(&messages, kind).await;
        if kind != MessageBatchKind::Notify {
            return;
        }
        for msg in messages {
            let jid = &msg.key.remote_jid;
            if jid.as_str().is_empty() || jid.is_status_broadcast() {
                continue;
            }
            let view = parse_message(&msg);
            self.events.publish(BridgeEvent::NewMessage(view.clone()));
            if !msg.key.from_me {
                if let Some((lead_id, stage)) =
                    advance_on_reply(self.leads.as_ref(), &self.config, &view.phone).await
                {
                    self.events.publish(BridgeEvent::LeadAdvanced { lead_id, stage });
                }
            }
        }
    }
}
