use crate::config::BridgeConfig;
use crate::jid::Jid;
use crate::normalize::{text_body, RawMessage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use zapline_api::ChatSummary;

/// Fields a chat event may carry. Merge is field-wise last-writer-wins:
/// a `Some` overwrites, a `None` leaves the cached value alone.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatUpsert {
    pub id: Jid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notify: Option<String>,
    /// Epoch seconds of the last activity.
    #[serde(default)]
    pub conversation_timestamp: Option<u64>,
    #[serde(default)]
    pub unread_count: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactUpsert {
    pub id: Jid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notify: Option<String>,
}

/// Subtype of a message batch. Only `Append` and `Notify` mutate the
/// cache; anything else is ignored.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageBatchKind {
    Append,
    Notify,
    Prepend,
}

#[derive(Clone, Debug, Default)]
pub struct Chat {
    pub id: Jid,
    pub name: Option<String>,
    pub notify: Option<String>,
    pub last_message: Option<RawMessage>,
    pub conversation_timestamp: Option<u64>,
    pub unread_count: u32,
}

impl Chat {
    fn from_upsert(upsert: &ChatUpsert) -> Self {
        let mut chat = Chat {
            id: upsert.id.clone(),
            ..Default::default()
        };
        chat.merge(upsert);
        chat
    }

    fn merge(&mut self, patch: &ChatUpsert) {
        if patch.name.is_some() {
            self.name = patch.name.clone();
        }
        if patch.notify.is_some() {
            self.notify = patch.notify.clone();
        }
        if patch.conversation_timestamp.is_some() {
            self.conversation_timestamp = patch.conversation_timestamp;
        }
        if let Some(unread) = patch.unread_count {
            self.unread_count = unread;
        }
    }
}

#[derive(Default)]
struct StoreInner {
    chats: HashMap<Jid, Chat>,
    messages: HashMap<Jid, Vec<RawMessage>>,
    contacts: HashMap<Jid, ContactUpsert>,
}

/// In-memory reconciliation of the network's chat/contact/message events
/// into one consistent per-conversation view. All reads are point-in-time
/// snapshots taken under the same lock the writers use.
#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Mutex<StoreInner>>,
    message_cap: usize,
    chat_page: usize,
    history_page: usize,
}

impl ChatStore {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            message_cap: config.message_cap,
            chat_page: config.chat_page,
            history_page: config.history_page,
        }
    }

    fn upsert_chat(inner: &mut StoreInner, chat: &ChatUpsert) {
        inner
            .chats
            .entry(chat.id.clone())
            .and_modify(|existing| existing.merge(chat))
            .or_insert_with(|| Chat::from_upsert(chat));
    }

    /// Bulk replace: with `is_latest` the whole conversation set is
    /// dropped first, then every given chat inserted.
    pub async fn apply_chats_set(&self, chats: &[ChatUpsert], is_latest: bool) {
        let mut inner = self.inner.lock().await;
        if is_latest {
            inner.chats.clear();
        }
        for chat in chats {
            Self::upsert_chat(&mut inner, chat);
        }
    }

    pub async fn apply_chats_upsert(&self, chats: &[ChatUpsert]) {
        let mut inner = self.inner.lock().await;
        for chat in chats {
            Self::upsert_chat(&mut inner, chat);
        }
    }

    /// Targeted update: merges onto existing records only. An unknown id
    /// never creates a conversation.
    pub async fn apply_chats_update(&self, updates: &[ChatUpsert]) {
        let mut inner = self.inner.lock().await;
        for update in updates {
            if let Some(existing) = inner.chats.get_mut(&update.id) {
                existing.merge(update);
            }
        }
    }

    pub async fn apply_contacts_upsert(&self, contacts: &[ContactUpsert]) {
        let mut inner = self.inner.lock().await;
        for contact in contacts {
            let entry = inner
                .contacts
                .entry(contact.id.clone())
                .or_insert_with(|| ContactUpsert {
                    id: contact.id.clone(),
                    ..Default::default()
                });
            if contact.name.is_some() {
                entry.name = contact.name.clone();
            }
            if contact.notify.is_some() {
                entry.notify = contact.notify.clone();
            }
        }
    }

    /// Message batch: dedup by id within the conversation, append, evict
    /// oldest past the cap, and roll the parent chat's last-message /
    /// timestamp / unread fields. A message for an unknown conversation
    /// creates a minimal stub.
    pub async fn apply_messages(&self, messages: &[RawMessage], kind: MessageBatchKind) {
        if !matches!(kind, MessageBatchKind::Append | MessageBatchKind::Notify) {
            return;
        }
        let mut inner = self.inner.lock().await;
        for msg in messages {
            let jid = msg.key.remote_jid.clone();
            let accepted = {
                let list = inner.messages.entry(jid.clone()).or_default();
                if list.iter().any(|m| m.key.id == msg.key.id) {
                    false
                } else {
                    list.push(msg.clone());
                    if list.len() > self.message_cap {
                        list.remove(0);
                    }
                    true
                }
            };
            if !accepted {
                continue;
            }
            match inner.chats.get_mut(&jid) {
                Some(chat) => {
                    chat.last_message = Some(msg.clone());
                    chat.conversation_timestamp = msg.timestamp;
                    if !msg.key.from_me {
                        chat.unread_count += 1;
                    }
                }
                None => {
                    inner.chats.insert(
                        jid.clone(),
                        Chat {
                            id: jid,
                            last_message: Some(msg.clone()),
                            conversation_timestamp: msg.timestamp,
                            unread_count: if msg.key.from_me { 0 } else { 1 },
                            ..Default::default()
                        },
                    );
                }
            }
        }
    }

    /// Conversation list: newest activity first, one page, without the
    /// status-broadcast pseudo-conversation.
    pub async fn chats(&self) -> Vec<ChatSummary> {
        let inner = self.inner.lock().await;
        let mut chats: Vec<&Chat> = inner
            .chats
            .values()
            .filter(|chat| !chat.id.is_status_broadcast())
            .collect();
        chats.sort_by(|a, b| {
            b.conversation_timestamp
                .unwrap_or(0)
                .cmp(&a.conversation_timestamp.unwrap_or(0))
        });
        chats
            .into_iter()
            .take(self.chat_page)
            .map(|chat| {
                let phone = chat.id.phone();
                let contact = inner.contacts.get(&chat.id);
                let name = chat
                    .name
                    .clone()
                    .or_else(|| chat.notify.clone())
                    .or_else(|| contact.and_then(|c| c.name.clone()))
                    .or_else(|| contact.and_then(|c| c.notify.clone()))
                    .unwrap_or_else(|| phone.clone());
                ChatSummary {
                    jid: chat.id.to_string(),
                    name,
                    phone,
                    is_group: chat.id.is_group(),
                    unread_count: chat.unread_count,
                    last_message: chat
                        .last_message
                        .as_ref()
                        .and_then(|m| text_body(&m.content))
                        .unwrap_or("")
                        .to_string(),
                    timestamp: chat
                        .conversation_timestamp
                        .map(|secs| secs.saturating_mul(1000))
                        .unwrap_or(0),
                }
            })
            .collect()
    }

    /// The last page of a conversation's messages in arrival order.
    pub async fn messages(&self, jid: &Jid) -> Vec<RawMessage> {
        let inner = self.inner.lock().await;
        match inner.messages.get(jid) {
            Some(list) => {
                let start = list.len().saturating_sub(self.history_page);
                list[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub async fn message(&self, jid: &Jid, id: &str) -> Option<RawMessage> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .get(jid)
            .and_then(|list| list.iter().find(|m| m.key.id == id))
            .cloned()
    }

    pub async fn chat_count(&self) -> usize {
        self.inner.lock().await.chats.len()
    }
}
