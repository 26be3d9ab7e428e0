use serde::{Deserialize, Serialize};

/// Connection lifecycle of the bridge as shown to UI clients.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Qr,
    Connected,
}

/// Identity of the account the bridge is paired with.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

/// One row of the conversation list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub jid: String,
    pub name: String,
    pub phone: String,
    pub is_group: bool,
    pub unread_count: u32,
    pub last_message: String,
    /// Epoch milliseconds; zero when the conversation has no activity yet.
    pub timestamp: u64,
}

/// A message after normalization, ready for display.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub jid: String,
    pub phone: String,
    pub is_group: bool,
    pub from_me: bool,
    pub push_name: String,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

/// Commands a UI session may issue over its socket. The serde tag is the
/// wire event name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    GetChats,
    GetMessages { jid: String },
    SendMessage { jid: String, text: String },
    OpenChat { phone: String },
    DisconnectWhatsapp,
}

/// Events the bridge pushes to UI sessions. `ConnectionStatus`, `Qr`,
/// `UserInfo`, `NewMessage` and `LeadAdvanced` are broadcast to every
/// session; the rest answer the requesting session only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    ConnectionStatus {
        status: ConnectionStatus,
    },
    Qr {
        image: String,
    },
    UserInfo(UserInfo),
    ChatsList {
        chats: Vec<ChatSummary>,
    },
    ChatMessages {
        jid: String,
        messages: Vec<MessageView>,
    },
    ChatOpened {
        jid: String,
        phone: String,
        messages: Vec<MessageView>,
    },
    NewMessage(MessageView),
    SendError {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    LeadAdvanced {
        lead_id: i64,
        stage: String,
    },
}
