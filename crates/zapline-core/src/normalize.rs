use crate::jid::Jid;
use crate::time::now_ms;
use serde::{Deserialize, Serialize};
use zapline_api::MessageView;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageKey {
    pub id: String,
    pub remote_jid: Jid,
    #[serde(default)]
    pub from_me: bool,
}

/// The payload shapes the network delivers. Anything it grows beyond
/// these lands in `Unknown` and renders as the generic placeholder.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum MessageContent {
    Text {
        body: String,
    },
    ExtendedText {
        body: String,
    },
    Image {
        caption: Option<String>,
    },
    Video,
    Audio,
    Document {
        file_name: Option<String>,
    },
    Sticker,
    ContactCard {
        display_name: Option<String>,
    },
    Location,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
    /// Epoch seconds as delivered by the network; absent on some
    /// backfills.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Plain or extended text body, used for chat-list previews. Media
/// placeholders are display-only and never become a preview.
pub fn text_body(content: &MessageContent) -> Option<&str> {
    match content {
        MessageContent::Text { body } | MessageContent::ExtendedText { body } => Some(body),
        _ => None,
    }
}

fn display_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text { body } | MessageContent::ExtendedText { body } => body.clone(),
        MessageContent::Image {
            caption: Some(caption),
        } => format!("📷 {}", caption),
        MessageContent::Image { caption: None } => "📷 Imagem".to_string(),
        MessageContent::Video => "🎥 Vídeo".to_string(),
        MessageContent::Audio => "🎤 Áudio".to_string(),
        MessageContent::Document { file_name } => {
            format!("📄 {}", file_name.as_deref().unwrap_or("Documento"))
        }
        MessageContent::Sticker => "🎨 Sticker".to_string(),
        MessageContent::ContactCard { display_name } => {
            format!("👤 {}", display_name.as_deref().unwrap_or("Contato"))
        }
        MessageContent::Location => "📍 Localização".to_string(),
        MessageContent::Unknown => "💬 Mensagem".to_string(),
    }
}

/// Pure mapping from a raw network message to the canonical display
/// record. Network timestamps are epoch seconds; a missing timestamp is
/// substituted with the current time.
pub fn parse_message(msg: &RawMessage) -> MessageView {
    let jid = &msg.key.remote_jid;
    MessageView {
        id: msg.key.id.clone(),
        jid: jid.to_string(),
        phone: jid.phone(),
        is_group: jid.is_group(),
        from_me: msg.key.from_me,
        push_name: msg.push_name.clone().unwrap_or_default(),
        text: display_text(&msg.content),
        timestamp: msg
            .timestamp
            .map(|secs| secs.saturating_mul(1000))
            .unwrap_or_else(now_ms),
    }
}
