use serde::{Deserialize, Serialize};

/// Tunables of the bridge core. The defaults match the behavior of the
/// production deployment: 100 cached messages per conversation, pages of
/// 100 chats and 50 messages, 2s/3s restart delays, 60s handshake bound.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default = "default_message_cap")]
    pub message_cap: usize,
    #[serde(default = "default_chat_page")]
    pub chat_page: usize,
    #[serde(default = "default_history_page")]
    pub history_page: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_logout_retry_delay_ms")]
    pub logout_retry_delay_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Stages a lead may be auto-advanced from when the prospect replies.
    #[serde(default = "default_early_stages")]
    pub early_stages: Vec<String>,
    /// Stage a replying lead is advanced to.
    #[serde(default = "default_responded_stage")]
    pub responded_stage: String,
    /// Stages past the reply point; leads here are excluded from the
    /// auto-classification query entirely.
    #[serde(default = "default_advanced_stages")]
    pub advanced_stages: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            message_cap: default_message_cap(),
            chat_page: default_chat_page(),
            history_page: default_history_page(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            logout_retry_delay_ms: default_logout_retry_delay_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            event_capacity: default_event_capacity(),
            early_stages: default_early_stages(),
            responded_stage: default_responded_stage(),
            advanced_stages: default_advanced_stages(),
        }
    }
}

fn default_message_cap() -> usize {
    100
}

fn default_chat_page() -> usize {
    100
}

fn default_history_page() -> usize {
    50
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_logout_retry_delay_ms() -> u64 {
    2000
}

fn default_handshake_timeout_ms() -> u64 {
    60_000
}

fn default_event_capacity() -> usize {
    256
}

fn default_early_stages() -> Vec<String> {
    vec!["novo".to_string(), "contatado".to_string()]
}

fn default_responded_stage() -> String {
    "respondeu".to_string()
}

fn default_advanced_stages() -> Vec<String> {
    vec![
        "ligacao".to_string(),
        "reuniao".to_string(),
        "proposta".to_string(),
        "fechado".to_string(),
        "perdido".to_string(),
    ]
}
