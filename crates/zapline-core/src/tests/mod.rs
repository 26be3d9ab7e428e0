pub mod auth_tests;
pub mod session_tests;

use crate::auth::InMemoryCredentialStore;
use crate::config::BridgeConfig;
use crate::event::{BridgeEvent, EventReceiver};
use crate::jid::Jid;
use crate::leads::{InMemoryLeadStore, Lead};
use crate::network::MockNetwork;
use crate::normalize::{MessageContent, MessageKey, RawMessage};
use crate::session::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use zapline_api::ConnectionStatus;

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        reconnect_delay_ms: 10,
        logout_retry_delay_ms: 10,
        ..BridgeConfig::default()
    }
}

pub fn text_message(jid: &str, id: &str, from_me: bool, body: &str) -> RawMessage {
    RawMessage {
        key: MessageKey {
            id: id.to_string(),
            remote_jid: Jid::new(jid),
            from_me,
        },
        push_name: None,
        content: MessageContent::Text {
            body: body.to_string(),
        },
        timestamp: Some(1_700_000_000),
    }
}

pub fn lead(id: i64, telefone: &str, stage: &str) -> Lead {
    Lead {
        id,
        nome: format!("Lead {}", id),
        telefone: telefone.to_string(),
        stage: stage.to_string(),
        historico: Vec::new(),
    }
}

pub fn manager(
    network: &MockNetwork,
    credentials: Arc<InMemoryCredentialStore>,
    leads: Arc<InMemoryLeadStore>,
) -> SessionManager {
    SessionManager::new(test_config(), Arc::new(network.clone()), credentials, leads)
}

pub async fn wait_for_connects(network: &MockNetwork, count: u32) {
    for _ in 0..200 {
        if network.connect_count().await >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("network never reached {} connects", count);
}

pub async fn wait_connected(manager: &SessionManager) {
    for _ in 0..200 {
        if manager.snapshot().await.status == ConnectionStatus::Connected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("manager never reached connected state");
}

pub async fn next_event(rx: &mut EventReceiver) -> BridgeEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}
