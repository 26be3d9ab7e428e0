use super::{
    lead, manager, next_event, text_message, wait_connected, wait_for_connects,
};
use crate::auth::{CredentialStore, InMemoryCredentialStore};
use crate::chats::MessageBatchKind;
use crate::error::BridgeError;
use crate::event::BridgeEvent;
use crate::leads::InMemoryLeadStore;
use crate::network::{DisconnectReason, MockNetwork, NetworkEvent};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use zapline_api::{ConnectionStatus, UserInfo};

fn user() -> UserInfo {
    UserInfo {
        id: "5511999990000@s.whatsapp.net".to_string(),
        name: "Uptrix".to_string(),
    }
}

#[tokio::test]
async fn transient_closure_keeps_credentials_logout_clears_them() {
    let network = MockNetwork::new();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    credentials.write("creds", b"identity").await.expect("seed");
    credentials
        .write("app-state-sync-key-1", b"material")
        .await
        .expect("seed");
    let mgr = manager(&network, credentials.clone(), Arc::new(InMemoryLeadStore::new()));
    mgr.start();
    wait_for_connects(&network, 1).await;

    network
        .emit(NetworkEvent::Closed(DisconnectReason::ConnectionLost))
        .await;
    wait_for_connects(&network, 2).await;
    assert_eq!(
        credentials.read("creds").await.expect("read"),
        Some(b"identity".to_vec())
    );

    network
        .emit(NetworkEvent::Closed(DisconnectReason::LoggedOut))
        .await;
    wait_for_connects(&network, 3).await;
    assert_eq!(credentials.read("creds").await.expect("read"), None);
    assert_eq!(
        credentials
            .read("app-state-sync-key-1")
            .await
            .expect("read"),
        None
    );
    mgr.stop();
}

#[tokio::test]
async fn transitions_are_broadcast_in_order() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    mgr.start();
    wait_for_connects(&network, 1).await;
    let mut rx = mgr.subscribe();

    network
        .emit(NetworkEvent::PairingCode("2@pairing-ref".to_string()))
        .await;
    match next_event(&mut rx).await {
        BridgeEvent::PairingCode { image } => {
            assert!(image.starts_with("data:image/svg+xml;base64,"));
        }
        other => panic!("expected pairing code, got {:?}", other),
    }
    assert!(matches!(
        next_event(&mut rx).await,
        BridgeEvent::ConnectionStatus(ConnectionStatus::Qr)
    ));
    let snapshot = mgr.snapshot().await;
    assert_eq!(snapshot.status, ConnectionStatus::Qr);
    assert!(snapshot.qr.is_some());

    network.emit(NetworkEvent::Open(user())).await;
    assert!(matches!(
        next_event(&mut rx).await,
        BridgeEvent::ConnectionStatus(ConnectionStatus::Connected)
    ));
    match next_event(&mut rx).await {
        BridgeEvent::UserInfo(info) => assert_eq!(info.name, "Uptrix"),
        other => panic!("expected user info, got {:?}", other),
    }
    let snapshot = mgr.snapshot().await;
    assert_eq!(snapshot.status, ConnectionStatus::Connected);
    assert!(snapshot.qr.is_none());
    mgr.stop();
}

#[tokio::test]
async fn send_records_on_network_and_broadcasts() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    mgr.start();
    wait_for_connects(&network, 1).await;
    network.emit(NetworkEvent::Open(user())).await;
    wait_connected(&mgr).await;

    let mut rx = mgr.subscribe();
    let view = mgr.send_text("5511988887777", "oi, tudo bem?").await.expect("send");
    assert!(view.from_me);
    assert_eq!(view.jid, "5511988887777@s.whatsapp.net");
    assert_eq!(view.text, "oi, tudo bem?");

    let sent = network.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.as_str(), "5511988887777@s.whatsapp.net");

    match next_event(&mut rx).await {
        BridgeEvent::NewMessage(msg) => assert_eq!(msg.id, view.id),
        other => panic!("expected new message, got {:?}", other),
    }
    mgr.stop();
}

#[tokio::test]
async fn send_while_disconnected_is_rejected() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    mgr.start();
    wait_for_connects(&network, 1).await;
    let err = mgr.send_text("5511988887777", "oi").await.unwrap_err();
    assert!(matches!(err, BridgeError::NotConnected));
    mgr.stop();
}

#[tokio::test]
async fn send_failure_is_not_broadcast() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    mgr.start();
    wait_for_connects(&network, 1).await;
    network.emit(NetworkEvent::Open(user())).await;
    wait_connected(&mgr).await;
    network.set_fail_sends(true).await;

    let mut rx = mgr.subscribe();
    let err = mgr.send_text("5511988887777", "oi").await.unwrap_err();
    assert!(matches!(err, BridgeError::Send(_)));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    mgr.stop();
}

#[tokio::test]
async fn open_by_phone_normalizes_and_tolerates_empty() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    let (jid, phone, messages) = mgr.open_by_phone("+55 (11) 98888-7777").await;
    assert_eq!(jid, "5511988887777@s.whatsapp.net");
    assert_eq!(phone, "5511988887777");
    assert!(messages.is_empty());

    let (jid, phone, messages) = mgr.open_by_phone("").await;
    assert_eq!(jid, "@s.whatsapp.net");
    assert_eq!(phone, "");
    assert!(messages.is_empty());
}

#[tokio::test]
async fn explicit_disconnect_takes_the_logout_path() {
    let network = MockNetwork::new();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    credentials.write("creds", b"identity").await.expect("seed");
    let mgr = manager(&network, credentials.clone(), Arc::new(InMemoryLeadStore::new()));
    mgr.start();
    wait_for_connects(&network, 1).await;
    network.emit(NetworkEvent::Open(user())).await;
    wait_connected(&mgr).await;

    mgr.disconnect().await;
    wait_for_connects(&network, 2).await;
    assert_eq!(credentials.read("creds").await.expect("read"), None);
    mgr.stop();
}

#[tokio::test]
async fn inbound_messages_flow_to_cache_and_bus() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    mgr.start();
    wait_for_connects(&network, 1).await;
    let mut rx = mgr.subscribe();

    // status broadcast is dropped before the bus; the real message passes
    network
        .emit(NetworkEvent::MessagesUpsert {
            messages: vec![
                text_message("status@broadcast", "st-1", false, "story"),
                text_message("5511988887777@s.whatsapp.net", "m1", false, "oi"),
            ],
            kind: MessageBatchKind::Notify,
        })
        .await;
    match next_event(&mut rx).await {
        BridgeEvent::NewMessage(msg) => assert_eq!(msg.id, "m1"),
        other => panic!("expected new message, got {:?}", other),
    }
    let chats = mgr.chats().await;
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].jid, "5511988887777@s.whatsapp.net");
    let history = mgr.chat_messages("5511988887777@s.whatsapp.net").await;
    assert_eq!(history.len(), 1);
    mgr.stop();
}

#[tokio::test]
async fn append_batches_fill_the_cache_without_broadcast() {
    let network = MockNetwork::new();
    let mgr = manager(
        &network,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryLeadStore::new()),
    );
    mgr.start();
    wait_for_connects(&network, 1).await;
    let mut rx = mgr.subscribe();
    network
        .emit(NetworkEvent::MessagesUpsert {
            messages: vec![text_message(
                "5511988887777@s.whatsapp.net",
                "hist-1",
                false,
                "antiga",
            )],
            kind: MessageBatchKind::Append,
        })
        .await;
    // cache sees it...
    for _ in 0..200 {
        if !mgr.chat_messages("5511988887777@s.whatsapp.net").await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(mgr.chat_messages("5511988887777@s.whatsapp.net").await.len(), 1);
    // ...but nothing was broadcast
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    mgr.stop();
}

#[tokio::test]
async fn reply_from_lead_advances_it_once() {
    let network = MockNetwork::new();
    let leads = Arc::new(InMemoryLeadStore::new());
    leads.push(lead(1, "5511999990000", "novo")).await;
    leads.push(lead(2, "5511988880000", "proposta")).await;
    let mgr = manager(&network, Arc::new(InMemoryCredentialStore::new()), leads.clone());
    mgr.start();
    wait_for_connects(&network, 1).await;
    let mut rx = mgr.subscribe();

    network
        .emit(NetworkEvent::MessagesUpsert {
            messages: vec![text_message(
                "11999990000@s.whatsapp.net",
                "m1",
                false,
                "tenho interesse",
            )],
            kind: MessageBatchKind::Notify,
        })
        .await;
    assert!(matches!(
        next_event(&mut rx).await,
        BridgeEvent::NewMessage(_)
    ));
    match next_event(&mut rx).await {
        BridgeEvent::LeadAdvanced { lead_id, stage } => {
            assert_eq!(lead_id, 1);
            assert_eq!(stage, "respondeu");
        }
        other => panic!("expected lead advance, got {:?}", other),
    }
    assert_eq!(leads.get(1).await.expect("lead").stage, "respondeu");
    assert_eq!(leads.get(2).await.expect("lead").stage, "proposta");

    // the same phone replying again finds nothing to advance
    network
        .emit(NetworkEvent::MessagesUpsert {
            messages: vec![text_message(
                "11999990000@s.whatsapp.net",
                "m2",
                false,
                "alguém aí?",
            )],
            kind: MessageBatchKind::Notify,
        })
        .await;
    assert!(matches!(
        next_event(&mut rx).await,
        BridgeEvent::NewMessage(_)
    ));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    mgr.stop();
}

#[tokio::test]
async fn outbound_echo_does_not_touch_leads() {
    let network = MockNetwork::new();
    let leads = Arc::new(InMemoryLeadStore::new());
    leads.push(lead(1, "5511999990000", "novo")).await;
    let mgr = manager(&network, Arc::new(InMemoryCredentialStore::new()), leads.clone());
    mgr.start();
    wait_for_connects(&network, 1).await;
    let mut rx = mgr.subscribe();
    network
        .emit(NetworkEvent::MessagesUpsert {
            messages: vec![text_message(
                "5511999990000@s.whatsapp.net",
                "m1",
                true,
                "mensagem enviada por mim",
            )],
            kind: MessageBatchKind::Notify,
        })
        .await;
    assert!(matches!(
        next_event(&mut rx).await,
        BridgeEvent::NewMessage(_)
    ));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(leads.get(1).await.expect("lead").stage, "novo");
    mgr.stop();
}

#[tokio::test]
async fn credential_updates_from_the_network_are_persisted() {
    let network = MockNetwork::new();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let mgr = manager(&network, credentials.clone(), Arc::new(InMemoryLeadStore::new()));
    mgr.start();
    wait_for_connects(&network, 1).await;
    network
        .emit(NetworkEvent::CredsUpdate(vec![
            ("creds".to_string(), Some(b"identity".to_vec())),
            ("pre-key-1".to_string(), Some(b"material".to_vec())),
        ]))
        .await;
    for _ in 0..200 {
        if credentials.read("creds").await.expect("read").is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(
        credentials.read("creds").await.expect("read"),
        Some(b"identity".to_vec())
    );
    assert_eq!(
        credentials.read("pre-key-1").await.expect("read"),
        Some(b"material".to_vec())
    );
    mgr.stop();
}
