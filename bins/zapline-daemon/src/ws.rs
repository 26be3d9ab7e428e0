use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use zapline_api::{ClientCommand, ServerEvent};
use zapline_core::error::BridgeError;
use zapline_core::event::BridgeEvent;
use zapline_core::session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    /// Which credential backend the daemon was started with; reported on
    /// `/status` so the UI can tell cloud from local sessions apart.
    pub mode: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "🚀 Servidor WhatsApp Online!"
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.manager.snapshot().await;
    Json(json!({
        "status": snapshot.status,
        "user": snapshot.user,
        "mode": state.mode,
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One task owns the socket's write half and drains a per-session queue;
/// the broadcast forwarder and the command handler both feed it. Replies
/// to request/response commands go only into this session's queue.
async fn handle_socket(socket: WebSocket, state: AppState) {
    log::debug!("ui session connected");
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

    // Subscribe before the snapshot so nothing can fall in between; a
    // transition racing the snapshot is delivered twice, never dropped.
    let mut rx = state.manager.subscribe();
    let snapshot = state.manager.snapshot().await;
    push(
        &out_tx,
        &ServerEvent::ConnectionStatus {
            status: snapshot.status,
        },
    )
    .await;
    if let Some(image) = snapshot.qr {
        push(&out_tx, &ServerEvent::Qr { image }).await;
    }
    if let Some(user) = snapshot.user {
        push(&out_tx, &ServerEvent::UserInfo(user)).await;
    }

    let mut write_task = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let broadcast_tx = out_tx.clone();
    let mut broadcast_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !push(&broadcast_tx, &broadcast_event(event)).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("ui session lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let manager = state.manager.clone();
    let command_tx = out_tx.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Text(text) = message {
                match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => handle_command(&manager, &command_tx, command).await,
                    Err(err) => log::debug!("unparseable command: {}", err),
                }
            }
        }
    });

    tokio::select! {
        _ = &mut write_task => {}
        _ = &mut broadcast_task => {}
        _ = &mut read_task => {}
    }
    write_task.abort();
    broadcast_task.abort();
    read_task.abort();
    log::debug!("ui session disconnected");
}

async fn handle_command(
    manager: &SessionManager,
    tx: &mpsc::Sender<String>,
    command: ClientCommand,
) {
    match command {
        ClientCommand::GetChats => {
            let chats = manager.chats().await;
            push(tx, &ServerEvent::ChatsList { chats }).await;
        }
        ClientCommand::GetMessages { jid } => {
            let messages = manager.chat_messages(&jid).await;
            push(tx, &ServerEvent::ChatMessages { jid, messages }).await;
        }
        ClientCommand::SendMessage { jid, text } => match manager.send_text(&jid, &text).await {
            // success is broadcast through the event bus
            Ok(_) => {}
            Err(BridgeError::NotConnected) => {
                push(
                    tx,
                    &ServerEvent::SendError {
                        message: "WhatsApp não está conectado".to_string(),
                    },
                )
                .await;
            }
            Err(err) => {
                push(
                    tx,
                    &ServerEvent::SendError {
                        message: err.to_string(),
                    },
                )
                .await;
            }
        },
        ClientCommand::OpenChat { phone } => {
            let (jid, phone, messages) = manager.open_by_phone(&phone).await;
            push(
                tx,
                &ServerEvent::ChatOpened {
                    jid,
                    phone,
                    messages,
                },
            )
            .await;
        }
        ClientCommand::DisconnectWhatsapp => manager.disconnect().await,
    }
}

fn broadcast_event(event: BridgeEvent) -> ServerEvent {
    match event {
        BridgeEvent::ConnectionStatus(status) => ServerEvent::ConnectionStatus { status },
        BridgeEvent::PairingCode { image } => ServerEvent::Qr { image },
        BridgeEvent::UserInfo(user) => ServerEvent::UserInfo(user),
        BridgeEvent::NewMessage(message) => ServerEvent::NewMessage(message),
        BridgeEvent::LeadAdvanced { lead_id, stage } => {
            ServerEvent::LeadAdvanced { lead_id, stage }
        }
    }
}

/// False when the session's write queue is gone.
async fn push(tx: &mpsc::Sender<String>, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => tx.send(text).await.is_ok(),
        Err(err) => {
            log::error!("event serialization failed: {}", err);
            true
        }
    }
}
