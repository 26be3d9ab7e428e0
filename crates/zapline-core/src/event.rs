use tokio::sync::broadcast;
use zapline_api::{ConnectionStatus, MessageView, UserInfo};

/// Everything the bridge fans out to connected UI sessions. A fixed set of
/// kinds, each with its payload; no string-keyed listener lists.
#[derive(Clone, Debug)]
pub enum BridgeEvent {
    ConnectionStatus(ConnectionStatus),
    PairingCode { image: String },
    UserInfo(UserInfo),
    NewMessage(MessageView),
    LeadAdvanced { lead_id: i64, stage: String },
}

pub type EventReceiver = broadcast::Receiver<BridgeEvent>;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    pub fn new(size: usize) -> Self {
        let (tx, _) = broadcast::channel(size);
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }
}
