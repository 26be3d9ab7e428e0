use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("storage")]
    Storage,
    #[error("codec")]
    Codec,
    #[error("network {0}")]
    Network(String),
    #[error("send {0}")]
    Send(String),
    #[error("not connected")]
    NotConnected,
}
