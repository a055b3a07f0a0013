use crate::application::runtime::QueueError;
use crate::domain::{InvalidTransition, SessionExists};

/// Signaling errors surfaced to callers
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    /// Microphone capture could not be opened or attached
    #[error("Local media unavailable: {0}")]
    LocalMediaUnavailable(String),

    #[error("Media transport error: {0}")]
    Media(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid peer: {0}")]
    InvalidPeer(String),

    #[error("Invalid room: {0}")]
    InvalidRoom(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    SessionExists(#[from] SessionExists),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Coordinator has been shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, SignalingError>;
