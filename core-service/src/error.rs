use bridge_traits::error::BridgeError;
use core_playback::PlaybackError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// A diff arrived before any prepared state it could apply to.
    #[error("Received a state diff without a prepared baseline")]
    MissingBaseline,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chunk mismatch: {0}")]
    ChunkMismatch(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Service released")]
    Released,

    #[error("Operation cancelled")]
    Cancelled,
}

impl ServiceError {
    /// Protocol violations mean the controller is out of sync and should
    /// request a full snapshot.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingBaseline
                | ServiceError::ChunkMismatch(_)
                | ServiceError::Playback(PlaybackError::DiffMismatch(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violations() {
        assert!(ServiceError::MissingBaseline.is_protocol_violation());
        let mismatch = ServiceError::Playback(PlaybackError::DiffMismatch("x".into()));
        assert!(mismatch.is_protocol_violation());
        assert!(!ServiceError::Released.is_protocol_violation());
        let died = ServiceError::Bridge(BridgeError::RemoteDied("gone".into()));
        assert!(!died.is_protocol_violation());
    }
}
