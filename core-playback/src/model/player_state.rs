//! Player state: a transport state plus what only the engine can tell.

use crate::model::transport::{ActiveState, IdleState, TransportState};
use bridge_traits::media::MediaObject;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Encoded artwork image, compared by content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artwork(Bytes);

impl Artwork {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Artwork {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferingState {
    #[default]
    Buffered,
    Buffering {
        /// Playback wants to run but stalled waiting for data.
        paused_for_buffering: bool,
        buffered_amount_ms: u64,
    },
}

impl BufferingState {
    pub fn is_paused_for_buffering(&self) -> bool {
        matches!(
            self,
            BufferingState::Buffering {
                paused_for_buffering: true,
                ..
            }
        )
    }
}

/// An active transport enriched with engine facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "M: MediaObject + Deserialize<'de>"))]
pub struct PreparedState<M> {
    pub transport: ActiveState<M>,
    pub artwork: Option<Artwork>,
    pub duration_ms: Option<u64>,
    pub buffering: BufferingState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "state",
    rename_all = "snake_case",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub enum MediaPlayerState<M> {
    /// Initialization has not completed yet.
    Initializing,
    /// Initialized with nothing loaded.
    Ready(IdleState),
    Prepared(PreparedState<M>),
}

impl<M: MediaObject> MediaPlayerState<M> {
    /// The transport state, `None` while initializing.
    pub fn transport_state(&self) -> Option<TransportState<M>> {
        match self {
            MediaPlayerState::Initializing => None,
            MediaPlayerState::Ready(idle) => Some(TransportState::Idle(*idle)),
            MediaPlayerState::Prepared(prepared) => {
                Some(TransportState::Active(prepared.transport.clone()))
            }
        }
    }

    pub fn as_prepared(&self) -> Option<&PreparedState<M>> {
        match self {
            MediaPlayerState::Prepared(prepared) => Some(prepared),
            _ => None,
        }
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, MediaPlayerState::Initializing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestTrack;

    #[test]
    fn test_artwork_compares_by_content() {
        let a = Artwork::new(vec![1u8, 2, 3]);
        let b = Artwork::from(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_transport_state_projection() {
        let ready: MediaPlayerState<TestTrack> = MediaPlayerState::Ready(IdleState::default());
        assert!(matches!(
            ready.transport_state(),
            Some(TransportState::Idle(_))
        ));
        assert!(MediaPlayerState::<TestTrack>::Initializing
            .transport_state()
            .is_none());
    }

    #[test]
    fn test_buffering_helpers() {
        assert!(!BufferingState::Buffered.is_paused_for_buffering());
        assert!(BufferingState::Buffering {
            paused_for_buffering: true,
            buffered_amount_ms: 0
        }
        .is_paused_for_buffering());
    }
}
