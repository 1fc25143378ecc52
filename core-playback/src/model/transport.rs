//! Transport state: what the user asked the player to do.

use crate::error::{PlaybackError, Result};
use crate::model::queue::{QueueItem, QueueState};
use crate::model::seek::SeekPosition;
use bridge_traits::engine::EngineRepeatMode;
use bridge_traits::media::MediaObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Play/pause status of an active transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaybackStatus {
    Playing,
    Paused { reached_end_of_queue: bool },
}

impl PlaybackStatus {
    /// Paused without having run off the end of the queue.
    pub const fn paused() -> Self {
        PlaybackStatus::Paused {
            reached_end_of_queue: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }

    pub fn reached_end_of_queue(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Paused {
                reached_end_of_queue: true
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl From<RepeatMode> for EngineRepeatMode {
    fn from(mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::None => EngineRepeatMode::Off,
            RepeatMode::One => EngineRepeatMode::One,
            RepeatMode::All => EngineRepeatMode::All,
        }
    }
}

impl From<EngineRepeatMode> for RepeatMode {
    fn from(mode: EngineRepeatMode) -> Self {
        match mode {
            EngineRepeatMode::Off => RepeatMode::None,
            EngineRepeatMode::One => RepeatMode::One,
            EngineRepeatMode::All => RepeatMode::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleMode {
    #[default]
    Disabled,
    Enabled,
}

impl ShuffleMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ShuffleMode::Enabled)
    }
}

/// Playback rate multiplier, finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct PlaybackSpeed(f32);

impl PlaybackSpeed {
    pub const NORMAL: PlaybackSpeed = PlaybackSpeed(1.0);

    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidPlaybackSpeed`] for zero, negative,
    /// infinite or NaN speeds.
    pub fn new(speed: f32) -> Result<Self> {
        if speed.is_finite() && speed > 0.0 {
            Ok(Self(speed))
        } else {
            Err(PlaybackError::InvalidPlaybackSpeed(speed))
        }
    }

    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<f32> for PlaybackSpeed {
    type Error = PlaybackError;

    fn try_from(speed: f32) -> Result<Self> {
        Self::new(speed)
    }
}

impl From<PlaybackSpeed> for f32 {
    fn from(speed: PlaybackSpeed) -> Self {
        speed.0
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// ============================================================================
// Transport State
// ============================================================================

/// A queue is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "M: MediaObject + Deserialize<'de>"))]
pub struct ActiveState<M> {
    pub status: PlaybackStatus,
    pub seek_position: SeekPosition,
    pub queue: QueueState<M>,
    pub repeat_mode: RepeatMode,
    pub playback_speed: PlaybackSpeed,
}

impl<M: MediaObject> ActiveState<M> {
    /// Derived from the queue variant.
    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.queue.shuffle_mode()
    }

    pub fn now_playing(&self) -> &QueueItem<M> {
        self.queue.now_playing()
    }
}

/// Nothing is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IdleState {
    pub repeat_mode: RepeatMode,
    pub shuffle_mode: ShuffleMode,
    pub playback_speed: PlaybackSpeed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "state",
    rename_all = "snake_case",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub enum TransportState<M> {
    Active(ActiveState<M>),
    Idle(IdleState),
}

impl<M: MediaObject> TransportState<M> {
    pub fn repeat_mode(&self) -> RepeatMode {
        match self {
            TransportState::Active(active) => active.repeat_mode,
            TransportState::Idle(idle) => idle.repeat_mode,
        }
    }

    pub fn shuffle_mode(&self) -> ShuffleMode {
        match self {
            TransportState::Active(active) => active.shuffle_mode(),
            TransportState::Idle(idle) => idle.shuffle_mode,
        }
    }

    pub fn playback_speed(&self) -> PlaybackSpeed {
        match self {
            TransportState::Active(active) => active.playback_speed,
            TransportState::Idle(idle) => idle.playback_speed,
        }
    }

    pub fn as_active(&self) -> Option<&ActiveState<M>> {
        match self {
            TransportState::Active(active) => Some(active),
            TransportState::Idle(_) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TransportState::Active(_))
    }
}

impl<M> Default for TransportState<M> {
    fn default() -> Self {
        TransportState::Idle(IdleState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::queue::LinearQueue;
    use crate::testing::{queue_items, TestTrack};

    #[test]
    fn test_playback_speed_validation() {
        assert!(PlaybackSpeed::new(1.25).is_ok());
        assert!(matches!(
            PlaybackSpeed::new(0.0),
            Err(PlaybackError::InvalidPlaybackSpeed(_))
        ));
        assert!(PlaybackSpeed::new(-1.0).is_err());
        assert!(PlaybackSpeed::new(f32::NAN).is_err());
        assert!(PlaybackSpeed::new(f32::INFINITY).is_err());
    }

    #[test]
    fn test_playback_speed_deserialization_revalidates() {
        let speed: PlaybackSpeed = serde_json::from_str("1.5").unwrap();
        assert_eq!(speed.get(), 1.5);
        assert!(serde_json::from_str::<PlaybackSpeed>("0.0").is_err());
    }

    #[test]
    fn test_repeat_mode_engine_mapping() {
        for mode in [RepeatMode::None, RepeatMode::One, RepeatMode::All] {
            let engine: EngineRepeatMode = mode.into();
            assert_eq!(RepeatMode::from(engine), mode);
        }
    }

    #[test]
    fn test_shuffle_mode_is_derived_from_queue() {
        let active = ActiveState {
            status: PlaybackStatus::Playing,
            seek_position: SeekPosition::ZERO,
            queue: QueueState::Linear(LinearQueue::new(queue_items(&["a"]), 0).unwrap()),
            repeat_mode: RepeatMode::All,
            playback_speed: PlaybackSpeed::NORMAL,
        };
        let state: TransportState<TestTrack> = TransportState::Active(active);
        assert_eq!(state.shuffle_mode(), ShuffleMode::Disabled);
        assert_eq!(state.repeat_mode(), RepeatMode::All);
        assert!(state.is_active());
    }

    #[test]
    fn test_status_helpers() {
        assert!(PlaybackStatus::Playing.is_playing());
        assert!(!PlaybackStatus::paused().reached_end_of_queue());
        assert!(PlaybackStatus::Paused {
            reached_end_of_queue: true
        }
        .reached_end_of_queue());
    }
}
