//! Seek positions.
//!
//! A position is either a fixed point, a point that keeps moving with the wall
//! clock while playback runs, or the end of the current item. Moving
//! positions let observers render a progressing seek bar without polling the
//! engine.

use bridge_traits::time::Clock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tolerance when comparing two extrapolated positions.
const COMPUTED_POSITION_TOLERANCE_MS: u64 = 1;

/// Playback position within the now-playing item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeekPosition {
    /// Fixed position.
    Absolute { position_ms: u64 },
    /// Position extrapolated from the wall clock.
    Computed(ComputedSeekPosition),
    /// End of the item. Reads as `u64::MAX`.
    End,
}

impl SeekPosition {
    pub const ZERO: SeekPosition = SeekPosition::Absolute { position_ms: 0 };

    pub fn absolute(position_ms: u64) -> Self {
        SeekPosition::Absolute { position_ms }
    }

    /// Position in milliseconds at `now_ms` (unix millis).
    pub fn position_at(&self, now_ms: i64) -> u64 {
        match self {
            SeekPosition::Absolute { position_ms } => *position_ms,
            SeekPosition::Computed(computed) => computed.position_at(now_ms),
            SeekPosition::End => u64::MAX,
        }
    }

    /// Position in milliseconds right now.
    pub fn position_ms(&self, clock: &dyn Clock) -> u64 {
        self.position_at(clock.unix_timestamp_millis())
    }

    /// Freeze into an absolute position at `now_ms`. `End` stays `End`.
    pub fn freeze_at(&self, now_ms: i64) -> Self {
        match self {
            SeekPosition::Computed(computed) => {
                SeekPosition::absolute(computed.position_at(now_ms))
            }
            other => *other,
        }
    }

    /// Order two positions by their value at `now_ms`.
    pub fn compare_at(&self, other: &SeekPosition, now_ms: i64) -> Ordering {
        self.position_at(now_ms).cmp(&other.position_at(now_ms))
    }
}

impl Default for SeekPosition {
    fn default() -> Self {
        SeekPosition::ZERO
    }
}

impl PartialEq for SeekPosition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                SeekPosition::Absolute { position_ms: a },
                SeekPosition::Absolute { position_ms: b },
            ) => {
                a == b
            }
            (SeekPosition::Computed(a), SeekPosition::Computed(b)) => a == b,
            (SeekPosition::End, SeekPosition::End) => true,
            _ => false,
        }
    }
}

/// A position that advances at `playback_speed` from `creation_time_ms`.
///
/// Never exceeds `max_seek_position_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComputedSeekPosition {
    pub original_seek_position_ms: u64,
    /// Duration of the item, `u64::MAX` when unknown.
    pub max_seek_position_ms: u64,
    /// Unix millis at which `original_seek_position_ms` was sampled.
    pub creation_time_ms: i64,
    pub playback_speed: f32,
}

impl ComputedSeekPosition {
    pub fn new(
        original_seek_position_ms: u64,
        max_seek_position_ms: Option<u64>,
        creation_time_ms: i64,
        playback_speed: f32,
    ) -> Self {
        Self {
            original_seek_position_ms,
            max_seek_position_ms: max_seek_position_ms.unwrap_or(u64::MAX),
            creation_time_ms,
            playback_speed,
        }
    }

    pub fn position_at(&self, now_ms: i64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.creation_time_ms).max(0) as f64;
        let advanced = (elapsed * f64::from(self.playback_speed)).round();
        let advanced = if advanced >= u64::MAX as f64 {
            u64::MAX
        } else {
            advanced as u64
        };
        self.original_seek_position_ms
            .saturating_add(advanced)
            .min(self.max_seek_position_ms)
    }
}

impl PartialEq for ComputedSeekPosition {
    /// Two extrapolations are equal when they describe the same motion: same
    /// speed and bound, and the same projected position at the later
    /// creation time.
    fn eq(&self, other: &Self) -> bool {
        if self.playback_speed != other.playback_speed
            || self.max_seek_position_ms != other.max_seek_position_ms
        {
            return false;
        }

        let at = self.creation_time_ms.max(other.creation_time_ms);
        self.position_at(at).abs_diff(other.position_at(at)) <= COMPUTED_POSITION_TOLERANCE_MS
    }
}
