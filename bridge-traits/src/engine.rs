//! Media engine bridge.
//!
//! The playback core wraps a single third-party engine instance (ExoPlayer on
//! Android, a native pipeline on desktop) and drives it only through the
//! primitives below. The engine keeps a playlist of [`EngineSource`]s and
//! reports its position, buffering and transport flags on demand.
//!
//! Implementations are driven from one confined context: the core holds its
//! state lock around every call, so methods take `&mut self` and need no
//! internal synchronisation.

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One playlist entry as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSource {
    /// Per-insertion identity assigned by the queue owner.
    pub tag: String,
    /// Locator the engine loads.
    pub uri: String,
}

impl EngineSource {
    pub fn new(tag: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            uri: uri.into(),
        }
    }
}

/// Coarse engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    /// Nothing loaded, or stopped.
    Idle,
    /// Waiting for data before it can render.
    Buffering,
    /// Able to render immediately.
    Ready,
    /// Rendered past the last playlist entry.
    Ended,
}

/// Engine-side repeat setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineRepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// Primitive operations exposed by the wrapped playback engine.
pub trait MediaEngine: Send {
    // ------------------------------------------------------------------
    // Playlist
    // ------------------------------------------------------------------

    /// Replace the whole playlist and position the engine at
    /// `start_index`/`start_position_ms`. Forces a reload.
    fn set_sources(
        &mut self,
        sources: Vec<EngineSource>,
        start_index: usize,
        start_position_ms: u64,
    ) -> Result<()>;

    /// Insert `sources` so the first one lands at `index`.
    fn insert_sources(&mut self, index: usize, sources: Vec<EngineSource>) -> Result<()>;

    /// Remove entries in `start..end`.
    fn remove_sources(&mut self, start: usize, end: usize) -> Result<()>;

    /// Move entries `start..end` so the first one lands at `new_index` in the
    /// resulting playlist.
    fn move_sources(&mut self, start: usize, end: usize, new_index: usize) -> Result<()>;

    /// Drop every entry.
    fn clear_sources(&mut self) -> Result<()>;

    /// Number of playlist entries.
    fn source_count(&self) -> usize;

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Acquire decoders and start loading the current entry.
    fn prepare(&mut self) -> Result<()>;

    /// Seek within entry `index`.
    fn seek_to(&mut self, index: usize, position_ms: u64) -> Result<()>;

    /// Seek to the end of entry `index`.
    fn seek_to_end(&mut self, index: usize) -> Result<()>;

    /// Play when ready (`true`) or pause (`false`).
    fn set_play_when_ready(&mut self, play_when_ready: bool) -> Result<()>;

    /// Stop rendering and release decoders, keeping the playlist.
    fn stop(&mut self) -> Result<()>;

    fn set_repeat_mode(&mut self, mode: EngineRepeatMode) -> Result<()>;

    fn set_playback_speed(&mut self, speed: f32) -> Result<()>;

    /// Free every engine resource. No call may follow.
    fn release(&mut self);

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Index of the entry currently loaded, `None` with an empty playlist.
    fn current_index(&self) -> Option<usize>;

    fn current_position_ms(&self) -> u64;

    /// Position up to which the current entry is buffered.
    fn buffered_position_ms(&self) -> u64;

    /// Buffered share of the current entry, `0..=100`.
    fn buffered_percentage(&self) -> u8;

    /// Duration of the current entry, once known.
    fn duration_ms(&self) -> Option<u64>;

    fn play_when_ready(&self) -> bool;

    fn phase(&self) -> EnginePhase;

    fn repeat_mode(&self) -> EngineRepeatMode;

    fn playback_speed(&self) -> f32;

    /// Artwork decoded from the current entry, if any.
    fn current_artwork(&self) -> Option<Bytes>;
}
