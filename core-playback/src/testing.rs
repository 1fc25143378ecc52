//! Test doubles for the playback core.
//!
//! [`InMemoryEngine`] is a deterministic stand-in for the wrapped media
//! engine: it keeps a playlist, tracks the current entry by tag across
//! playlist edits and records every call so tests can tell a seamless queue
//! update from a full reload. Clones share state, so a test can hand one
//! clone to the player and inspect the other.

use crate::model::QueueItem;
use bridge_traits::engine::{EnginePhase, EngineRepeatMode, EngineSource, MediaEngine};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::media::{MediaMetadata, MediaObject};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use bridge_traits::time::ManualClock;

/// Minimal media object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestTrack {
    pub id: String,
    pub uri: String,
    pub title: String,
}

impl TestTrack {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            uri: format!("file:///music/{}.mp3", id),
            title: format!("Track {}", id),
        }
    }
}

impl MediaObject for TestTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn playback_uri(&self) -> &str {
        &self.uri
    }

    fn metadata(&self) -> MediaMetadata {
        MediaMetadata::titled(self.title.clone())
    }
}

/// Fresh queue items for the given track ids.
pub fn queue_items(ids: &[&str]) -> Vec<QueueItem<TestTrack>> {
    ids.iter().map(|id| QueueItem::new(TestTrack::new(id))).collect()
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetSources {
        count: usize,
        start_index: usize,
        start_position_ms: u64,
    },
    InsertSources {
        index: usize,
        count: usize,
    },
    RemoveSources {
        start: usize,
        end: usize,
    },
    MoveSources {
        start: usize,
        end: usize,
        new_index: usize,
    },
    ClearSources,
    Prepare,
    SeekTo {
        index: usize,
        position_ms: u64,
    },
    SeekToEnd {
        index: usize,
    },
    SetPlayWhenReady(bool),
    Stop,
    SetRepeatMode(EngineRepeatMode),
    SetPlaybackSpeed(f32),
    Release,
}

impl EngineCall {
    /// Whether this call reloads the playlist from scratch.
    pub fn is_reload(&self) -> bool {
        matches!(self, EngineCall::SetSources { .. })
    }
}

/// Injected failures: let `skip` mutating calls through, then fail the
/// next `remaining`.
#[derive(Debug)]
struct FailurePlan {
    skip: usize,
    remaining: usize,
    message: String,
}

#[derive(Debug)]
struct EngineModel {
    playlist: Vec<EngineSource>,
    current_index: Option<usize>,
    position_ms: u64,
    buffered_position_ms: u64,
    duration_ms: Option<u64>,
    play_when_ready: bool,
    phase: EnginePhase,
    repeat_mode: EngineRepeatMode,
    playback_speed: f32,
    artwork: Option<Bytes>,
    released: bool,
    failure: Option<FailurePlan>,
    calls: Vec<EngineCall>,
}

impl Default for EngineModel {
    fn default() -> Self {
        Self {
            playlist: Vec::new(),
            current_index: None,
            position_ms: 0,
            buffered_position_ms: 0,
            duration_ms: None,
            play_when_ready: false,
            phase: EnginePhase::Idle,
            repeat_mode: EngineRepeatMode::Off,
            playback_speed: 1.0,
            artwork: None,
            released: false,
            failure: None,
            calls: Vec::new(),
        }
    }
}

impl EngineModel {
    fn begin(&mut self, call: EngineCall) -> Result<()> {
        if self.released {
            return Err(BridgeError::NotAvailable("engine released".to_string()));
        }
        if let Some(plan) = &mut self.failure {
            if plan.skip > 0 {
                plan.skip -= 1;
            } else {
                let message = plan.message.clone();
                plan.remaining -= 1;
                if plan.remaining == 0 {
                    self.failure = None;
                }
                return Err(BridgeError::OperationFailed(message));
            }
        }
        self.calls.push(call);
        Ok(())
    }

    fn current_tag(&self) -> Option<String> {
        self.current_index
            .and_then(|index| self.playlist.get(index))
            .map(|source| source.tag.clone())
    }

    fn relocate(&mut self, tag: Option<String>, fallback: usize) {
        if self.playlist.is_empty() {
            self.current_index = None;
            self.phase = EnginePhase::Idle;
            self.position_ms = 0;
            return;
        }

        let found = tag.and_then(|tag| self.playlist.iter().position(|source| source.tag == tag));
        match found {
            Some(index) => self.current_index = Some(index),
            None => {
                self.current_index = Some(fallback.min(self.playlist.len() - 1));
                self.position_ms = 0;
            }
        }
    }
}

/// Shared-state fake engine.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    model: Arc<Mutex<EngineModel>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playlist(&self) -> Vec<EngineSource> {
        self.model.lock().playlist.clone()
    }

    /// Playlist tags in order.
    pub fn playlist_tags(&self) -> Vec<String> {
        self.model
            .lock()
            .playlist
            .iter()
            .map(|source| source.tag.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.model.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.model.lock().calls.clear();
    }

    pub fn is_released(&self) -> bool {
        self.model.lock().released
    }

    /// Simulate playback progress.
    pub fn set_position_ms(&self, position_ms: u64) {
        let mut model = self.model.lock();
        model.position_ms = position_ms;
        model.buffered_position_ms = model.buffered_position_ms.max(position_ms);
    }

    pub fn set_buffered_position_ms(&self, position_ms: u64) {
        self.model.lock().buffered_position_ms = position_ms;
    }

    pub fn set_duration_ms(&self, duration_ms: Option<u64>) {
        self.model.lock().duration_ms = duration_ms;
    }

    pub fn set_phase(&self, phase: EnginePhase) {
        self.model.lock().phase = phase;
    }

    pub fn set_artwork(&self, artwork: Option<Bytes>) {
        self.model.lock().artwork = artwork;
    }

    /// The next mutating call fails with `OperationFailed(message)`.
    pub fn fail_next_call(&self, message: &str) {
        self.fail_calls_after(0, 1, message);
    }

    /// Let `skip` mutating calls succeed, then fail the following `count`.
    pub fn fail_calls_after(&self, skip: usize, count: usize, message: &str) {
        self.model.lock().failure = (count > 0).then(|| FailurePlan {
            skip,
            remaining: count,
            message: message.to_string(),
        });
    }
}

impl MediaEngine for InMemoryEngine {
    fn set_sources(
        &mut self,
        sources: Vec<EngineSource>,
        start_index: usize,
        start_position_ms: u64,
    ) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::SetSources {
            count: sources.len(),
            start_index,
            start_position_ms,
        })?;

        model.current_index = if sources.is_empty() {
            None
        } else {
            Some(start_index.min(sources.len() - 1))
        };
        model.playlist = sources;
        model.position_ms = start_position_ms;
        model.buffered_position_ms = start_position_ms;
        model.phase = EnginePhase::Idle;
        Ok(())
    }

    fn insert_sources(&mut self, index: usize, sources: Vec<EngineSource>) -> Result<()> {
        let mut model = self.model.lock();
        if index > model.playlist.len() {
            return Err(BridgeError::OperationFailed(format!(
                "insert at {} past end {}",
                index,
                model.playlist.len()
            )));
        }
        model.begin(EngineCall::InsertSources {
            index,
            count: sources.len(),
        })?;

        let tag = model.current_tag();
        model.playlist.splice(index..index, sources);
        model.relocate(tag, 0);
        Ok(())
    }

    fn remove_sources(&mut self, start: usize, end: usize) -> Result<()> {
        let mut model = self.model.lock();
        if start > end || end > model.playlist.len() {
            return Err(BridgeError::OperationFailed(format!(
                "remove {}..{} out of range",
                start, end
            )));
        }
        model.begin(EngineCall::RemoveSources { start, end })?;

        let tag = model.current_tag();
        model.playlist.drain(start..end);
        model.relocate(tag, start);
        Ok(())
    }

    fn move_sources(&mut self, start: usize, end: usize, new_index: usize) -> Result<()> {
        let mut model = self.model.lock();
        let len = model.playlist.len();
        if start > end || end > len || new_index + (end - start) > len {
            return Err(BridgeError::OperationFailed(format!(
                "move {}..{} to {} out of range",
                start, end, new_index
            )));
        }
        model.begin(EngineCall::MoveSources {
            start,
            end,
            new_index,
        })?;

        let tag = model.current_tag();
        let block: Vec<EngineSource> = model.playlist.drain(start..end).collect();
        model.playlist.splice(new_index..new_index, block);
        model.relocate(tag, 0);
        Ok(())
    }

    fn clear_sources(&mut self) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::ClearSources)?;
        model.playlist.clear();
        model.relocate(None, 0);
        Ok(())
    }

    fn source_count(&self) -> usize {
        self.model.lock().playlist.len()
    }

    fn prepare(&mut self) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::Prepare)?;
        if !model.playlist.is_empty() {
            model.phase = EnginePhase::Ready;
        }
        Ok(())
    }

    fn seek_to(&mut self, index: usize, position_ms: u64) -> Result<()> {
        let mut model = self.model.lock();
        if index >= model.playlist.len() {
            return Err(BridgeError::OperationFailed(format!("seek to missing entry {}", index)));
        }
        model.begin(EngineCall::SeekTo { index, position_ms })?;
        model.current_index = Some(index);
        model.position_ms = position_ms;
        model.buffered_position_ms = position_ms;
        if model.phase == EnginePhase::Ended {
            model.phase = EnginePhase::Ready;
        }
        Ok(())
    }

    fn seek_to_end(&mut self, index: usize) -> Result<()> {
        let mut model = self.model.lock();
        if index >= model.playlist.len() {
            return Err(BridgeError::OperationFailed(format!("seek to missing entry {}", index)));
        }
        model.begin(EngineCall::SeekToEnd { index })?;
        model.current_index = Some(index);
        model.position_ms = model.duration_ms.unwrap_or(0);
        if index + 1 == model.playlist.len() && model.repeat_mode == EngineRepeatMode::Off {
            model.phase = EnginePhase::Ended;
        }
        Ok(())
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::SetPlayWhenReady(play_when_ready))?;
        model.play_when_ready = play_when_ready;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::Stop)?;
        model.phase = EnginePhase::Idle;
        Ok(())
    }

    fn set_repeat_mode(&mut self, mode: EngineRepeatMode) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::SetRepeatMode(mode))?;
        model.repeat_mode = mode;
        Ok(())
    }

    fn set_playback_speed(&mut self, speed: f32) -> Result<()> {
        let mut model = self.model.lock();
        model.begin(EngineCall::SetPlaybackSpeed(speed))?;
        model.playback_speed = speed;
        Ok(())
    }

    fn release(&mut self) {
        let mut model = self.model.lock();
        if !model.released {
            model.calls.push(EngineCall::Release);
            model.released = true;
        }
    }

    fn current_index(&self) -> Option<usize> {
        self.model.lock().current_index
    }

    fn current_position_ms(&self) -> u64 {
        self.model.lock().position_ms
    }

    fn buffered_position_ms(&self) -> u64 {
        self.model.lock().buffered_position_ms
    }

    fn buffered_percentage(&self) -> u8 {
        let model = self.model.lock();
        match model.duration_ms {
            Some(duration) if duration > 0 => {
                (model.buffered_position_ms.saturating_mul(100) / duration).min(100) as u8
            }
            _ => 0,
        }
    }

    fn duration_ms(&self) -> Option<u64> {
        self.model.lock().duration_ms
    }

    fn play_when_ready(&self) -> bool {
        self.model.lock().play_when_ready
    }

    fn phase(&self) -> EnginePhase {
        self.model.lock().phase
    }

    fn repeat_mode(&self) -> EngineRepeatMode {
        self.model.lock().repeat_mode
    }

    fn playback_speed(&self) -> f32 {
        self.model.lock().playback_speed
    }

    fn current_artwork(&self) -> Option<Bytes> {
        self.model.lock().artwork.clone()
    }
}
