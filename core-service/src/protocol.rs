//! # Wire Protocol
//!
//! Messages exchanged between the playback service and its controllers.
//!
//! ```text
//! controller ──ClientCommand──> service
//! controller <──ServiceMessage── service
//! ```
//!
//! Messages are JSON-encoded and then split into [`MessageChunk`]s so that no
//! single transport payload exceeds the configured size. Every frame on the
//! channel is an encoded chunk, even when one chunk carries the whole
//! message. [`ChunkAssembler`] puts them back together on the other side.

use crate::error::{Result, ServiceError};
use bridge_traits::media::{MediaObject, SearchArguments};
use bytes::Bytes;
use core_playback::model::{
    MediaPlayerState, PlaybackSpeed, RepeatMode, ShuffleMode, TransportState,
};
use core_playback::state_differ::StateModification;
use core_runtime::config::{EncoreConfig, DEFAULT_MAX_ASSEMBLED_BYTES};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};
use uuid::Uuid;

// ============================================================================
// Messages
// ============================================================================

/// Service to controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "snake_case",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub enum ServiceMessage<M> {
    /// Full snapshot.
    State { state: MediaPlayerState<M> },
    /// Changes relative to the previous prepared state.
    Diff { modifications: Vec<StateModification<M>> },
    Released,
}

/// Controller to service. Every command is safe to deliver twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "snake_case",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub enum ClientCommand<M> {
    SetState { state: TransportState<M> },
    Play,
    Pause,
    SeekTo { position_ms: u64 },
    SkipToNext,
    SkipToPrevious,
    SkipToIndex { index: usize },
    SetShuffleMode { shuffle_mode: ShuffleMode },
    SetRepeatMode { repeat_mode: RepeatMode },
    SetPlaybackSpeed { playback_speed: PlaybackSpeed },
    PlayFromSearch {
        query: String,
        #[serde(default)]
        arguments: SearchArguments,
    },
    /// Play the browsed items starting at `media_item_id`.
    PlayFromMediaBrowser {
        media_item_ids: Vec<String>,
        media_item_id: String,
    },
}

pub fn encode_message<T: Serialize>(message: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

pub fn decode_message<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

// ============================================================================
// Chunking
// ============================================================================

/// One slice of an encoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChunk {
    pub message_id: Uuid,
    pub index: u32,
    pub total: u32,
    pub payload: Bytes,
}

/// Split `payload` into chunks of at most `max_bytes` (at least one chunk).
pub fn split_into_chunks(payload: Bytes, max_bytes: usize) -> Vec<MessageChunk> {
    let max_bytes = max_bytes.max(1);
    let message_id = Uuid::new_v4();
    let total = payload.len().div_ceil(max_bytes).max(1);

    (0..total)
        .map(|index| {
            let start = index * max_bytes;
            let end = (start + max_bytes).min(payload.len());
            MessageChunk {
                message_id,
                index: index as u32,
                total: total as u32,
                payload: payload.slice(start..end),
            }
        })
        .collect()
}

/// Half-assembled messages kept at once; the oldest is dropped first.
pub const MAX_PENDING_MESSAGES: usize = 8;

#[derive(Debug)]
struct PendingMessage {
    total: u32,
    parts: BTreeMap<u32, Bytes>,
    bytes: usize,
    arrival: u64,
}

/// Reassembles chunked messages. Interleaved messages are kept apart by id.
///
/// Memory is bounded: chunks are stored as they arrive, a message may not
/// grow past the assembled-size limit, and only [`MAX_PENDING_MESSAGES`]
/// incomplete messages are kept. Messages abandoned by a sender that died
/// midway are evicted oldest first.
#[derive(Debug)]
pub struct ChunkAssembler {
    pending: HashMap<Uuid, PendingMessage>,
    max_message_bytes: usize,
    max_pending: usize,
    arrivals: u64,
}

impl Default for ChunkAssembler {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_ASSEMBLED_BYTES, MAX_PENDING_MESSAGES)
    }
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembler bounded by `config.max_assembled_bytes`.
    pub fn from_config(config: &EncoreConfig) -> Self {
        Self::with_limits(config.max_assembled_bytes, MAX_PENDING_MESSAGES)
    }

    pub fn with_limits(max_message_bytes: usize, max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            max_message_bytes: max_message_bytes.max(1),
            max_pending: max_pending.max(1),
            arrivals: 0,
        }
    }

    /// Add a chunk. Returns the full payload once its last missing chunk
    /// arrives. A chunk seen twice replaces the earlier copy.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ChunkMismatch`] for a zero total, an index past the
    /// total, a total that disagrees with earlier chunks of the message, or a
    /// message larger than the assembled-size limit. The partial message is
    /// dropped.
    pub fn push(&mut self, chunk: MessageChunk) -> Result<Option<Bytes>> {
        let id = chunk.message_id;
        if chunk.total == 0 || chunk.index >= chunk.total {
            return Err(ServiceError::ChunkMismatch(format!(
                "chunk {} of {} for message {}",
                chunk.index, chunk.total, id
            )));
        }
        // Only a lone chunk may be empty, so more chunks than bytes is bogus
        if chunk.total as usize > self.max_message_bytes {
            return Err(ServiceError::ChunkMismatch(format!(
                "message {} announced {} chunks, limit is {} bytes",
                id, chunk.total, self.max_message_bytes
            )));
        }

        if !self.pending.contains_key(&id) {
            self.evict_oldest_if_full();
            self.arrivals += 1;
        }
        let arrival = self.arrivals;
        let pending = self.pending.entry(id).or_insert_with(|| PendingMessage {
            total: chunk.total,
            parts: BTreeMap::new(),
            bytes: 0,
            arrival,
        });

        if pending.total != chunk.total {
            let expected = pending.total;
            self.pending.remove(&id);
            return Err(ServiceError::ChunkMismatch(format!(
                "message {} announced {} chunks, then {}",
                id, expected, chunk.total
            )));
        }

        let added = chunk.payload.len();
        let replaced = pending
            .parts
            .insert(chunk.index, chunk.payload)
            .map_or(0, |old| old.len());
        pending.bytes = pending.bytes + added - replaced;
        if pending.bytes > self.max_message_bytes {
            let bytes = pending.bytes;
            self.pending.remove(&id);
            return Err(ServiceError::ChunkMismatch(format!(
                "message {} grew to {} bytes, limit is {}",
                id, bytes, self.max_message_bytes
            )));
        }

        trace!(
            message_id = %id,
            received = pending.parts.len(),
            total = pending.total,
            "Chunk received"
        );
        if pending.parts.len() < pending.total as usize {
            return Ok(None);
        }

        let pending = match self.pending.remove(&id) {
            Some(pending) => pending,
            None => return Ok(None),
        };
        let mut payload = Vec::with_capacity(pending.bytes);
        for part in pending.parts.values() {
            payload.extend_from_slice(part);
        }
        Ok(Some(Bytes::from(payload)))
    }

    /// Messages still waiting for chunks.
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    fn evict_oldest_if_full(&mut self) {
        if self.pending.len() < self.max_pending {
            return;
        }
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, pending)| pending.arrival)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            debug!(message_id = %id, "Dropping abandoned partial message");
            self.pending.remove(&id);
        }
    }
}

/// Encode `message` into channel frames.
pub fn encode_frames<T: Serialize>(message: &T, max_bytes: usize) -> Result<Vec<Bytes>> {
    let payload = encode_message(message)?;
    split_into_chunks(payload, max_bytes)
        .iter()
        .map(encode_message)
        .collect()
}

/// Feed one channel frame; yields the decoded message once complete.
pub fn decode_frame<T: DeserializeOwned>(
    assembler: &mut ChunkAssembler,
    frame: &[u8],
) -> Result<Option<T>> {
    let chunk: MessageChunk = decode_message(frame)?;
    match assembler.push(chunk)? {
        Some(payload) => decode_message(&payload).map(Some),
        None => Ok(None),
    }
}
