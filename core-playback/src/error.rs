//! # Playback Error Types
//!
//! Error types for the playback state model, the player and the diff protocol.

use crate::model::QueueId;
use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur in playback state handling.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Invariant Violations
    // ========================================================================
    /// A queue must contain at least one item.
    #[error("Queue must not be empty")]
    EmptyQueue,

    /// Queue ids are unique within one queue.
    #[error("Duplicate queue id in queue: {0}")]
    DuplicateQueueId(QueueId),

    /// The queue index does not point into the queue.
    #[error("Queue index {index} out of bounds for queue of length {len}")]
    QueueIndexOutOfBounds { index: usize, len: usize },

    /// Playback speed must be finite and strictly positive.
    #[error("Invalid playback speed: {0} (must be finite and greater than 0)")]
    InvalidPlaybackSpeed(f32),

    /// The linear queue of a shuffled queue must hold exactly the same items.
    #[error("Linear queue is not a permutation of the shuffled queue: {0}")]
    NotAPermutation(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The player has not finished its initialization.
    #[error("Media player is not initialized")]
    NotInitialized,

    /// The player was released and accepts no further calls.
    #[error("Media player has been released")]
    Released,

    // ========================================================================
    // Content Errors
    // ========================================================================
    /// A media id could not be resolved.
    #[error("Media item not found: {0}")]
    MediaItemNotFound(String),

    /// A diff cannot be applied to the given base state.
    #[error("Diff does not apply to base state: {0}")]
    DiffMismatch(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The wrapped media engine rejected an operation.
    #[error("Media engine error: {0}")]
    Engine(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` for data model invariant violations.
    ///
    /// These are programming errors at the call site and are never retried.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            PlaybackError::EmptyQueue
                | PlaybackError::DuplicateQueueId(_)
                | PlaybackError::QueueIndexOutOfBounds { .. }
                | PlaybackError::InvalidPlaybackSpeed(_)
                | PlaybackError::NotAPermutation(_)
        )
    }

    /// Returns `true` if the player was used outside its lifecycle.
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self, PlaybackError::NotInitialized | PlaybackError::Released)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
