//! # Playback State Model
//!
//! Immutable, serializable snapshots of what the player is doing.
//!
//! ## Overview
//!
//! ```text
//! MediaPlayerState ── Initializing
//!                  ├─ Ready(IdleState)
//!                  └─ Prepared(PreparedState) ── ActiveState ── QueueState ── Linear | Shuffled
//!                                              ├─ artwork      ├─ SeekPosition
//!                                              ├─ duration     └─ PlaybackStatus / RepeatMode
//!                                              └─ BufferingState
//! ```
//!
//! Every constructor that can break an invariant returns a `Result`, and
//! deserialization goes through the same checks.

pub mod player_state;
pub mod queue;
pub mod seek;
pub mod transport;

pub use player_state::{Artwork, BufferingState, MediaPlayerState, PreparedState};
pub use queue::{to_queue_items, LinearQueue, QueueId, QueueItem, QueueState, ShuffledQueue};
pub use seek::{ComputedSeekPosition, SeekPosition};
pub use transport::{
    ActiveState, IdleState, PlaybackSpeed, PlaybackStatus, RepeatMode, ShuffleMode, TransportState,
};
