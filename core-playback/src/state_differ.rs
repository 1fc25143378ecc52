//! # Cross-Process State Differ
//!
//! Field-level diffs between two [`PreparedState`]s, for shipping state
//! changes to controllers without resending the full snapshot.
//!
//! Only changed fields are emitted. Queues are diffed with the move-aware
//! [`difference_of`]: the linear order against the previous linear order, and
//! the shuffled order against the previous shuffled order. When shuffle is
//! switched on, the shuffled order is diffed against the new linear order,
//! which is already on the receiving side by then.
//!
//! Every [`StateModification`] serializes on its own.
//!
//! ```text
//! service                                 controller
//! ───────                                 ──────────
//! generate_diff(new, old) ──[records]──> apply_diff(old, records) == new
//! ```

use crate::diff::{apply_operations, difference_of, ListOperation};
use crate::error::{PlaybackError, Result};
use crate::model::{
    Artwork, BufferingState, LinearQueue, PlaybackSpeed, PlaybackStatus, PreparedState, QueueItem,
    QueueState, RepeatMode, SeekPosition, ShuffledQueue,
};
use bridge_traits::media::MediaObject;
use serde::{Deserialize, Serialize};

/// A single changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "field",
    content = "value",
    rename_all = "snake_case",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub enum StateModification<M> {
    Artwork(Option<Artwork>),
    Duration(Option<u64>),
    Buffering(BufferingState),
    Status(PlaybackStatus),
    SeekPosition(SeekPosition),
    RepeatMode(RepeatMode),
    PlaybackSpeed(PlaybackSpeed),
    /// Edits of the unshuffled order.
    LinearQueue {
        operations: Vec<ListOperation<QueueItem<M>>>,
    },
    /// Edits of the shuffled order. When the base is linear they apply to the
    /// already-updated linear order and switch the queue to shuffled.
    ShuffledQueue {
        operations: Vec<ListOperation<QueueItem<M>>>,
    },
    /// Switch back to the linear order.
    Unshuffle,
    QueueIndex(usize),
}

/// Records that turn `from` into `to`.
pub fn generate_diff<M: MediaObject>(
    to: &PreparedState<M>,
    from: &PreparedState<M>,
) -> Vec<StateModification<M>> {
    let mut diff = Vec::new();

    if to.artwork != from.artwork {
        diff.push(StateModification::Artwork(to.artwork.clone()));
    }
    if to.duration_ms != from.duration_ms {
        diff.push(StateModification::Duration(to.duration_ms));
    }
    if to.buffering != from.buffering {
        diff.push(StateModification::Buffering(to.buffering));
    }

    let (to, from) = (&to.transport, &from.transport);
    if to.status != from.status {
        diff.push(StateModification::Status(to.status));
    }
    if to.seek_position != from.seek_position {
        diff.push(StateModification::SeekPosition(to.seek_position.clone()));
    }
    if to.repeat_mode != from.repeat_mode {
        diff.push(StateModification::RepeatMode(to.repeat_mode));
    }
    if to.playback_speed != from.playback_speed {
        diff.push(StateModification::PlaybackSpeed(to.playback_speed));
    }

    let linear_operations = difference_of(from.queue.linear_queue(), to.queue.linear_queue(), true);
    if !linear_operations.is_empty() {
        diff.push(StateModification::LinearQueue {
            operations: linear_operations,
        });
    }

    match (&from.queue, &to.queue) {
        (QueueState::Shuffled(previous), QueueState::Shuffled(next)) => {
            let operations = difference_of(previous.queue(), next.queue(), true);
            if !operations.is_empty() {
                diff.push(StateModification::ShuffledQueue { operations });
            }
        }
        (QueueState::Linear(_), QueueState::Shuffled(next)) => {
            diff.push(StateModification::ShuffledQueue {
                operations: difference_of(next.linear_queue(), next.queue(), true),
            });
        }
        (QueueState::Shuffled(_), QueueState::Linear(_)) => diff.push(StateModification::Unshuffle),
        (QueueState::Linear(_), QueueState::Linear(_)) => {}
    }

    if to.queue.queue_index() != from.queue.queue_index() {
        diff.push(StateModification::QueueIndex(to.queue.queue_index()));
    }

    diff
}

/// Fold `diff` over `base`.
///
/// # Errors
///
/// Returns [`PlaybackError::DiffMismatch`] when the records do not fit the
/// base (indices out of range, or a resulting queue that breaks its
/// invariants). Such a diff was generated against a different base.
pub fn apply_diff<M: MediaObject>(
    base: &PreparedState<M>,
    diff: &[StateModification<M>],
) -> Result<PreparedState<M>> {
    let mut state = base.clone();
    let mut linear = base.transport.queue.linear_queue().to_vec();
    let mut shuffled = match &base.transport.queue {
        QueueState::Shuffled(queue) => Some(queue.queue().to_vec()),
        QueueState::Linear(_) => None,
    };
    let mut queue_index = base.transport.queue.queue_index();
    let mut queue_touched = false;

    for modification in diff {
        match modification {
            StateModification::Artwork(artwork) => state.artwork = artwork.clone(),
            StateModification::Duration(duration_ms) => state.duration_ms = *duration_ms,
            StateModification::Buffering(buffering) => state.buffering = *buffering,
            StateModification::Status(status) => state.transport.status = *status,
            StateModification::SeekPosition(seek) => state.transport.seek_position = seek.clone(),
            StateModification::RepeatMode(mode) => state.transport.repeat_mode = *mode,
            StateModification::PlaybackSpeed(speed) => state.transport.playback_speed = *speed,
            StateModification::LinearQueue { operations } => {
                apply_operations(&mut linear, operations)?;
                queue_touched = true;
            }
            StateModification::ShuffledQueue { operations } => {
                let mut order = shuffled.take().unwrap_or_else(|| linear.clone());
                apply_operations(&mut order, operations)?;
                shuffled = Some(order);
                queue_touched = true;
            }
            StateModification::Unshuffle => {
                shuffled = None;
                queue_touched = true;
            }
            StateModification::QueueIndex(index) => {
                queue_index = *index;
                queue_touched = true;
            }
        }
    }

    if queue_touched {
        state.transport.queue = rebuild_queue(linear, shuffled, queue_index)?;
    }
    Ok(state)
}

fn rebuild_queue<M: MediaObject>(
    linear: Vec<QueueItem<M>>,
    shuffled: Option<Vec<QueueItem<M>>>,
    queue_index: usize,
) -> Result<QueueState<M>> {
    let queue = match shuffled {
        Some(order) => ShuffledQueue::new(order, queue_index, linear).map(QueueState::Shuffled),
        None => LinearQueue::new(linear, queue_index).map(QueueState::Linear),
    };
    queue.map_err(|err| {
        PlaybackError::DiffMismatch(format!("queue rebuilt from diff is invalid: {}", err))
    })
}

/// Stateless front for [`generate_diff`] and [`apply_diff`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaPlayerStateDiffer;

impl MediaPlayerStateDiffer {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_diff<M: MediaObject>(
        &self,
        to: &PreparedState<M>,
        from: &PreparedState<M>,
    ) -> Vec<StateModification<M>> {
        generate_diff(to, from)
    }

    pub fn apply_diff<M: MediaObject>(
        &self,
        base: &PreparedState<M>,
        diff: &[StateModification<M>],
    ) -> Result<PreparedState<M>> {
        apply_diff(base, diff)
    }
}
