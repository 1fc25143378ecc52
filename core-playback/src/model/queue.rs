//! Queue items and the linear/shuffled queue variants.
//!
//! Both queue types validate their invariants on construction and on
//! deserialization: the queue is non-empty, queue ids are unique and the
//! index points into the queue. A shuffled queue additionally carries the
//! linear order it was shuffled from, which must hold exactly the same items.

use crate::error::{PlaybackError, Result};
use crate::model::transport::ShuffleMode;
use bridge_traits::media::MediaObject;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Identity of one queue placement.
///
/// Generated fresh every time an item is put into a queue, so the same media
/// item can appear several times with distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(Uuid);

impl QueueId {
    /// Create a new random queue id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a queue id from its string form (engine source tags use it).
    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for QueueId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// One entry of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem<M> {
    pub queue_id: QueueId,
    pub media_item: M,
}

impl<M> QueueItem<M> {
    /// Place `media_item` with a fresh queue id.
    pub fn new(media_item: M) -> Self {
        Self {
            queue_id: QueueId::new(),
            media_item,
        }
    }

    pub fn with_id(queue_id: QueueId, media_item: M) -> Self {
        Self {
            queue_id,
            media_item,
        }
    }
}

// Equal items always share a queue id, so hashing the id alone is consistent
// with the structural `Eq`.
impl<M> Hash for QueueItem<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.queue_id.hash(state);
    }
}

/// Wrap every media item with a fresh queue id.
pub fn to_queue_items<M>(media_items: impl IntoIterator<Item = M>) -> Vec<QueueItem<M>> {
    media_items.into_iter().map(QueueItem::new).collect()
}

fn validate_items<M>(queue: &[QueueItem<M>], queue_index: usize) -> Result<()> {
    if queue.is_empty() {
        return Err(PlaybackError::EmptyQueue);
    }

    let mut seen = HashSet::with_capacity(queue.len());
    for item in queue {
        if !seen.insert(item.queue_id) {
            return Err(PlaybackError::DuplicateQueueId(item.queue_id));
        }
    }

    if queue_index >= queue.len() {
        return Err(PlaybackError::QueueIndexOutOfBounds {
            index: queue_index,
            len: queue.len(),
        });
    }

    Ok(())
}

// ============================================================================
// Linear Queue
// ============================================================================

/// Queue played in its natural order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "RawLinearQueue<M>",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub struct LinearQueue<M> {
    queue: Vec<QueueItem<M>>,
    queue_index: usize,
}

#[derive(Deserialize)]
struct RawLinearQueue<M> {
    queue: Vec<QueueItem<M>>,
    queue_index: usize,
}

impl<M: MediaObject> TryFrom<RawLinearQueue<M>> for LinearQueue<M> {
    type Error = PlaybackError;

    fn try_from(raw: RawLinearQueue<M>) -> Result<Self> {
        Self::new(raw.queue, raw.queue_index)
    }
}

impl<M: MediaObject> LinearQueue<M> {
    /// # Errors
    ///
    /// Fails on an empty queue, duplicate queue ids or an out-of-range index.
    pub fn new(queue: Vec<QueueItem<M>>, queue_index: usize) -> Result<Self> {
        validate_items(&queue, queue_index)?;
        Ok(Self { queue, queue_index })
    }

    /// Caller guarantees the invariants.
    pub(crate) fn new_unchecked(queue: Vec<QueueItem<M>>, queue_index: usize) -> Self {
        debug_assert!(validate_items(&queue, queue_index).is_ok());
        Self { queue, queue_index }
    }

    pub fn queue(&self) -> &[QueueItem<M>] {
        &self.queue
    }

    pub fn queue_index(&self) -> usize {
        self.queue_index
    }

    pub fn now_playing(&self) -> &QueueItem<M> {
        &self.queue[self.queue_index]
    }

    pub fn into_items(self) -> Vec<QueueItem<M>> {
        self.queue
    }
}

// ============================================================================
// Shuffled Queue
// ============================================================================

/// Queue played in shuffled order, remembering the linear order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "RawShuffledQueue<M>",
    bound(deserialize = "M: MediaObject + Deserialize<'de>")
)]
pub struct ShuffledQueue<M> {
    queue: Vec<QueueItem<M>>,
    queue_index: usize,
    linear_queue: Vec<QueueItem<M>>,
}

#[derive(Deserialize)]
struct RawShuffledQueue<M> {
    queue: Vec<QueueItem<M>>,
    queue_index: usize,
    linear_queue: Vec<QueueItem<M>>,
}

impl<M: MediaObject> TryFrom<RawShuffledQueue<M>> for ShuffledQueue<M> {
    type Error = PlaybackError;

    fn try_from(raw: RawShuffledQueue<M>) -> Result<Self> {
        Self::new(raw.queue, raw.queue_index, raw.linear_queue)
    }
}

impl<M: MediaObject> ShuffledQueue<M> {
    /// # Errors
    ///
    /// Fails like [`LinearQueue::new`], or with
    /// [`PlaybackError::NotAPermutation`] when `linear_queue` does not hold
    /// exactly the items of `queue`.
    pub fn new(
        queue: Vec<QueueItem<M>>,
        queue_index: usize,
        linear_queue: Vec<QueueItem<M>>,
    ) -> Result<Self> {
        validate_items(&queue, queue_index)?;
        check_permutation(&queue, &linear_queue)?;
        Ok(Self {
            queue,
            queue_index,
            linear_queue,
        })
    }

    /// Caller guarantees the invariants.
    pub(crate) fn new_unchecked(
        queue: Vec<QueueItem<M>>,
        queue_index: usize,
        linear_queue: Vec<QueueItem<M>>,
    ) -> Self {
        debug_assert!(validate_items(&queue, queue_index).is_ok());
        debug_assert!(check_permutation(&queue, &linear_queue).is_ok());
        Self {
            queue,
            queue_index,
            linear_queue,
        }
    }

    pub fn queue(&self) -> &[QueueItem<M>] {
        &self.queue
    }

    pub fn queue_index(&self) -> usize {
        self.queue_index
    }

    pub fn linear_queue(&self) -> &[QueueItem<M>] {
        &self.linear_queue
    }

    pub fn now_playing(&self) -> &QueueItem<M> {
        &self.queue[self.queue_index]
    }
}

fn check_permutation<M: MediaObject>(
    queue: &[QueueItem<M>],
    linear_queue: &[QueueItem<M>],
) -> Result<()> {
    if queue.len() != linear_queue.len() {
        return Err(PlaybackError::NotAPermutation(format!(
            "shuffled queue has {} items, linear queue has {}",
            queue.len(),
            linear_queue.len()
        )));
    }

    let mut remaining: HashMap<QueueId, &QueueItem<M>> =
        queue.iter().map(|item| (item.queue_id, item)).collect();

    for item in linear_queue {
        match remaining.remove(&item.queue_id) {
            Some(shuffled) if shuffled == item => {}
            Some(_) => {
                return Err(PlaybackError::NotAPermutation(format!(
                    "item {} differs between the two orders",
                    item.queue_id
                )))
            }
            None => {
                return Err(PlaybackError::NotAPermutation(format!(
                    "item {} is missing from the shuffled queue or repeated",
                    item.queue_id
                )))
            }
        }
    }

    Ok(())
}

// ============================================================================
// Queue State
// ============================================================================

/// The queue of an active transport state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "M: MediaObject + Deserialize<'de>"))]
pub enum QueueState<M> {
    Linear(LinearQueue<M>),
    Shuffled(ShuffledQueue<M>),
}

impl<M: MediaObject> QueueState<M> {
    /// Items in playback order.
    pub fn queue(&self) -> &[QueueItem<M>] {
        match self {
            QueueState::Linear(q) => q.queue(),
            QueueState::Shuffled(q) => q.queue(),
        }
    }

    pub fn queue_index(&self) -> usize {
        match self {
            QueueState::Linear(q) => q.queue_index(),
            QueueState::Shuffled(q) => q.queue_index(),
        }
    }

    /// Items in unshuffled order. Equal to [`queue`](Self::queue) when linear.
    pub fn linear_queue(&self) -> &[QueueItem<M>] {
        match self {
            QueueState::Linear(q) => q.queue(),
            QueueState::Shuffled(q) => q.linear_queue(),
        }
    }

    pub fn now_playing(&self) -> &QueueItem<M> {
        match self {
            QueueState::Linear(q) => q.now_playing(),
            QueueState::Shuffled(q) => q.now_playing(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Derived from the variant.
    pub fn shuffle_mode(&self) -> ShuffleMode {
        match self {
            QueueState::Linear(_) => ShuffleMode::Disabled,
            QueueState::Shuffled(_) => ShuffleMode::Enabled,
        }
    }

    /// Same items, different position.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::QueueIndexOutOfBounds`] if `queue_index` is
    /// not inside the queue.
    pub fn with_queue_index(&self, queue_index: usize) -> Result<Self> {
        if queue_index >= self.len() {
            return Err(PlaybackError::QueueIndexOutOfBounds {
                index: queue_index,
                len: self.len(),
            });
        }

        Ok(match self {
            QueueState::Linear(q) => {
                QueueState::Linear(LinearQueue::new_unchecked(q.queue.clone(), queue_index))
            }
            QueueState::Shuffled(q) => QueueState::Shuffled(ShuffledQueue::new_unchecked(
                q.queue.clone(),
                queue_index,
                q.linear_queue.clone(),
            )),
        })
    }

    /// Whether both queues hold the same items in the same orders,
    /// regardless of the current index.
    pub fn same_items(&self, other: &Self) -> bool {
        self.shuffle_mode() == other.shuffle_mode()
            && self.queue() == other.queue()
            && self.linear_queue() == other.linear_queue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{queue_items, TestTrack};

    #[test]
    fn test_queue_id_round_trips_through_string() {
        let id = QueueId::new();
        let parsed = QueueId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(QueueId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_fresh_ids_for_same_media_item() {
        let track = TestTrack::new("a");
        let first = QueueItem::new(track.clone());
        let second = QueueItem::new(track);
        assert_ne!(first.queue_id, second.queue_id);
        assert_ne!(first, second);
    }

    #[test]
    fn test_linear_queue_rejects_empty() {
        let result = LinearQueue::<TestTrack>::new(Vec::new(), 0);
        assert!(matches!(result, Err(PlaybackError::EmptyQueue)));
    }

    #[test]
    fn test_linear_queue_rejects_out_of_range_index() {
        let result = LinearQueue::new(queue_items(&["a", "b"]), 2);
        assert!(matches!(
            result,
            Err(PlaybackError::QueueIndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_linear_queue_rejects_duplicate_ids() {
        let items = queue_items(&["a"]);
        let duplicated = vec![items[0].clone(), items[0].clone()];
        assert!(matches!(
            LinearQueue::new(duplicated, 0),
            Err(PlaybackError::DuplicateQueueId(_))
        ));
    }

    #[test]
    fn test_shuffled_queue_rejects_missing_item() {
        let items = queue_items(&["a", "b", "c"]);
        let shuffled = vec![items[2].clone(), items[0].clone(), items[1].clone()];
        let linear = vec![items[0].clone(), items[1].clone()];
        let result = ShuffledQueue::new(shuffled, 0, linear);
        assert!(matches!(result, Err(PlaybackError::NotAPermutation(_))));
    }

    #[test]
    fn test_shuffled_queue_rejects_substituted_item() {
        let items = queue_items(&["a", "b"]);
        let stranger = QueueItem::new(TestTrack::new("z"));
        let result = ShuffledQueue::new(
            vec![items[1].clone(), items[0].clone()],
            0,
            vec![items[0].clone(), stranger],
        );
        assert!(matches!(result, Err(PlaybackError::NotAPermutation(_))));
    }

    #[test]
    fn test_shuffled_queue_accepts_permutation() {
        let items = queue_items(&["a", "b", "c"]);
        let shuffled = vec![items[1].clone(), items[2].clone(), items[0].clone()];
        let queue = ShuffledQueue::new(shuffled, 0, items.clone()).unwrap();
        assert_eq!(queue.now_playing(), &items[1]);
        assert_eq!(queue.linear_queue(), items.as_slice());
    }

    #[test]
    fn test_queue_state_accessors() {
        let items = queue_items(&["a", "b"]);
        let state = QueueState::Linear(LinearQueue::new(items.clone(), 1).unwrap());
        assert_eq!(state.now_playing(), &items[1]);
        assert_eq!(state.linear_queue(), state.queue());
        assert_eq!(state.shuffle_mode(), ShuffleMode::Disabled);

        let moved = state.with_queue_index(0).unwrap();
        assert_eq!(moved.queue_index(), 0);
        assert!(moved.same_items(&state));
        assert!(state.with_queue_index(5).is_err());
    }

    #[test]
    fn test_deserialization_revalidates() {
        let items = queue_items(&["a", "b"]);
        let valid = LinearQueue::new(items, 1).unwrap();
        let mut json = serde_json::to_value(&valid).unwrap();

        let restored: LinearQueue<TestTrack> = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(restored, valid);

        json["queue_index"] = serde_json::json!(7);
        assert!(serde_json::from_value::<LinearQueue<TestTrack>>(json).is_err());
    }
}
