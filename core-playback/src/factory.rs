//! # Playback State Factory
//!
//! Pure transitions of the transport state machine.
//!
//! ## Overview
//!
//! Every user or system intent maps to one method taking the current
//! [`TransportState`] and returning the next one. Nothing here touches the
//! engine: the result is handed to `MediaPlayer::set_state`, which works out
//! the engine operations.
//!
//! Intents that need a queue (`play`, `pause`, `seek_to`, skips) return an
//! [`Idle`](TransportState::Idle) state unchanged.
//!
//! ## Usage
//!
//! ```
//! use bridge_traits::time::ManualClock;
//! use core_playback::factory::PlaybackStateFactory;
//! use core_playback::model::TransportState;
//! use core_playback::testing::TestTrack;
//! use std::sync::Arc;
//!
//! let factory = PlaybackStateFactory::with_seed(Arc::new(ManualClock::new(0)), 7);
//! let idle: TransportState<TestTrack> = TransportState::default();
//! assert_eq!(factory.play(&idle), idle);
//! ```

use crate::error::{PlaybackError, Result};
use crate::model::{
    to_queue_items, ActiveState, LinearQueue, PlaybackSpeed, PlaybackStatus, QueueItem, QueueState,
    RepeatMode, SeekPosition, ShuffleMode, ShuffledQueue, TransportState,
};
use bridge_traits::media::{MediaObject, SearchResults};
use bridge_traits::time::Clock;
use core_runtime::config::EncoreConfig;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;

/// Below this position `skip_to_previous` goes back one item, otherwise it
/// restarts the current one.
pub const SKIP_TO_PREVIOUS_RESTART_THRESHOLD_MS: u64 = 5_000;

/// Computes the next transport state for each intent.
pub struct PlaybackStateFactory {
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for PlaybackStateFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackStateFactory").finish_non_exhaustive()
    }
}

impl PlaybackStateFactory {
    /// Factory with an entropy-seeded shuffle.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Factory whose shuffles are reproducible.
    pub fn with_seed(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_config(config: &EncoreConfig) -> Self {
        match config.shuffle_seed {
            Some(seed) => Self::with_seed(Arc::clone(&config.clock), seed),
            None => Self::new(Arc::clone(&config.clock)),
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub fn play<M: MediaObject>(&self, state: &TransportState<M>) -> TransportState<M> {
        map_active(state, |active| {
            if active.status.reached_end_of_queue() {
                ActiveState {
                    status: PlaybackStatus::Playing,
                    seek_position: SeekPosition::ZERO,
                    queue: active
                        .queue
                        .with_queue_index(0)
                        .unwrap_or_else(|_| active.queue.clone()),
                    ..active.clone()
                }
            } else {
                ActiveState {
                    status: PlaybackStatus::Playing,
                    ..active.clone()
                }
            }
        })
    }

    pub fn pause<M: MediaObject>(&self, state: &TransportState<M>) -> TransportState<M> {
        map_active(state, |active| match active.status {
            PlaybackStatus::Playing => ActiveState {
                status: PlaybackStatus::paused(),
                ..active.clone()
            },
            PlaybackStatus::Paused { .. } => active.clone(),
        })
    }

    /// Seeking while paused clears the end-of-queue flag.
    pub fn seek_to<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        position_ms: u64,
    ) -> TransportState<M> {
        map_active(state, |active| ActiveState {
            status: match active.status {
                PlaybackStatus::Playing => PlaybackStatus::Playing,
                PlaybackStatus::Paused { .. } => PlaybackStatus::paused(),
            },
            seek_position: SeekPosition::absolute(position_ms),
            ..active.clone()
        })
    }

    pub fn skip_to_previous<M: MediaObject>(&self, state: &TransportState<M>) -> TransportState<M> {
        map_active(state, |active| {
            let position = active.seek_position.position_ms(self.clock.as_ref());
            let index = active.queue.queue_index();
            let target = if position < SKIP_TO_PREVIOUS_RESTART_THRESHOLD_MS && index > 0 {
                index - 1
            } else {
                index
            };

            ActiveState {
                status: PlaybackStatus::Playing,
                seek_position: SeekPosition::ZERO,
                queue: active
                    .queue
                    .with_queue_index(target)
                    .unwrap_or_else(|_| active.queue.clone()),
                ..active.clone()
            }
        })
    }

    /// At the last item without repeat-all, playback stops at the end of it.
    pub fn skip_to_next<M: MediaObject>(&self, state: &TransportState<M>) -> TransportState<M> {
        map_active(state, |active| {
            let index = active.queue.queue_index();
            let len = active.queue.len();

            if active.repeat_mode == RepeatMode::All {
                return ActiveState {
                    status: PlaybackStatus::Playing,
                    seek_position: SeekPosition::ZERO,
                    queue: active
                        .queue
                        .with_queue_index((index + 1) % len)
                        .unwrap_or_else(|_| active.queue.clone()),
                    ..active.clone()
                };
            }

            if index + 1 >= len {
                return ActiveState {
                    status: PlaybackStatus::Paused {
                        reached_end_of_queue: true,
                    },
                    seek_position: SeekPosition::End,
                    ..active.clone()
                };
            }

            ActiveState {
                status: PlaybackStatus::Playing,
                seek_position: SeekPosition::ZERO,
                queue: active
                    .queue
                    .with_queue_index((index + 1).min(len - 1))
                    .unwrap_or_else(|_| active.queue.clone()),
                ..active.clone()
            }
        })
    }

    /// Jump to `index` in playback order. The seek position is kept.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::QueueIndexOutOfBounds`] when `index` is not
    /// inside the queue.
    pub fn skip_to_index<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        index: usize,
    ) -> Result<TransportState<M>> {
        match state {
            TransportState::Idle(_) => Ok(state.clone()),
            TransportState::Active(active) => Ok(TransportState::Active(ActiveState {
                status: PlaybackStatus::Playing,
                queue: active.queue.with_queue_index(index)?,
                ..active.clone()
            })),
        }
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    /// Enabling keeps the now-playing item first and shuffles the rest.
    /// Disabling restores the remembered linear order.
    pub fn set_shuffle_mode<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        shuffle_mode: ShuffleMode,
    ) -> TransportState<M> {
        match state {
            TransportState::Idle(idle) => {
                let mut idle = *idle;
                idle.shuffle_mode = shuffle_mode;
                TransportState::Idle(idle)
            }
            TransportState::Active(active) => {
                let queue = match (&active.queue, shuffle_mode) {
                    (QueueState::Linear(linear), ShuffleMode::Enabled) => {
                        self.to_shuffled_queue(linear)
                    }
                    (QueueState::Shuffled(shuffled), ShuffleMode::Disabled) => {
                        QueueState::Linear(to_linear_queue(shuffled))
                    }
                    _ => return state.clone(),
                };
                TransportState::Active(ActiveState {
                    queue,
                    ..active.clone()
                })
            }
        }
    }

    pub fn set_repeat_mode<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        repeat_mode: RepeatMode,
    ) -> TransportState<M> {
        match state {
            TransportState::Idle(idle) => {
                let mut idle = *idle;
                idle.repeat_mode = repeat_mode;
                TransportState::Idle(idle)
            }
            TransportState::Active(active) => TransportState::Active(ActiveState {
                repeat_mode,
                ..active.clone()
            }),
        }
    }

    pub fn set_playback_speed<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        playback_speed: PlaybackSpeed,
    ) -> TransportState<M> {
        match state {
            TransportState::Idle(idle) => {
                let mut idle = *idle;
                idle.playback_speed = playback_speed;
                TransportState::Idle(idle)
            }
            TransportState::Active(active) => TransportState::Active(ActiveState {
                playback_speed,
                ..active.clone()
            }),
        }
    }

    // ------------------------------------------------------------------
    // New queues
    // ------------------------------------------------------------------

    /// Start a new queue from search results followed by their continuation.
    ///
    /// Empty `search_results` leave `state` unchanged. With shuffle enabled
    /// the first result plays first, the remaining results are shuffled and
    /// the shuffled continuation follows them.
    pub fn play_from_search_results<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        results: SearchResults<M>,
        begin_playback: bool,
    ) -> TransportState<M> {
        if results.is_empty() {
            return state.clone();
        }

        let SearchResults {
            search_results,
            playback_continuation,
        } = results;
        let matches = to_queue_items(search_results);
        let continuation = to_queue_items(playback_continuation);

        let mut linear = Vec::with_capacity(matches.len() + continuation.len());
        linear.extend(matches.iter().cloned());
        linear.extend(continuation.iter().cloned());

        let queue = if state.shuffle_mode().is_enabled() {
            let mut shuffled = self.shuffle_pinned(&matches, 0);
            let mut rest = continuation;
            rest.shuffle(&mut *self.rng.lock());
            shuffled.extend(rest);
            QueueState::Shuffled(ShuffledQueue::new_unchecked(shuffled, 0, linear))
        } else {
            QueueState::Linear(LinearQueue::new_unchecked(linear, 0))
        };

        TransportState::Active(ActiveState {
            status: if begin_playback {
                PlaybackStatus::Playing
            } else {
                PlaybackStatus::paused()
            },
            seek_position: SeekPosition::ZERO,
            queue,
            repeat_mode: state.repeat_mode(),
            playback_speed: state.playback_speed(),
        })
    }

    /// Start playing `media_items` at the item whose id is `media_item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::MediaItemNotFound`] when no item carries
    /// `media_item_id`.
    pub fn play_from_media_browser<M: MediaObject>(
        &self,
        state: &TransportState<M>,
        media_items: Vec<M>,
        media_item_id: &str,
    ) -> Result<TransportState<M>> {
        let index = media_items
            .iter()
            .position(|item| item.id() == media_item_id)
            .ok_or_else(|| PlaybackError::MediaItemNotFound(media_item_id.to_string()))?;

        let linear = to_queue_items(media_items);
        let queue = if state.shuffle_mode().is_enabled() {
            let shuffled = self.shuffle_pinned(&linear, index);
            QueueState::Shuffled(ShuffledQueue::new_unchecked(shuffled, 0, linear))
        } else {
            QueueState::Linear(LinearQueue::new_unchecked(linear, index))
        };

        Ok(TransportState::Active(ActiveState {
            status: PlaybackStatus::Playing,
            seek_position: SeekPosition::ZERO,
            queue,
            repeat_mode: state.repeat_mode(),
            playback_speed: state.playback_speed(),
        }))
    }

    // ------------------------------------------------------------------
    // Shuffling
    // ------------------------------------------------------------------

    /// Shuffle `linear`, keeping its now-playing item in front.
    pub fn to_shuffled_queue<M: MediaObject>(&self, linear: &LinearQueue<M>) -> QueueState<M> {
        let shuffled = self.shuffle_pinned(linear.queue(), linear.queue_index());
        QueueState::Shuffled(ShuffledQueue::new_unchecked(
            shuffled,
            0,
            linear.queue().to_vec(),
        ))
    }

    /// `items[pinned]` first, the others in random order.
    fn shuffle_pinned<M: Clone>(&self, items: &[QueueItem<M>], pinned: usize) -> Vec<QueueItem<M>> {
        let mut rest: Vec<QueueItem<M>> = items
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != pinned)
            .map(|(_, item)| item.clone())
            .collect();
        rest.shuffle(&mut *self.rng.lock());

        let mut shuffled = Vec::with_capacity(items.len());
        if let Some(first) = items.get(pinned) {
            shuffled.push(first.clone());
        }
        shuffled.extend(rest);
        shuffled
    }
}

/// Restore the linear order, keeping the now-playing item.
pub fn to_linear_queue<M: MediaObject>(shuffled: &ShuffledQueue<M>) -> LinearQueue<M> {
    let now_playing = shuffled.now_playing().queue_id;
    let index = shuffled
        .linear_queue()
        .iter()
        .position(|item| item.queue_id == now_playing)
        .unwrap_or(0);
    LinearQueue::new_unchecked(shuffled.linear_queue().to_vec(), index)
}

fn map_active<M: MediaObject>(
    state: &TransportState<M>,
    f: impl FnOnce(&ActiveState<M>) -> ActiveState<M>,
) -> TransportState<M> {
    match state {
        TransportState::Idle(_) => state.clone(),
        TransportState::Active(active) => TransportState::Active(f(active)),
    }
}
