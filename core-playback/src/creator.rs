//! # Playback State Creator
//!
//! Rebuilds the player state from what the engine reports.
//!
//! The engine knows positions, flags and the current playlist entry. The
//! [`MediaQueue`](crate::queue_sync::MediaQueue) knows which queue that
//! playlist mirrors. Together they give back a full [`MediaPlayerState`].
//!
//! While the engine is actually rendering, the seek position is a
//! [`ComputedSeekPosition`] that extrapolates from the clock; otherwise it is
//! the exact sampled value.

use crate::model::{
    ActiveState, Artwork, BufferingState, ComputedSeekPosition, IdleState, MediaPlayerState,
    PlaybackSpeed, PlaybackStatus, PreparedState, QueueState, SeekPosition,
};
use bridge_traits::engine::{EnginePhase, MediaEngine};
use bridge_traits::media::MediaObject;
use bridge_traits::time::Clock;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub struct PlaybackStateCreator {
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for PlaybackStateCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackStateCreator").finish_non_exhaustive()
    }
}

impl PlaybackStateCreator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Sample `engine` against the queue it was last given.
    ///
    /// `idle` supplies what the engine cannot know while nothing is loaded
    /// (the requested shuffle mode).
    pub fn create<M: MediaObject>(
        &self,
        engine: &dyn MediaEngine,
        queue: Option<&QueueState<M>>,
        idle: &IdleState,
    ) -> MediaPlayerState<M> {
        let playback_speed =
            PlaybackSpeed::new(engine.playback_speed()).unwrap_or(idle.playback_speed);
        let repeat_mode = engine.repeat_mode().into();

        let (queue, engine_index) = match (queue, engine.current_index()) {
            (Some(queue), Some(index)) => (queue, index),
            _ => {
                return MediaPlayerState::Ready(IdleState {
                    repeat_mode,
                    shuffle_mode: idle.shuffle_mode,
                    playback_speed,
                })
            }
        };

        let queue = match queue.with_queue_index(engine_index) {
            Ok(queue) => queue,
            Err(err) => {
                warn!(error = %err, "Engine index does not match the applied queue");
                queue.clone()
            }
        };

        let phase = engine.phase();
        let play_when_ready = engine.play_when_ready();
        let position_ms = engine.current_position_ms();
        let duration_ms = engine.duration_ms();

        let buffering = match phase {
            EnginePhase::Buffering => BufferingState::Buffering {
                paused_for_buffering: play_when_ready,
                buffered_amount_ms: engine.buffered_position_ms().saturating_sub(position_ms),
            },
            _ => BufferingState::Buffered,
        };

        let (status, seek_position) = match phase {
            EnginePhase::Ended => (
                PlaybackStatus::Paused {
                    reached_end_of_queue: true,
                },
                SeekPosition::End,
            ),
            EnginePhase::Ready if play_when_ready => (
                PlaybackStatus::Playing,
                SeekPosition::Computed(ComputedSeekPosition::new(
                    position_ms,
                    duration_ms,
                    self.clock.unix_timestamp_millis(),
                    playback_speed.get(),
                )),
            ),
            _ => (
                if play_when_ready {
                    PlaybackStatus::Playing
                } else {
                    PlaybackStatus::paused()
                },
                SeekPosition::absolute(position_ms),
            ),
        };

        MediaPlayerState::Prepared(PreparedState {
            transport: ActiveState {
                status,
                seek_position,
                queue,
                repeat_mode,
                playback_speed,
            },
            artwork: engine.current_artwork().map(Artwork::from),
            duration_ms,
            buffering,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearQueue, RepeatMode, ShuffleMode};
    use crate::testing::{queue_items, InMemoryEngine, ManualClock, TestTrack};
    use bridge_traits::engine::{EngineRepeatMode, EngineSource};
    use bytes::Bytes;

    fn setup(index: usize) -> (InMemoryEngine, QueueState<TestTrack>, Arc<ManualClock>) {
        let items = queue_items(&["a", "b", "c"]);
        let mut engine = InMemoryEngine::new();
        let sources: Vec<EngineSource> =
            items.iter().map(crate::queue_sync::engine_source).collect();
        engine.set_sources(sources, index, 0).unwrap();
        engine.prepare().unwrap();
        let queue = QueueState::Linear(LinearQueue::new(items, 0).unwrap());
        (engine, queue, Arc::new(ManualClock::new(50_000)))
    }

    fn prepared(state: MediaPlayerState<TestTrack>) -> PreparedState<TestTrack> {
        match state {
            MediaPlayerState::Prepared(prepared) => prepared,
            other => panic!("expected prepared state, got {:?}", other),
        }
    }

    #[test]
    fn test_no_queue_yields_ready() {
        let engine = InMemoryEngine::new();
        let creator = PlaybackStateCreator::new(Arc::new(ManualClock::new(0)));
        let idle = IdleState {
            shuffle_mode: ShuffleMode::Enabled,
            ..IdleState::default()
        };

        let state: MediaPlayerState<TestTrack> = creator.create(&engine, None, &idle);
        assert_eq!(state, MediaPlayerState::Ready(idle));
    }

    #[test]
    fn test_paused_engine_gives_absolute_position() {
        let (engine, queue, clock) = setup(1);
        engine.set_position_ms(1_234);
        let creator = PlaybackStateCreator::new(clock);

        let state = prepared(creator.create(&engine, Some(&queue), &IdleState::default()));
        assert_eq!(state.transport.status, PlaybackStatus::paused());
        assert_eq!(state.transport.seek_position, SeekPosition::absolute(1_234));
        assert_eq!(state.transport.queue.queue_index(), 1);
        assert_eq!(state.buffering, BufferingState::Buffered);
    }

    #[test]
    fn test_playing_engine_gives_computed_position() {
        let (mut engine, queue, clock) = setup(0);
        engine.set_play_when_ready(true).unwrap();
        engine.set_position_ms(2_000);
        engine.set_duration_ms(Some(180_000));
        let creator = PlaybackStateCreator::new(clock.clone());

        let state = prepared(creator.create(&engine, Some(&queue), &IdleState::default()));
        assert_eq!(state.transport.status, PlaybackStatus::Playing);
        assert!(matches!(state.transport.seek_position, SeekPosition::Computed(_)));

        clock.advance(1_000);
        assert_eq!(state.transport.seek_position.position_ms(clock.as_ref()), 3_000);
        assert_eq!(state.duration_ms, Some(180_000));
    }

    #[test]
    fn test_buffering_pause_freezes_position() {
        let (mut engine, queue, clock) = setup(0);
        engine.set_play_when_ready(true).unwrap();
        engine.set_position_ms(5_000);
        engine.set_buffered_position_ms(7_500);
        engine.set_phase(EnginePhase::Buffering);
        let creator = PlaybackStateCreator::new(clock);

        let state = prepared(creator.create(&engine, Some(&queue), &IdleState::default()));
        assert_eq!(state.transport.seek_position, SeekPosition::absolute(5_000));
        assert_eq!(
            state.buffering,
            BufferingState::Buffering {
                paused_for_buffering: true,
                buffered_amount_ms: 2_500
            }
        );
    }

    #[test]
    fn test_ended_engine_reports_end_of_queue() {
        let (mut engine, queue, clock) = setup(2);
        engine.set_repeat_mode(EngineRepeatMode::Off).unwrap();
        engine.set_phase(EnginePhase::Ended);
        engine.set_artwork(Some(Bytes::from_static(b"png")));
        let creator = PlaybackStateCreator::new(clock);

        let state = prepared(creator.create(&engine, Some(&queue), &IdleState::default()));
        assert!(state.transport.status.reached_end_of_queue());
        assert_eq!(state.transport.seek_position, SeekPosition::End);
        assert_eq!(state.transport.repeat_mode, RepeatMode::None);
        assert_eq!(state.artwork, Some(Artwork::new(Bytes::from_static(b"png"))));
    }
}
