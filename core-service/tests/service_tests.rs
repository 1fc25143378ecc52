//! End-to-end tests of the service layer.
//!
//! A `PlaybackService` drives a player over an `InMemoryEngine`; its messages
//! are framed exactly as on the wire and fed into a `ControllerStateCache`.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::media::{MediaProvider, SearchArguments, SearchResults};
use bridge_traits::time::Clock;
use core_playback::error::PlaybackError;
use core_playback::model::{
    ActiveState, BufferingState, ComputedSeekPosition, LinearQueue, MediaPlayerState, PlaybackSpeed,
    PlaybackStatus, PreparedState, QueueState, RepeatMode, SeekPosition, ShuffleMode,
};
use core_playback::testing::{queue_items, InMemoryEngine, ManualClock, TestTrack};
use core_playback::MediaPlayer;
use core_runtime::config::EncoreConfig;
use core_service::protocol::{
    encode_frames, encode_message, ClientCommand, MessageChunk, ServiceMessage,
};
use core_service::{ControllerStateCache, PlaybackService, SeekUpdateFrequency, ServiceError};
use futures::StreamExt;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

mock! {
    pub Provider {}

    #[async_trait]
    impl MediaProvider<TestTrack> for Provider {
        async fn get_media_item_by_id(&self, id: &str) -> BridgeResult<Option<TestTrack>>;
        async fn get_media_items_by_ids(&self, ids: &[String]) -> BridgeResult<Vec<TestTrack>>;
        async fn search_for_media_items(
            &self,
            query: &str,
            arguments: &SearchArguments,
        ) -> BridgeResult<SearchResults<TestTrack>>;
    }
}

const CHUNK_BYTES: usize = 256;

struct Harness {
    service: PlaybackService<TestTrack>,
    engine: InMemoryEngine,
    cache: ControllerStateCache<TestTrack>,
    messages: broadcast::Receiver<ServiceMessage<TestTrack>>,
}

impl Harness {
    async fn start(provider: MockProvider) -> Self {
        let config = EncoreConfig::builder()
            .clock(Arc::new(ManualClock::new(1_000_000)))
            .shuffle_seed(3)
            .max_message_bytes(CHUNK_BYTES)
            .build()
            .unwrap();

        let engine = InMemoryEngine::new();
        let player = MediaPlayer::builder(engine.clone()).config(&config).build();
        let service = PlaybackService::new(player, Arc::new(provider), &config);
        let subscription = service.subscribe();
        service.player().initialize().await.unwrap();

        let mut harness = Self {
            service,
            engine,
            cache: ControllerStateCache::from_config(&config),
            messages: subscription.receiver,
        };
        harness.pump();
        harness
    }

    /// Deliver every pending service message to the cache, frame by frame.
    fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(message) = self.messages.try_recv() {
            let frames = encode_frames(&message, CHUNK_BYTES).unwrap();
            let mut complete = false;
            for frame in &frames {
                complete = self.cache.apply_payload(frame).unwrap();
            }
            assert!(complete, "last frame completes the message");
            delivered += 1;
        }
        delivered
    }

    async fn send(&self, command: ClientCommand<TestTrack>) -> Result<(), ServiceError> {
        let frames = encode_frames(&command, CHUNK_BYTES).unwrap();
        let mut handled = false;
        for frame in &frames {
            handled = self.service.handle_payload(frame).await?;
        }
        assert!(handled);
        Ok(())
    }

    fn latest_broadcast(&self) -> Option<MediaPlayerState<TestTrack>> {
        self.service.subscribe().snapshot
    }
}

fn browse_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_get_media_items_by_ids()
        .returning(|ids| Ok(ids.iter().map(|id| TestTrack::new(id)).collect()));
    provider
}

fn browse(ids: &[&str], start: &str) -> ClientCommand<TestTrack> {
    ClientCommand::PlayFromMediaBrowser {
        media_item_ids: ids.iter().map(|id| id.to_string()).collect(),
        media_item_id: start.to_string(),
    }
}

// ============================================================================
// Command routing and state sync
// ============================================================================

#[tokio::test]
async fn test_controller_tracks_service_state() {
    let mut harness = Harness::start(browse_provider()).await;
    assert!(matches!(harness.cache.state(), Some(MediaPlayerState::Ready(_))));

    harness.send(browse(&["a", "b", "c", "d"], "b")).await.unwrap();
    assert!(harness.pump() >= 1);
    assert_eq!(harness.engine.playlist_tags().len(), 4);

    let commands = vec![
        ClientCommand::Pause,
        ClientCommand::SeekTo { position_ms: 12_000 },
        ClientCommand::SetShuffleMode {
            shuffle_mode: ShuffleMode::Enabled,
        },
        ClientCommand::SkipToNext,
        ClientCommand::SetRepeatMode {
            repeat_mode: RepeatMode::All,
        },
        ClientCommand::SetPlaybackSpeed {
            playback_speed: PlaybackSpeed::new(1.5).unwrap(),
        },
        ClientCommand::SetShuffleMode {
            shuffle_mode: ShuffleMode::Disabled,
        },
        ClientCommand::SkipToIndex { index: 3 },
        ClientCommand::Play,
    ];

    for command in commands {
        harness.send(command).await.unwrap();
        harness.pump();
        assert_eq!(harness.cache.state(), harness.latest_broadcast());
    }

    let prepared = harness.cache.state().unwrap();
    let prepared = prepared.as_prepared().unwrap();
    assert_eq!(prepared.transport.queue.queue_index(), 3);
    assert_eq!(prepared.transport.repeat_mode, RepeatMode::All);
    assert!(prepared.transport.status.is_playing());
}

#[tokio::test]
async fn test_resent_command_is_harmless() {
    let mut harness = Harness::start(browse_provider()).await;
    harness.send(browse(&["a", "b"], "a")).await.unwrap();
    harness.pump();

    harness.send(ClientCommand::Play).await.unwrap();
    harness.pump();
    let before = harness.cache.state();

    harness.send(ClientCommand::Play).await.unwrap();
    assert_eq!(harness.pump(), 0);
    assert_eq!(harness.cache.state(), before);
}

#[tokio::test]
async fn test_unknown_browse_item_is_rejected() {
    let mut harness = Harness::start(browse_provider()).await;

    let result = harness.send(browse(&["a", "b"], "zzz")).await;
    assert!(matches!(
        result,
        Err(ServiceError::Playback(PlaybackError::MediaItemNotFound(_)))
    ));
    assert_eq!(harness.pump(), 0);
    assert!(matches!(harness.cache.state(), Some(MediaPlayerState::Ready(_))));
}

#[tokio::test]
async fn test_empty_search_is_a_no_op() {
    let mut provider = MockProvider::new();
    provider
        .expect_search_for_media_items()
        .times(1)
        .returning(|_, _| Ok(SearchResults::new(Vec::new(), vec![TestTrack::new("x")])));
    let mut harness = Harness::start(provider).await;

    harness
        .send(ClientCommand::PlayFromSearch {
            query: "nothing".to_string(),
            arguments: SearchArguments::new(),
        })
        .await
        .unwrap();
    assert_eq!(harness.pump(), 0);
    assert!(harness.engine.playlist_tags().is_empty());
}

#[tokio::test]
async fn test_search_queues_results_then_continuation() {
    let mut provider = MockProvider::new();
    provider
        .expect_search_for_media_items()
        .withf(|query, _| query == "album")
        .returning(|_, _| {
            Ok(SearchResults::new(
                vec![TestTrack::new("hit")],
                vec![TestTrack::new("next-1"), TestTrack::new("next-2")],
            ))
        });
    let mut harness = Harness::start(provider).await;

    harness
        .send(ClientCommand::PlayFromSearch {
            query: "album".to_string(),
            arguments: SearchArguments::new(),
        })
        .await
        .unwrap();
    harness.pump();

    let state = harness.cache.state().unwrap();
    let queue = &state.as_prepared().unwrap().transport.queue;
    let ids: Vec<&str> = queue.queue().iter().map(|item| item.media_item.id.as_str()).collect();
    assert_eq!(ids, vec!["hit", "next-1", "next-2"]);
    assert_eq!(queue.queue_index(), 0);
}

#[tokio::test]
async fn test_commands_before_initialization_fail() {
    let config = EncoreConfig::default();
    let player = MediaPlayer::builder(InMemoryEngine::new()).config(&config).build();
    let service = PlaybackService::new(player, Arc::new(MockProvider::new()), &config);

    let result = service.handle_command(ClientCommand::Play).await;
    assert!(matches!(
        result,
        Err(ServiceError::Playback(PlaybackError::NotInitialized))
    ));
}

#[tokio::test]
async fn test_release_reaches_controller() {
    let mut harness = Harness::start(browse_provider()).await;
    harness.send(browse(&["a"], "a")).await.unwrap();
    harness.pump();
    assert!(harness.cache.state().is_some());

    harness.service.release();
    harness.pump();
    assert!(harness.cache.state().is_none());
    assert!(harness.engine.is_released());

    let result = harness.send(ClientCommand::Play).await;
    assert!(matches!(result, Err(ServiceError::Released)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_skips_are_all_applied() {
    let mut harness = Harness::start(browse_provider()).await;
    harness
        .send(browse(&["a", "b", "c", "d", "e", "f", "g", "h"], "a"))
        .await
        .unwrap();
    harness.pump();

    let service = Arc::new(harness.service);
    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.handle_command(ClientCommand::SkipToNext).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let state = service.player().state().unwrap();
    assert_eq!(state.as_prepared().unwrap().transport.queue.queue_index(), 6);
}

#[tokio::test]
async fn test_bogus_chunk_header_is_rejected() {
    let mut harness = Harness::start(browse_provider()).await;
    let bogus = MessageChunk {
        message_id: Uuid::new_v4(),
        index: 0,
        total: u32::MAX,
        payload: bytes::Bytes::from_static(b"{"),
    };
    let frame = encode_message(&bogus).unwrap();

    let result = harness.service.handle_payload(&frame).await;
    assert!(matches!(result, Err(ServiceError::ChunkMismatch(_))));
    assert!(matches!(harness.cache.apply_payload(&frame), Err(ServiceError::ChunkMismatch(_))));

    // Both ends keep working
    harness.send(browse(&["a"], "a")).await.unwrap();
    assert!(harness.pump() >= 1);
    assert!(matches!(harness.cache.state(), Some(MediaPlayerState::Prepared(_))));
}

// ============================================================================
// State streams
// ============================================================================

fn playing_state(
    clock: &ManualClock,
    position_ms: u64,
    duration_ms: u64,
) -> MediaPlayerState<TestTrack> {
    MediaPlayerState::Prepared(PreparedState {
        transport: ActiveState {
            status: PlaybackStatus::Playing,
            seek_position: SeekPosition::Computed(ComputedSeekPosition::new(
                position_ms,
                Some(duration_ms),
                clock.unix_timestamp_millis(),
                1.0,
            )),
            queue: QueueState::Linear(LinearQueue::new(queue_items(&["a", "b"]), 0).unwrap()),
            repeat_mode: RepeatMode::None,
            playback_speed: PlaybackSpeed::NORMAL,
        },
        artwork: None,
        duration_ms: Some(duration_ms),
        buffering: BufferingState::Buffered,
    })
}

#[tokio::test]
async fn test_observe_state_never_emits_only_on_change() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = ControllerStateCache::new(clock.clone());
    cache
        .apply_message(ServiceMessage::State {
            state: playing_state(&clock, 0, 60_000),
        })
        .unwrap();

    let mut stream = Box::pin(cache.observe_state(SeekUpdateFrequency::Never));
    assert!(stream.next().await.is_some());
    assert!(tokio::time::timeout(Duration::from_millis(50), stream.next())
        .await
        .is_err());

    cache
        .apply_message(ServiceMessage::State {
            state: playing_state(&clock, 5_000, 60_000),
        })
        .unwrap();
    let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next, playing_state(&clock, 5_000, 60_000));
}

#[tokio::test]
async fn test_observe_state_ticks_while_playing() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = ControllerStateCache::new(clock.clone());
    cache
        .apply_message(ServiceMessage::State {
            state: playing_state(&clock, 0, 60_000),
        })
        .unwrap();

    let stream =
        cache.observe_state(SeekUpdateFrequency::WhilePlayingEvery(Duration::from_millis(10)));
    let emitted = tokio::time::timeout(Duration::from_secs(2), stream.take(3).collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(emitted.len(), 3);
}

#[tokio::test]
async fn test_observe_state_stops_ticking_at_duration() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = ControllerStateCache::new(clock.clone());
    cache
        .apply_message(ServiceMessage::State {
            state: playing_state(&clock, 0, 1_000),
        })
        .unwrap();
    clock.advance(5_000);

    let mut stream = Box::pin(cache.observe_state(SeekUpdateFrequency::WhilePlayingEvery(
        Duration::from_millis(10),
    )));
    assert!(stream.next().await.is_some());
    assert!(tokio::time::timeout(Duration::from_millis(100), stream.next())
        .await
        .is_err());
}

#[tokio::test]
async fn test_observe_state_ends_with_cache() {
    let clock = Arc::new(ManualClock::new(0));
    let cache: ControllerStateCache<TestTrack> = ControllerStateCache::new(clock);
    let mut stream = Box::pin(cache.observe_state(SeekUpdateFrequency::Never));

    drop(cache);
    let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap();
    assert!(next.is_none());
}
