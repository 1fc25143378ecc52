//! # Media Player Core
//!
//! Owns the wrapped engine and exposes the player as a transport-state
//! machine.
//!
//! ## Lifecycle
//!
//! ```text
//! Initializing ──initialize()──> Initialized ──release()──> Released
//! ```
//!
//! - [`MediaPlayer::state`] returns `Initializing` until [`MediaPlayer::initialize`]
//!   has run the extension chain; afterwards it samples the engine.
//! - [`MediaPlayer::set_state`] fails with [`PlaybackError::NotInitialized`]
//!   before initialization and with [`PlaybackError::Released`] after release.
//!
//! ## Applying a target
//!
//! `set_state` compares the sampled state with the target and plans a list of
//! [`PlaybackStateDiff`] engine operations. While they run, engine events are
//! suppressed. Afterwards the engine is sampled again and observers are
//! notified once, and only if the result differs from the last dispatched
//! state.
//!
//! ## Locking
//!
//! Every engine read and write happens under one state lock. Observers and
//! extensions are called after the lock is dropped, so they may read the
//! player. An engine that reports events synchronously from inside an engine
//! call is suppressed before the lock is touched.
//!
//! Each state taken under the lock gets a sequence number. Delivery keeps
//! the highest number seen, so a state that loses the race to a newer one is
//! dropped instead of reaching observers after it.

use crate::creator::PlaybackStateCreator;
use crate::error::{PlaybackError, Result};
use crate::extension::{ExtensionChain, PlaybackExtension};
use crate::model::{
    IdleState, MediaPlayerState, PlaybackSpeed, PlaybackStatus, QueueState, RepeatMode,
    SeekPosition, TransportState,
};
use crate::queue_sync::MediaQueue;
use bridge_traits::engine::MediaEngine;
use bridge_traits::media::MediaObject;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::EncoreConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, PlaybackStatusSummary};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Observers
// ============================================================================

/// Receives every confirmed, de-duplicated state change.
pub trait StateObserver<M>: Send + Sync {
    fn on_state_changed(&self, state: &MediaPlayerState<M>);

    fn on_release(&self) {}
}

/// Registration of a [`StateObserver`]. Dropping it unregisters the observer.
#[must_use = "dropping the handle unregisters the observer"]
pub struct ObserverHandle<M: MediaObject> {
    shared: Weak<PlayerShared<M>>,
    id: u64,
}

impl<M: MediaObject> ObserverHandle<M> {
    /// Unregister now.
    pub fn detach(self) {}
}

impl<M: MediaObject> Drop for ObserverHandle<M> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.observers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl<M: MediaObject> fmt::Debug for ObserverHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle").field("id", &self.id).finish()
    }
}

// ============================================================================
// Engine operations
// ============================================================================

/// One engine-level step of a `set_state` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStateDiff<M> {
    /// Bring the engine playlist to `queue`. Seamless modifications keep the
    /// now-playing source loaded; the others reload and re-prepare.
    QueueModification { queue: QueueState<M>, seamless: bool },
    TimelinePositionChange {
        queue_index: usize,
        position: SeekPosition,
    },
    SetRepeatMode(RepeatMode),
    SetPlaybackSpeed(PlaybackSpeed),
    SetPlaying(bool),
    StopPlayback,
}

/// Plan the engine operations that take `current` to `target`.
///
/// Operations are ordered: queue, position, repeat mode, speed, play flag,
/// stop.
pub fn plan_engine_operations<M: MediaObject>(
    current: &MediaPlayerState<M>,
    play_when_ready: bool,
    target: &TransportState<M>,
) -> Vec<PlaybackStateDiff<M>> {
    let mut operations = Vec::new();
    let current_transport = current.transport_state();
    let current_active = current.as_prepared().map(|prepared| &prepared.transport);

    let push_modes = |operations: &mut Vec<PlaybackStateDiff<M>>| {
        let current_repeat = current_transport.as_ref().map(TransportState::repeat_mode);
        if current_repeat != Some(target.repeat_mode()) {
            operations.push(PlaybackStateDiff::SetRepeatMode(target.repeat_mode()));
        }
        let current_speed = current_transport.as_ref().map(TransportState::playback_speed);
        if current_speed != Some(target.playback_speed()) {
            operations.push(PlaybackStateDiff::SetPlaybackSpeed(target.playback_speed()));
        }
    };

    match target {
        TransportState::Active(target_active) => {
            let target_id = target_active.now_playing().queue_id;
            let same_now_playing =
                current_active.map_or(false, |active| active.now_playing().queue_id == target_id);
            let queue_changed = current_active
                .map_or(true, |active| !active.queue.same_items(&target_active.queue));
            let reload = queue_changed && !same_now_playing;

            if queue_changed {
                operations.push(PlaybackStateDiff::QueueModification {
                    queue: target_active.queue.clone(),
                    seamless: same_now_playing,
                });
            }

            let position_changed = reload
                || !same_now_playing
                || current_active
                    .map_or(true, |active| active.seek_position != target_active.seek_position);
            if position_changed {
                operations.push(PlaybackStateDiff::TimelinePositionChange {
                    queue_index: target_active.queue.queue_index(),
                    position: target_active.seek_position.clone(),
                });
            }

            push_modes(&mut operations);

            if target_active.status.is_playing() != play_when_ready {
                operations.push(PlaybackStateDiff::SetPlaying(target_active.status.is_playing()));
            }
        }
        TransportState::Idle(_) => {
            push_modes(&mut operations);
            if play_when_ready {
                operations.push(PlaybackStateDiff::SetPlaying(false));
            }
            if current_active.is_some() {
                operations.push(PlaybackStateDiff::StopPlayback);
            }
        }
    }

    operations
}

// ============================================================================
// Player
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Initializing,
    Initialized,
    Released,
}

struct PlayerInner<M> {
    engine: Box<dyn MediaEngine>,
    queue: MediaQueue<M>,
    lifecycle: Lifecycle,
    /// Settings to report while nothing is loaded.
    idle: IdleState,
    last_dispatched: Option<MediaPlayerState<M>>,
    /// Sequence number of `last_dispatched`.
    dispatch_seq: u64,
}

struct PlayerShared<M: MediaObject> {
    inner: Mutex<PlayerInner<M>>,
    extensions: ExtensionChain<M>,
    observers: Mutex<Vec<(u64, Arc<dyn StateObserver<M>>)>>,
    next_observer_id: AtomicU64,
    init_started: AtomicBool,
    dispatch_suppressed: AtomicBool,
    /// Highest sequence number handed to observers. Reentrant so observers
    /// may drive the player from inside a callback.
    delivered: ReentrantMutex<Cell<u64>>,
    creator: PlaybackStateCreator,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
}

impl<M: MediaObject> PlayerShared<M> {
    fn sample(&self, inner: &PlayerInner<M>) -> MediaPlayerState<M> {
        self.creator.create(&*inner.engine, inner.queue.current(), &inner.idle)
    }

    fn state(&self) -> Result<MediaPlayerState<M>> {
        let inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::Initializing => Ok(MediaPlayerState::Initializing),
            Lifecycle::Released => Err(PlaybackError::Released),
            Lifecycle::Initialized => Ok(self.sample(&inner)),
        }
    }

    fn set_state(&self, target: TransportState<M>) -> Result<()> {
        self.ensure_initialized()?;
        let target = self.extensions.intercept_transport_state(target);

        let (result, changed) = {
            let mut inner = self.inner.lock();
            self.ensure_lifecycle(inner.lifecycle)?;

            self.dispatch_suppressed.store(true, Ordering::SeqCst);
            let result = self.apply(&mut inner, &target);
            self.dispatch_suppressed.store(false, Ordering::SeqCst);

            (result, self.take_changed(&mut inner))
        };

        if let Some((seq, state)) = changed {
            self.dispatch(seq, &state);
        }
        result
    }

    fn ensure_initialized(&self) -> Result<()> {
        let lifecycle = self.inner.lock().lifecycle;
        self.ensure_lifecycle(lifecycle)
    }

    fn ensure_lifecycle(&self, lifecycle: Lifecycle) -> Result<()> {
        match lifecycle {
            Lifecycle::Initializing => Err(PlaybackError::NotInitialized),
            Lifecycle::Released => Err(PlaybackError::Released),
            Lifecycle::Initialized => Ok(()),
        }
    }

    fn apply(&self, inner: &mut PlayerInner<M>, target: &TransportState<M>) -> Result<()> {
        let current = self.sample(inner);
        let operations = plan_engine_operations(&current, inner.engine.play_when_ready(), target);
        debug!(operations = operations.len(), "Applying engine operations");

        inner.idle = IdleState {
            repeat_mode: target.repeat_mode(),
            shuffle_mode: target.shuffle_mode(),
            playback_speed: target.playback_speed(),
        };

        for operation in operations {
            self.apply_operation(inner, operation)?;
        }
        Ok(())
    }

    fn apply_operation(
        &self,
        inner: &mut PlayerInner<M>,
        operation: PlaybackStateDiff<M>,
    ) -> Result<()> {
        let PlayerInner { engine, queue, .. } = inner;
        let engine: &mut dyn MediaEngine = &mut **engine;

        match operation {
            PlaybackStateDiff::QueueModification { queue: target, seamless: true } => {
                queue.update_queue(engine, Some(target))?
            }
            PlaybackStateDiff::QueueModification { queue: target, seamless: false } => {
                queue.replace_queue(engine, target, 0)?
            }
            PlaybackStateDiff::TimelinePositionChange {
                queue_index,
                position: SeekPosition::End,
            } => engine.seek_to_end(queue_index)?,
            PlaybackStateDiff::TimelinePositionChange { queue_index, position } => {
                engine.seek_to(queue_index, position.position_ms(self.clock.as_ref()))?
            }
            PlaybackStateDiff::SetRepeatMode(mode) => engine.set_repeat_mode(mode.into())?,
            PlaybackStateDiff::SetPlaybackSpeed(speed) => engine.set_playback_speed(speed.get())?,
            PlaybackStateDiff::SetPlaying(playing) => engine.set_play_when_ready(playing)?,
            PlaybackStateDiff::StopPlayback => {
                engine.stop()?;
                queue.clear(engine)?;
            }
        }
        Ok(())
    }

    /// Sample and remember the state if it differs from the last dispatched
    /// one, numbering it for delivery.
    fn take_changed(&self, inner: &mut PlayerInner<M>) -> Option<(u64, MediaPlayerState<M>)> {
        let state = self.sample(inner);
        if inner.last_dispatched.as_ref() == Some(&state) {
            return None;
        }
        inner.last_dispatched = Some(state.clone());
        inner.dispatch_seq += 1;
        Some((inner.dispatch_seq, state))
    }

    /// Deliver state number `seq` unless a newer one already went out.
    fn dispatch(&self, seq: u64, state: &MediaPlayerState<M>) {
        let delivered = self.delivered.lock();
        if seq <= delivered.get() {
            debug!(seq, delivered = delivered.get(), "Dropping superseded state");
            return;
        }
        delivered.set(seq);

        self.extensions.state_changed(state);

        let observers: Vec<Arc<dyn StateObserver<M>>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            // An observer drove the player and a newer state went out
            if delivered.get() != seq {
                return;
            }
            observer.on_state_changed(state);
        }
        if delivered.get() != seq {
            return;
        }

        self.emit(PlaybackEvent::StateChanged {
            status: status_summary(state),
            now_playing_id: state
                .as_prepared()
                .map(|prepared| prepared.transport.now_playing().media_item.id().to_string()),
            queue_length: state
                .as_prepared()
                .map_or(0, |prepared| prepared.transport.queue.len()),
            position_ms: state.as_prepared().map_or(0, |prepared| {
                match &prepared.transport.seek_position {
                    SeekPosition::End => prepared.duration_ms.unwrap_or(0),
                    seek => seek.position_ms(self.clock.as_ref()),
                }
            }),
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            if events.emit(CoreEvent::Playback(event)).is_err() {
                debug!("No event subscribers");
            }
        }
    }
}

impl<M: MediaObject> Drop for PlayerShared<M> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.lifecycle != Lifecycle::Released {
            inner.engine.release();
        }
    }
}

fn status_summary<M: MediaObject>(state: &MediaPlayerState<M>) -> PlaybackStatusSummary {
    match state {
        MediaPlayerState::Initializing => PlaybackStatusSummary::Initializing,
        MediaPlayerState::Ready(_) => PlaybackStatusSummary::Idle,
        MediaPlayerState::Prepared(prepared) => match prepared.transport.status {
            PlaybackStatus::Playing => PlaybackStatusSummary::Playing,
            PlaybackStatus::Paused {
                reached_end_of_queue: true,
            } => PlaybackStatusSummary::EndOfQueue,
            PlaybackStatus::Paused { .. } => PlaybackStatusSummary::Paused,
        },
    }
}

/// The playback core. Clones share one engine.
pub struct MediaPlayer<M: MediaObject> {
    shared: Arc<PlayerShared<M>>,
}

impl<M: MediaObject> Clone for MediaPlayer<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: MediaObject> fmt::Debug for MediaPlayer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("extensions", &self.shared.extensions)
            .finish_non_exhaustive()
    }
}

impl<M: MediaObject> MediaPlayer<M> {
    pub fn builder(engine: impl MediaEngine + 'static) -> MediaPlayerBuilder<M> {
        MediaPlayerBuilder::new(engine)
    }

    /// Run the extension chain for the initial state and apply it.
    ///
    /// Later calls are no-ops.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        if self.shared.init_started.swap(true, Ordering::SeqCst) {
            debug!("Initialization already started");
            return Ok(());
        }

        let initial = self
            .shared
            .extensions
            .intercept_initialization_state(TransportState::default())
            .await;

        let (result, changed) = {
            let mut inner = self.shared.inner.lock();
            if inner.lifecycle == Lifecycle::Released {
                return Err(PlaybackError::Released);
            }
            inner.lifecycle = Lifecycle::Initialized;

            self.shared.dispatch_suppressed.store(true, Ordering::SeqCst);
            let result = self.shared.apply(&mut inner, &initial);
            self.shared.dispatch_suppressed.store(false, Ordering::SeqCst);

            (result, self.shared.take_changed(&mut inner))
        };

        info!(active = initial.is_active(), "Media player initialized");
        if let Err(err) = &result {
            warn!(error = %err, "Initial state could not be fully applied");
        }
        if let Some((seq, state)) = changed {
            self.shared.dispatch(seq, &state);
        }
        result
    }

    /// Current state sampled from the engine.
    pub fn state(&self) -> Result<MediaPlayerState<M>> {
        self.shared.state()
    }

    /// Drive the engine to `target`.
    #[instrument(skip(self, target), fields(active = target.is_active()))]
    pub fn set_state(&self, target: TransportState<M>) -> Result<()> {
        self.shared.set_state(target)
    }

    /// Called by the host whenever the engine reports a change.
    pub fn on_engine_event(&self) {
        if self.shared.dispatch_suppressed.load(Ordering::SeqCst) {
            return;
        }

        let changed = {
            let mut inner = self.shared.inner.lock();
            if inner.lifecycle != Lifecycle::Initialized {
                return;
            }
            self.shared.take_changed(&mut inner)
        };

        if let Some((seq, state)) = changed {
            self.shared.dispatch(seq, &state);
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn StateObserver<M>>) -> ObserverHandle<M> {
        let id = self.shared.next_observer_id.fetch_add(1, Ordering::SeqCst);
        self.shared.observers.lock().push((id, observer));
        ObserverHandle {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    pub fn is_released(&self) -> bool {
        self.shared.inner.lock().lifecycle == Lifecycle::Released
    }

    /// Release extensions, observers and the engine. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub fn release(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.lifecycle == Lifecycle::Released {
                return;
            }
            inner.lifecycle = Lifecycle::Released;
            inner.last_dispatched = None;
        }

        self.shared.extensions.release();

        let observers = std::mem::take(&mut *self.shared.observers.lock());
        for (_, observer) in observers {
            observer.on_release();
        }

        self.shared.inner.lock().engine.release();
        self.shared.emit(PlaybackEvent::Released);
        info!("Media player released");
    }

    /// Weak capability handed to extensions.
    pub fn handle(&self) -> PlayerHandle<M> {
        PlayerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

/// Narrow, non-owning access to a player.
pub struct PlayerHandle<M: MediaObject> {
    shared: Weak<PlayerShared<M>>,
}

impl<M: MediaObject> Clone for PlayerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<M: MediaObject> fmt::Debug for PlayerHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl<M: MediaObject> PlayerHandle<M> {
    fn upgrade(&self) -> Result<Arc<PlayerShared<M>>> {
        self.shared.upgrade().ok_or(PlaybackError::Released)
    }

    pub fn state(&self) -> Result<MediaPlayerState<M>> {
        self.upgrade()?.state()
    }

    pub fn set_state(&self, target: TransportState<M>) -> Result<()> {
        self.upgrade()?.set_state(target)
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct MediaPlayerBuilder<M: MediaObject> {
    engine: Box<dyn MediaEngine>,
    clock: Arc<dyn Clock>,
    extensions: Vec<Arc<dyn PlaybackExtension<M>>>,
    events: Option<EventBus>,
}

impl<M: MediaObject> MediaPlayerBuilder<M> {
    pub fn new(engine: impl MediaEngine + 'static) -> Self {
        Self {
            engine: Box::new(engine),
            clock: Arc::new(SystemClock),
            extensions: Vec::new(),
            events: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Take the clock from `config`.
    pub fn config(mut self, config: &EncoreConfig) -> Self {
        self.clock = Arc::clone(&config.clock);
        self
    }

    /// Register an extension. Registration order is invocation order.
    pub fn extension(mut self, extension: Arc<dyn PlaybackExtension<M>>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> MediaPlayer<M> {
        let player = MediaPlayer {
            shared: Arc::new(PlayerShared {
                inner: Mutex::new(PlayerInner {
                    engine: self.engine,
                    queue: MediaQueue::new(),
                    lifecycle: Lifecycle::Initializing,
                    idle: IdleState::default(),
                    last_dispatched: None,
                    dispatch_seq: 0,
                }),
                extensions: ExtensionChain::new(self.extensions),
                observers: Mutex::new(Vec::new()),
                next_observer_id: AtomicU64::new(0),
                init_started: AtomicBool::new(false),
                dispatch_suppressed: AtomicBool::new(false),
                delivered: ReentrantMutex::new(Cell::new(0)),
                creator: PlaybackStateCreator::new(Arc::clone(&self.clock)),
                clock: self.clock,
                events: self.events,
            }),
        };

        player.shared.extensions.attach(&player.handle());
        player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActiveState, BufferingState, LinearQueue, PreparedState, QueueItem};
    use crate::testing::{queue_items, InMemoryEngine, TestTrack};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<MediaPlayerState<TestTrack>>>,
    }

    impl StateObserver<TestTrack> for Recorder {
        fn on_state_changed(&self, state: &MediaPlayerState<TestTrack>) {
            self.seen.lock().push(state.clone());
        }
    }

    fn active(
        items: &[QueueItem<TestTrack>],
        index: usize,
        status: PlaybackStatus,
    ) -> ActiveState<TestTrack> {
        ActiveState {
            status,
            seek_position: SeekPosition::ZERO,
            queue: QueueState::Linear(LinearQueue::new(items.to_vec(), index).unwrap()),
            repeat_mode: RepeatMode::None,
            playback_speed: PlaybackSpeed::NORMAL,
        }
    }

    fn prepared(transport: ActiveState<TestTrack>) -> MediaPlayerState<TestTrack> {
        MediaPlayerState::Prepared(PreparedState {
            transport,
            artwork: None,
            duration_ms: None,
            buffering: BufferingState::Buffered,
        })
    }

    #[test]
    fn test_superseded_state_is_not_delivered() {
        let player: MediaPlayer<TestTrack> = MediaPlayer::builder(InMemoryEngine::new()).build();
        let recorder = Arc::new(Recorder::default());
        let _registration = player.add_observer(recorder.clone());

        let items = queue_items(&["a", "b"]);
        let older = prepared(active(&items, 0, PlaybackStatus::Playing));
        let newer = prepared(active(&items, 1, PlaybackStatus::Playing));

        // The thread holding the newer state got there first
        player.shared.dispatch(2, &newer);
        player.shared.dispatch(1, &older);
        player.shared.dispatch(2, &newer);

        assert_eq!(*recorder.seen.lock(), vec![newer]);
    }

    #[test]
    fn test_plan_from_ready_reloads() {
        let items = queue_items(&["a", "b"]);
        let target = TransportState::Active(active(&items, 1, PlaybackStatus::Playing));
        let current = MediaPlayerState::Ready(IdleState::default());

        let plan = plan_engine_operations(&current, false, &target);
        assert!(matches!(
            plan[0],
            PlaybackStateDiff::QueueModification { seamless: false, .. }
        ));
        assert_eq!(
            plan[1],
            PlaybackStateDiff::TimelinePositionChange {
                queue_index: 1,
                position: SeekPosition::ZERO
            }
        );
        assert_eq!(plan[2], PlaybackStateDiff::SetPlaying(true));
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_plan_for_pause_only_flips_play_flag() {
        let items = queue_items(&["a", "b"]);
        let playing = active(&items, 0, PlaybackStatus::Playing);
        let target = TransportState::Active(ActiveState {
            status: PlaybackStatus::paused(),
            ..playing.clone()
        });

        let plan = plan_engine_operations(&prepared(playing), true, &target);
        assert_eq!(plan, vec![PlaybackStateDiff::SetPlaying(false)]);
    }

    #[test]
    fn test_plan_appending_keeps_now_playing_seamless() {
        let items = queue_items(&["a", "b"]);
        let current = active(&items, 0, PlaybackStatus::Playing);
        let mut extended = items.clone();
        extended.extend(queue_items(&["c"]));
        let target = TransportState::Active(active(&extended, 0, PlaybackStatus::Playing));

        let plan = plan_engine_operations(&prepared(current), true, &target);
        assert_eq!(plan.len(), 1);
        assert!(matches!(
            plan[0],
            PlaybackStateDiff::QueueModification { seamless: true, .. }
        ));
    }

    #[test]
    fn test_plan_to_idle_stops() {
        let items = queue_items(&["a"]);
        let current = prepared(active(&items, 0, PlaybackStatus::Playing));
        let target = TransportState::Idle(IdleState {
            repeat_mode: RepeatMode::All,
            ..IdleState::default()
        });

        let plan = plan_engine_operations(&current, true, &target);
        assert_eq!(
            plan,
            vec![
                PlaybackStateDiff::SetRepeatMode(RepeatMode::All),
                PlaybackStateDiff::SetPlaying(false),
                PlaybackStateDiff::StopPlayback,
            ]
        );
    }
}
