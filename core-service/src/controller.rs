//! # Controller State Cache
//!
//! The controller-side mirror of the service's player state.
//!
//! Full snapshots replace the cache; diffs are folded onto the cached
//! prepared state. A diff with nothing to fold onto means the controller
//! missed part of the stream and is reported as
//! [`ServiceError::MissingBaseline`] instead of being dropped.
//!
//! [`ControllerStateCache::observe_state`] exposes the cache as a stream.
//! Seek positions of a playing item are computed from the wall clock, so the
//! stream can re-emit the same state on a timer to animate a seek bar
//! without any extra traffic from the service.

use crate::error::{Result, ServiceError};
use crate::protocol::{decode_frame, ChunkAssembler, ServiceMessage};
use bridge_traits::media::MediaObject;
use bridge_traits::time::Clock;
use core_playback::model::{MediaPlayerState, SeekPosition};
use core_playback::state_differ::apply_diff;
use core_runtime::config::EncoreConfig;
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// How often `observe_state` re-emits while the position is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekUpdateFrequency {
    /// Emit on real changes only.
    Never,
    /// Also re-emit at this interval while playing.
    WhilePlayingEvery(Duration),
}

pub struct ControllerStateCache<M> {
    state: watch::Sender<Option<MediaPlayerState<M>>>,
    clock: Arc<dyn Clock>,
    assembler: Mutex<ChunkAssembler>,
}

impl<M: MediaObject> ControllerStateCache<M> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_assembler(clock, ChunkAssembler::new())
    }

    /// Cache using the configured clock and reassembly limits.
    pub fn from_config(config: &EncoreConfig) -> Self {
        Self::with_assembler(Arc::clone(&config.clock), ChunkAssembler::from_config(config))
    }

    fn with_assembler(clock: Arc<dyn Clock>, assembler: ChunkAssembler) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            clock,
            assembler: Mutex::new(assembler),
        }
    }

    /// Cached state, `None` before the first snapshot or after release.
    pub fn state(&self) -> Option<MediaPlayerState<M>> {
        self.state.borrow().clone()
    }

    /// Apply one message from the service.
    ///
    /// # Errors
    ///
    /// [`ServiceError::MissingBaseline`] for a diff without a cached prepared
    /// state, [`ServiceError::Playback`] for a diff that does not fit it.
    pub fn apply_message(&self, message: ServiceMessage<M>) -> Result<()> {
        match message {
            ServiceMessage::State { state } => {
                self.state.send_if_modified(|cached| {
                    if cached.as_ref() == Some(&state) {
                        false
                    } else {
                        *cached = Some(state);
                        true
                    }
                });
                Ok(())
            }
            ServiceMessage::Diff { modifications } => {
                let mut outcome = Ok(());
                self.state.send_if_modified(|cached| {
                    let base = match cached.as_ref().and_then(MediaPlayerState::as_prepared) {
                        Some(base) => base,
                        None => {
                            outcome = Err(ServiceError::MissingBaseline);
                            return false;
                        }
                    };
                    match apply_diff(base, &modifications) {
                        Ok(next) => {
                            let next = MediaPlayerState::Prepared(next);
                            let changed = cached.as_ref() != Some(&next);
                            *cached = Some(next);
                            changed
                        }
                        Err(err) => {
                            outcome = Err(err.into());
                            false
                        }
                    }
                });
                if let Err(err) = &outcome {
                    warn!(error = %err, "Diff rejected");
                }
                outcome
            }
            ServiceMessage::Released => {
                debug!("Service released the player");
                self.state.send_if_modified(|cached| cached.take().is_some());
                Ok(())
            }
        }
    }

    /// Feed one frame from the service. Returns `Ok(false)` while the message
    /// is still incomplete.
    pub fn apply_payload(&self, frame: &[u8]) -> Result<bool>
    where
        M: DeserializeOwned,
    {
        let message = {
            let mut assembler = self.assembler.lock();
            decode_frame::<ServiceMessage<M>>(&mut assembler, frame)?
        };
        match message {
            Some(message) => self.apply_message(message).map(|()| true),
            None => Ok(false),
        }
    }

    /// Stream of cached states, starting with the current one if any.
    ///
    /// The stream ends when the cache is dropped.
    pub fn observe_state(
        &self,
        frequency: SeekUpdateFrequency,
    ) -> impl Stream<Item = MediaPlayerState<M>> + Send + 'static {
        let mut receiver = self.state.subscribe();
        receiver.mark_changed();
        let clock = Arc::clone(&self.clock);

        stream::unfold(receiver, move |mut receiver| {
            let clock = Arc::clone(&clock);
            async move {
                loop {
                    let current = receiver.borrow().clone();
                    let interval = match (frequency, &current) {
                        (SeekUpdateFrequency::WhilePlayingEvery(interval), Some(state))
                            if is_advancing(state, clock.as_ref()) =>
                        {
                            Some(interval)
                        }
                        _ => None,
                    };

                    // Ok(true) on a real change, Ok(false) on a tick
                    let woke = match interval {
                        Some(interval) => tokio::select! {
                            changed = receiver.changed() => changed.map(|()| true),
                            _ = tokio::time::sleep(interval) => Ok(false),
                        },
                        None => receiver.changed().await.map(|()| true),
                    };

                    let next = match woke {
                        Err(_) => return None,
                        Ok(true) => receiver.borrow_and_update().clone(),
                        Ok(false) => current,
                    };
                    if let Some(state) = next {
                        return Some((state, receiver));
                    }
                }
            }
        })
    }
}

/// Whether the visible position of `state` keeps moving on its own.
///
/// Only a computed position moves; an absolute one sampled while the engine
/// has not started rendering stays put even when the status says playing.
fn is_advancing<M: MediaObject>(state: &MediaPlayerState<M>, clock: &dyn Clock) -> bool {
    let prepared = match state.as_prepared() {
        Some(prepared) => prepared,
        None => return false,
    };
    let duration_ms = match prepared.duration_ms {
        Some(duration_ms) => duration_ms,
        None => return false,
    };

    matches!(prepared.transport.seek_position, SeekPosition::Computed(_))
        && prepared.transport.status.is_playing()
        && !prepared.buffering.is_paused_for_buffering()
        && prepared.transport.seek_position.position_ms(clock) < duration_ms
}

impl<M> fmt::Debug for ControllerStateCache<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerStateCache")
            .field("cached", &self.state.borrow().is_some())
            .finish()
    }
}
