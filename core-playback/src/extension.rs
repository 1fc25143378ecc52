//! # Playback Extensions
//!
//! Pluggable interceptors around player state transitions.
//!
//! Extensions are registered on the [`MediaPlayerBuilder`](crate::player::MediaPlayerBuilder)
//! and invoked in registration order:
//!
//! 1. `on_attach` once, with a weak [`PlayerHandle`] that stops working after
//!    the player is released.
//! 2. `on_intercept_initialization_state` once during initialization. Each
//!    extension sees the previous one's output.
//! 3. `on_intercept_transport_state` for every `set_state` target.
//! 4. `on_state_changed` for every confirmed, de-duplicated state.
//! 5. `on_release` on shutdown.
//!
//! Callbacks 3 and 4 run on the caller's thread right after the change is
//! confirmed. They must not block, and calling back into `set_state` from
//! `on_state_changed` re-enters the player.

use crate::model::{MediaPlayerState, TransportState};
use crate::player::PlayerHandle;
use async_trait::async_trait;
use bridge_traits::media::MediaObject;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait PlaybackExtension<M: MediaObject>: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_attach(&self, _player: PlayerHandle<M>) {}

    /// Rewrite the state the player starts from (restore a persisted queue).
    async fn on_intercept_initialization_state(
        &self,
        state: TransportState<M>,
    ) -> TransportState<M> {
        state
    }

    /// Rewrite a `set_state` target before it reaches the engine.
    fn on_intercept_transport_state(&self, state: TransportState<M>) -> TransportState<M> {
        state
    }

    fn on_state_changed(&self, _state: &MediaPlayerState<M>) {}

    fn on_release(&self) {}
}

/// Ordered list of extensions.
pub struct ExtensionChain<M> {
    extensions: Vec<Arc<dyn PlaybackExtension<M>>>,
}

impl<M> Default for ExtensionChain<M> {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }
}

impl<M: MediaObject> ExtensionChain<M> {
    pub fn new(extensions: Vec<Arc<dyn PlaybackExtension<M>>>) -> Self {
        Self { extensions }
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn attach(&self, handle: &PlayerHandle<M>) {
        for extension in &self.extensions {
            extension.on_attach(handle.clone());
        }
    }

    pub async fn intercept_initialization_state(
        &self,
        mut state: TransportState<M>,
    ) -> TransportState<M> {
        for extension in &self.extensions {
            state = extension.on_intercept_initialization_state(state).await;
            debug!(
                extension = extension.name(),
                active = state.is_active(),
                "Initialization state intercepted"
            );
        }
        state
    }

    pub fn intercept_transport_state(&self, mut state: TransportState<M>) -> TransportState<M> {
        for extension in &self.extensions {
            state = extension.on_intercept_transport_state(state);
        }
        state
    }

    pub fn state_changed(&self, state: &MediaPlayerState<M>) {
        for extension in &self.extensions {
            extension.on_state_changed(state);
        }
    }

    pub fn release(&self) {
        for extension in &self.extensions {
            extension.on_release();
        }
    }
}

impl<M> std::fmt::Debug for ExtensionChain<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionChain")
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IdleState, RepeatMode, ShuffleMode};
    use crate::testing::TestTrack;
    use parking_lot::Mutex;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PlaybackExtension<TestTrack> for Recorder {
        async fn on_intercept_initialization_state(
            &self,
            state: TransportState<TestTrack>,
        ) -> TransportState<TestTrack> {
            self.log.lock().push(format!("{}:init", self.label));
            match state {
                TransportState::Idle(idle) if self.label == "repeat" => {
                    TransportState::Idle(IdleState { repeat_mode: RepeatMode::All, ..idle })
                }
                TransportState::Idle(idle) if self.label == "shuffle" => {
                    TransportState::Idle(IdleState { shuffle_mode: ShuffleMode::Enabled, ..idle })
                }
                other => other,
            }
        }

        fn on_release(&self) {
            self.log.lock().push(format!("{}:release", self.label));
        }
    }

    #[tokio::test]
    async fn test_chain_folds_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: ExtensionChain<TestTrack> = ExtensionChain::new(vec![
            Arc::new(Recorder {
                label: "repeat",
                log: log.clone(),
            }),
            Arc::new(Recorder {
                label: "shuffle",
                log: log.clone(),
            }),
        ]);

        let state = chain.intercept_initialization_state(TransportState::default()).await;
        assert_eq!(state.repeat_mode(), RepeatMode::All);
        assert_eq!(state.shuffle_mode(), ShuffleMode::Enabled);

        chain.release();
        assert_eq!(
            *log.lock(),
            vec!["repeat:init", "shuffle:init", "repeat:release", "shuffle:release"]
        );
    }

    #[test]
    fn test_default_interception_is_identity() {
        let chain: ExtensionChain<TestTrack> = ExtensionChain::new(vec![Arc::new(Recorder {
            label: "noop",
            log: Arc::new(Mutex::new(Vec::new())),
        })]);
        let state = TransportState::Idle(IdleState::default());
        assert_eq!(chain.intercept_transport_state(state.clone()), state);
    }
}
