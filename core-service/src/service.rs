//! # Playback Service
//!
//! The process that owns the [`MediaPlayer`]. Controllers send
//! [`ClientCommand`]s; each one is turned into a target transport state by
//! the [`PlaybackStateFactory`] and applied to the player:
//!
//! ```text
//! payload ─> ChunkAssembler ─> ClientCommand ─> (MediaProvider) ─> factory ─> set_state
//!                                                                                 │
//! controllers <── ServiceMessage <── StateBroadcaster <── observer ───────────────┘
//! ```
//!
//! Commands are applied against the state sampled right before the factory
//! runs, so a resent command lands on the newest state and is harmless.
//! Sampling, the factory and `set_state` run under one command lock, so two
//! controllers skipping at once move the queue twice.

use crate::broadcaster::{StateBroadcaster, Subscription};
use crate::error::{Result, ServiceError};
use crate::protocol::{decode_frame, ChunkAssembler, ClientCommand};
use bridge_traits::media::{MediaObject, MediaProvider};
use core_playback::error::PlaybackError;
use core_playback::factory::PlaybackStateFactory;
use core_playback::model::TransportState;
use core_playback::player::{MediaPlayer, ObserverHandle};
use core_runtime::config::EncoreConfig;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Routes controller commands onto a player and publishes its states.
pub struct PlaybackService<M: MediaObject> {
    player: MediaPlayer<M>,
    factory: PlaybackStateFactory,
    provider: Arc<dyn MediaProvider<M>>,
    broadcaster: Arc<StateBroadcaster<M>>,
    _registration: ObserverHandle<M>,
    assembler: Mutex<ChunkAssembler>,
    /// Held from sampling the state until the target is applied.
    command_lock: Mutex<()>,
}

impl<M: MediaObject> PlaybackService<M> {
    /// Wrap `player`. The broadcaster is registered immediately, so build the
    /// service before initializing the player to catch its first state.
    pub fn new(
        player: MediaPlayer<M>,
        provider: Arc<dyn MediaProvider<M>>,
        config: &EncoreConfig,
    ) -> Self {
        let broadcaster = Arc::new(StateBroadcaster::new(config.event_buffer_size));
        let registration = player.add_observer(broadcaster.clone());

        Self {
            player,
            factory: PlaybackStateFactory::from_config(config),
            provider,
            broadcaster,
            _registration: registration,
            assembler: Mutex::new(ChunkAssembler::from_config(config)),
            command_lock: Mutex::new(()),
        }
    }

    pub fn player(&self) -> &MediaPlayer<M> {
        &self.player
    }

    /// Join the state stream.
    pub fn subscribe(&self) -> Subscription<M> {
        self.broadcaster.subscribe()
    }

    /// Feed one frame received from a controller. Returns `Ok(false)` while
    /// the command is still incomplete.
    pub async fn handle_payload(&self, frame: &[u8]) -> Result<bool>
    where
        M: DeserializeOwned,
    {
        let command = {
            let mut assembler = self.assembler.lock();
            decode_frame::<ClientCommand<M>>(&mut assembler, frame)?
        };

        match command {
            Some(command) => {
                self.handle_command(command).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self, command))]
    pub async fn handle_command(&self, command: ClientCommand<M>) -> Result<()> {
        if self.player.is_released() {
            return Err(ServiceError::Released);
        }

        let factory = &self.factory;
        match command {
            // Provider lookups run before the state is sampled
            ClientCommand::PlayFromSearch { query, arguments } => {
                let results = self.provider.search_for_media_items(&query, &arguments).await?;
                debug!(
                    matches = results.search_results.len(),
                    continuation = results.playback_continuation.len(),
                    "Search resolved"
                );
                self.transition(|current| {
                    Ok(factory.play_from_search_results(current, results, true))
                })
            }
            ClientCommand::PlayFromMediaBrowser {
                media_item_ids,
                media_item_id,
            } => {
                let media_items = self.provider.get_media_items_by_ids(&media_item_ids).await?;
                self.transition(|current| {
                    Ok(factory.play_from_media_browser(current, media_items, &media_item_id)?)
                })
            }
            ClientCommand::SetState { state } => self.transition(|_| Ok(state)),
            ClientCommand::Play => self.transition(|current| Ok(factory.play(current))),
            ClientCommand::Pause => self.transition(|current| Ok(factory.pause(current))),
            ClientCommand::SeekTo { position_ms } => {
                self.transition(|current| Ok(factory.seek_to(current, position_ms)))
            }
            ClientCommand::SkipToNext => {
                self.transition(|current| Ok(factory.skip_to_next(current)))
            }
            ClientCommand::SkipToPrevious => {
                self.transition(|current| Ok(factory.skip_to_previous(current)))
            }
            ClientCommand::SkipToIndex { index } => {
                self.transition(|current| Ok(factory.skip_to_index(current, index)?))
            }
            ClientCommand::SetShuffleMode { shuffle_mode } => {
                self.transition(|current| Ok(factory.set_shuffle_mode(current, shuffle_mode)))
            }
            ClientCommand::SetRepeatMode { repeat_mode } => {
                self.transition(|current| Ok(factory.set_repeat_mode(current, repeat_mode)))
            }
            ClientCommand::SetPlaybackSpeed { playback_speed } => {
                self.transition(|current| Ok(factory.set_playback_speed(current, playback_speed)))
            }
        }
    }

    /// Sample, compute the target and apply it with no other command in
    /// between, so concurrent commands each see the previous one's result.
    fn transition<F>(&self, plan: F) -> Result<()>
    where
        F: FnOnce(&TransportState<M>) -> Result<TransportState<M>>,
    {
        let _guard = self.command_lock.lock();
        let target = plan(&self.current_transport()?)?;
        self.player.set_state(target)?;
        Ok(())
    }

    /// Release the player; subscribers receive `Released`.
    pub fn release(&self) {
        self.player.release();
        info!("Playback service released");
    }

    fn current_transport(&self) -> Result<TransportState<M>> {
        self.player
            .state()?
            .transport_state()
            .ok_or(ServiceError::Playback(PlaybackError::NotInitialized))
    }
}

impl<M: MediaObject> fmt::Debug for PlaybackService<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackService")
            .field("player", &self.player)
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}
