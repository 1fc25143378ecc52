//! # Playback Core
//!
//! State model and state machine of the player.
//!
//! ## Overview
//!
//! - [`model`] - Transport states, queues, seek positions and player states
//! - [`diff`] - Move-aware list diff used for engine playlists and IPC
//! - [`factory`] - Pure transitions for every user intent
//! - [`queue_sync`] - Keeps the engine playlist in step with the queue
//! - [`creator`] - Rebuilds the player state from engine samples
//! - [`player`] - The [`MediaPlayer`] that owns the engine
//! - [`extension`] - Interceptors invoked around state changes
//! - [`state_differ`] - Field-level diffs of prepared states for controllers
//! - [`testing`] - In-memory engine and fixtures
//!
//! ## Flow
//!
//! ```text
//! intent ──> factory(state) ──> MediaPlayer::set_state ──> engine
//!                                        │
//!                 observers <── creator(engine, queue)
//! ```
//!
//! ## Usage
//!
//! ```
//! use core_playback::factory::PlaybackStateFactory;
//! use core_playback::testing::{InMemoryEngine, ManualClock, TestTrack};
//! use core_playback::MediaPlayer;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> core_playback::Result<()> {
//! let clock = Arc::new(ManualClock::new(0));
//! let player: MediaPlayer<TestTrack> = MediaPlayer::builder(InMemoryEngine::new())
//!     .clock(clock.clone())
//!     .build();
//! player.initialize().await?;
//!
//! let factory = PlaybackStateFactory::with_seed(clock, 1);
//! let state = player.state()?.transport_state().unwrap_or_default();
//! let state = factory.play_from_media_browser(
//!     &state,
//!     vec![TestTrack::new("a"), TestTrack::new("b")],
//!     "b",
//! )?;
//! player.set_state(state)?;
//! assert!(player.state()?.as_prepared().is_some());
//! # Ok(())
//! # }
//! ```

pub mod creator;
pub mod diff;
pub mod error;
pub mod extension;
pub mod factory;
pub mod model;
pub mod player;
pub mod queue_sync;
pub mod state_differ;
pub mod testing;

pub use error::{PlaybackError, Result};

pub use creator::PlaybackStateCreator;
pub use extension::{ExtensionChain, PlaybackExtension};
pub use factory::PlaybackStateFactory;
pub use player::{
    MediaPlayer, MediaPlayerBuilder, ObserverHandle, PlaybackStateDiff, PlayerHandle, StateObserver,
};
pub use queue_sync::MediaQueue;
pub use state_differ::{MediaPlayerStateDiffer, StateModification};
