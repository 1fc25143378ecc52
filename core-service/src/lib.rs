//! # Playback Service Layer
//!
//! Carries player state and commands across the process boundary between
//! the background playback service and its controllers (UI, widgets,
//! notifications).
//!
//! ## Overview
//!
//! - [`protocol`] - Wire messages, JSON codec and chunking
//! - [`broadcaster`] - Service-side observer producing snapshots and diffs
//! - [`service`] - Routes controller commands onto the player
//! - [`controller`] - Controller-side state cache and state streams
//! - [`connection`] - Ref-counted binding and ordered, resending command sender
//! - [`session`] - Last-intent-wins dispatch of media session actions
//!
//! ```text
//!  controller process                         service process
//! ┌──────────────────────┐  ClientCommand   ┌──────────────────────┐
//! │ CommandSender        ├─────────────────>│ PlaybackService      │
//! │ ConnectionManager    │                  │   └─ MediaPlayer     │
//! │ ControllerStateCache │<─────────────────┤ StateBroadcaster     │
//! └──────────────────────┘  ServiceMessage  └──────────────────────┘
//! ```
//!
//! Every frame on the channel is a JSON-encoded [`MessageChunk`]; large
//! messages span several frames.

pub mod broadcaster;
pub mod connection;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod service;
pub mod session;

pub use error::{Result, ServiceError};

pub use broadcaster::{StateBroadcaster, Subscription};
pub use connection::{BindingToken, CommandSender, ConnectionManager};
pub use controller::{ControllerStateCache, SeekUpdateFrequency};
pub use protocol::{ChunkAssembler, ClientCommand, MessageChunk, ServiceMessage};
pub use service::PlaybackService;
pub use session::{MediaSessionDispatcher, SessionAction};
