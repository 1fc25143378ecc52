//! # Host Bridge Traits
//!
//! Boundary contracts between the playback core and the host platform.
//!
//! ## Overview
//!
//! The playback core owns state and decides what should happen. Everything
//! that actually touches the platform is behind a trait defined here and
//! implemented by the host:
//!
//! ### Content
//! - [`MediaObject`](media::MediaObject) - Identity-bearing playable content
//! - [`MediaProvider`](media::MediaProvider) - Lookup and search
//!
//! ### Playback
//! - [`MediaEngine`](engine::MediaEngine) - Primitives of the wrapped media engine
//!
//! ### Process boundary
//! - [`ServiceConnector`](connection::ServiceConnector) - Binds to the playback service
//! - [`ServiceChannel`](connection::ServiceChannel) - Sends payloads over a live binding
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for seek extrapolation
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map a dead remote process to `BridgeError::RemoteDied` so callers
//! can rebind and resend.
//!
//! ## Thread Safety
//!
//! Shared bridges (`MediaProvider`, `ServiceConnector`, `Clock`) require
//! `Send + Sync`. `MediaEngine` only requires `Send`: the core serialises
//! every engine call behind its own lock.

pub mod connection;
pub mod engine;
pub mod error;
pub mod media;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use connection::{ServiceChannel, ServiceConnector};
pub use engine::{EnginePhase, EngineRepeatMode, EngineSource, MediaEngine};
pub use media::{MediaMetadata, MediaObject, MediaProvider, SearchArguments, SearchResults};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
