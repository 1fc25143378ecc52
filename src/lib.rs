//! Encore playback core.
//!
//! Re-exports the workspace crates under one dependency. The cross-process
//! layer sits behind the `service` feature (enabled by default); hosts that
//! run the player in-process can turn it off.

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;

#[cfg(feature = "service")]
pub use core_service as service;
