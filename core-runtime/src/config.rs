//! # Encore Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `EncoreConfig` holding the clock and the tuning knobs of the player, the
//! service broadcaster and the client connection. `build()` validates the
//! values and fails fast with an actionable message.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::EncoreConfig;
//! use std::time::Duration;
//!
//! let config = EncoreConfig::builder()
//!     .event_buffer_size(64)
//!     .reconnect_delay(Duration::from_millis(100))
//!     .seek_update_interval(Duration::from_millis(500))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.event_buffer_size, 64);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::EncoreConfig;
//!
//! // A zero-sized broadcast buffer is rejected
//! let config = EncoreConfig::builder()
//!     .event_buffer_size(0)
//!     .build()
//!     .expect("Should fail - zero buffer");
//! ```

use crate::error::{Error, Result};
use bridge_traits::time::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default broadcast capacity for events and state messages.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Default wait before resending a command after the remote died.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(250);

/// Default maximum size of one IPC payload before it is chunked.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Default cap on one reassembled IPC message.
pub const DEFAULT_MAX_ASSEMBLED_BYTES: usize = 16 * 1024 * 1024;

/// Default cadence for seek-bar refreshes on the client.
pub const DEFAULT_SEEK_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for `max_message_bytes`; binder transactions cap out near 1 MB.
const MAX_MESSAGE_BYTES_LIMIT: usize = 1024 * 1024;

/// Configuration for the playback core.
///
/// Use [`EncoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct EncoreConfig {
    /// Wall clock used to extrapolate seek positions
    pub clock: Arc<dyn Clock>,

    /// Capacity of the event bus and of the state broadcaster
    pub event_buffer_size: usize,

    /// Delay between resend attempts after `RemoteDied`
    pub reconnect_delay: Duration,

    /// Payloads larger than this are split into chunks
    pub max_message_bytes: usize,

    /// Largest message a receiver reassembles from chunks
    pub max_assembled_bytes: usize,

    /// Default interval for `WhilePlayingEvery` seek refreshes
    pub seek_update_interval: Duration,

    /// Seed for reproducible shuffling; random when `None`
    pub shuffle_seed: Option<u64>,
}

impl std::fmt::Debug for EncoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoreConfig")
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_message_bytes", &self.max_message_bytes)
            .field("max_assembled_bytes", &self.max_assembled_bytes)
            .field("seek_update_interval", &self.seek_update_interval)
            .field("shuffle_seed", &self.shuffle_seed)
            .finish()
    }
}

impl Default for EncoreConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_assembled_bytes: DEFAULT_MAX_ASSEMBLED_BYTES,
            seek_update_interval: DEFAULT_SEEK_UPDATE_INTERVAL,
            shuffle_seed: None,
        }
    }
}

impl EncoreConfig {
    /// Creates a new builder for constructing an `EncoreConfig`.
    pub fn builder() -> EncoreConfigBuilder {
        EncoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Event buffer size is > 0
    /// - Message chunk size is > 0 and below the binder transaction limit
    /// - Reassembled messages may span at least one chunk
    /// - Reconnect delay and seek update interval are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_message_bytes == 0 {
            return Err(Error::Config(
                "Maximum message size must be greater than 0 bytes".to_string(),
            ));
        }

        if self.max_message_bytes > MAX_MESSAGE_BYTES_LIMIT {
            return Err(Error::Config(format!(
                "Maximum message size exceeds the transaction limit of {} bytes",
                MAX_MESSAGE_BYTES_LIMIT
            )));
        }

        if self.max_assembled_bytes < self.max_message_bytes {
            return Err(Error::Config(format!(
                "Maximum assembled size ({} bytes) is smaller than one chunk ({} bytes)",
                self.max_assembled_bytes, self.max_message_bytes
            )));
        }

        if self.reconnect_delay.is_zero() {
            return Err(Error::Config(
                "Reconnect delay must be non-zero to avoid a busy resend loop".to_string(),
            ));
        }

        if self.seek_update_interval.is_zero() {
            return Err(Error::Config(
                "Seek update interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`EncoreConfig`] instances.
///
/// Unset fields fall back to the documented defaults.
#[derive(Default)]
pub struct EncoreConfigBuilder {
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    reconnect_delay: Option<Duration>,
    max_message_bytes: Option<usize>,
    max_assembled_bytes: Option<usize>,
    seek_update_interval: Option<Duration>,
    shuffle_seed: Option<u64>,
}

impl EncoreConfigBuilder {
    /// Sets the clock used for seek extrapolation.
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge_traits::time::ManualClock;
    /// use core_runtime::config::EncoreConfig;
    /// use std::sync::Arc;
    ///
    /// let config = EncoreConfig::builder()
    ///     .clock(Arc::new(ManualClock::new(0)))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.clock.unix_timestamp_millis(), 0);
    /// ```
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the broadcast capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the delay between resend attempts.
    ///
    /// Default: 250 ms
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Sets the chunking threshold for IPC payloads.
    ///
    /// Default: 64 KiB
    pub fn max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = Some(bytes);
        self
    }

    /// Sets the largest message a receiver reassembles.
    ///
    /// Default: 16 MiB
    pub fn max_assembled_bytes(mut self, bytes: usize) -> Self {
        self.max_assembled_bytes = Some(bytes);
        self
    }

    /// Sets the default seek refresh cadence.
    ///
    /// Default: 1 s
    pub fn seek_update_interval(mut self, interval: Duration) -> Self {
        self.seek_update_interval = Some(interval);
        self
    }

    /// Makes shuffling reproducible.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a value is out of range.
    pub fn build(self) -> Result<EncoreConfig> {
        let defaults = EncoreConfig::default();
        let config = EncoreConfig {
            clock: self.clock.unwrap_or(defaults.clock),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
            reconnect_delay: self.reconnect_delay.unwrap_or(defaults.reconnect_delay),
            max_message_bytes: self.max_message_bytes.unwrap_or(defaults.max_message_bytes),
            max_assembled_bytes: self
                .max_assembled_bytes
                .unwrap_or(defaults.max_assembled_bytes),
            seek_update_interval: self
                .seek_update_interval
                .unwrap_or(defaults.seek_update_interval),
            shuffle_seed: self.shuffle_seed,
        };

        config.validate()?;
        Ok(config)
    }
}
