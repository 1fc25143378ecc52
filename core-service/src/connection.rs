//! # Service Connection
//!
//! Client-side binding to the playback service.
//!
//! ## Binding
//!
//! [`ConnectionManager::acquire`] hands out [`BindingToken`]s. The first
//! token binds the service and the last released one unbinds it. Acquire and
//! release go through one async mutex, so a release immediately followed by
//! an acquire cannot tear down a channel that is about to be used again.
//!
//! ## Sending
//!
//! [`CommandSender`] serializes outgoing commands per sender. A send that
//! fails with [`BridgeError::RemoteDied`] drops the dead channel, waits for a
//! fresh one and resends the whole command. Commands are idempotent, so
//! delivering one twice is harmless. Any other failure is returned.

use crate::error::{Result, ServiceError};
use crate::protocol::{encode_frames, ClientCommand};
use bridge_traits::connection::{ServiceChannel, ServiceConnector};
use bridge_traits::error::BridgeError;
use bridge_traits::media::MediaObject;
use bytes::Bytes;
use core_runtime::config::EncoreConfig;
use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

type Channel = Arc<dyn ServiceChannel>;

#[derive(Debug, Default)]
struct BindingState {
    tokens: usize,
    remote_deaths: u32,
}

/// Ref-counted binding to the playback service.
pub struct ConnectionManager {
    connector: Arc<dyn ServiceConnector>,
    binding: Mutex<BindingState>,
    channel: watch::Sender<Option<Channel>>,
    events: Option<EventBus>,
    reconnect_delay: Duration,
    max_message_bytes: usize,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn ServiceConnector>, config: &EncoreConfig) -> Arc<Self> {
        let (channel, _) = watch::channel(None);
        Arc::new(Self {
            connector,
            binding: Mutex::new(BindingState::default()),
            channel,
            events: None,
            reconnect_delay: config.reconnect_delay,
            max_message_bytes: config.max_message_bytes,
        })
    }

    pub fn with_event_bus(
        connector: Arc<dyn ServiceConnector>,
        config: &EncoreConfig,
        events: EventBus,
    ) -> Arc<Self> {
        let (channel, _) = watch::channel(None);
        Arc::new(Self {
            connector,
            binding: Mutex::new(BindingState::default()),
            channel,
            events: Some(events),
            reconnect_delay: config.reconnect_delay,
            max_message_bytes: config.max_message_bytes,
        })
    }

    /// Take a binding token, binding the service if this is the first one.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when the first bind fails; no token is
    /// held in that case.
    #[instrument(skip(self))]
    pub async fn acquire(self: &Arc<Self>) -> Result<BindingToken> {
        let mut binding = self.binding.lock().await;
        if binding.tokens == 0 {
            let channel = self.connector.connect().await?;
            self.channel.send_replace(Some(channel));
            info!("Playback service bound");
            self.emit(ConnectionEvent::Bound);
        }
        binding.tokens += 1;
        debug!(tokens = binding.tokens, "Binding token acquired");

        Ok(BindingToken {
            manager: Some(Arc::clone(self)),
        })
    }

    /// Number of outstanding tokens.
    pub async fn token_count(&self) -> usize {
        self.binding.lock().await.tokens
    }

    /// Suspend until a channel is bound. Only returns while a token is held.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Released`] when the manager is gone.
    pub async fn wait_for_channel(&self) -> Result<Channel> {
        let mut receiver = self.channel.subscribe();
        let channel = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ServiceError::Released)?;
        channel.clone().ok_or(ServiceError::Released)
    }

    /// Forget `dead` and rebind while tokens are held. A channel that was
    /// already replaced is ignored.
    #[instrument(skip(self, dead))]
    pub async fn report_dead(&self, dead: &Channel) -> Result<()> {
        let mut binding = self.binding.lock().await;
        let current_is_dead = self
            .channel
            .borrow()
            .as_ref()
            .is_some_and(|current| same_channel(current, dead));
        if !current_is_dead {
            debug!("Dead channel already replaced");
            return Ok(());
        }

        self.channel.send_replace(None);
        binding.remote_deaths += 1;
        warn!(attempt = binding.remote_deaths, "Playback service died");
        self.emit(ConnectionEvent::RemoteDied {
            attempt: binding.remote_deaths,
        });

        if binding.tokens > 0 {
            let channel = self.connector.connect().await?;
            self.channel.send_replace(Some(channel));
            info!("Playback service rebound");
        }
        Ok(())
    }

    /// Encoder for commands over this connection.
    pub fn command_sender<M: MediaObject>(self: &Arc<Self>) -> CommandSender<M> {
        CommandSender {
            manager: Arc::clone(self),
            send_lock: Mutex::new(()),
            _media: PhantomData,
        }
    }

    async fn release_token(&self) {
        let mut binding = self.binding.lock().await;
        binding.tokens = binding.tokens.saturating_sub(1);
        debug!(tokens = binding.tokens, "Binding token released");
        if binding.tokens > 0 {
            return;
        }

        if let Some(channel) = self.channel.send_replace(None) {
            channel.disconnect().await;
        }
        info!("Playback service unbound");
        self.emit(ConnectionEvent::Unbound);
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Some(events) = &self.events {
            if events.emit(CoreEvent::Connection(event)).is_err() {
                debug!("No event subscribers");
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connected", &self.channel.borrow().is_some())
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}

fn same_channel(a: &Channel, b: &Channel) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Keeps the service bound while held.
///
/// Prefer [`BindingToken::release`]; dropping the token releases it on the
/// current tokio runtime, if there is one.
#[must_use = "dropping the token may unbind the service"]
pub struct BindingToken {
    manager: Option<Arc<ConnectionManager>>,
}

impl BindingToken {
    pub async fn release(mut self) {
        if let Some(manager) = self.manager.take() {
            manager.release_token().await;
        }
    }
}

impl Drop for BindingToken {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { manager.release_token().await });
                }
                Err(_) => warn!("Binding token dropped outside a runtime; service stays bound"),
            }
        }
    }
}

impl fmt::Debug for BindingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingToken")
            .field("held", &self.manager.is_some())
            .finish()
    }
}

/// Sends commands in order, resending after the remote died.
pub struct CommandSender<M> {
    manager: Arc<ConnectionManager>,
    send_lock: Mutex<()>,
    _media: PhantomData<fn() -> M>,
}

impl<M: MediaObject + Serialize> CommandSender<M> {
    /// Deliver `command` at least once.
    ///
    /// # Errors
    ///
    /// Encoding failures and any channel failure other than a dead remote.
    #[instrument(skip(self, command))]
    pub async fn send(&self, command: &ClientCommand<M>) -> Result<()> {
        let _ordered = self.send_lock.lock().await;
        let frames = encode_frames(command, self.manager.max_message_bytes)?;

        loop {
            let channel = self.manager.wait_for_channel().await?;
            match send_frames(&channel, &frames).await {
                Ok(()) => return Ok(()),
                Err(BridgeError::RemoteDied(reason)) => {
                    warn!(%reason, frames = frames.len(), "Remote died during send, resending");
                    self.manager.report_dead(&channel).await?;
                    tokio::time::sleep(self.manager.reconnect_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

async fn send_frames(channel: &Channel, frames: &[Bytes]) -> std::result::Result<(), BridgeError> {
    for frame in frames {
        channel.send(frame.clone()).await?;
    }
    Ok(())
}

impl<M> fmt::Debug for CommandSender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSender")
            .field("manager", &self.manager)
            .finish()
    }
}
