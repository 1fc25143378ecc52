//! Service connection bridge.
//!
//! Abstracts the binder/IPC link between a UI process and the background
//! playback service. The core only needs to bind, send opaque payloads and
//! learn when the remote end died; message framing lives in `core-service`.

use crate::error::Result;
use bytes::Bytes;
use std::sync::Arc;

/// A live link to the playback service.
#[async_trait::async_trait]
pub trait ServiceChannel: Send + Sync {
    /// Deliver one payload. Fails with
    /// [`BridgeError::RemoteDied`](crate::error::BridgeError::RemoteDied)
    /// when the remote process is gone.
    async fn send(&self, payload: Bytes) -> Result<()>;

    /// Whether the remote end is still believed to be alive.
    fn is_alive(&self) -> bool;

    /// Tear down this link.
    async fn disconnect(&self);
}

/// Factory for [`ServiceChannel`]s (Android `bindService`).
#[async_trait::async_trait]
pub trait ServiceConnector: Send + Sync {
    /// Bind to the service, suspending until a channel is available.
    async fn connect(&self) -> Result<Arc<dyn ServiceChannel>>;
}
