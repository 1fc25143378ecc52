use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote endpoint died while a call was in flight. Callers holding an
    /// idempotent command may rebind and resend it.
    #[error("Remote endpoint died: {0}")]
    RemoteDied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the failure came from a dead remote endpoint.
    pub fn is_remote_died(&self) -> bool {
        matches!(self, BridgeError::RemoteDied(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
