//! Media session actions with last-intent-wins semantics.
//!
//! Actions coming from the system media session (play from a browse item,
//! voice search, ...) may need to resolve content before they can touch the
//! player. When a new action arrives while one is still resolving, the old
//! one is cancelled and never applied.

use crate::error::{Result, ServiceError};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct InFlight {
    token: CancellationToken,
    abort: AbortHandle,
}

#[derive(Default)]
pub struct MediaSessionDispatcher {
    current: Mutex<Option<InFlight>>,
}

impl MediaSessionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running action, if any, and start `action`.
    ///
    /// `action` receives a token it may poll to stop early; it is also
    /// aborted at its next suspension point.
    pub fn dispatch<F, Fut>(&self, action: F) -> SessionAction
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let future = action(token.clone());
        let guard = token.clone();

        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            debug!("Superseding in-flight session action");
            previous.token.cancel();
            previous.abort.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => Err(ServiceError::Cancelled),
                result = future => result,
            }
        });
        *current = Some(InFlight {
            token,
            abort: handle.abort_handle(),
        });

        SessionAction { handle }
    }

    /// Cancel the running action without starting another.
    pub fn cancel_current(&self) {
        if let Some(previous) = self.current.lock().take() {
            previous.token.cancel();
            previous.abort.abort();
        }
    }
}

impl fmt::Debug for MediaSessionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSessionDispatcher")
            .field("in_flight", &self.current.lock().is_some())
            .finish()
    }
}

/// A dispatched session action.
#[derive(Debug)]
pub struct SessionAction {
    handle: JoinHandle<Result<()>>,
}

impl SessionAction {
    /// Wait for the outcome. A superseded action yields
    /// [`ServiceError::Cancelled`].
    pub async fn wait(self) -> Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(ServiceError::Cancelled),
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_new_action_cancels_previous() {
        let dispatcher = MediaSessionDispatcher::new();
        let applied = Arc::new(AtomicUsize::new(0));

        let (_hold, never) = oneshot::channel::<()>();
        let first_applied = Arc::clone(&applied);
        let first = dispatcher.dispatch(move |_| async move {
            let _ = never.await;
            first_applied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let second_applied = Arc::clone(&applied);
        let second = dispatcher.dispatch(move |_| async move {
            second_applied.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(first.wait().await, Err(ServiceError::Cancelled)));
        second.wait().await.unwrap();
        assert_eq!(applied.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_token_is_cancelled_on_supersede() {
        let dispatcher = MediaSessionDispatcher::new();
        let (seen_tx, seen_rx) = oneshot::channel();

        let first = dispatcher.dispatch(move |token| {
            let _ = seen_tx.send(token.clone());
            async move {
                token.cancelled().await;
                Ok(())
            }
        });
        let token = seen_rx.await.unwrap();
        assert!(!token.is_cancelled());

        dispatcher.cancel_current();
        assert!(token.is_cancelled());
        assert!(matches!(first.wait().await, Err(ServiceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let dispatcher = MediaSessionDispatcher::new();
        let action = dispatcher.dispatch(|_| async { Err(ServiceError::MissingBaseline) });
        assert!(matches!(action.wait().await, Err(ServiceError::MissingBaseline)));
    }
}
