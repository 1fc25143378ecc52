//! Service-side state fan-out.
//!
//! [`StateBroadcaster`] observes the player and turns each confirmed state
//! into the smallest [`ServiceMessage`]: a diff when the previous and the new
//! state are both prepared, a full snapshot otherwise. Subscribers join with
//! a snapshot taken under the same lock that orders the message stream, so
//! the first diff they receive always applies to the snapshot they hold.

use crate::protocol::ServiceMessage;
use bridge_traits::media::MediaObject;
use core_playback::model::MediaPlayerState;
use core_playback::player::StateObserver;
use core_playback::state_differ::generate_diff;
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// A new subscription: the state to start from and the messages after it.
pub struct Subscription<M> {
    /// `None` until the player dispatched its first state.
    pub snapshot: Option<MediaPlayerState<M>>,
    pub receiver: broadcast::Receiver<ServiceMessage<M>>,
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("has_snapshot", &self.snapshot.is_some())
            .finish()
    }
}

pub struct StateBroadcaster<M> {
    last_state: Mutex<Option<MediaPlayerState<M>>>,
    sender: broadcast::Sender<ServiceMessage<M>>,
}

impl<M: MediaObject> StateBroadcaster<M> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            last_state: Mutex::new(None),
            sender,
        }
    }

    pub fn subscribe(&self) -> Subscription<M> {
        let last_state = self.last_state.lock();
        Subscription {
            snapshot: last_state.clone(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn message_for(
        previous: Option<&MediaPlayerState<M>>,
        next: &MediaPlayerState<M>,
    ) -> Option<ServiceMessage<M>> {
        match (previous, next) {
            (Some(MediaPlayerState::Prepared(from)), MediaPlayerState::Prepared(to)) => {
                let modifications = generate_diff(to, from);
                if modifications.is_empty() {
                    None
                } else {
                    Some(ServiceMessage::Diff { modifications })
                }
            }
            _ => Some(ServiceMessage::State {
                state: next.clone(),
            }),
        }
    }

    fn send(&self, message: ServiceMessage<M>) {
        // No subscribers is fine; late joiners start from the snapshot
        if self.sender.send(message).is_err() {
            trace!("No controllers subscribed");
        }
    }
}

impl<M: MediaObject> StateObserver<M> for StateBroadcaster<M> {
    fn on_state_changed(&self, state: &MediaPlayerState<M>) {
        let mut last_state = self.last_state.lock();
        match Self::message_for(last_state.as_ref(), state) {
            Some(message) => {
                debug!(
                    diff = matches!(message, ServiceMessage::Diff { .. }),
                    "Broadcasting player state"
                );
                self.send(message);
            }
            None => trace!("Empty diff skipped"),
        }
        *last_state = Some(state.clone());
    }

    fn on_release(&self) {
        let mut last_state = self.last_state.lock();
        *last_state = None;
        self.send(ServiceMessage::Released);
    }
}

impl<M> fmt::Debug for StateBroadcaster<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBroadcaster")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
