//! Binding and resend behavior of the client connection.

use async_trait::async_trait;
use bridge_traits::connection::{ServiceChannel, ServiceConnector};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bytes::Bytes;
use core_playback::testing::TestTrack;
use core_runtime::config::EncoreConfig;
use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
use core_service::protocol::{decode_frame, ChunkAssembler, ClientCommand};
use core_service::{ConnectionManager, ServiceError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Clone, Copy)]
enum Failure {
    /// Die after delivering this many frames.
    DieAfter(usize),
    Reject,
}

struct FakeChannel {
    delivered: Arc<Mutex<Vec<Bytes>>>,
    failure: Option<Failure>,
    sent: AtomicUsize,
    alive: AtomicBool,
    disconnected: AtomicBool,
}

#[async_trait]
impl ServiceChannel for FakeChannel {
    async fn send(&self, payload: Bytes) -> BridgeResult<()> {
        match self.failure {
            Some(Failure::DieAfter(limit)) if self.sent.load(Ordering::SeqCst) >= limit => {
                self.alive.store(false, Ordering::SeqCst);
                return Err(BridgeError::RemoteDied("service process killed".to_string()));
            }
            Some(Failure::Reject) => {
                return Err(BridgeError::OperationFailed("transaction too large".to_string()))
            }
            _ => {}
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.delivered.lock().push(payload);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Hands out channels whose failures follow `plan`, then healthy ones.
#[derive(Default)]
struct FakeConnector {
    plan: Mutex<Vec<Failure>>,
    delivered: Arc<Mutex<Vec<Bytes>>>,
    channels: Mutex<Vec<Arc<FakeChannel>>>,
}

impl FakeConnector {
    fn with_plan(plan: Vec<Failure>) -> Arc<Self> {
        Arc::new(Self {
            plan: Mutex::new(plan),
            ..Default::default()
        })
    }

    fn connects(&self) -> usize {
        self.channels.lock().len()
    }

    fn channel(&self, index: usize) -> Arc<FakeChannel> {
        self.channels.lock()[index].clone()
    }

    fn delivered(&self) -> Vec<Bytes> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl ServiceConnector for FakeConnector {
    async fn connect(&self) -> BridgeResult<Arc<dyn ServiceChannel>> {
        let failure = {
            let mut plan = self.plan.lock();
            if plan.is_empty() {
                None
            } else {
                Some(plan.remove(0))
            }
        };
        let channel = Arc::new(FakeChannel {
            delivered: Arc::clone(&self.delivered),
            failure,
            sent: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
            disconnected: AtomicBool::new(false),
        });
        self.channels.lock().push(channel.clone());
        Ok(channel)
    }
}

fn config(max_message_bytes: usize) -> EncoreConfig {
    EncoreConfig::builder()
        .reconnect_delay(Duration::from_millis(1))
        .max_message_bytes(max_message_bytes)
        .build()
        .unwrap()
}

fn decode_all(frames: &[Bytes]) -> Vec<ClientCommand<TestTrack>> {
    let mut assembler = ChunkAssembler::new();
    frames
        .iter()
        .filter_map(|frame| decode_frame(&mut assembler, frame).unwrap())
        .collect()
}

// ============================================================================
// Binding
// ============================================================================

#[tokio::test]
async fn test_binding_is_reference_counted() {
    let connector = FakeConnector::with_plan(Vec::new());
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let manager = ConnectionManager::with_event_bus(connector.clone(), &config(1024), bus);

    let first = manager.acquire().await.unwrap();
    let second = manager.acquire().await.unwrap();
    assert_eq!(connector.connects(), 1);
    assert_eq!(manager.token_count().await, 2);

    first.release().await;
    assert!(!connector.channel(0).disconnected.load(Ordering::SeqCst));

    second.release().await;
    assert!(connector.channel(0).disconnected.load(Ordering::SeqCst));
    assert_eq!(manager.token_count().await, 0);

    let third = manager.acquire().await.unwrap();
    assert_eq!(connector.connects(), 2);
    third.release().await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            CoreEvent::Connection(ConnectionEvent::Bound),
            CoreEvent::Connection(ConnectionEvent::Unbound),
            CoreEvent::Connection(ConnectionEvent::Bound),
            CoreEvent::Connection(ConnectionEvent::Unbound),
        ]
    );
}

#[tokio::test]
async fn test_dropped_token_releases_binding() {
    let connector = FakeConnector::with_plan(Vec::new());
    let manager = ConnectionManager::new(connector.clone(), &config(1024));

    let token = manager.acquire().await.unwrap();
    drop(token);

    tokio::time::timeout(Duration::from_secs(1), async {
        while manager.token_count().await > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(connector.channel(0).disconnected.load(Ordering::SeqCst));
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_command_is_resent_after_remote_death() {
    let connector = FakeConnector::with_plan(vec![Failure::DieAfter(1)]);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let manager = ConnectionManager::with_event_bus(connector.clone(), &config(16), bus);
    let _token = manager.acquire().await.unwrap();

    let sender = manager.command_sender::<TestTrack>();
    let command = ClientCommand::PlayFromMediaBrowser {
        media_item_ids: vec!["first".to_string(), "second".to_string()],
        media_item_id: "second".to_string(),
    };
    sender.send(&command).await.unwrap();

    assert_eq!(connector.connects(), 2);
    assert!(!connector.channel(0).is_alive());

    // One frame from the dead channel, then the full message again
    let delivered = connector.delivered();
    assert!(delivered.len() > 2);
    assert_eq!(decode_all(&delivered), vec![command]);

    let mut saw_death = false;
    while let Ok(event) = events.try_recv() {
        if event == CoreEvent::Connection(ConnectionEvent::RemoteDied { attempt: 1 }) {
            saw_death = true;
        }
    }
    assert!(saw_death);
}

#[tokio::test]
async fn test_commands_keep_their_order() {
    let connector = FakeConnector::with_plan(vec![Failure::DieAfter(0), Failure::DieAfter(3)]);
    let manager = ConnectionManager::new(connector.clone(), &config(32));
    let _token = manager.acquire().await.unwrap();
    let sender = manager.command_sender::<TestTrack>();

    let commands = vec![
        ClientCommand::Play,
        ClientCommand::SeekTo { position_ms: 90_000 },
        ClientCommand::SkipToIndex { index: 4 },
        ClientCommand::Pause,
    ];
    for command in &commands {
        sender.send(command).await.unwrap();
    }

    let decoded = decode_all(&connector.delivered());
    let mut deduped = decoded.clone();
    deduped.dedup();
    assert_eq!(deduped, commands);
}

#[tokio::test]
async fn test_other_failures_are_not_retried() {
    let connector = FakeConnector::with_plan(vec![Failure::Reject]);
    let manager = ConnectionManager::new(connector.clone(), &config(1024));
    let _token = manager.acquire().await.unwrap();

    let result = manager
        .command_sender::<TestTrack>()
        .send(&ClientCommand::Play)
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Bridge(BridgeError::OperationFailed(_)))
    ));
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_stale_death_report_is_ignored() {
    let connector = FakeConnector::with_plan(Vec::new());
    let manager = ConnectionManager::new(connector.clone(), &config(1024));
    let _token = manager.acquire().await.unwrap();

    let stale: Arc<dyn ServiceChannel> = connector.channel(0);
    manager.report_dead(&stale).await.unwrap();
    assert_eq!(connector.connects(), 2);

    // The replacement stays bound
    manager.report_dead(&stale).await.unwrap();
    assert_eq!(connector.connects(), 2);
}
