use super::{ObserverSession, SessionId};
use crate::door::DoorTable;
use crate::events::{EventBus, EventFilter, EventReceiver, GarageEvent};
use crate::error::EventBusError;
use crate::protocol::StateSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Broadcaster statistics
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub active_sessions: u32,
    pub total_sessions: u64,
    pub broadcasts: u64,
    pub messages_sent: u64,
    pub evictions: u64,
    pub last_broadcast: Option<Instant>,
}

/// Pushes the combined state of all doors to every connected observer.
///
/// Each session owns a bounded queue. Messages are queued while the session
/// map is locked, so two broadcasts can never reach a session out of order.
/// A session whose queue is closed or full is evicted; the others are not
/// affected.
pub struct StateBroadcaster {
    table: Arc<DoorTable>,
    event_bus: Arc<EventBus>,
    queue_capacity: usize,
    sessions: Mutex<HashMap<SessionId, mpsc::Sender<String>>>,
    stats: Mutex<BroadcastStats>,
}

impl StateBroadcaster {
    pub fn new(table: Arc<DoorTable>, event_bus: Arc<EventBus>, queue_capacity: usize) -> Self {
        Self {
            table,
            event_bus,
            queue_capacity: queue_capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
            stats: Mutex::new(BroadcastStats::default()),
        }
    }

    /// Current state of every door
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from_readings(&self.table.readings())
    }

    /// Register a new observer. Its queue already holds the full state.
    pub fn connect(&self) -> ObserverSession {
        let id = SessionId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        {
            let mut sessions = self.sessions.lock();
            // Fresh queue with capacity >= 1, cannot fail
            let _ = sender.try_send(self.snapshot().to_message());
            sessions.insert(id, sender);

            let mut stats = self.stats.lock();
            stats.active_sessions = sessions.len() as u32;
            stats.total_sessions += 1;
            stats.messages_sent += 1;
        }

        info!("Observer {} connected", id);
        let _ = self.event_bus.publish(GarageEvent::ObserverConnected {
            session_id: id.to_string(),
        });

        ObserverSession::new(id, receiver)
    }

    /// Drop a session. Returns false if it was already gone.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock();
            let removed = sessions.remove(&id).is_some();
            self.stats.lock().active_sessions = sessions.len() as u32;
            removed
        };

        if removed {
            info!("Observer {} disconnected", id);
            let _ = self.event_bus.publish(GarageEvent::ObserverDisconnected {
                session_id: id.to_string(),
                evicted: false,
            });
        }
        removed
    }

    /// Re-send the full state to one session (the LoadTrigger handshake)
    pub fn send_snapshot_to(&self, id: SessionId) -> bool {
        let outcome = {
            let mut sessions = self.sessions.lock();
            let Some(sender) = sessions.get(&id) else {
                return false;
            };

            if sender.try_send(self.snapshot().to_message()).is_ok() {
                self.stats.lock().messages_sent += 1;
                true
            } else {
                sessions.remove(&id);
                let mut stats = self.stats.lock();
                stats.active_sessions = sessions.len() as u32;
                stats.evictions += 1;
                false
            }
        };

        if !outcome {
            self.report_eviction(id);
        }
        outcome
    }

    /// Send the current state to every session, returning how many accepted
    /// it.
    pub fn broadcast(&self) -> usize {
        let (delivered, evicted) = {
            let mut sessions = self.sessions.lock();
            let message = self.snapshot().to_message();
            let mut evicted = Vec::new();

            sessions.retain(|id, sender| {
                if sender.try_send(message.clone()).is_ok() {
                    true
                } else {
                    evicted.push(*id);
                    false
                }
            });

            let mut stats = self.stats.lock();
            stats.active_sessions = sessions.len() as u32;
            stats.broadcasts += 1;
            stats.messages_sent += sessions.len() as u64;
            stats.evictions += evicted.len() as u64;
            stats.last_broadcast = Some(Instant::now());

            (sessions.len(), evicted)
        };

        debug!("Broadcast state to {} observers", delivered);
        for id in evicted {
            self.report_eviction(id);
        }
        delivered
    }

    fn report_eviction(&self, id: SessionId) {
        warn!("Evicting observer {}: outbound queue closed or full", id);
        let _ = self.event_bus.publish(GarageEvent::ObserverDisconnected {
            session_id: id.to_string(),
            evicted: true,
        });
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn stats(&self) -> BroadcastStats {
        self.stats.lock().clone()
    }

    fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["door_state_changed"]),
            "state_broadcaster".to_string(),
        )
    }

    /// Broadcast on every door state change until cancelled
    pub async fn run(&self, token: CancellationToken) {
        let receiver = self.subscribe();
        self.run_with(receiver, token).await;
    }

    /// Spawn the broadcast loop. The event subscription is taken before this
    /// returns, so no state change published afterwards is missed.
    pub fn start(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let receiver = self.subscribe();
        let broadcaster = Arc::clone(self);
        tokio::spawn(async move { broadcaster.run_with(receiver, token).await })
    }

    async fn run_with(&self, mut receiver: EventReceiver, token: CancellationToken) {
        info!("State broadcaster started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = receiver.recv() => match event {
                    Ok(_) => {
                        self.broadcast();
                    }
                    Err(EventBusError::Lagged { skipped }) => {
                        // Snapshots are complete, one catches up on everything
                        debug!("Broadcaster skipped {} state changes", skipped);
                        self.broadcast();
                    }
                    Err(_) => break,
                },
            }
        }

        info!("State broadcaster stopped");
    }
}
