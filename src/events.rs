use crate::door::{DoorId, DoorStatus};
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Relay channel on a door unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Door,
    Light,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Door => write!(f, "door"),
            Channel::Light => write!(f, "light"),
        }
    }
}

/// Events that can occur in the garage controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GarageEvent {
    /// A door's derived status or lock projection changed
    DoorStateChanged {
        door_id: DoorId,
        previous: DoorStatus,
        status: DoorStatus,
        lock_engaged: bool,
        timestamp: SystemTime,
    },
    /// A command was accepted and its relay pulse started
    CommandAccepted {
        door_id: DoorId,
        channel: Channel,
        timestamp: SystemTime,
    },
    /// A command arrived inside the cooldown window and was dropped
    CommandDropped { door_id: DoorId, channel: Channel },
    /// A relay pulse finished and the relay is idle again
    PulseEnded { door_id: DoorId, channel: Channel },
    /// An observer session connected
    ObserverConnected { session_id: String },
    /// An observer session disconnected or was evicted
    ObserverDisconnected { session_id: String, evicted: bool },
    /// Sensor hardware for a door is missing; the door is latched to FAULT
    HardwareFault { door_id: DoorId, details: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl GarageEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            GarageEvent::DoorStateChanged {
                door_id,
                previous,
                status,
                lock_engaged,
                ..
            } => format!(
                "Door {} {} -> {} ({})",
                door_id,
                previous,
                status,
                if *lock_engaged { "locked" } else { "unlocked" }
            ),
            GarageEvent::CommandAccepted {
                door_id, channel, ..
            } => format!("Door {} {} command accepted", door_id, channel),
            GarageEvent::CommandDropped { door_id, channel } => {
                format!("Door {} {} command dropped (cooldown)", door_id, channel)
            }
            GarageEvent::PulseEnded { door_id, channel } => {
                format!("Door {} {} pulse ended", door_id, channel)
            }
            GarageEvent::ObserverConnected { session_id } => {
                format!("Observer {} connected", session_id)
            }
            GarageEvent::ObserverDisconnected {
                session_id,
                evicted,
            } => {
                if *evicted {
                    format!("Observer {} evicted", session_id)
                } else {
                    format!("Observer {} disconnected", session_id)
                }
            }
            GarageEvent::HardwareFault { door_id, details } => {
                format!("Door {} hardware fault: {}", door_id, details)
            }
            GarageEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            GarageEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            GarageEvent::DoorStateChanged { .. } => "door_state_changed",
            GarageEvent::CommandAccepted { .. } => "command_accepted",
            GarageEvent::CommandDropped { .. } => "command_dropped",
            GarageEvent::PulseEnded { .. } => "pulse_ended",
            GarageEvent::ObserverConnected { .. } => "observer_connected",
            GarageEvent::ObserverDisconnected { .. } => "observer_disconnected",
            GarageEvent::HardwareFault { .. } => "hardware_fault",
            GarageEvent::SystemError { .. } => "system_error",
            GarageEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Door the event refers to, if any
    pub fn door_id(&self) -> Option<DoorId> {
        match self {
            GarageEvent::DoorStateChanged { door_id, .. }
            | GarageEvent::CommandAccepted { door_id, .. }
            | GarageEvent::CommandDropped { door_id, .. }
            | GarageEvent::PulseEnded { door_id, .. }
            | GarageEvent::HardwareFault { door_id, .. } => Some(*door_id),
            _ => None,
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<GarageEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<GarageEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: GarageEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            GarageEvent::DoorStateChanged { .. } | GarageEvent::CommandAccepted { .. } => {
                info!("{}", event.description());
            }
            GarageEvent::HardwareFault { door_id, details } => {
                error!("Hardware fault on door {}: {}", door_id, details);
            }
            GarageEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            GarageEvent::ObserverDisconnected {
                session_id,
                evicted: true,
            } => {
                warn!("Observer {} evicted after send failure", session_id);
            }
            GarageEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events concerning specific doors
    Doors(Vec<DoorId>),
    /// Custom filter function
    Custom(fn(&GarageEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &GarageEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Doors(doors) => event
                .door_id()
                .map(|door_id| doors.contains(&door_id))
                .unwrap_or(false),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<GarageEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<GarageEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<GarageEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<GarageEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn state_changed(door_id: DoorId) -> GarageEvent {
        GarageEvent::DoorStateChanged {
            door_id,
            previous: DoorStatus::Closed,
            status: DoorStatus::Transition,
            lock_engaged: false,
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(state_changed(1)).unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            GarageEvent::DoorStateChanged {
                door_id, status, ..
            } => {
                assert_eq!(door_id, 1);
                assert_eq!(status, DoorStatus::Transition);
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(GarageEvent::PulseEnded {
                door_id: 2,
                channel: Channel::Light,
            })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);

        assert!(!event_bus.has_subscribers());
        assert!(event_bus.publish(state_changed(1)).is_err());
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["door_state_changed"]);

        assert!(filter.matches(&state_changed(1)));
        assert!(!filter.matches(&GarageEvent::CommandDropped {
            door_id: 1,
            channel: Channel::Door,
        }));

        let door_filter = EventFilter::Doors(vec![2]);
        assert!(door_filter.matches(&state_changed(2)));
        assert!(!door_filter.matches(&state_changed(1)));
        assert!(!door_filter.matches(&GarageEvent::ObserverConnected {
            session_id: "abc".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let receiver = event_bus.subscribe();
        let filter = EventFilter::EventTypes(vec!["door_state_changed"]);
        let mut filtered_receiver = EventReceiver::new(receiver, filter, "test".to_string());

        event_bus
            .publish(GarageEvent::CommandDropped {
                door_id: 1,
                channel: Channel::Door,
            })
            .unwrap();
        event_bus.publish(state_changed(2)).unwrap();

        let event = timeout(Duration::from_millis(100), filtered_receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "door_state_changed");
        assert_eq!(event.door_id(), Some(2));
        assert!(filtered_receiver.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_skipped_events() {
        let event_bus = EventBus::new(2);
        let receiver = event_bus.subscribe();
        let mut filtered_receiver =
            EventReceiver::new(receiver, EventFilter::All, "laggard".to_string());

        for _ in 0..5 {
            event_bus.publish(state_changed(1)).unwrap();
        }

        match filtered_receiver.recv().await {
            Err(EventBusError::Lagged { skipped }) => assert_eq!(skipped, 3),
            other => panic!("Expected lag, got {:?}", other),
        }
    }
}
