use super::{Debouncer, SensorInput};
use crate::door::{DoorId, DoorStateChange, DoorTable};
use crate::events::{EventBus, GarageEvent};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct DoorFilters {
    open: Debouncer,
    close: Debouncer,
    lock: Debouncer,
    faulted: bool,
}

impl DoorFilters {
    fn new(threshold: u32) -> Self {
        Self {
            open: Debouncer::new(threshold),
            close: Debouncer::new(threshold),
            lock: Debouncer::new(threshold),
            faulted: false,
        }
    }
}

/// Polls every door's sensors, debounces them and pushes accepted values
/// into the door table.
pub struct SensorSampler {
    table: Arc<DoorTable>,
    input: Arc<dyn SensorInput>,
    event_bus: Arc<EventBus>,
    sample_interval: Duration,
    filters: BTreeMap<DoorId, Mutex<DoorFilters>>,
}

impl SensorSampler {
    pub fn new(
        table: Arc<DoorTable>,
        input: Arc<dyn SensorInput>,
        event_bus: Arc<EventBus>,
        sample_interval: Duration,
        debounce_samples: u32,
    ) -> Self {
        let filters = table
            .ids()
            .into_iter()
            .map(|id| (id, Mutex::new(DoorFilters::new(debounce_samples))))
            .collect();

        Self {
            table,
            input,
            event_bus,
            sample_interval,
            filters,
        }
    }

    /// Sample every door once and return the transitions that resulted
    pub fn sample_once(&self) -> Vec<DoorStateChange> {
        self.filters
            .keys()
            .filter_map(|&door_id| self.sample_door(door_id))
            .collect()
    }

    /// Sample a single door
    pub fn sample_door(&self, door_id: DoorId) -> Option<DoorStateChange> {
        let mut filters = self.filters.get(&door_id)?.lock();
        if filters.faulted {
            return None;
        }

        let raw = match self.input.read(door_id) {
            Ok(raw) => raw,
            Err(e) if e.is_missing() => {
                filters.faulted = true;
                drop(filters);
                return self.latch_fault(door_id, e.to_string());
            }
            Err(e) => {
                warn!("Skipping sample for door {}: {}", door_id, e);
                return None;
            }
        };

        let open_changed = filters.open.sample(raw.open).is_some();
        let close_changed = filters.close.sample(raw.close).is_some();
        let lock_changed = filters.lock.sample(raw.lock).is_some();

        if !(open_changed || close_changed || lock_changed) {
            return None;
        }

        let open = filters.open.accepted().unwrap_or(false);
        let close = filters.close.accepted().unwrap_or(false);
        let lock = filters.lock.accepted().unwrap_or(false);
        drop(filters);

        debug!(
            "Door {} accepted sensors open={} close={} lock={}",
            door_id, open, close, lock
        );

        let change = self
            .table
            .with_door(door_id, |unit| unit.apply_sensors(open, close, lock))
            .flatten()?;
        self.publish_change(change);
        Some(change)
    }

    fn latch_fault(&self, door_id: DoorId, details: String) -> Option<DoorStateChange> {
        let _ = self
            .event_bus
            .publish(GarageEvent::HardwareFault { door_id, details });

        let change = self
            .table
            .with_door(door_id, |unit| unit.latch_hardware_fault())
            .flatten()?;
        self.publish_change(change);
        Some(change)
    }

    fn publish_change(&self, change: DoorStateChange) {
        let _ = self.event_bus.publish(GarageEvent::DoorStateChanged {
            door_id: change.door_id,
            previous: change.previous,
            status: change.status,
            lock_engaged: change.lock_engaged,
            timestamp: SystemTime::now(),
        });
    }

    /// Sample at the configured interval until cancelled
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            "Sensor sampler running every {:?} for {} doors",
            self.sample_interval,
            self.filters.len()
        );

        let mut ticker = interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("Sensor sampler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.sample_once();
                }
            }
        }
    }

    /// Spawn the sampling loop
    pub fn start(self: &Arc<Self>, cancellation_token: CancellationToken) -> JoinHandle<()> {
        let sampler = Arc::clone(self);
        tokio::spawn(async move { sampler.run(cancellation_token).await })
    }
}
