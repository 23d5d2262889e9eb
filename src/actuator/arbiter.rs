use super::Actuator;
use crate::door::{DoorId, DoorTable};
use crate::error::{GarageError, Result};
use crate::events::{Channel, EventBus, GarageEvent};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

/// What happened to one channel of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    NotRequested,
    Accepted,
    /// Arrived inside the cooldown window; dropped without error
    Dropped,
    /// The relay could not be driven; the other channel may still have pulsed
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub door: Disposition,
    pub light: Disposition,
}

impl CommandOutcome {
    pub fn pulses(&self) -> usize {
        [self.door, self.light]
            .iter()
            .filter(|d| **d == Disposition::Accepted)
            .count()
    }
}

/// Accepts toggle commands from any client and turns them into relay
/// pulses, enforcing a per-door, per-channel cooldown.
///
/// Submission never waits for the pulse to finish or for the door to move;
/// the pulse end is a deferred task and the resulting motion is observed
/// later through the sensor sampler.
#[derive(Clone)]
pub struct CommandArbiter {
    table: Arc<DoorTable>,
    actuator: Arc<dyn Actuator>,
    event_bus: Arc<EventBus>,
    cooldown: Duration,
    pulse_duration: Duration,
}

impl CommandArbiter {
    pub fn new(
        table: Arc<DoorTable>,
        actuator: Arc<dyn Actuator>,
        event_bus: Arc<EventBus>,
        cooldown: Duration,
        pulse_duration: Duration,
    ) -> Self {
        Self {
            table,
            actuator,
            event_bus,
            cooldown,
            pulse_duration,
        }
    }

    /// Submit a command for one door. Must be called from within a Tokio
    /// runtime since accepted pulses schedule their own release.
    pub fn submit(
        &self,
        door_id: DoorId,
        toggle_door: bool,
        toggle_light: bool,
    ) -> Result<CommandOutcome> {
        if !self.table.contains(door_id) {
            error!("Rejected command for unknown door {}", door_id);
            return Err(GarageError::InvalidTarget {
                door_id: door_id.into(),
            });
        }

        let door = toggle_door.then(|| self.request(door_id, Channel::Door));
        let light = toggle_light.then(|| self.request(door_id, Channel::Light));

        // Only an error when nothing went through
        let any_handled = door.iter().chain(light.iter()).any(|r| r.is_ok());
        if !any_handled {
            for result in [door, light].into_iter().flatten() {
                result?;
            }
            return Ok(CommandOutcome {
                door: Disposition::NotRequested,
                light: Disposition::NotRequested,
            });
        }

        Ok(CommandOutcome {
            door: disposition(door),
            light: disposition(light),
        })
    }

    fn request(&self, door_id: DoorId, channel: Channel) -> Result<Disposition> {
        let now = Instant::now();
        let cooldown = self.cooldown;

        let accepted = self
            .table
            .with_door(door_id, |unit| {
                if unit.in_cooldown(channel, now, cooldown) {
                    false
                } else {
                    unit.begin_pulse(channel, now);
                    true
                }
            })
            .ok_or(GarageError::InvalidTarget {
                door_id: door_id.into(),
            })?;

        if !accepted {
            debug!(
                "Dropping door {} {} command inside {:?} cooldown",
                door_id, channel, cooldown
            );
            let _ = self
                .event_bus
                .publish(GarageEvent::CommandDropped { door_id, channel });
            return Ok(Disposition::Dropped);
        }

        if let Err(e) = self.actuator.set(door_id, channel, true) {
            self.table
                .with_door(door_id, |unit| unit.abort_pulse(channel));
            let _ = self.event_bus.publish(GarageEvent::SystemError {
                component: "command_arbiter".to_string(),
                error: format!("Door {} {} relay failed: {}", door_id, channel, e),
            });
            return Err(e.into());
        }

        let _ = self.event_bus.publish(GarageEvent::CommandAccepted {
            door_id,
            channel,
            timestamp: SystemTime::now(),
        });
        self.schedule_release(door_id, channel);

        Ok(Disposition::Accepted)
    }

    fn schedule_release(&self, door_id: DoorId, channel: Channel) {
        let table = Arc::clone(&self.table);
        let actuator = Arc::clone(&self.actuator);
        let event_bus = Arc::clone(&self.event_bus);
        let pulse_duration = self.pulse_duration;

        tokio::spawn(async move {
            sleep(pulse_duration).await;

            if let Err(e) = actuator.set(door_id, channel, false) {
                error!("Failed to release door {} {} relay: {}", door_id, channel, e);
            }
            table.with_door(door_id, |unit| unit.end_pulse(channel));

            info!("Door {} {} pulse complete", door_id, channel);
            let _ = event_bus.publish(GarageEvent::PulseEnded { door_id, channel });
        });
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn pulse_duration(&self) -> Duration {
        self.pulse_duration
    }
}

fn disposition(result: Option<Result<Disposition>>) -> Disposition {
    match result {
        None => Disposition::NotRequested,
        Some(Ok(disposition)) => disposition,
        Some(Err(_)) => Disposition::Failed,
    }
}
