//! In-process garage model used when no GPIO hardware is available.
//!
//! Each simulated door starts closed and unlocked. A rising edge on the door
//! relay starts travel toward the opposite limit (or stops a moving door,
//! as real openers do); the limit switch for the target is asserted once the
//! configured travel time has elapsed. Without a travel time, sensors only
//! change through the setters, which is what the tests use.

use crate::actuator::Actuator;
use crate::door::DoorId;
use crate::error::HardwareError;
use crate::events::Channel;
use crate::sensor::{RawSample, SensorInput};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
enum Motion {
    Idle,
    Travelling { target_open: bool, arrives: Instant },
}

#[derive(Debug)]
struct SimulatedDoor {
    sensors: RawSample,
    missing: bool,
    motion: Motion,
    last_target_open: bool,
    door_relay: bool,
    light_relay: bool,
    light_on: bool,
    door_pulses: usize,
    light_pulses: usize,
}

impl SimulatedDoor {
    fn new() -> Self {
        Self {
            sensors: RawSample::new(false, true, false),
            missing: false,
            motion: Motion::Idle,
            last_target_open: false,
            door_relay: false,
            light_relay: false,
            light_on: false,
            door_pulses: 0,
            light_pulses: 0,
        }
    }

    fn advance(&mut self, now: Instant) {
        if let Motion::Travelling {
            target_open,
            arrives,
        } = self.motion
        {
            if now >= arrives {
                self.sensors.open = target_open;
                self.sensors.close = !target_open;
                self.motion = Motion::Idle;
            }
        }
    }

    fn start_motion(&mut self, travel: Duration, now: Instant) {
        self.advance(now);
        match self.motion {
            Motion::Travelling { .. } => {
                // A pulse while moving stops the door where it is
                self.motion = Motion::Idle;
            }
            Motion::Idle => {
                let target_open = match (self.sensors.open, self.sensors.close) {
                    (false, true) => true,
                    (true, false) => false,
                    _ => !self.last_target_open,
                };
                self.last_target_open = target_open;
                self.sensors.open = false;
                self.sensors.close = false;
                self.motion = Motion::Travelling {
                    target_open,
                    arrives: now + travel,
                };
            }
        }
    }
}

/// Simulated sensors and relays for a fixed set of doors
pub struct SimulatedGarage {
    doors: BTreeMap<DoorId, Mutex<SimulatedDoor>>,
    travel: Option<Duration>,
}

impl SimulatedGarage {
    /// Doors move on their own after a pulse, taking `travel` per stroke
    pub fn new<I: IntoIterator<Item = DoorId>>(ids: I, travel: Duration) -> Self {
        let garage = Self::build(ids, Some(travel));
        info!(
            "Simulated garage with {} doors, travel time {:?}",
            garage.doors.len(),
            travel
        );
        garage
    }

    /// Sensors never change on their own
    pub fn manual<I: IntoIterator<Item = DoorId>>(ids: I) -> Self {
        Self::build(ids, None)
    }

    fn build<I: IntoIterator<Item = DoorId>>(ids: I, travel: Option<Duration>) -> Self {
        let doors = ids
            .into_iter()
            .map(|id| (id, Mutex::new(SimulatedDoor::new())))
            .collect();
        Self { doors, travel }
    }

    fn door(&self, door_id: DoorId) -> Result<&Mutex<SimulatedDoor>, HardwareError> {
        self.doors.get(&door_id).ok_or_else(|| HardwareError::Missing {
            device: format!("simulated door {}", door_id),
        })
    }

    pub fn set_sensors(&self, door_id: DoorId, open: bool, close: bool) {
        if let Ok(door) = self.door(door_id) {
            let mut door = door.lock();
            door.sensors.open = open;
            door.sensors.close = close;
            door.motion = Motion::Idle;
        }
    }

    pub fn set_lock(&self, door_id: DoorId, locked: bool) {
        if let Ok(door) = self.door(door_id) {
            door.lock().sensors.lock = locked;
        }
    }

    /// Make the door's sensors disappear, as if unplugged
    pub fn disconnect(&self, door_id: DoorId) {
        if let Ok(door) = self.door(door_id) {
            door.lock().missing = true;
        }
    }

    pub fn pulse_count(&self, door_id: DoorId, channel: Channel) -> usize {
        self.door(door_id)
            .map(|door| {
                let door = door.lock();
                match channel {
                    Channel::Door => door.door_pulses,
                    Channel::Light => door.light_pulses,
                }
            })
            .unwrap_or(0)
    }

    pub fn relay_energized(&self, door_id: DoorId, channel: Channel) -> bool {
        self.door(door_id)
            .map(|door| {
                let door = door.lock();
                match channel {
                    Channel::Door => door.door_relay,
                    Channel::Light => door.light_relay,
                }
            })
            .unwrap_or(false)
    }

    pub fn light_on(&self, door_id: DoorId) -> bool {
        self.door(door_id)
            .map(|door| door.lock().light_on)
            .unwrap_or(false)
    }
}

impl SensorInput for SimulatedGarage {
    fn read(&self, door_id: DoorId) -> Result<RawSample, HardwareError> {
        let mut door = self.door(door_id)?.lock();
        if door.missing {
            return Err(HardwareError::Missing {
                device: format!("simulated door {} sensors", door_id),
            });
        }
        door.advance(Instant::now());
        Ok(door.sensors)
    }
}

impl Actuator for SimulatedGarage {
    fn set(&self, door_id: DoorId, channel: Channel, energized: bool) -> Result<(), HardwareError> {
        let mut door = self.door(door_id)?.lock();
        let now = Instant::now();

        match channel {
            Channel::Door => {
                let rising = energized && !door.door_relay;
                door.door_relay = energized;
                if rising {
                    door.door_pulses += 1;
                    if let Some(travel) = self.travel {
                        door.start_motion(travel, now);
                    }
                }
            }
            Channel::Light => {
                let rising = energized && !door.light_relay;
                door.light_relay = energized;
                if rising {
                    door.light_pulses += 1;
                    door.light_on = !door.light_on;
                }
            }
        }

        debug!(
            "Simulated door {} {} relay {}",
            door_id,
            channel,
            if energized { "on" } else { "off" }
        );
        Ok(())
    }

    fn release_all(&self) {
        for door in self.doors.values() {
            let mut door = door.lock();
            door.door_relay = false;
            door.light_relay = false;
        }
    }
}
