use super::{DoorId, DoorStatus};
use crate::events::Channel;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// One physical door: its accepted sensor values, the derived status and
/// the bookkeeping for relay pulses.
#[derive(Debug, Clone)]
pub struct DoorUnit {
    id: DoorId,
    pub(crate) open_sensor: bool,
    pub(crate) close_sensor: bool,
    pub(crate) lock_sensor: bool,
    status: DoorStatus,
    lock_engaged: bool,
    pub(crate) door_pulse_active: bool,
    pub(crate) light_pulse_active: bool,
    pub(crate) last_door_command: Option<Instant>,
    pub(crate) last_light_command: Option<Instant>,
    hardware_fault: bool,
    last_changed: Option<DateTime<Utc>>,
}

/// A status or lock transition produced by a recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorStateChange {
    pub door_id: DoorId,
    pub previous: DoorStatus,
    pub status: DoorStatus,
    pub lock_engaged: bool,
}

impl DoorUnit {
    /// Status is unknown until the first sensor read and reported as TRANSITION
    pub fn new(id: DoorId) -> Self {
        Self {
            id,
            open_sensor: false,
            close_sensor: false,
            lock_sensor: false,
            status: DoorStatus::Transition,
            lock_engaged: false,
            door_pulse_active: false,
            light_pulse_active: false,
            last_door_command: None,
            last_light_command: None,
            hardware_fault: false,
            last_changed: None,
        }
    }

    pub fn id(&self) -> DoorId {
        self.id
    }

    pub fn status(&self) -> DoorStatus {
        self.status
    }

    pub fn lock_engaged(&self) -> bool {
        self.lock_engaged
    }

    pub fn open_sensor(&self) -> bool {
        self.open_sensor
    }

    pub fn close_sensor(&self) -> bool {
        self.close_sensor
    }

    pub fn hardware_fault(&self) -> bool {
        self.hardware_fault
    }

    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.last_changed
    }

    pub fn pulse_active(&self, channel: Channel) -> bool {
        match channel {
            Channel::Door => self.door_pulse_active,
            Channel::Light => self.light_pulse_active,
        }
    }

    /// Store accepted sensor values and recompute the derived state
    pub fn apply_sensors(
        &mut self,
        open_sensor: bool,
        close_sensor: bool,
        lock_sensor: bool,
    ) -> Option<DoorStateChange> {
        if self.hardware_fault {
            return None;
        }
        self.open_sensor = open_sensor;
        self.close_sensor = close_sensor;
        self.lock_sensor = lock_sensor;
        self.recompute()
    }

    /// Derive status and lock projection from the current sensor values.
    ///
    /// Returns a change only when the status or the lock projection actually
    /// moved, so repeated calls with the same inputs are no-ops.
    pub fn recompute(&mut self) -> Option<DoorStateChange> {
        let status = DoorStatus::from_sensors(self.open_sensor, self.close_sensor);
        let lock_engaged = self.lock_sensor;

        if status == self.status && lock_engaged == self.lock_engaged {
            return None;
        }

        let previous = self.status;
        self.status = status;
        self.lock_engaged = lock_engaged;
        self.last_changed = Some(Utc::now());

        Some(DoorStateChange {
            door_id: self.id,
            previous,
            status,
            lock_engaged,
        })
    }

    /// Latch the door into a permanent FAULT after its sensor hardware went
    /// missing. Both limit bits are reported asserted so observers derive
    /// FAULT from the wire bits alone.
    pub fn latch_hardware_fault(&mut self) -> Option<DoorStateChange> {
        if self.hardware_fault {
            return None;
        }
        self.open_sensor = true;
        self.close_sensor = true;
        let change = self.recompute();
        self.hardware_fault = true;
        change
    }

    /// Whether a command on `channel` issued at `now` falls inside the
    /// cooldown window of the previous accepted one
    pub fn in_cooldown(&self, channel: Channel, now: Instant, cooldown: std::time::Duration) -> bool {
        let last = match channel {
            Channel::Door => self.last_door_command,
            Channel::Light => self.last_light_command,
        };
        last.map(|at| now.saturating_duration_since(at) < cooldown)
            .unwrap_or(false)
    }

    /// Record an accepted command and mark its pulse active
    pub(crate) fn begin_pulse(&mut self, channel: Channel, now: Instant) {
        match channel {
            Channel::Door => {
                self.last_door_command = Some(now);
                self.door_pulse_active = true;
            }
            Channel::Light => {
                self.last_light_command = Some(now);
                self.light_pulse_active = true;
            }
        }
    }

    pub(crate) fn end_pulse(&mut self, channel: Channel) {
        match channel {
            Channel::Door => self.door_pulse_active = false,
            Channel::Light => self.light_pulse_active = false,
        }
    }

    /// Undo `begin_pulse` when the relay could not be energized
    pub(crate) fn abort_pulse(&mut self, channel: Channel) {
        match channel {
            Channel::Door => {
                self.last_door_command = None;
                self.door_pulse_active = false;
            }
            Channel::Light => {
                self.last_light_command = None;
                self.light_pulse_active = false;
            }
        }
    }
}
