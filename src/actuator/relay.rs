use crate::config::{DoorConfig, HardwareConfig};
use crate::door::DoorId;
use crate::error::HardwareError;
use crate::events::Channel;
use crate::gpio::{Direction, GpioPin};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Relay outputs for door motors and lights.
///
/// Door hardware interprets a pulse on the door relay as "toggle motion";
/// the light relay likewise toggles the opener light.
pub trait Actuator: Send + Sync {
    fn set(&self, door_id: DoorId, channel: Channel, energized: bool) -> Result<(), HardwareError>;

    /// De-energize every relay, used on shutdown
    fn release_all(&self);
}

struct DoorRelays {
    command: GpioPin,
    light: GpioPin,
}

/// Relays driven through sysfs GPIO outputs (active high)
pub struct SysfsRelays {
    doors: BTreeMap<DoorId, DoorRelays>,
}

impl SysfsRelays {
    pub fn new(hardware: &HardwareConfig, doors: &[DoorConfig]) -> Self {
        let mut relays = BTreeMap::new();

        for door in doors {
            let pins = DoorRelays {
                command: GpioPin::new(&hardware.gpio_root, door.command_pin),
                light: GpioPin::new(&hardware.gpio_root, door.light_pin),
            };

            for pin in [&pins.command, &pins.light] {
                let configured = pin.open(Direction::Out).and_then(|_| pin.write(false));
                if let Err(e) = configured {
                    error!(
                        "Failed to configure relay GPIO {} for door {}: {}",
                        pin.number(),
                        door.id,
                        e
                    );
                }
            }

            info!(
                "Door {} relays: command=GPIO{} light=GPIO{}",
                door.id, door.command_pin, door.light_pin
            );
            relays.insert(door.id, pins);
        }

        Self { doors: relays }
    }

    fn pin(&self, door_id: DoorId, channel: Channel) -> Result<&GpioPin, HardwareError> {
        let relays = self.doors.get(&door_id).ok_or_else(|| HardwareError::Missing {
            device: format!("door {} relays", door_id),
        })?;
        Ok(match channel {
            Channel::Door => &relays.command,
            Channel::Light => &relays.light,
        })
    }
}

impl Actuator for SysfsRelays {
    fn set(&self, door_id: DoorId, channel: Channel, energized: bool) -> Result<(), HardwareError> {
        let pin = self.pin(door_id, channel)?;
        pin.write(energized)?;
        debug!(
            "Door {} {} relay (GPIO{}) {}",
            door_id,
            channel,
            pin.number(),
            if energized { "energized" } else { "released" }
        );
        Ok(())
    }

    fn release_all(&self) {
        for (door_id, relays) in &self.doors {
            for pin in [&relays.command, &relays.light] {
                if let Err(e) = pin.write(false) {
                    warn!(
                        "Failed to release GPIO {} for door {}: {}",
                        pin.number(),
                        door_id,
                        e
                    );
                }
            }
        }
    }
}
