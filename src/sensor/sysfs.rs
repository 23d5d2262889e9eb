use super::{RawSample, SensorInput};
use crate::config::{DoorConfig, HardwareConfig};
use crate::door::DoorId;
use crate::error::HardwareError;
use crate::gpio::{Direction, GpioPin};
use std::collections::BTreeMap;
use tracing::{error, info};

struct DoorInputs {
    open: GpioPin,
    close: GpioPin,
    lock: GpioPin,
}

/// Limit and lock switches read from sysfs GPIO lines
pub struct SysfsSensors {
    doors: BTreeMap<DoorId, DoorInputs>,
    active_low: bool,
}

impl SysfsSensors {
    /// Configure every door's input lines. A door whose lines cannot be set
    /// up is still registered; its reads fail and the sampler faults it.
    pub fn new(hardware: &HardwareConfig, doors: &[DoorConfig]) -> Self {
        let mut inputs = BTreeMap::new();

        for door in doors {
            let pins = DoorInputs {
                open: GpioPin::new(&hardware.gpio_root, door.open_pin),
                close: GpioPin::new(&hardware.gpio_root, door.close_pin),
                lock: GpioPin::new(&hardware.gpio_root, door.lock_pin),
            };

            for pin in [&pins.open, &pins.close, &pins.lock] {
                if let Err(e) = pin.open(Direction::In) {
                    error!(
                        "Failed to configure GPIO {} for door {}: {}",
                        pin.number(),
                        door.id,
                        e
                    );
                }
            }

            info!(
                "Door {} inputs: open=GPIO{} close=GPIO{} lock=GPIO{}",
                door.id, door.open_pin, door.close_pin, door.lock_pin
            );
            inputs.insert(door.id, pins);
        }

        Self {
            doors: inputs,
            active_low: hardware.inputs_active_low,
        }
    }

    fn level(&self, pin: &GpioPin) -> Result<bool, HardwareError> {
        Ok(pin.read()? != self.active_low)
    }
}

impl SensorInput for SysfsSensors {
    fn read(&self, door_id: DoorId) -> Result<RawSample, HardwareError> {
        let pins = self.doors.get(&door_id).ok_or_else(|| HardwareError::Missing {
            device: format!("door {} inputs", door_id),
        })?;

        Ok(RawSample {
            open: self.level(&pins.open)?,
            close: self.level(&pins.close)?,
            lock: self.level(&pins.lock)?,
        })
    }
}
