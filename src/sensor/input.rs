use crate::door::DoorId;
use crate::error::HardwareError;

/// Logical sensor levels for one door, already corrected for wiring polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub open: bool,
    pub close: bool,
    pub lock: bool,
}

impl RawSample {
    pub fn new(open: bool, close: bool, lock: bool) -> Self {
        Self { open, close, lock }
    }
}

/// Source of raw sensor readings.
///
/// Implementations return [`HardwareError::Missing`] when the sensors for a
/// door are not present at all; the sampler treats that as permanent.
pub trait SensorInput: Send + Sync {
    fn read(&self, door_id: DoorId) -> Result<RawSample, HardwareError>;
}
