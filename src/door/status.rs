use serde::{Deserialize, Serialize};

/// Discrete door status derived from the open/closed limit switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorStatus {
    /// Neither limit reached; the door is moving or stopped midway
    Transition,
    Open,
    Closed,
    /// Both limits asserted at once
    Fault,
}

impl DoorStatus {
    pub fn from_sensors(open_sensor: bool, close_sensor: bool) -> Self {
        match (open_sensor, close_sensor) {
            (false, false) => DoorStatus::Transition,
            (true, false) => DoorStatus::Open,
            (false, true) => DoorStatus::Closed,
            (true, true) => DoorStatus::Fault,
        }
    }

    /// The `(open, closed)` sensor pair that produces this status
    pub fn sensor_pair(self) -> (bool, bool) {
        match self {
            DoorStatus::Transition => (false, false),
            DoorStatus::Open => (true, false),
            DoorStatus::Closed => (false, true),
            DoorStatus::Fault => (true, true),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DoorStatus::Transition => "TRANSITION",
            DoorStatus::Open => "OPEN",
            DoorStatus::Closed => "CLOSED",
            DoorStatus::Fault => "FAULT",
        }
    }
}

impl std::fmt::Display for DoorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
