pub mod actuator;
pub mod app;
pub mod broadcast;
pub mod config;
pub mod door;
pub mod error;
pub mod events;
pub mod gpio;
pub mod keyboard_input;
pub mod protocol;
pub mod sensor;
pub mod simulated;

#[cfg(feature = "server")]
pub mod server;

pub use actuator::{Actuator, CommandArbiter, CommandOutcome, Disposition, SysfsRelays};
pub use app::{ComponentState, GarageOrchestrator, ShutdownReason};
pub use broadcast::{BroadcastStats, ObserverSession, SessionId, StateBroadcaster};
pub use config::{GarageConfig, HardwareBackend};
pub use door::{DoorId, DoorReading, DoorStateChange, DoorStatus, DoorTable, DoorUnit};
pub use error::{GarageError, Result};
pub use events::{Channel, EventBus, EventFilter, EventReceiver, GarageEvent};
pub use protocol::{ClientMessage, CommandMessage, DoorReport, StateSnapshot};
pub use sensor::{Debouncer, RawSample, SensorInput, SensorSampler, SysfsSensors};
pub use simulated::SimulatedGarage;

#[cfg(feature = "server")]
pub use server::{ControlServer, ControlServerBuilder};
