use super::types::{ComponentState, ShutdownReason};
use crate::actuator::{Actuator, CommandArbiter, SysfsRelays};
use crate::broadcast::StateBroadcaster;
use crate::config::{GarageConfig, HardwareBackend};
use crate::door::{DoorId, DoorTable};
use crate::error::Result;
use crate::events::EventBus;
use crate::keyboard_input::KeyboardInputHandler;
use crate::sensor::{SensorInput, SensorSampler, SysfsSensors};
use crate::simulated::SimulatedGarage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(feature = "server")]
use crate::server::{ControlServer, ControlServerBuilder};

/// Owns every controller component and drives their lifecycle
pub struct GarageOrchestrator {
    pub(super) config: GarageConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) table: Arc<DoorTable>,
    pub(super) actuator: Arc<dyn Actuator>,

    // Components
    pub(super) sampler: Arc<SensorSampler>,
    pub(super) arbiter: CommandArbiter,
    pub(super) broadcaster: Arc<StateBroadcaster>,
    #[cfg(feature = "server")]
    pub(super) server: Arc<ControlServer>,
    pub(super) server_enabled: bool,
    pub(super) keyboard_handler: KeyboardInputHandler,
    pub(super) keyboard_enabled: bool,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) tasks: Vec<(String, JoinHandle<()>)>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl GarageOrchestrator {
    pub async fn new(config: GarageConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let door_ids: Vec<DoorId> = config.doors.iter().map(|door| door.id).collect();
        let table = Arc::new(DoorTable::new(door_ids.iter().copied()));
        let (sensors, actuator) = build_hardware(&config, &door_ids);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let sampler = Arc::new(SensorSampler::new(
            Arc::clone(&table),
            sensors,
            Arc::clone(&event_bus),
            config.controller.sample_interval(),
            config.controller.debounce_samples,
        ));

        let arbiter = CommandArbiter::new(
            Arc::clone(&table),
            Arc::clone(&actuator),
            Arc::clone(&event_bus),
            config.controller.command_cooldown(),
            config.controller.pulse_duration(),
        );

        let broadcaster = Arc::new(StateBroadcaster::new(
            Arc::clone(&table),
            Arc::clone(&event_bus),
            config.server.session_queue_capacity,
        ));

        #[cfg(feature = "server")]
        let server = Arc::new(
            ControlServerBuilder::new()
                .config(config.server.clone())
                .table(Arc::clone(&table))
                .arbiter(arbiter.clone())
                .broadcaster(Arc::clone(&broadcaster))
                .build()?,
        );

        let keyboard_handler = KeyboardInputHandler::new(arbiter.clone(), Arc::clone(&event_bus));

        Ok(Self {
            config,
            event_bus,
            table,
            actuator,
            sampler,
            arbiter,
            broadcaster,
            #[cfg(feature = "server")]
            server,
            server_enabled: cfg!(feature = "server"),
            keyboard_handler,
            keyboard_enabled: false,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            tasks: Vec::new(),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the local keyboard console
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Enable or disable the HTTP and WebSocket listeners
    pub fn set_server_enabled(&mut self, enabled: bool) {
        self.server_enabled = enabled && cfg!(feature = "server");
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn table(&self) -> Arc<DoorTable> {
        Arc::clone(&self.table)
    }

    pub fn arbiter(&self) -> CommandArbiter {
        self.arbiter.clone()
    }

    pub fn broadcaster(&self) -> Arc<StateBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    pub fn config(&self) -> &GarageConfig {
        &self.config
    }
}

/// Sensor and relay backends for the configured hardware
fn build_hardware(
    config: &GarageConfig,
    door_ids: &[DoorId],
) -> (Arc<dyn SensorInput>, Arc<dyn Actuator>) {
    match config.hardware.backend {
        HardwareBackend::Simulated => {
            let garage = match config.hardware.simulated_travel_ms {
                0 => SimulatedGarage::manual(door_ids.iter().copied()),
                travel_ms => SimulatedGarage::new(
                    door_ids.iter().copied(),
                    Duration::from_millis(travel_ms),
                ),
            };
            let garage = Arc::new(garage);
            info!("Using simulated garage hardware");
            (
                Arc::clone(&garage) as Arc<dyn SensorInput>,
                garage as Arc<dyn Actuator>,
            )
        }
        HardwareBackend::Sysfs => {
            info!("Using sysfs GPIO under {}", config.hardware.gpio_root);
            (
                Arc::new(SysfsSensors::new(&config.hardware, &config.doors)),
                Arc::new(SysfsRelays::new(&config.hardware, &config.doors)),
            )
        }
    }
}
