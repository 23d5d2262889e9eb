use super::*;
use crate::config::{DoorConfig, HardwareBackend, HardwareConfig};
use crate::door::{DoorStatus, DoorTable};
use crate::events::{EventBus, GarageEvent};
use crate::simulated::SimulatedGarage;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn create_sampler(
    garage: &Arc<SimulatedGarage>,
    debounce_samples: u32,
) -> (SensorSampler, Arc<DoorTable>, Arc<EventBus>) {
    let table = Arc::new(DoorTable::new([1, 2]));
    let event_bus = Arc::new(EventBus::new(32));
    let sampler = SensorSampler::new(
        Arc::clone(&table),
        Arc::clone(garage) as Arc<dyn SensorInput>,
        Arc::clone(&event_bus),
        Duration::from_millis(5),
        debounce_samples,
    );
    (sampler, table, event_bus)
}

#[test]
fn test_debouncer_accepts_first_sample() {
    let mut debouncer = Debouncer::new(3);

    assert_eq!(debouncer.accepted(), None);
    assert_eq!(debouncer.sample(true), Some(true));
    assert_eq!(debouncer.accepted(), Some(true));
    assert_eq!(debouncer.sample(true), None);
}

#[test]
fn test_debouncer_requires_consecutive_samples() {
    let mut debouncer = Debouncer::new(3);
    debouncer.sample(false);

    assert_eq!(debouncer.sample(true), None);
    assert_eq!(debouncer.sample(true), None);
    assert_eq!(debouncer.accepted(), Some(false));
    assert_eq!(debouncer.sample(true), Some(true));
    assert_eq!(debouncer.accepted(), Some(true));
}

#[test]
fn test_debouncer_glitch_resets_streak() {
    let mut debouncer = Debouncer::new(3);
    debouncer.sample(false);

    debouncer.sample(true);
    debouncer.sample(true);
    // Back to the accepted level: the glitch is discarded
    assert_eq!(debouncer.sample(false), None);
    assert_eq!(debouncer.sample(true), None);
    assert_eq!(debouncer.sample(true), None);
    assert_eq!(debouncer.accepted(), Some(false));
    assert_eq!(debouncer.sample(true), Some(true));
}

#[test]
fn test_debouncer_threshold_of_one_is_immediate() {
    let mut debouncer = Debouncer::new(0);
    debouncer.sample(false);

    assert_eq!(debouncer.sample(true), Some(true));
    assert_eq!(debouncer.sample(false), Some(false));
}

#[tokio::test]
async fn test_first_sample_sets_status() {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let (sampler, table, _bus) = create_sampler(&garage, 3);

    let changes = sampler.sample_once();

    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|c| c.status == DoorStatus::Closed));
    assert_eq!(table.reading(1).unwrap().status, DoorStatus::Closed);
}

#[tokio::test]
async fn test_unchanged_sensors_publish_once() {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let (sampler, _table, event_bus) = create_sampler(&garage, 1);
    let mut receiver = event_bus.subscribe();

    sampler.sample_door(1);
    sampler.sample_door(1);
    sampler.sample_door(1);

    let mut state_events = 0;
    while let Ok(event) = receiver.try_recv() {
        if matches!(event, GarageEvent::DoorStateChanged { .. }) {
            state_events += 1;
        }
    }
    assert_eq!(state_events, 1);
}

#[tokio::test]
async fn test_debounced_transition_through_travel() {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let (sampler, table, _bus) = create_sampler(&garage, 3);
    sampler.sample_once();

    garage.set_sensors(1, false, false);
    assert!(sampler.sample_door(1).is_none());
    assert!(sampler.sample_door(1).is_none());
    assert_eq!(table.reading(1).unwrap().status, DoorStatus::Closed);

    let change = sampler.sample_door(1).unwrap();
    assert_eq!(change.previous, DoorStatus::Closed);
    assert_eq!(change.status, DoorStatus::Transition);

    garage.set_sensors(1, true, false);
    sampler.sample_door(1);
    sampler.sample_door(1);
    let change = sampler.sample_door(1).unwrap();
    assert_eq!(change.status, DoorStatus::Open);

    // Door 2 never moved
    assert_eq!(table.reading(2).unwrap().status, DoorStatus::Closed);
}

#[tokio::test]
async fn test_lock_sensor_passthrough() {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let (sampler, table, _bus) = create_sampler(&garage, 1);
    sampler.sample_once();

    garage.set_lock(2, true);
    let change = sampler.sample_door(2).unwrap();
    assert!(change.lock_engaged);
    assert!(table.reading(2).unwrap().lock_engaged);

    garage.set_lock(2, false);
    sampler.sample_door(2);
    assert!(!table.reading(2).unwrap().lock_engaged);
}

#[tokio::test]
async fn test_missing_hardware_latches_fault() {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let (sampler, table, event_bus) = create_sampler(&garage, 1);
    let mut receiver = event_bus.subscribe();
    sampler.sample_once();

    garage.disconnect(1);
    let change = sampler.sample_door(1).unwrap();
    assert_eq!(change.status, DoorStatus::Fault);

    let reading = table.reading(1).unwrap();
    assert!(reading.hardware_fault);
    assert!(reading.open_sensor && reading.close_sensor);

    // Faulted doors are no longer sampled; other doors carry on
    assert!(sampler.sample_door(1).is_none());
    garage.set_sensors(2, true, false);
    assert_eq!(
        sampler.sample_door(2).map(|c| c.status),
        Some(DoorStatus::Open)
    );

    let mut saw_fault = false;
    while let Ok(event) = receiver.try_recv() {
        if let GarageEvent::HardwareFault { door_id, .. } = event {
            assert_eq!(door_id, 1);
            saw_fault = true;
        }
    }
    assert!(saw_fault);
}

#[tokio::test]
async fn test_run_loop_stops_on_cancel() {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let (sampler, table, _bus) = create_sampler(&garage, 1);
    let sampler = Arc::new(sampler);
    let token = tokio_util::sync::CancellationToken::new();

    let handle = sampler.start(token.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(table.reading(1).unwrap().status, DoorStatus::Closed);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

fn fake_input(root: &Path, number: u32, value: &str) {
    let dir = root.join(format!("gpio{}", number));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("value"), value).unwrap();
    fs::write(dir.join("direction"), "in").unwrap();
}

#[test]
fn test_sysfs_sensors_invert_active_low_inputs() {
    let root = tempfile::tempdir().unwrap();
    // Pulled-up inputs: the closed switch and the lock switch read low
    fake_input(root.path(), 25, "1");
    fake_input(root.path(), 26, "0");
    fake_input(root.path(), 27, "0");

    let hardware = HardwareConfig {
        backend: HardwareBackend::Sysfs,
        gpio_root: root.path().display().to_string(),
        inputs_active_low: true,
        simulated_travel_ms: 0,
    };
    let doors = vec![
        DoorConfig {
            id: 1,
            open_pin: 25,
            close_pin: 26,
            lock_pin: 27,
            command_pin: 18,
            light_pin: 19,
        },
        DoorConfig {
            id: 2,
            open_pin: 5,
            close_pin: 17,
            lock_pin: 16,
            command_pin: 33,
            light_pin: 32,
        },
    ];

    let sensors = SysfsSensors::new(&hardware, &doors);

    assert_eq!(sensors.read(1).unwrap(), RawSample::new(false, true, true));
    // Door 2 has no GPIO nodes at all
    assert!(sensors.read(2).unwrap_err().is_missing());
    assert!(sensors.read(9).unwrap_err().is_missing());
}
