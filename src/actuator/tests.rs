use super::*;
use crate::config::{DoorConfig, HardwareBackend, HardwareConfig};
use crate::door::DoorTable;
use crate::error::GarageError;
use crate::events::{Channel, EventBus, GarageEvent};
use crate::simulated::SimulatedGarage;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

const COOLDOWN: Duration = Duration::from_millis(300);
const PULSE: Duration = Duration::from_millis(40);

fn create_arbiter() -> (CommandArbiter, Arc<SimulatedGarage>, Arc<DoorTable>, Arc<EventBus>) {
    let garage = Arc::new(SimulatedGarage::manual([1, 2]));
    let table = Arc::new(DoorTable::new([1, 2]));
    let event_bus = Arc::new(EventBus::new(32));
    let arbiter = CommandArbiter::new(
        Arc::clone(&table),
        Arc::clone(&garage) as Arc<dyn Actuator>,
        Arc::clone(&event_bus),
        COOLDOWN,
        PULSE,
    );
    (arbiter, garage, table, event_bus)
}

#[tokio::test]
async fn test_unknown_door_is_invalid_target() {
    let (arbiter, garage, _table, _bus) = create_arbiter();

    let result = arbiter.submit(3, true, false);

    assert!(matches!(
        result,
        Err(GarageError::InvalidTarget { door_id: 3 })
    ));
    assert_eq!(garage.pulse_count(1, Channel::Door), 0);
}

#[tokio::test]
async fn test_empty_command_is_noop() {
    let (arbiter, garage, _table, _bus) = create_arbiter();

    let outcome = arbiter.submit(1, false, false).unwrap();

    assert_eq!(outcome.door, Disposition::NotRequested);
    assert_eq!(outcome.light, Disposition::NotRequested);
    assert_eq!(outcome.pulses(), 0);
    assert_eq!(garage.pulse_count(1, Channel::Door), 0);
}

#[tokio::test]
async fn test_pulse_energizes_then_releases() {
    let (arbiter, garage, table, _bus) = create_arbiter();

    let outcome = arbiter.submit(1, true, false).unwrap();
    assert_eq!(outcome.door, Disposition::Accepted);

    // submit returns while the relay is still energized
    assert!(garage.relay_energized(1, Channel::Door));
    assert!(table.with_door(1, |unit| unit.pulse_active(Channel::Door)).unwrap());

    tokio::time::sleep(PULSE * 3).await;

    assert!(!garage.relay_energized(1, Channel::Door));
    assert!(!table.with_door(1, |unit| unit.pulse_active(Channel::Door)).unwrap());
    assert_eq!(garage.pulse_count(1, Channel::Door), 1);
}

#[tokio::test]
async fn test_repeated_toggle_inside_cooldown_pulses_once() {
    let (arbiter, garage, _table, event_bus) = create_arbiter();
    let mut receiver = event_bus.subscribe();

    let first = arbiter.submit(1, true, false).unwrap();
    let second = arbiter.submit(1, true, false).unwrap();

    assert_eq!(first.door, Disposition::Accepted);
    assert_eq!(second.door, Disposition::Dropped);

    tokio::time::sleep(PULSE * 3).await;
    // Still inside the cooldown after the pulse ended
    assert_eq!(
        arbiter.submit(1, true, false).unwrap().door,
        Disposition::Dropped
    );
    assert_eq!(garage.pulse_count(1, Channel::Door), 1);

    let mut dropped = 0;
    while let Ok(event) = receiver.try_recv() {
        if matches!(event, GarageEvent::CommandDropped { door_id: 1, .. }) {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 2);
}

#[tokio::test]
async fn test_command_accepted_after_cooldown() {
    let (arbiter, garage, _table, _bus) = create_arbiter();

    arbiter.submit(1, true, false).unwrap();
    tokio::time::sleep(COOLDOWN + PULSE).await;

    assert_eq!(
        arbiter.submit(1, true, false).unwrap().door,
        Disposition::Accepted
    );
    tokio::time::sleep(PULSE * 3).await;
    assert_eq!(garage.pulse_count(1, Channel::Door), 2);
}

#[tokio::test]
async fn test_doors_and_channels_are_independent() {
    let (arbiter, garage, _table, _bus) = create_arbiter();

    let door_one = arbiter.submit(1, true, false).unwrap();
    let light_one = arbiter.submit(1, false, true).unwrap();
    let door_two = arbiter.submit(2, true, true).unwrap();

    assert_eq!(door_one.door, Disposition::Accepted);
    assert_eq!(light_one.light, Disposition::Accepted);
    assert_eq!(door_two.pulses(), 2);

    tokio::time::sleep(PULSE * 3).await;
    assert!(garage.light_on(1));
    assert!(garage.light_on(2));
    assert_eq!(garage.pulse_count(2, Channel::Door), 1);
}

#[tokio::test]
async fn test_relay_failure_rolls_back_cooldown() {
    let root = tempfile::tempdir().unwrap();
    let hardware = HardwareConfig {
        backend: HardwareBackend::Sysfs,
        gpio_root: root.path().display().to_string(),
        inputs_active_low: true,
        simulated_travel_ms: 0,
    };
    let doors = vec![DoorConfig {
        id: 1,
        open_pin: 25,
        close_pin: 26,
        lock_pin: 27,
        command_pin: 18,
        light_pin: 19,
    }];
    let relays = Arc::new(SysfsRelays::new(&hardware, &doors));
    let table = Arc::new(DoorTable::new([1]));
    let arbiter = CommandArbiter::new(
        Arc::clone(&table),
        relays as Arc<dyn Actuator>,
        Arc::new(EventBus::new(8)),
        COOLDOWN,
        PULSE,
    );

    assert!(matches!(
        arbiter.submit(1, true, false),
        Err(GarageError::Hardware(_))
    ));
    assert!(!table.with_door(1, |unit| unit.pulse_active(Channel::Door)).unwrap());

    // Once the relay shows up the next command goes through immediately
    let pin_dir = root.path().join("gpio18");
    fs::create_dir_all(&pin_dir).unwrap();
    fs::write(pin_dir.join("value"), "0").unwrap();

    assert_eq!(
        arbiter.submit(1, true, false).unwrap().door,
        Disposition::Accepted
    );
    assert_eq!(fs::read_to_string(pin_dir.join("value")).unwrap(), "1");

    tokio::time::sleep(PULSE * 3).await;
    assert_eq!(fs::read_to_string(pin_dir.join("value")).unwrap(), "0");
}

#[tokio::test]
async fn test_light_relay_failure_keeps_door_pulse() {
    let root = tempfile::tempdir().unwrap();
    let door_pin = root.path().join("gpio18");
    fs::create_dir_all(&door_pin).unwrap();
    fs::write(door_pin.join("value"), "0").unwrap();

    let hardware = HardwareConfig {
        backend: HardwareBackend::Sysfs,
        gpio_root: root.path().display().to_string(),
        inputs_active_low: true,
        simulated_travel_ms: 0,
    };
    let doors = vec![DoorConfig {
        id: 1,
        open_pin: 25,
        close_pin: 26,
        lock_pin: 27,
        command_pin: 18,
        light_pin: 19,
    }];
    let relays = Arc::new(SysfsRelays::new(&hardware, &doors));
    let table = Arc::new(DoorTable::new([1]));
    let arbiter = CommandArbiter::new(
        Arc::clone(&table),
        relays as Arc<dyn Actuator>,
        Arc::new(EventBus::new(8)),
        COOLDOWN,
        PULSE,
    );

    // gpio19 is absent, so only the light half fails
    let outcome = arbiter.submit(1, true, true).unwrap();

    assert_eq!(outcome.door, Disposition::Accepted);
    assert_eq!(outcome.light, Disposition::Failed);
    assert_eq!(outcome.pulses(), 1);
    assert_eq!(fs::read_to_string(door_pin.join("value")).unwrap(), "1");
    assert!(!table.with_door(1, |unit| unit.pulse_active(Channel::Light)).unwrap());

    // Light alone still reports the relay error
    assert!(matches!(
        arbiter.submit(1, false, true),
        Err(GarageError::Hardware(_))
    ));
}
