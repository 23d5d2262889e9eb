use super::*;
use crate::config::{GarageConfig, HardwareBackend};
use crate::door::DoorStatus;
use crate::events::GarageEvent;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;

fn create_test_config() -> GarageConfig {
    let mut config = GarageConfig::default();
    config.controller.sample_interval_ms = 10;
    config.controller.debounce_samples = 1;
    config.controller.command_cooldown_ms = 200;
    config.controller.pulse_duration_ms = 20;
    config.hardware.backend = HardwareBackend::Simulated;
    config.hardware.simulated_travel_ms = 60;
    config
}

async fn create_orchestrator() -> GarageOrchestrator {
    let mut orchestrator = GarageOrchestrator::new(create_test_config()).await.unwrap();
    orchestrator.set_server_enabled(false);
    orchestrator
}

async fn wait_for_status(orchestrator: &GarageOrchestrator, door_id: u8, status: DoorStatus) {
    let table = orchestrator.table();
    timeout(Duration::from_secs(2), async {
        while table.reading(door_id).map(|r| r.status) != Some(status) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("door {} never reached {}", door_id, status));
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let orchestrator = create_orchestrator().await;

    assert_eq!(orchestrator.table().ids(), vec![1, 2]);
    assert!(orchestrator.get_all_component_states().await.is_empty());
    assert_eq!(
        orchestrator.arbiter().cooldown(),
        Duration::from_millis(200)
    );
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let mut orchestrator = create_orchestrator().await;
    orchestrator.initialize().await.unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.len(), 2);
    assert_eq!(states.get("sampler"), Some(&ComponentState::Stopped));
    assert_eq!(states.get("broadcaster"), Some(&ComponentState::Stopped));
    assert!(!states.contains_key("server"));
    assert!(!states.contains_key("keyboard"));
}

#[tokio::test]
async fn test_start_and_shutdown() {
    let mut orchestrator = create_orchestrator().await;
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    // The initial sample has already resolved every door
    let reading = orchestrator.table().reading(1).unwrap();
    assert_eq!(reading.status, DoorStatus::Closed);
    assert_eq!(
        orchestrator.running_components().await,
        vec!["broadcaster".to_string(), "sampler".to_string()]
    );

    let exit_code = orchestrator.shutdown().await.unwrap();

    assert_eq!(exit_code, 0);
    assert_eq!(
        orchestrator.get_component_state("sampler").await,
        Some(ComponentState::Stopped)
    );
    assert!(orchestrator.running_components().await.is_empty());
}

#[tokio::test]
async fn test_command_moves_simulated_door() {
    let mut orchestrator = create_orchestrator().await;
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    // Let the broadcasts from the initial sample drain first
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut session = orchestrator.broadcaster().connect();
    while session.try_recv().is_some() {}

    orchestrator.arbiter().submit(2, true, false).unwrap();

    wait_for_status(&orchestrator, 2, DoorStatus::Open).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        orchestrator.table().reading(1).unwrap().status,
        DoorStatus::Closed
    );

    // Observers saw the door travel
    let mut statuses = Vec::new();
    while let Some(message) = session.try_recv() {
        let snapshot = crate::protocol::StateSnapshot::from_json(&message).unwrap();
        statuses.push(snapshot.door(2).unwrap().status());
    }
    assert_eq!(statuses, vec![DoorStatus::Transition, DoorStatus::Open]);

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_request_ends_run() {
    let mut orchestrator = create_orchestrator().await;
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let event_bus = orchestrator.event_bus();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = event_bus.publish(GarageEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "test".to_string(),
        });
    });

    let exit_code = timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);

    // The shutdown channel is single use
    assert!(orchestrator.run().await.is_err());
}

#[tokio::test]
async fn test_component_state_transitions() {
    let orchestrator = create_orchestrator().await;
    let component = "test_component";

    assert_eq!(orchestrator.get_component_state(component).await, None);

    for state in [
        ComponentState::Starting,
        ComponentState::Running,
        ComponentState::Stopping,
        ComponentState::Stopped,
    ] {
        orchestrator
            .set_component_state(component, state.clone())
            .await;
        assert_eq!(
            orchestrator.get_component_state(component).await,
            Some(state)
        );
    }
}

#[tokio::test]
async fn test_concurrent_component_state_access() {
    let orchestrator = Arc::new(create_orchestrator().await);
    let mut handles = Vec::new();

    for i in 0..10 {
        let orchestrator_clone = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let component_name = format!("component_{}", i);
            orchestrator_clone
                .set_component_state(&component_name, ComponentState::Running)
                .await;
            orchestrator_clone
                .get_component_state(&component_name)
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some(ComponentState::Running));
    }
    assert_eq!(orchestrator.get_all_component_states().await.len(), 10);
}

#[tokio::test]
async fn test_shutdown_reason_debug_formatting() {
    let reasons = vec![
        ShutdownReason::Signal("SIGTERM".to_string()),
        ShutdownReason::UserRequest("keyboard".to_string()),
    ];

    for reason in reasons {
        let debug_str = format!("{:?}", reason);
        match reason {
            ShutdownReason::Signal(ref sig) => assert!(debug_str.contains(sig)),
            ShutdownReason::UserRequest(ref why) => assert!(debug_str.contains(why)),
        }
    }
}
