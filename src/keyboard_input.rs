use crate::actuator::CommandArbiter;
use crate::door::DoorId;
use crate::error::Result;
use crate::events::{EventBus, GarageEvent};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press asks the controller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    ToggleDoor(DoorId),
    ToggleLight(DoorId),
    Quit,
    None,
}

/// Key map: a digit toggles that door, `l` followed by a digit toggles that
/// door's light, `q` or Esc quits.
#[derive(Debug, Default)]
pub struct KeyInterpreter {
    light_pending: bool,
}

impl KeyInterpreter {
    pub fn interpret(&mut self, code: KeyCode) -> KeyAction {
        let light = std::mem::take(&mut self.light_pending);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('l') | KeyCode::Char('L') => {
                self.light_pending = true;
                KeyAction::None
            }
            KeyCode::Char(c @ '1'..='9') => {
                let door_id = c as DoorId - b'0';
                if light {
                    KeyAction::ToggleLight(door_id)
                } else {
                    KeyAction::ToggleDoor(door_id)
                }
            }
            _ => KeyAction::None,
        }
    }
}

/// Local console for operating the doors from the controller's terminal
pub struct KeyboardInputHandler {
    arbiter: CommandArbiter,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(arbiter: CommandArbiter, event_bus: Arc<EventBus>) -> Self {
        Self {
            arbiter,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard console");

        let arbiter = self.arbiter.clone();
        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();
        let runtime_handle = Handle::current();

        // Key reads block, so the loop runs off the async workers
        task::spawn_blocking(move || {
            // Pulse release timers are spawned onto the runtime
            let _runtime = runtime_handle.enter();

            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard console active");
            let mut interpreter = KeyInterpreter::default();

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard console stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match interpreter.interpret(key_event.code) {
                            KeyAction::ToggleDoor(door_id) => {
                                info!("Console toggling door {}", door_id);
                                if let Err(e) = arbiter.submit(door_id, true, false) {
                                    warn!("Console command rejected: {}", e);
                                }
                            }
                            KeyAction::ToggleLight(door_id) => {
                                info!("Console toggling door {} light", door_id);
                                if let Err(e) = arbiter.submit(door_id, false, true) {
                                    warn!("Console command rejected: {}", e);
                                }
                            }
                            KeyAction::Quit => {
                                info!("Quit key pressed - requesting shutdown");
                                let shutdown_event = GarageEvent::ShutdownRequested {
                                    timestamp: SystemTime::now(),
                                    reason: "User requested via keyboard".to_string(),
                                };
                                if let Err(e) = event_bus.publish(shutdown_event) {
                                    warn!("Failed to publish shutdown event: {}", e);
                                }
                                break;
                            }
                            KeyAction::None => {
                                debug!("Key pressed: {:?}", key_event.code);
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }

            debug!("Keyboard console task exited");
        });

        Ok(())
    }

    /// Stop the console and restore the terminal
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard console");
        self.cancellation_token.cancel();

        // Give the poll loop one timeout period to notice
        tokio::time::sleep(Duration::from_millis(200)).await;

        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Actuator;
    use crate::door::DoorTable;
    use crate::simulated::SimulatedGarage;

    #[test]
    fn test_digits_toggle_doors() {
        let mut interpreter = KeyInterpreter::default();

        assert_eq!(
            interpreter.interpret(KeyCode::Char('1')),
            KeyAction::ToggleDoor(1)
        );
        assert_eq!(
            interpreter.interpret(KeyCode::Char('2')),
            KeyAction::ToggleDoor(2)
        );
        assert_eq!(interpreter.interpret(KeyCode::Char('0')), KeyAction::None);
    }

    #[test]
    fn test_light_prefix_applies_to_next_key_only() {
        let mut interpreter = KeyInterpreter::default();

        assert_eq!(interpreter.interpret(KeyCode::Char('l')), KeyAction::None);
        assert_eq!(
            interpreter.interpret(KeyCode::Char('2')),
            KeyAction::ToggleLight(2)
        );
        assert_eq!(
            interpreter.interpret(KeyCode::Char('2')),
            KeyAction::ToggleDoor(2)
        );

        interpreter.interpret(KeyCode::Char('l'));
        interpreter.interpret(KeyCode::Char('x'));
        assert_eq!(
            interpreter.interpret(KeyCode::Char('1')),
            KeyAction::ToggleDoor(1)
        );
    }

    #[test]
    fn test_quit_keys() {
        let mut interpreter = KeyInterpreter::default();

        assert_eq!(interpreter.interpret(KeyCode::Char('q')), KeyAction::Quit);
        assert_eq!(interpreter.interpret(KeyCode::Esc), KeyAction::Quit);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let garage = Arc::new(SimulatedGarage::manual([1]));
        let event_bus = Arc::new(EventBus::new(16));
        let arbiter = CommandArbiter::new(
            Arc::new(DoorTable::new([1])),
            garage as Arc<dyn Actuator>,
            Arc::clone(&event_bus),
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
        let handler = KeyboardInputHandler::new(arbiter, event_bus);

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
