use super::{ComponentState, GarageOrchestrator};
use crate::error::Result;
use tracing::{error, info};

#[cfg(feature = "server")]
use crate::events::GarageEvent;
#[cfg(feature = "server")]
use std::sync::Arc;

impl GarageOrchestrator {
    /// Register every component in the stopped state
    pub async fn initialize(&mut self) -> Result<()> {
        info!(
            "Initializing garage controller for {} doors",
            self.table.len()
        );

        let mut states = self.component_states.lock().await;
        states.insert("broadcaster".to_string(), ComponentState::Stopped);
        states.insert("sampler".to_string(), ComponentState::Stopped);

        if self.server_enabled {
            states.insert("server".to_string(), ComponentState::Stopped);
        }

        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all components. The broadcaster subscribes before the first
    /// sample so the initial door states reach observers.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting garage controller");

        self.set_component_state("broadcaster", ComponentState::Starting)
            .await;
        let handle = self
            .broadcaster
            .start(self.cancellation_token.child_token());
        self.tasks.push(("broadcaster".to_string(), handle));
        self.set_component_state("broadcaster", ComponentState::Running)
            .await;

        self.set_component_state("sampler", ComponentState::Starting)
            .await;
        let initial = self.sampler.sample_once();
        info!("Initial sample resolved {} doors", initial.len());
        let handle = self.sampler.start(self.cancellation_token.child_token());
        self.tasks.push(("sampler".to_string(), handle));
        self.set_component_state("sampler", ComponentState::Running)
            .await;

        #[cfg(feature = "server")]
        if self.server_enabled {
            self.start_server().await;
        }

        if self.keyboard_enabled {
            self.set_component_state("keyboard", ComponentState::Starting)
                .await;

            self.keyboard_handler.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;

            self.set_component_state("keyboard", ComponentState::Running)
                .await;
            info!("Keyboard console started - press a door number to toggle it, q to quit");
        }

        info!("Garage controller started successfully");
        Ok(())
    }

    #[cfg(feature = "server")]
    async fn start_server(&mut self) {
        self.set_component_state("server", ComponentState::Starting)
            .await;

        let server = Arc::clone(&self.server);
        let token = self.cancellation_token.child_token();
        let states = Arc::clone(&self.component_states);
        let event_bus = Arc::clone(&self.event_bus);

        // Set before spawning; the task may mark the server failed
        self.set_component_state("server", ComponentState::Running)
            .await;

        // Listener failures leave the rest of the controller running
        let handle = tokio::spawn(async move {
            if let Err(e) = server.start(token).await {
                error!("Control server error: {}", e);
                states
                    .lock()
                    .await
                    .insert("server".to_string(), ComponentState::Failed);
                let _ = event_bus.publish(GarageEvent::SystemError {
                    component: "server".to_string(),
                    error: e.to_string(),
                });
            }
        });
        self.tasks.push(("server".to_string(), handle));
        info!(
            "Control server starting on {} (http {}, websocket {})",
            self.config.server.ip, self.config.server.http_port, self.config.server.ws_port
        );
    }
}
