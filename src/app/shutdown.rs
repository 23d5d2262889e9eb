use super::{ComponentState, GarageOrchestrator};
use crate::error::{GarageError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl GarageOrchestrator {
    /// Stop every component and release all relays. Returns the process exit
    /// code: 0 if everything stopped cleanly.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if self.keyboard_enabled {
            self.set_component_state("keyboard", ComponentState::Stopping)
                .await;
            match timeout(Duration::from_secs(2), self.keyboard_handler.stop()).await {
                Ok(Ok(())) => {
                    self.set_component_state("keyboard", ComponentState::Stopped)
                        .await;
                }
                Ok(Err(e)) => {
                    error!("Error stopping keyboard: {}", e);
                    self.set_component_state("keyboard", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
                Err(_) => {
                    error!("keyboard component stop timeout");
                    self.set_component_state("keyboard", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
            }
        }

        // Reverse start order: server, sampler, broadcaster
        let tasks = std::mem::take(&mut self.tasks);
        for (component, handle) in tasks.into_iter().rev() {
            if let Err(e) = self.stop_component(&component, handle).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        self.actuator.release_all();
        info!("All relays released");

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component(&self, component: &str, handle: JoinHandle<()>) -> Result<()> {
        info!("Stopping {} component", component);
        if self.get_component_state(component).await == Some(ComponentState::Failed) {
            // Already reported when it failed
            handle.abort();
            return Ok(());
        }
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(GarageError::component(
                    component.to_string(),
                    format!("task ended abnormally: {}", e),
                ))
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(GarageError::component(
                    component.to_string(),
                    "stop timeout".to_string(),
                ))
            }
        }
    }
}
