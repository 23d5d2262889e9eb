use super::{ComponentState, GarageOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl GarageOrchestrator {
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        debug!("Component '{}' state changed to: {:?}", component, state);
        states.insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// Names of components currently in the running state, sorted
    pub async fn running_components(&self) -> Vec<String> {
        let states = self.component_states.lock().await;
        let mut running: Vec<String> = states
            .iter()
            .filter(|(_, state)| **state == ComponentState::Running)
            .map(|(name, _)| name.clone())
            .collect();
        running.sort();
        running
    }
}
