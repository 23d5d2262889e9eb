/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the controller is shutting down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest(String),
}
