use thiserror::Error;

#[derive(Error, Debug)]
pub enum GarageError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Invalid target: door {door_id} does not exist")]
    InvalidTarget { door_id: u32 },

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl GarageError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by GPIO backends
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Hardware missing: {device}")]
    Missing { device: String },

    #[error("Failed to access {device}: {source}")]
    Io {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected value {value:?} read from {device}")]
    InvalidValue { device: String, value: String },
}

impl HardwareError {
    /// Map an IO error on `device` into a hardware error, treating a missing
    /// device node as absent hardware.
    pub fn from_io(device: impl Into<String>, source: std::io::Error) -> Self {
        let device = device.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => HardwareError::Missing { device },
            _ => HardwareError::Io { device, source },
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, HardwareError::Missing { .. })
    }
}

/// Errors raised while decoding client messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server startup failed: {details}")]
    StartupFailed { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, GarageError>;
