mod handlers;
mod server;

pub use handlers::process_client_message;
pub use server::{ControlServer, ControlServerBuilder, ServerState};
