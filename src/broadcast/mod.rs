//! Fan-out of the combined door state to connected observers.

mod broadcaster;
mod session;

pub use broadcaster::{BroadcastStats, StateBroadcaster};
pub use session::{ObserverSession, SessionId};
