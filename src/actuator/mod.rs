//! Relay outputs and the arbiter that turns client commands into pulses.

mod arbiter;
mod relay;
#[cfg(test)]
mod tests;

pub use arbiter::{CommandArbiter, CommandOutcome, Disposition};
pub use relay::{Actuator, SysfsRelays};
