//! Limit-switch sampling: hardware inputs, debouncing and the polling loop
//! that feeds accepted values into the door table.

mod debounce;
mod input;
mod sampler;
mod sysfs;
#[cfg(test)]
mod tests;

pub use debounce::Debouncer;
pub use input::{RawSample, SensorInput};
pub use sampler::SensorSampler;
pub use sysfs::SysfsSensors;
