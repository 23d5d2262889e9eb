//! Door units and the status arbitration rules that derive each door's
//! state from its limit switches.

mod status;
mod table;
mod unit;

pub use status::DoorStatus;
pub use table::{DoorReading, DoorTable};
pub use unit::{DoorStateChange, DoorUnit};

/// Ordinal door identifier, starting at 1
pub type DoorId = u8;
