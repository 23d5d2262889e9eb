use super::{DoorId, DoorStatus, DoorUnit};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Point-in-time copy of one door's observable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorReading {
    pub id: DoorId,
    pub open_sensor: bool,
    pub close_sensor: bool,
    pub lock_engaged: bool,
    pub status: DoorStatus,
    pub hardware_fault: bool,
    pub last_changed: Option<DateTime<Utc>>,
}

impl From<&DoorUnit> for DoorReading {
    fn from(unit: &DoorUnit) -> Self {
        Self {
            id: unit.id(),
            open_sensor: unit.open_sensor(),
            close_sensor: unit.close_sensor(),
            lock_engaged: unit.lock_engaged(),
            status: unit.status(),
            hardware_fault: unit.hardware_fault(),
            last_changed: unit.last_changed(),
        }
    }
}

/// Controller-owned store of door units.
///
/// The set of doors is fixed at construction. Each unit sits behind its own
/// lock, so mutations of one door are serialized while different doors
/// proceed independently. Locks are only held inside the closures passed to
/// [`DoorTable::with_door`] and never across an await point.
pub struct DoorTable {
    doors: BTreeMap<DoorId, Mutex<DoorUnit>>,
}

impl DoorTable {
    pub fn new<I: IntoIterator<Item = DoorId>>(ids: I) -> Self {
        let doors = ids
            .into_iter()
            .map(|id| (id, Mutex::new(DoorUnit::new(id))))
            .collect();
        Self { doors }
    }

    /// Door ids in ascending order
    pub fn ids(&self) -> Vec<DoorId> {
        self.doors.keys().copied().collect()
    }

    pub fn contains(&self, id: DoorId) -> bool {
        self.doors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.doors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doors.is_empty()
    }

    /// Run `f` with exclusive access to one door; `None` for unknown ids
    pub fn with_door<R>(&self, id: DoorId, f: impl FnOnce(&mut DoorUnit) -> R) -> Option<R> {
        self.doors.get(&id).map(|unit| f(&mut unit.lock()))
    }

    pub fn reading(&self, id: DoorId) -> Option<DoorReading> {
        self.with_door(id, |unit| DoorReading::from(&*unit))
    }

    /// Readings for all doors in id order, each taken under that door's lock
    pub fn readings(&self) -> Vec<DoorReading> {
        self.doors
            .values()
            .map(|unit| DoorReading::from(&*unit.lock()))
            .collect()
    }
}
