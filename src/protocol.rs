//! JSON wire format shared with observer clients.
//!
//! The server pushes one flat object per state update:
//! `{"door1_ZSO": 0, "door1_ZSC": 1, "door1_LockSts": 0, ...}`. Clients send
//! `{"LoadTrigger": 1}` to request the current state and
//! `{"door1_CMD": 1, "door1_Light": 0, ...}` to toggle doors and lights.

use crate::door::{DoorId, DoorReading, DoorStatus};
use crate::error::ProtocolError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const LOAD_TRIGGER: &str = "LoadTrigger";
const OPEN_SUFFIX: &str = "ZSO";
const CLOSED_SUFFIX: &str = "ZSC";
const LOCK_SUFFIX: &str = "LockSts";
const COMMAND_SUFFIX: &str = "CMD";
const LIGHT_SUFFIX: &str = "Light";

/// Sensor projection of one door as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorReport {
    pub id: DoorId,
    pub open: bool,
    pub closed: bool,
    pub locked: bool,
}

impl DoorReport {
    pub fn status(&self) -> DoorStatus {
        DoorStatus::from_sensors(self.open, self.closed)
    }
}

impl From<&DoorReading> for DoorReport {
    fn from(reading: &DoorReading) -> Self {
        Self {
            id: reading.id,
            open: reading.open_sensor,
            closed: reading.close_sensor,
            locked: reading.lock_engaged,
        }
    }
}

/// Combined state of every door, sent to observers as one message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    pub doors: Vec<DoorReport>,
}

impl StateSnapshot {
    pub fn from_readings(readings: &[DoorReading]) -> Self {
        Self {
            doors: readings.iter().map(DoorReport::from).collect(),
        }
    }

    pub fn door(&self, id: DoorId) -> Option<&DoorReport> {
        self.doors.iter().find(|door| door.id == id)
    }

    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        for door in &self.doors {
            fields.insert(field_name(door.id, OPEN_SUFFIX), flag(door.open));
            fields.insert(field_name(door.id, CLOSED_SUFFIX), flag(door.closed));
            fields.insert(field_name(door.id, LOCK_SUFFIX), flag(door.locked));
        }
        Value::Object(fields)
    }

    /// Serialize to the text frame pushed to observers
    pub fn to_message(&self) -> String {
        self.to_json().to_string()
    }

    /// Parse a state message as an observer would. Doors are returned in id
    /// order; a door missing one of its fields reads that field as 0.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let fields = parse_object(text)?;
        let mut doors: BTreeMap<DoorId, DoorReport> = BTreeMap::new();

        for (key, value) in &fields {
            let Some((number, suffix)) = split_door_field(key)? else {
                continue;
            };
            let id = DoorId::try_from(number).map_err(|_| out_of_range(key))?;
            let report = doors.entry(id).or_insert(DoorReport {
                id,
                open: false,
                closed: false,
                locked: false,
            });
            match suffix {
                OPEN_SUFFIX => report.open = truthy(key, value)?,
                CLOSED_SUFFIX => report.closed = truthy(key, value)?,
                LOCK_SUFFIX => report.locked = truthy(key, value)?,
                _ => {}
            }
        }

        Ok(Self {
            doors: doors.into_values().collect(),
        })
    }
}

/// Toggle request for a single door
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMessage {
    pub door_id: DoorId,
    pub toggle_door: bool,
    pub toggle_light: bool,
}

/// Everything a client asked for in one frame.
///
/// Fields are read independently: a field that cannot be used is recorded in
/// `rejected` and the rest of the frame still applies.
#[derive(Debug, Default)]
pub struct ClientMessage {
    pub load_trigger: bool,
    /// Only doors with at least one toggle set, in id order
    pub commands: Vec<CommandMessage>,
    /// Door numbers with a toggle set that no door id can hold
    pub out_of_range: Vec<u32>,
    /// Fields that were ignored, each read as 0
    pub rejected: Vec<ProtocolError>,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let fields = parse_object(text)?;
        let mut message = ClientMessage::default();
        let mut commands: BTreeMap<DoorId, CommandMessage> = BTreeMap::new();
        let mut out_of_range = BTreeSet::new();

        for (key, value) in &fields {
            if key == LOAD_TRIGGER {
                message.load_trigger = message.read_flag(key, value);
                continue;
            }

            let (number, suffix) = match split_door_field(key) {
                Ok(Some(field)) => field,
                Ok(None) => continue,
                Err(e) => {
                    message.rejected.push(e);
                    continue;
                }
            };
            if suffix != COMMAND_SUFFIX && suffix != LIGHT_SUFFIX {
                continue;
            }
            let set = message.read_flag(key, value);

            let Ok(door_id) = DoorId::try_from(number) else {
                if set {
                    out_of_range.insert(number);
                }
                continue;
            };
            let command = commands.entry(door_id).or_insert(CommandMessage {
                door_id,
                toggle_door: false,
                toggle_light: false,
            });
            if suffix == COMMAND_SUFFIX {
                command.toggle_door = set;
            } else {
                command.toggle_light = set;
            }
        }

        message.commands = commands
            .into_values()
            .filter(|c| c.toggle_door || c.toggle_light)
            .collect();
        message.out_of_range = out_of_range.into_iter().collect();
        Ok(message)
    }

    pub fn is_empty(&self) -> bool {
        !self.load_trigger && self.commands.is_empty() && self.out_of_range.is_empty()
    }

    fn read_flag(&mut self, key: &str, value: &Value) -> bool {
        truthy(key, value).unwrap_or_else(|e| {
            self.rejected.push(e);
            false
        })
    }
}

fn field_name(id: DoorId, suffix: &str) -> String {
    format!("door{}_{}", id, suffix)
}

fn flag(value: bool) -> Value {
    Value::from(u8::from(value))
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ProtocolError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(ProtocolError::NotAnObject),
    }
}

/// Split `door<N>_<suffix>` into its number and suffix. Keys of any other
/// shape are not door fields and yield `None`.
fn split_door_field(key: &str) -> Result<Option<(u32, &str)>, ProtocolError> {
    let Some(rest) = key.strip_prefix("door") else {
        return Ok(None);
    };
    let Some((digits, suffix)) = rest.split_once('_') else {
        return Ok(None);
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let number = digits.parse::<u32>().map_err(|_| out_of_range(key))?;
    Ok(Some((number, suffix)))
}

fn out_of_range(key: &str) -> ProtocolError {
    ProtocolError::InvalidField {
        field: key.to_string(),
        reason: "door number out of range".to_string(),
    }
}

/// Clients send 0/1 but any number, bool or null is accepted
fn truthy(key: &str, value: &Value) -> Result<bool, ProtocolError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        other => Err(ProtocolError::InvalidField {
            field: key.to_string(),
            reason: format!("expected a number, got {}", other),
        }),
    }
}
