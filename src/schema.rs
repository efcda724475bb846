//! Schema registry
//!
//! Static catalogue of the message layouts understood on the satellite link.
//! Field order defines wire order and ids never change once shipped: a
//! vehicle in the field and the ground station must agree on both.

use crate::error::SchemaError;
use std::fmt;

/// Wire representation of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Unsigned byte (1 byte)
    U8,
    /// Unsigned 16-bit integer, little-endian (2 bytes)
    U16,
    /// IEEE754 single precision float, little-endian (4 bytes)
    F32,
    /// Fixed-length byte string, zero padded or truncated (N bytes)
    Bytes(usize),
}

impl WireType {
    /// Number of bytes this field occupies on the wire
    pub const fn width(&self) -> usize {
        match self {
            WireType::U8 => 1,
            WireType::U16 => 2,
            WireType::F32 => 4,
            WireType::Bytes(n) => *n,
        }
    }

    /// Whether the field carries a number (as opposed to bytes)
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, WireType::Bytes(_))
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::U8 => write!(f, "u8"),
            WireType::U16 => write!(f, "u16le"),
            WireType::F32 => write!(f, "f32le"),
            WireType::Bytes(n) => write!(f, "bytes[{}]", n),
        }
    }
}

/// One field of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name
    pub name: &'static str,
    /// Wire type
    pub wire_type: WireType,
    /// Unit annotation (documentation only)
    pub unit: &'static str,
}

impl Field {
    const fn new(name: &'static str, wire_type: WireType, unit: &'static str) -> Self {
        Self {
            name,
            wire_type,
            unit,
        }
    }
}

/// A message layout identified by name and a one-byte id
#[derive(Debug, PartialEq, Eq)]
pub struct MessageSchema {
    /// Unique schema name
    pub name: &'static str,
    /// Unique schema id (1-255)
    pub id: u8,
    /// Fields in wire order
    pub fields: &'static [Field],
}

impl MessageSchema {
    /// Total payload width in bytes (excluding the 2-byte header)
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|f| f.wire_type.width()).sum()
    }

    /// Position of a field in wire order
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

use WireType::{Bytes, F32, U16, U8};

/// Id of the `global` schema
pub const GLOBAL_ID: u8 = 1;
/// Id of the `waypoint` schema
pub const WAYPOINT_ID: u8 = 2;
/// Id of the `control` schema
pub const CONTROL_ID: u8 = 3;
/// Id of the `message` schema
pub const MESSAGE_ID: u8 = 4;

/// Width of the `message` schema text field
pub const TEXT_LEN: usize = 40;

/// Vehicle telemetry snapshot
pub static GLOBAL: MessageSchema = MessageSchema {
    name: "global",
    id: GLOBAL_ID,
    fields: &[
        Field::new("heading", U8, "360degree/256"),
        Field::new("max_abs_roll", U8, "360degree/256"),
        Field::new("max_abs_pitch", U8, "360degree/256"),
        Field::new("battery_voltage", U8, "decavoltage/256"),
        Field::new("battery_current", U8, "64amps/256"),
        Field::new("solar_voltage", U8, "64volts/256"),
        Field::new("solar_power", U8, "200w/256"),
        Field::new("throttle_first", U8, "100%/256"),
        Field::new("throttle_second", U8, "100%/256"),
        Field::new("air_temperature", U8, "64celsius/256"),
        Field::new("water_temperature", U8, "64celsius/256"),
        Field::new("cpu", U8, "100/256"),
        Field::new("memory", U8, "100/256"),
        Field::new("disk", U8, "100/256"),
        Field::new("raspberry_temp", U8, "128celsius/256"),
        Field::new("raspberry_volt", U8, "10volts/256"),
        Field::new("mission_status", U8, "holding,running,drift,disarmed"),
        Field::new("wind_speed", U8, "64meters/second"),
        Field::new("wind_angle", U8, "360degree/256"),
        Field::new("gps_fix_type", U8, "no gps/no fix/2d fix/3d fix"),
        Field::new("sat_number", U8, "number"),
        Field::new("lattitude", F32, "degrees"),
        Field::new("longitude", F32, "degrees"),
        Field::new("next_waypoint_lattitude", F32, "degrees"),
        Field::new("next_waypoint_longitude", F32, "degrees"),
        Field::new("vdop", U16, "uint16"),
        Field::new("hdop", U16, "uint16"),
    ],
};

/// Waypoint report
pub static WAYPOINT: MessageSchema = MessageSchema {
    name: "waypoint",
    id: WAYPOINT_ID,
    fields: &[
        Field::new("lattitude", F32, "degrees"),
        Field::new("longitude", F32, "degrees"),
        Field::new("holding_time", U16, "minutes"),
    ],
};

/// Mission control request
pub static CONTROL: MessageSchema = MessageSchema {
    name: "control",
    id: CONTROL_ID,
    fields: &[Field::new("type", U8, "hold,run,drift,disarm")],
};

/// Free-form text (acks, reports)
pub static MESSAGE: MessageSchema = MessageSchema {
    name: "message",
    id: MESSAGE_ID,
    fields: &[Field::new("text", Bytes(TEXT_LEN), "text string")],
};

static CATALOGUE: [&MessageSchema; 4] = [&GLOBAL, &WAYPOINT, &CONTROL, &MESSAGE];

/// All registered schemas, ordered by id
pub fn schemas() -> &'static [&'static MessageSchema] {
    &CATALOGUE
}

/// Look up a schema by name
pub fn get_schema(name: &str) -> Result<&'static MessageSchema, SchemaError> {
    CATALOGUE
        .iter()
        .copied()
        .find(|s| s.name == name)
        .ok_or_else(|| SchemaError::NotFound(name.to_string()))
}

/// Look up a schema by wire id
pub fn get_schema_by_id(id: u8) -> Result<&'static MessageSchema, SchemaError> {
    CATALOGUE
        .iter()
        .copied()
        .find(|s| s.id == id)
        .ok_or(SchemaError::UnknownId(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_payload_widths() {
        assert_eq!(GLOBAL.payload_len(), 21 + 4 * 4 + 2 * 2);
        assert_eq!(WAYPOINT.payload_len(), 10);
        assert_eq!(CONTROL.payload_len(), 1);
        assert_eq!(MESSAGE.payload_len(), TEXT_LEN);
    }

    #[test]
    fn test_global_field_count() {
        assert_eq!(GLOBAL.fields.len(), 27);
        assert_eq!(GLOBAL.field_index("heading"), Some(0));
        assert_eq!(GLOBAL.field_index("hdop"), Some(26));
    }

    #[test]
    fn test_names_and_ids_unique() {
        let names: HashSet<_> = schemas().iter().map(|s| s.name).collect();
        let ids: HashSet<_> = schemas().iter().map(|s| s.id).collect();
        assert_eq!(names.len(), schemas().len());
        assert_eq!(ids.len(), schemas().len());
        assert!(schemas().iter().all(|s| s.id != 0));
    }

    #[test]
    fn test_field_names_unique_per_schema() {
        for schema in schemas() {
            let names: HashSet<_> = schema.fields.iter().map(|f| f.name).collect();
            assert_eq!(names.len(), schema.fields.len(), "{}", schema.name);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(get_schema("waypoint").unwrap().id, WAYPOINT_ID);
        assert_eq!(get_schema_by_id(MESSAGE_ID).unwrap().name, "message");
    }

    #[test]
    fn test_lookup_failures() {
        assert_eq!(
            get_schema("telemetry"),
            Err(SchemaError::NotFound("telemetry".to_string()))
        );
        assert_eq!(get_schema_by_id(0), Err(SchemaError::UnknownId(0)));
        assert_eq!(get_schema_by_id(99), Err(SchemaError::UnknownId(99)));
    }

    #[test]
    fn test_wire_type_display() {
        assert_eq!(WireType::Bytes(40).to_string(), "bytes[40]");
        assert!(WireType::F32.is_numeric());
        assert!(!WireType::Bytes(3).is_numeric());
    }
}
