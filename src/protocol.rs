//! Protocol definitions for the satellite link
//!
//! This module defines the core types shared by the encoder and decoder:
//! - Header layout (start marker + schema id)
//! - Dynamically typed field values
//! - Per-field packing and unpacking

use crate::schema::WireType;
use std::collections::BTreeMap;
use std::fmt;

/// Start marker, first byte of every header-carrying message
pub const START_BYTE: u8 = b'$';

/// Header size in bytes: start marker + schema id
pub const HEADER_SIZE: usize = 2;

/// Field values of one message, keyed by field name
pub type FieldMap = BTreeMap<String, Value>;

/// A field value before packing or after unpacking
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer (decoded `u8` and `u16` fields)
    Int(i64),
    /// Floating point (decoded `f32` fields)
    Float(f64),
    /// Raw bytes (decoded fixed strings, always full width)
    Bytes(Vec<u8>),
}

impl Value {
    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bytes(_) => None,
        }
    }

    /// Byte view of the value, if it is a byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// A decoded message: the field map plus the schema it was decoded with
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Schema name
    pub name: &'static str,
    /// Schema id
    pub schema_id: u8,
    /// Decoded fields
    pub fields: FieldMap,
}

impl DecodedMessage {
    /// Get a decoded field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Saturating integer coercion; floats truncate toward zero, NaN maps to 0
fn coerce_int(value: &Value, max: i64) -> i64 {
    match value {
        Value::Int(v) => (*v).clamp(0, max),
        Value::Float(v) => {
            if v.is_nan() {
                0
            } else {
                (v.trunc() as i64).clamp(0, max)
            }
        }
        Value::Bytes(_) => 0,
    }
}

/// Append one field to `buf`. Returns false on a type mismatch.
pub(crate) fn pack_field(wire_type: WireType, value: &Value, buf: &mut Vec<u8>) -> bool {
    match (wire_type, value) {
        (WireType::Bytes(_), Value::Int(_) | Value::Float(_)) => false,
        (WireType::U8 | WireType::U16 | WireType::F32, Value::Bytes(_)) => false,
        (WireType::U8, v) => {
            buf.push(coerce_int(v, u8::MAX as i64) as u8);
            true
        }
        (WireType::U16, v) => {
            let n = coerce_int(v, u16::MAX as i64) as u16;
            buf.extend_from_slice(&n.to_le_bytes());
            true
        }
        (WireType::F32, v) => {
            let x = v.as_f64().unwrap_or_default() as f32;
            buf.extend_from_slice(&x.to_le_bytes());
            true
        }
        (WireType::Bytes(n), Value::Bytes(b)) => {
            let take = b.len().min(n);
            buf.extend_from_slice(&b[..take]);
            buf.resize(buf.len() + (n - take), 0);
            true
        }
    }
}

/// Read one field from the start of `data`, which must be at least
/// `wire_type.width()` bytes long.
pub(crate) fn unpack_field(wire_type: WireType, data: &[u8]) -> Value {
    match wire_type {
        WireType::U8 => Value::Int(data[0] as i64),
        WireType::U16 => Value::Int(u16::from_le_bytes([data[0], data[1]]) as i64),
        WireType::F32 => {
            Value::Float(f32::from_le_bytes([data[0], data[1], data[2], data[3]]) as f64)
        }
        WireType::Bytes(n) => Value::Bytes(data[..n].to_vec()),
    }
}
