//! Typed messages
//!
//! One struct per schema, with fields in wire order. Conversions go through
//! the schema's field index, never through field-name lookups, so a typed
//! message can only be built with exactly the schema's fields.

use crate::decoder::{split_header, unpack_values};
use crate::encoder::encode_indexed;
use crate::error::{DecodeError, EncodeError};
use crate::protocol::Value;
use crate::schema::{
    MessageSchema, CONTROL, CONTROL_ID, GLOBAL, GLOBAL_ID, MESSAGE, MESSAGE_ID, TEXT_LEN,
    WAYPOINT, WAYPOINT_ID,
};

/// Vehicle telemetry snapshot (`global`, id 1)
///
/// Byte fields are pre-scaled by the producer (see the unit annotations in
/// [`crate::schema::GLOBAL`]).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlobalTelemetry {
    pub heading: u8,
    pub max_abs_roll: u8,
    pub max_abs_pitch: u8,
    pub battery_voltage: u8,
    pub battery_current: u8,
    pub solar_voltage: u8,
    pub solar_power: u8,
    pub throttle_first: u8,
    pub throttle_second: u8,
    pub air_temperature: u8,
    pub water_temperature: u8,
    pub cpu: u8,
    pub memory: u8,
    pub disk: u8,
    pub raspberry_temp: u8,
    pub raspberry_volt: u8,
    pub mission_status: u8,
    pub wind_speed: u8,
    pub wind_angle: u8,
    pub gps_fix_type: u8,
    pub sat_number: u8,
    pub lattitude: f32,
    pub longitude: f32,
    pub next_waypoint_lattitude: f32,
    pub next_waypoint_longitude: f32,
    pub vdop: u16,
    pub hdop: u16,
}

impl GlobalTelemetry {
    fn byte_fields(&self) -> [u8; 21] {
        [
            self.heading,
            self.max_abs_roll,
            self.max_abs_pitch,
            self.battery_voltage,
            self.battery_current,
            self.solar_voltage,
            self.solar_power,
            self.throttle_first,
            self.throttle_second,
            self.air_temperature,
            self.water_temperature,
            self.cpu,
            self.memory,
            self.disk,
            self.raspberry_temp,
            self.raspberry_volt,
            self.mission_status,
            self.wind_speed,
            self.wind_angle,
            self.gps_fix_type,
            self.sat_number,
        ]
    }

    fn to_values(self) -> Vec<Value> {
        let mut values: Vec<Value> = self.byte_fields().into_iter().map(Value::from).collect();
        values.extend([
            Value::from(self.lattitude),
            Value::from(self.longitude),
            Value::from(self.next_waypoint_lattitude),
            Value::from(self.next_waypoint_longitude),
            Value::from(self.vdop),
            Value::from(self.hdop),
        ]);
        values
    }

    fn from_values(v: &[Value]) -> Self {
        Self {
            heading: byte_at(v, 0),
            max_abs_roll: byte_at(v, 1),
            max_abs_pitch: byte_at(v, 2),
            battery_voltage: byte_at(v, 3),
            battery_current: byte_at(v, 4),
            solar_voltage: byte_at(v, 5),
            solar_power: byte_at(v, 6),
            throttle_first: byte_at(v, 7),
            throttle_second: byte_at(v, 8),
            air_temperature: byte_at(v, 9),
            water_temperature: byte_at(v, 10),
            cpu: byte_at(v, 11),
            memory: byte_at(v, 12),
            disk: byte_at(v, 13),
            raspberry_temp: byte_at(v, 14),
            raspberry_volt: byte_at(v, 15),
            mission_status: byte_at(v, 16),
            wind_speed: byte_at(v, 17),
            wind_angle: byte_at(v, 18),
            gps_fix_type: byte_at(v, 19),
            sat_number: byte_at(v, 20),
            lattitude: float_at(v, 21),
            longitude: float_at(v, 22),
            next_waypoint_lattitude: float_at(v, 23),
            next_waypoint_longitude: float_at(v, 24),
            vdop: word_at(v, 25),
            hdop: word_at(v, 26),
        }
    }
}

/// Waypoint report (`waypoint`, id 2)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaypointReport {
    pub lattitude: f32,
    pub longitude: f32,
    /// Minutes to hold at the waypoint
    pub holding_time: u16,
}

/// Mission control request (`control`, id 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlMessage {
    /// 0 hold, 1 run, 2 drift, 3 disarm
    pub kind: u8,
}

/// Free-form text (`message`, id 4), always [`TEXT_LEN`] bytes on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    bytes: Vec<u8>,
}

impl TextMessage {
    /// Build a text message, truncating to the wire width
    pub fn new(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Build from raw bytes, zero padding or truncating to the wire width
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bytes = bytes[..bytes.len().min(TEXT_LEN)].to_vec();
        bytes.resize(TEXT_LEN, 0);
        Self { bytes }
    }

    /// Text with the trailing NUL padding removed
    pub fn text(&self) -> String {
        let end = self
            .bytes
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }

    /// Raw padded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A message of any registered schema
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Global(GlobalTelemetry),
    Waypoint(WaypointReport),
    Control(ControlMessage),
    Text(TextMessage),
}

impl Message {
    /// Schema this message is encoded with
    pub fn schema(&self) -> &'static MessageSchema {
        match self {
            Message::Global(_) => &GLOBAL,
            Message::Waypoint(_) => &WAYPOINT,
            Message::Control(_) => &CONTROL,
            Message::Text(_) => &MESSAGE,
        }
    }

    /// Shorthand for a text message
    pub fn text(text: &str) -> Self {
        Message::Text(TextMessage::new(text))
    }

    /// Field values in schema order
    pub fn to_values(&self) -> Vec<Value> {
        match self {
            Message::Global(g) => g.to_values(),
            Message::Waypoint(w) => vec![
                Value::from(w.lattitude),
                Value::from(w.longitude),
                Value::from(w.holding_time),
            ],
            Message::Control(c) => vec![Value::from(c.kind)],
            Message::Text(t) => vec![Value::Bytes(t.bytes.clone())],
        }
    }

    /// Encode with the `'$' id` header
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode_indexed(self.schema(), &self.to_values())
    }

    /// Decode a header-carrying buffer into a typed message
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (schema, payload) = split_header(data)?;
        let v = unpack_values(schema, payload)?;
        let message = match schema.id {
            GLOBAL_ID => Message::Global(GlobalTelemetry::from_values(&v)),
            WAYPOINT_ID => Message::Waypoint(WaypointReport {
                lattitude: float_at(&v, 0),
                longitude: float_at(&v, 1),
                holding_time: word_at(&v, 2),
            }),
            CONTROL_ID => Message::Control(ControlMessage {
                kind: byte_at(&v, 0),
            }),
            MESSAGE_ID => Message::Text(TextMessage::from_bytes(
                v.first().and_then(Value::as_bytes).unwrap_or_default(),
            )),
            other => return Err(DecodeError::UnknownSchemaId(other)),
        };
        Ok(message)
    }
}

impl From<GlobalTelemetry> for Message {
    fn from(g: GlobalTelemetry) -> Self {
        Message::Global(g)
    }
}

impl From<WaypointReport> for Message {
    fn from(w: WaypointReport) -> Self {
        Message::Waypoint(w)
    }
}

impl From<ControlMessage> for Message {
    fn from(c: ControlMessage) -> Self {
        Message::Control(c)
    }
}

impl From<TextMessage> for Message {
    fn from(t: TextMessage) -> Self {
        Message::Text(t)
    }
}

// Values come from `unpack_values` for the matching schema, so the kinds
// and indices always line up.
fn number_at(v: &[Value], i: usize) -> f64 {
    v.get(i).and_then(Value::as_f64).unwrap_or_default()
}

fn byte_at(v: &[Value], i: usize) -> u8 {
    number_at(v, i) as u8
}

fn word_at(v: &[Value], i: usize) -> u16 {
    number_at(v, i) as u16
}

fn float_at(v: &[Value], i: usize) -> f32 {
    number_at(v, i) as f32
}
