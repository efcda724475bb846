//! Error types for the satellite link
//!
//! This module defines all error types used throughout the library.
//! Codec errors reject the whole call; transport errors abort one drain or
//! poll and are meant to be logged by the caller's loop.

use thiserror::Error;

/// Result type alias for link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Main error type for link operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Schema lookup error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// Transport (modem) error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command grammar error
    #[error("Command error: {0}")]
    Command(#[from] ParseError),

    /// Vehicle actuator error
    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),
}

/// Errors from the schema registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No schema with this name
    #[error("Schema not found: {0}")]
    NotFound(String),

    /// No schema with this id
    #[error("Unknown schema id: {0}")]
    UnknownId(u8),
}

/// Errors during encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Schema lookup failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A schema field has no value
    #[error("Missing field '{field}' for schema '{schema}'")]
    MissingField { schema: String, field: String },

    /// A value was given for a field the schema does not declare
    #[error("Unexpected field '{field}' for schema '{schema}'")]
    UnexpectedField { schema: String, field: String },

    /// Byte string given for a numeric field, or the reverse
    #[error("Type mismatch for field '{field}' of schema '{schema}'")]
    TypeMismatch { schema: String, field: String },
}

/// Errors during decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer too short to hold a header
    #[error("Buffer too short: need at least {needed} bytes, got {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// First byte is not the start marker
    #[error("Invalid header: start byte 0x{0:02x}")]
    InvalidHeader(u8),

    /// Header carries an id with no schema
    #[error("Unknown schema id: {0}")]
    UnknownSchemaId(u8),

    /// Schema lookup by name failed (headerless decode)
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Payload width does not match the schema layout
    #[error("Malformed payload for schema '{schema}': expected {expected} bytes, got {actual}")]
    MalformedPayload {
        schema: String,
        expected: usize,
        actual: usize,
    },
}

/// Errors talking to the satellite modem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Underlying serial I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// No complete response before the line timeout
    #[error("Timeout waiting for response to {command}")]
    Timeout { command: String },

    /// Modem answered something we cannot interpret
    #[error("Unexpected response to {command}: {response:?}")]
    UnexpectedResponse { command: String, response: String },

    /// Modem refused the staged payload (SBDWB result code)
    #[error("Modem rejected outbound payload with code {0}")]
    WriteRejected(u8),

    /// Payload exceeds the modem's MO buffer
    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// MT buffer checksum mismatch
    #[error("Checksum mismatch: expected {expected:04x}, got {actual:04x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Transport closed
    #[error("Transport disconnected")]
    Disconnected,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Errors parsing an inbound command frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is empty
    #[error("Empty command")]
    Empty,

    /// Frame contains non-ASCII bytes
    #[error("Command is not ASCII")]
    NotAscii,

    /// Verb is not part of the grammar
    #[error("Unknown verb: {0}")]
    UnknownVerb(String),

    /// Wrong number of arguments
    #[error("{verb} expects {expected} argument(s), found {found}")]
    WrongArity {
        verb: &'static str,
        expected: usize,
        found: usize,
    },

    /// Argument could not be parsed
    #[error("Invalid {arg} for {verb}: {value:?}")]
    InvalidArgument {
        verb: &'static str,
        arg: &'static str,
        value: String,
    },
}

/// Errors driving the vehicle autopilot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// Request could not be delivered
    #[error("Request failed: {0}")]
    Request(String),

    /// Autopilot bridge answered with an error status
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Answer could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Mode name has no known mode number
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),
}
