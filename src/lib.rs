//! # Sats Link - Satellite telemetry link
//!
//! Telemetry codec and store-and-forward Iridium SBD link for an
//! autonomous surface vehicle.
//!
//! ## Key Features
//!
//! - **Compact Wire Format**: `'$'`, a schema id, then fixed-width
//!   little-endian fields
//! - **Store and Forward**: Envelopes stay queued until a session confirms them
//! - **Bounded Retries**: Each envelope gets a fixed number of sessions per drain
//! - **Remote Commands**: ASCII command frames drive the autopilot and are
//!   always acknowledged
//!
//! ## Quick Start
//!
//! ```rust
//! use sats_link::{Message, MemoryTransport, TransferSession, WaypointReport};
//!
//! let session = TransferSession::new(MemoryTransport::new());
//!
//! let report = Message::Waypoint(WaypointReport {
//!     lattitude: -22.9,
//!     longitude: -43.2,
//!     holding_time: 60,
//! });
//! session.enqueue_message(&report).unwrap();
//!
//! let drained = session.drain().unwrap();
//! assert_eq!(drained.delivered.len(), 1);
//! assert_eq!(session.queue_depth(), 0);
//! ```
//!
//! ## Modules
//!
//! - [`schema`]: Message schemas and wire types
//! - [`protocol`]: Field values and wire constants
//! - [`encoder`] / [`decoder`]: Field map codec
//! - [`message`]: Typed messages
//! - [`queue`]: Outbound store-and-forward queue
//! - [`transport`]: Modem abstraction
//! - [`modem`]: Iridium 9602/9603 driver
//! - [`session`]: Shared drain/poll state
//! - [`command`] / [`dispatcher`]: Inbound command handling
//! - [`metrics`] / [`health`]: Link counters and heartbeat

// Modules
pub mod command;
pub mod decoder;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod health;
pub mod message;
pub mod metrics;
pub mod modem;
pub mod protocol;
pub mod queue;
pub mod recovery;
pub mod schema;
pub mod session;
pub mod transport;

// Re-exports for convenient access
pub use command::{Command, VehicleMode};
pub use decoder::{decode, decode_headerless};
pub use dispatcher::{
    Actuator, ActuatorCall, DispatchOutcome, Dispatcher, DispatcherConfig, RecordingActuator,
};
pub use encoder::{encode, encode_headerless};
pub use error::{
    ActuatorError, DecodeError, EncodeError, LinkError, ParseError, Result, SchemaError,
    TransportError,
};
pub use health::{HealthConfig, HealthStatus, Heartbeat, LinkStatus};
pub use message::{ControlMessage, GlobalTelemetry, Message, TextMessage, WaypointReport};
pub use metrics::LinkMetrics;
pub use modem::{ModemConfig, RockBlock};
pub use protocol::{DecodedMessage, FieldMap, Value};
pub use queue::{DrainReport, Envelope, EnvelopeId, OutboundQueue};
pub use recovery::{with_retry, with_retry_metrics, RetryOutcome, RetryPolicy, RetryResult};
pub use schema::{get_schema, get_schema_by_id, schemas, Field, MessageSchema, WireType};
pub use session::{RestIntervals, SessionConfig, TransferSession};
pub use transport::{MemoryTransport, ModemInfo, ModemStatus, TransferStatus, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest SBD mobile-originated payload in bytes
pub const MAX_PAYLOAD_SIZE: usize = modem::MAX_MO_PAYLOAD;
