//! End-to-end tests for the satellite link
//!
//! Codec round trips over every schema, then the store-and-forward and
//! command paths through a scripted transport.

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use sats_link::*;
use std::sync::{Arc, Weak};

fn random_fields(schema: &MessageSchema, rng: &mut StdRng) -> FieldMap {
    schema
        .fields
        .iter()
        .map(|field| {
            let value = match field.wire_type {
                WireType::U8 => Value::Int(rng.gen_range(0..=u8::MAX as i64)),
                WireType::U16 => Value::Int(rng.gen_range(0..=u16::MAX as i64)),
                WireType::F32 => Value::Float(rng.gen_range(-180.0f32..180.0) as f64),
                WireType::Bytes(n) => Value::Bytes((0..n).map(|_| rng.gen()).collect()),
            };
            (field.name.to_string(), value)
        })
        .collect()
}

fn session(transport: MemoryTransport) -> TransferSession<MemoryTransport> {
    TransferSession::with_config(transport, SessionConfig::with_retry(RetryPolicy::immediate(10)))
}

fn delivered_texts(session: &TransferSession<MemoryTransport>) -> Vec<String> {
    session.with_transport(|t| {
        t.delivered()
            .iter()
            .filter_map(|p| match Message::decode(p) {
                Ok(Message::Text(text)) => Some(text.text()),
                _ => None,
            })
            .collect()
    })
}

#[test]
fn test_roundtrip_every_schema() {
    let mut rng = StdRng::seed_from_u64(7);

    for schema in schemas() {
        for _ in 0..50 {
            let fields = random_fields(schema, &mut rng);
            let bytes = encode(schema.name, &fields).unwrap();
            assert_eq!(bytes.len(), 2 + schema.payload_len());

            let decoded = decode(&bytes).unwrap();
            assert_eq!(decoded.name, schema.name);
            assert_eq!(decoded.schema_id, schema.id);
            assert_eq!(decoded.fields, fields);
        }
    }
}

#[test]
fn test_roundtrip_rounds_floats_to_f32() {
    let mut fields = FieldMap::new();
    fields.insert("lattitude".into(), Value::Float(-22.906847));
    fields.insert("longitude".into(), Value::Float(-43.172897));
    fields.insert("holding_time".into(), Value::Int(15));

    let decoded = decode(&encode("waypoint", &fields).unwrap()).unwrap();

    assert_relative_eq!(
        decoded.get("lattitude").and_then(Value::as_f64).unwrap(),
        -22.906847,
        epsilon = 1e-5
    );
    assert_relative_eq!(
        decoded.get("longitude").and_then(Value::as_f64).unwrap(),
        -43.172897,
        epsilon = 1e-5
    );
    assert_eq!(decoded.get("holding_time"), Some(&Value::Int(15)));
}

#[test]
fn test_decode_rejections() {
    let good = Message::text("hello").encode().unwrap();

    let mut bad_header = good.clone();
    bad_header[0] = b'#';
    assert_eq!(decode(&bad_header), Err(DecodeError::InvalidHeader(b'#')));

    let mut bad_id = good.clone();
    bad_id[1] = 9;
    assert_eq!(decode(&bad_id), Err(DecodeError::UnknownSchemaId(9)));

    let truncated = &good[..good.len() - 1];
    assert!(matches!(
        decode(truncated),
        Err(DecodeError::MalformedPayload {
            expected: 40,
            actual: 39,
            ..
        })
    ));
}

#[test]
fn test_typed_global_roundtrip() {
    let telemetry = GlobalTelemetry {
        heading: 200,
        battery_voltage: 170,
        gps_fix_type: 3,
        sat_number: 11,
        lattitude: -22.5,
        longitude: -43.25,
        vdop: 120,
        hdop: 90,
        ..Default::default()
    };
    let bytes = Message::Global(telemetry).encode().unwrap();
    assert_eq!(bytes.len(), 43);
    assert_eq!(Message::decode(&bytes), Ok(Message::Global(telemetry)));
}

#[test]
fn test_drain_sends_newest_first() {
    let s = session(MemoryTransport::new());
    s.enqueue(b"A".to_vec());
    s.enqueue(b"B".to_vec());

    s.drain().unwrap();

    s.with_transport(|t| assert_eq!(t.delivered(), &[b"B".to_vec(), b"A".to_vec()]));
}

#[test]
fn test_removed_only_after_tenth_attempt() {
    let s = session(MemoryTransport::new().script([6; 9]));
    let id = s.enqueue(b"A".to_vec());

    let report = s.drain().unwrap();

    assert_eq!(report.delivered, vec![id]);
    assert_eq!(report.attempts, 10);
    assert_eq!(s.queue_depth(), 0);
}

/// Scripted transport that notes the link's queue depth as each transfer
/// starts
struct DepthWatch {
    inner: MemoryTransport,
    link: Weak<TransferSession<DepthWatch>>,
    depths: Vec<usize>,
}

impl Transport for DepthWatch {
    fn status(&mut self) -> std::result::Result<ModemStatus, TransportError> {
        self.inner.status()
    }

    fn write_outbound(&mut self, payload: &[u8]) -> std::result::Result<(), TransportError> {
        self.inner.write_outbound(payload)
    }

    fn clear_outbound(&mut self) -> std::result::Result<(), TransportError> {
        self.inner.clear_outbound()
    }

    fn transfer(&mut self, answer_ring: bool) -> std::result::Result<TransferStatus, TransportError> {
        if let Some(link) = self.link.upgrade() {
            self.depths.push(link.queue_depth());
        }
        self.inner.transfer(answer_ring)
    }

    fn read_inbound(&mut self) -> std::result::Result<Vec<u8>, TransportError> {
        self.inner.read_inbound()
    }
}

#[test]
fn test_envelope_stays_queued_until_its_session_succeeds() {
    let s = Arc::new_cyclic(|link: &Weak<TransferSession<DepthWatch>>| {
        TransferSession::with_config(
            DepthWatch {
                inner: MemoryTransport::new().script([6; 9]),
                link: link.clone(),
                depths: Vec::new(),
            },
            SessionConfig::with_retry(RetryPolicy::immediate(10)),
        )
    });
    s.enqueue(b"A".to_vec());

    let report = s.drain().unwrap();

    assert_eq!(report.attempts, 10);
    s.with_transport(|t| {
        assert_eq!(t.depths, vec![1; 10]);
        assert_eq!(t.inner.delivered(), &[b"A".to_vec()]);
    });
    assert_eq!(s.queue_depth(), 0);
}

#[test]
fn test_ring_answer_never_sends_a_queued_envelope() {
    let s = session(MemoryTransport::always(6));
    s.enqueue(b"A".to_vec());
    s.drain().unwrap();

    s.with_transport(|t| {
        t.set_default_status(0);
        t.push_incoming(b"arm".to_vec());
        t.ring();
    });
    assert_eq!(s.poll().unwrap(), Some(b"arm".to_vec()));
    s.drain().unwrap();

    s.with_transport(|t| assert_eq!(t.delivered(), &[b"A".to_vec()]));
}

#[test]
fn test_stuck_envelope_survives_and_is_sent_once() {
    let s = session(MemoryTransport::always(6));
    s.enqueue(b"A".to_vec());

    for _ in 0..3 {
        let report = s.drain().unwrap();
        assert_eq!(report.exhausted.len(), 1);
        assert_eq!(s.queue_depth(), 1);
    }

    s.with_transport(|t| t.set_default_status(0));
    s.drain().unwrap();
    s.drain().unwrap();

    s.with_transport(|t| assert_eq!(t.delivered(), &[b"A".to_vec()]));
}

#[test]
fn test_set_mode_command_acknowledged() {
    let s = session(MemoryTransport::new());
    let d = Dispatcher::with_config(RecordingActuator::new(), DispatcherConfig::immediate());

    d.handle(&s, b"set_mode:auto");

    assert_eq!(
        d.actuator().calls(),
        vec![ActuatorCall::SetMode(VehicleMode::Auto)]
    );
    assert_eq!(delivered_texts(&s), vec!["cmd_ack:set_mode:auto"]);
}

#[test]
fn test_unknown_command_acknowledged_without_effect() {
    let s = session(MemoryTransport::new());
    let d = Dispatcher::with_config(RecordingActuator::new(), DispatcherConfig::immediate());

    d.handle(&s, b"foo:bar");

    assert!(d.actuator().calls().is_empty());
    assert_eq!(delivered_texts(&s), vec!["cmd_ack:foo:bar"]);
}

#[test]
fn test_inbound_command_round_trip() {
    let s = session(MemoryTransport::new());
    let d = Dispatcher::with_config(RecordingActuator::new(), DispatcherConfig::immediate());
    s.with_transport(|t| {
        t.push_incoming(b"input_rest_time:30".to_vec());
        t.ring();
    });

    let frame = s.poll().unwrap().expect("a message after the ring alert");
    let outcome = d.handle(&s, &frame);

    assert!(outcome.is_success());
    assert_eq!(s.rest_intervals().input.as_secs(), 30);
    assert_eq!(delivered_texts(&s), vec!["cmd_ack:input_rest_time:30"]);

    let status = s.status();
    assert_eq!(status.metrics.messages_received, 1);
    assert_eq!(status.metrics.commands_handled, 1);
    assert_eq!(status.input_rest_secs, 30);
}
