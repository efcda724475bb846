//! Stress tests for the satellite link
//!
//! Run with: cargo test --release stress -- --ignored

use sats_link::*;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_encoding() {
    let iterations = 1_000_000;
    let start = Instant::now();

    for i in 0..iterations {
        let telemetry = GlobalTelemetry {
            heading: (i % 256) as u8,
            lattitude: (i as f32 * 0.001).sin() * 90.0,
            vdop: (i % 65536) as u16,
            ..Default::default()
        };
        let _bytes = Message::Global(telemetry).encode().unwrap();
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Encoded {} messages in {:?}", iterations, elapsed);
    println!("Rate: {:.0} messages/second", rate);

    assert!(
        rate > 100_000.0,
        "Should encode at least 100k msg/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_roundtrip() {
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let message = Message::Waypoint(WaypointReport {
            lattitude: (i as f32 * 0.01).sin() * 80.0,
            longitude: (i as f32 * 0.01).cos() * 170.0,
            holding_time: (i % 600) as u16,
        });
        let bytes = message.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();

        assert_eq!(decoded, message, "Roundtrip failed at iteration {}", i);
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Roundtrip {} messages in {:?}", iterations, elapsed);
    println!("Rate: {:.0} messages/second", rate);

    assert!(
        rate > 50_000.0,
        "Should roundtrip at least 50k msg/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_concurrent_producers_and_drains() {
    let session = Arc::new(TransferSession::with_config(
        MemoryTransport::new().script((0..5000).map(|i| if i % 3 == 0 { 32 } else { 0 })),
        SessionConfig::with_retry(RetryPolicy::immediate(10)),
    ));

    let producers = 4;
    let per_producer = 2_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let s = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..per_producer {
                    let text = format!("p{}:{}", p, i);
                    s.enqueue_message(&Message::text(&text)).unwrap();
                    if i % 100 == 0 {
                        s.drain().unwrap();
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    session.drain().unwrap();

    let elapsed = start.elapsed();
    let total = producers * per_producer;

    println!("Queued and delivered {} envelopes in {:?}", total, elapsed);

    assert_eq!(session.queue_depth(), 0);
    session.with_transport(|t| {
        let mut delivered = t.delivered().to_vec();
        assert_eq!(delivered.len(), total);
        delivered.sort();
        delivered.dedup();
        assert_eq!(delivered.len(), total, "No envelope may be delivered twice");
    });
}

#[test]
#[ignore]
fn stress_test_command_parsing() {
    let frames = [
        "waypoint:-22.9068:-43.1729:60:3",
        "set_mode:smart_rtl",
        "set_param:CRUISE_SPEED:1.5",
        "output_rest_time:300",
        "foo:bar",
    ];

    let iterations = 1_000_000;
    let start = Instant::now();
    let mut parsed = 0usize;

    for i in 0..iterations {
        if Command::parse(frames[i % frames.len()]).is_ok() {
            parsed += 1;
        }
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Parsed {} frames in {:?}", iterations, elapsed);
    println!("Rate: {:.0} frames/second", rate);

    assert_eq!(parsed, iterations / 5 * 4);
    assert!(
        rate > 200_000.0,
        "Should parse at least 200k frames/s, got {:.0}",
        rate
    );
}
