//! Link metrics
//!
//! Counters describing what the satellite link has done since start-up:
//! envelopes queued and delivered, sessions run, inbound traffic and
//! command handling.

use crate::queue::DrainReport;
use serde::Serialize;

/// Link statistics collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetrics {
    /// Envelopes added to the outbound queue
    pub envelopes_enqueued: u64,
    /// Envelopes confirmed by a session
    pub envelopes_delivered: u64,
    /// Times an envelope ran out of attempts during a drain
    pub envelopes_exhausted: u64,
    /// Encoded bytes enqueued
    pub bytes_enqueued: u64,
    /// Satellite sessions run for outbound traffic
    pub outbound_sessions: u64,
    /// Satellite sessions run to fetch inbound traffic
    pub inbound_sessions: u64,
    /// Inbound messages received
    pub messages_received: u64,
    /// Inbound bytes received
    pub bytes_received: u64,
    /// Commands that parsed and ran
    pub commands_handled: u64,
    /// Inbound frames that did not parse
    pub commands_rejected: u64,
    /// Drains or polls aborted by a transport error
    pub transport_errors: u64,
}

impl LinkMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an enqueued envelope
    pub fn record_enqueue(&mut self, size: usize) {
        self.envelopes_enqueued += 1;
        self.bytes_enqueued += size as u64;
    }

    /// Record the result of a drain
    pub fn record_drain(&mut self, report: &DrainReport) {
        self.envelopes_delivered += report.delivered.len() as u64;
        self.envelopes_exhausted += report.exhausted.len() as u64;
        self.outbound_sessions += report.attempts as u64;
    }

    /// Record inbound sessions and, if one arrived, the received message
    pub fn record_poll(&mut self, sessions: u32, received: Option<usize>) {
        self.inbound_sessions += sessions as u64;
        if let Some(size) = received {
            self.messages_received += 1;
            self.bytes_received += size as u64;
        }
    }

    /// Record a command frame outcome
    pub fn record_command(&mut self, parsed: bool) {
        if parsed {
            self.commands_handled += 1;
        } else {
            self.commands_rejected += 1;
        }
    }

    /// Record an aborted drain or poll
    pub fn record_transport_error(&mut self) {
        self.transport_errors += 1;
    }

    /// Outbound sessions per delivered envelope
    pub fn sessions_per_delivery(&self) -> f64 {
        if self.envelopes_delivered == 0 {
            return 0.0;
        }
        self.outbound_sessions as f64 / self.envelopes_delivered as f64
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Satellite Link Metrics ===\n\n");
        report.push_str(&format!(
            "Envelopes: {} enqueued ({} bytes), {} delivered, {} exhausted\n",
            self.envelopes_enqueued,
            self.bytes_enqueued,
            self.envelopes_delivered,
            self.envelopes_exhausted
        ));
        report.push_str(&format!(
            "Sessions: {} outbound ({:.1} per delivery), {} inbound\n",
            self.outbound_sessions,
            self.sessions_per_delivery(),
            self.inbound_sessions
        ));
        report.push_str(&format!(
            "Received: {} messages ({} bytes)\n",
            self.messages_received, self.bytes_received
        ));
        report.push_str(&format!(
            "Commands: {} handled, {} rejected\n",
            self.commands_handled, self.commands_rejected
        ));
        if self.transport_errors > 0 {
            report.push_str(&format!("Transport errors: {}\n", self.transport_errors));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_drain() {
        let mut metrics = LinkMetrics::new();
        metrics.record_drain(&DrainReport {
            delivered: vec![1, 2],
            exhausted: vec![3],
            attempts: 14,
        });

        assert_eq!(metrics.envelopes_delivered, 2);
        assert_eq!(metrics.envelopes_exhausted, 1);
        assert!((metrics.sessions_per_delivery() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_poll() {
        let mut metrics = LinkMetrics::new();
        metrics.record_poll(3, None);
        metrics.record_poll(1, Some(12));

        assert_eq!(metrics.inbound_sessions, 4);
        assert_eq!(metrics.messages_received, 1);
        assert_eq!(metrics.bytes_received, 12);
    }

    #[test]
    fn test_commands() {
        let mut metrics = LinkMetrics::new();
        metrics.record_command(true);
        metrics.record_command(false);
        metrics.record_command(false);

        assert_eq!(metrics.commands_handled, 1);
        assert_eq!(metrics.commands_rejected, 2);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = LinkMetrics::new();
        assert_eq!(metrics.sessions_per_delivery(), 0.0);
        assert!(!metrics.report().contains("Transport errors"));
    }

    #[test]
    fn test_report_generation() {
        let mut metrics = LinkMetrics::new();
        metrics.record_enqueue(41);
        metrics.record_transport_error();

        let report = metrics.report();
        assert!(report.contains("1 enqueued (41 bytes)"));
        assert!(report.contains("Transport errors: 1"));
    }

    #[test]
    fn test_reset() {
        let mut metrics = LinkMetrics::new();
        metrics.record_enqueue(10);
        metrics.reset();
        assert_eq!(metrics, LinkMetrics::default());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&LinkMetrics::new()).unwrap();
        assert!(json.contains("\"envelopesDelivered\":0"));
    }
}
