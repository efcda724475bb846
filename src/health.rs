//! Link health and heartbeat
//!
//! The outbound loop beats the heart after every iteration. An external
//! supervisor polls the status snapshot and restarts the daemon when the
//! heartbeat goes stale.

use crate::metrics::LinkMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Health status of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Heartbeat fresh, queue short
    Healthy,
    /// Backlog building or heartbeat late
    Degraded,
    /// Heartbeat stale or backlog out of hand
    Unhealthy,
    /// Not assessed yet
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Check if the status is operational (healthy or degraded)
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    /// Check if the status is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    fn worst(self, other: Self) -> Self {
        use HealthStatus::*;
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            (Unknown, x) | (x, Unknown) => x,
            _ => Healthy,
        }
    }
}

/// Health thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// Queue depth before degraded
    pub degraded_queue_depth: usize,
    /// Queue depth before unhealthy
    pub unhealthy_queue_depth: usize,
    /// Heartbeat age before degraded
    pub degraded_heartbeat: Duration,
    /// Heartbeat age before unhealthy
    pub unhealthy_heartbeat: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_queue_depth: 10,
            unhealthy_queue_depth: 100,
            degraded_heartbeat: Duration::from_secs(600),
            unhealthy_heartbeat: Duration::from_secs(3600),
        }
    }
}

impl HealthConfig {
    /// Assess the link from its queue depth and heartbeat age
    pub fn assess(&self, queue_depth: usize, seconds_since_heartbeat: u64) -> HealthStatus {
        let queue = if queue_depth > self.unhealthy_queue_depth {
            HealthStatus::Unhealthy
        } else if queue_depth > self.degraded_queue_depth {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let heartbeat = if seconds_since_heartbeat > self.unhealthy_heartbeat.as_secs() {
            HealthStatus::Unhealthy
        } else if seconds_since_heartbeat > self.degraded_heartbeat.as_secs() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        queue.worst(heartbeat)
    }
}

/// Time of the last completed outbound iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    last: DateTime<Utc>,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

impl Heartbeat {
    /// Start counting from now
    pub fn new() -> Self {
        Self { last: Utc::now() }
    }

    /// Start counting from a given instant
    pub fn at(last: DateTime<Utc>) -> Self {
        Self { last }
    }

    /// Record a beat
    pub fn beat(&mut self) {
        self.last = Utc::now();
    }

    /// Time of the last beat
    pub fn last(&self) -> DateTime<Utc> {
        self.last
    }

    /// Whole seconds between the last beat and `now`, zero if `now` is earlier
    pub fn seconds_since(&self, now: DateTime<Utc>) -> u64 {
        (now - self.last).num_seconds().max(0) as u64
    }
}

/// Point-in-time view of the link, served by the daemon's status endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    /// Time the snapshot was taken
    pub utc_time_now: DateTime<Utc>,
    /// Last heartbeat
    pub utc_time_last_heartbeat: DateTime<Utc>,
    /// Heartbeat age
    pub seconds_since_last_heartbeat: u64,
    /// Envelopes waiting to be sent
    pub queue_depth: usize,
    /// The gateway reported more inbound messages
    pub mt_pending: bool,
    /// Outbound loop rest interval, seconds
    pub output_rest_secs: u64,
    /// Inbound loop rest interval, seconds
    pub input_rest_secs: u64,
    /// Overall assessment
    pub health: HealthStatus,
    /// Counters since start-up
    pub metrics: LinkMetrics,
}

impl LinkStatus {
    /// Generate a human-readable report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Satellite Link Status ===\n\n");
        report.push_str(&format!("Health: {:?}\n", self.health));
        report.push_str(&format!(
            "Last heartbeat: {} ({}s ago)\n",
            self.utc_time_last_heartbeat.to_rfc3339(),
            self.seconds_since_last_heartbeat
        ));
        report.push_str(&format!("Queue depth: {}\n", self.queue_depth));
        report.push_str(&format!("MT pending: {}\n", self.mt_pending));
        report.push_str(&format!(
            "Rest intervals: out {}s, in {}s\n\n",
            self.output_rest_secs, self.input_rest_secs
        ));
        report.push_str(&self.metrics.report());

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_health_status_is_ok() {
        assert!(HealthStatus::Healthy.is_ok());
        assert!(HealthStatus::Degraded.is_ok());
        assert!(!HealthStatus::Unhealthy.is_ok());
        assert!(!HealthStatus::Unknown.is_ok());
    }

    #[test]
    fn test_health_status_default() {
        assert_eq!(HealthStatus::default(), HealthStatus::Unknown);
    }

    #[test]
    fn test_assess() {
        let config = HealthConfig::default();
        assert_eq!(config.assess(0, 0), HealthStatus::Healthy);
        assert_eq!(config.assess(11, 0), HealthStatus::Degraded);
        assert_eq!(config.assess(0, 601), HealthStatus::Degraded);
        assert_eq!(config.assess(101, 0), HealthStatus::Unhealthy);
        assert_eq!(config.assess(11, 3601), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_heartbeat_seconds_since() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let hb = Heartbeat::at(t0);
        let later = Utc.with_ymd_and_hms(2024, 5, 1, 12, 2, 5).unwrap();
        assert_eq!(hb.seconds_since(later), 125);
        assert_eq!(hb.seconds_since(t0 - chrono::Duration::seconds(5)), 0);
    }

    #[test]
    fn test_heartbeat_beat_moves_forward() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut hb = Heartbeat::at(t0);
        hb.beat();
        assert!(hb.last() > t0);
    }

    #[test]
    fn test_link_status_json() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let status = LinkStatus {
            utc_time_now: t0,
            utc_time_last_heartbeat: t0,
            seconds_since_last_heartbeat: 0,
            queue_depth: 2,
            mt_pending: true,
            output_rest_secs: 120,
            input_rest_secs: 10,
            health: HealthStatus::Healthy,
            metrics: LinkMetrics::new(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["secondsSinceLastHeartbeat"], 0);
        assert_eq!(json["queueDepth"], 2);
        assert_eq!(json["mtPending"], true);
        assert_eq!(json["health"], "healthy");
        assert!(json["utcTimeLastHeartbeat"].is_string());
        assert!(status.report().contains("Queue depth: 2"));
    }
}
