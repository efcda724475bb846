//! Retry logic for satellite sessions
//!
//! A session "fails" when the modem reports an MO status above the success
//! threshold. Failed sessions are retried a bounded number of times with a
//! fixed delay. Running out of attempts is an outcome, not an error: the
//! caller keeps the message and tries again on its next cycle.

use crate::error::TransportError;
use crate::transport::TransferStatus;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default number of attempts per message
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Delay between attempts
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Policy with no delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (0-indexed)
    ///
    /// Returns None if no more attempts should be made
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 < self.max_attempts {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// Result of a retried session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// A session succeeded
    Succeeded {
        /// Status of the successful session
        status: TransferStatus,
        /// Number of attempts made
        attempts: u32,
    },
    /// Every attempt reported failure
    Exhausted {
        /// Status of the last attempt, if any was made
        last_status: Option<TransferStatus>,
        /// Number of attempts made
        attempts: u32,
    },
}

impl RetryOutcome {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Status of the successful session
    pub fn succeeded(&self) -> Option<TransferStatus> {
        match self {
            Self::Succeeded { status, .. } => Some(*status),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Run `session` until it reports success or the policy runs out
///
/// The closure receives the 0-indexed attempt number. Transport errors
/// abort immediately and are returned to the caller.
///
/// # Example
///
/// ```
/// use sats_link::recovery::{with_retry, RetryPolicy};
/// use sats_link::transport::TransferStatus;
///
/// let policy = RetryPolicy::immediate(3);
/// let outcome = with_retry(&policy, |attempt| {
///     Ok(TransferStatus::with_mo(if attempt < 2 { 32 } else { 0 }))
/// })
/// .unwrap();
/// assert_eq!(outcome.attempts(), 3);
/// assert!(outcome.succeeded().is_some());
/// ```
pub fn with_retry<F>(policy: &RetryPolicy, mut session: F) -> Result<RetryOutcome, TransportError>
where
    F: FnMut(u32) -> Result<TransferStatus, TransportError>,
{
    let mut last_status = None;
    for attempt in 0..policy.max_attempts {
        let status = session(attempt)?;
        if status.is_success() {
            return Ok(RetryOutcome::Succeeded {
                status,
                attempts: attempt + 1,
            });
        }
        log::debug!(
            "Attempt {} failed with status {} ({})",
            attempt + 1,
            status.mo_status,
            status.describe()
        );
        last_status = Some(status);
        if let Some(delay) = policy.delay_for_attempt(attempt) {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }
    Ok(RetryOutcome::Exhausted {
        last_status,
        attempts: policy.max_attempts,
    })
}

/// Retry result with timing
#[derive(Debug, Clone, Copy)]
pub struct RetryResult {
    /// The outcome
    pub outcome: RetryOutcome,
    /// Total time spent in sessions and delays
    pub total_duration: Duration,
}

/// Execute [`with_retry`] and measure how long it took
pub fn with_retry_metrics<F>(policy: &RetryPolicy, session: F) -> Result<RetryResult, TransportError>
where
    F: FnMut(u32) -> Result<TransferStatus, TransportError>,
{
    let start = Instant::now();
    let outcome = with_retry(policy, session)?;
    Ok(RetryResult {
        outcome,
        total_duration: start.elapsed(),
    })
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_millis(100));
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(2), None);
    }

    #[test]
    fn test_with_retry_success() {
        let policy = RetryPolicy::immediate(3);
        let outcome = with_retry(&policy, |_| Ok(TransferStatus::with_mo(0))).unwrap();
        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.succeeded().is_some());
    }

    #[test]
    fn test_with_retry_eventual_success() {
        let policy = RetryPolicy::immediate(10);
        let mut calls = 0;
        let outcome = with_retry(&policy, |attempt| {
            calls += 1;
            Ok(TransferStatus::with_mo(if attempt < 9 { 6 } else { 0 }))
        })
        .unwrap();
        assert_eq!(calls, 10);
        assert_eq!(outcome.attempts(), 10);
        assert!(outcome.succeeded().is_some());
    }

    #[test]
    fn test_with_retry_exhausted() {
        let policy = RetryPolicy::immediate(4);
        let mut calls = 0;
        let outcome = with_retry(&policy, |_| {
            calls += 1;
            Ok(TransferStatus::with_mo(6))
        })
        .unwrap();
        assert_eq!(calls, 4);
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_status: Some(TransferStatus::with_mo(6)),
                attempts: 4,
            }
        );
    }

    #[test]
    fn test_with_retry_transport_error_aborts() {
        let policy = RetryPolicy::immediate(5);
        let mut calls = 0;
        let result = with_retry(&policy, |_| {
            calls += 1;
            Err(TransportError::Disconnected)
        });
        assert_eq!(result, Err(TransportError::Disconnected));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_attempts() {
        let policy = RetryPolicy::immediate(0);
        let outcome = with_retry(&policy, |_| Ok(TransferStatus::with_mo(0))).unwrap();
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_status: None,
                attempts: 0,
            }
        );
    }

    #[test]
    fn test_with_retry_metrics_sleeps_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5));
        let result = with_retry_metrics(&policy, |_| Ok(TransferStatus::with_mo(6))).unwrap();
        assert_eq!(result.outcome.attempts(), 3);
        assert!(result.total_duration >= Duration::from_millis(10));
    }
}
