//! Transfer session
//!
//! [`TransferSession`] is the state shared by the daemon's outbound and
//! inbound loops: the single modem handle, the outbound queue, the
//! MT-pending flag, the runtime-adjustable rest intervals, the heartbeat
//! and the link counters. Share it behind an `Arc`.
//!
//! Lock order is transport, then queue. The queue lock is only held for
//! short bookkeeping steps, so producers can enqueue while a drain is
//! talking to the satellites.

use crate::error::{EncodeError, TransportError};
use crate::health::{HealthConfig, Heartbeat, LinkStatus};
use crate::message::Message;
use crate::metrics::LinkMetrics;
use crate::queue::{send_envelope, DrainReport, Envelope, EnvelopeId, OutboundQueue};
use crate::recovery::{with_retry, RetryOutcome, RetryPolicy};
use crate::transport::{ModemInfo, Transport};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default rest between outbound iterations
pub const DEFAULT_OUTPUT_REST: Duration = Duration::from_secs(120);

/// Default rest between inbound polls
pub const DEFAULT_INPUT_REST: Duration = Duration::from_secs(10);

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Retry policy for every satellite session
    pub retry: RetryPolicy,
    /// Initial outbound rest interval
    pub output_rest: Duration,
    /// Initial inbound rest interval
    pub input_rest: Duration,
    /// Health thresholds for status snapshots
    pub health: HealthConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            output_rest: DEFAULT_OUTPUT_REST,
            input_rest: DEFAULT_INPUT_REST,
            health: HealthConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Configuration with a custom retry policy
    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Default::default()
        }
    }

    /// Set both rest intervals
    pub fn with_rest(mut self, output: Duration, input: Duration) -> Self {
        self.output_rest = output;
        self.input_rest = input;
        self
    }
}

/// Current loop rest intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestIntervals {
    pub output: Duration,
    pub input: Duration,
}

/// Shared store-and-forward state around one transport
#[derive(Debug)]
pub struct TransferSession<T> {
    transport: Mutex<T>,
    queue: Mutex<OutboundQueue>,
    mt_pending: AtomicBool,
    output_rest_ms: AtomicU64,
    input_rest_ms: AtomicU64,
    heartbeat: Mutex<Heartbeat>,
    metrics: Mutex<LinkMetrics>,
    retry: RetryPolicy,
    health: HealthConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

impl<T: Transport> TransferSession<T> {
    /// Create a session with default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with custom configuration
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            queue: Mutex::new(OutboundQueue::new()),
            mt_pending: AtomicBool::new(false),
            output_rest_ms: AtomicU64::new(millis(config.output_rest)),
            input_rest_ms: AtomicU64::new(millis(config.input_rest)),
            heartbeat: Mutex::new(Heartbeat::new()),
            metrics: Mutex::new(LinkMetrics::new()),
            retry: config.retry,
            health: config.health,
        }
    }

    /// Queue an encoded payload
    pub fn enqueue(&self, payload: Vec<u8>) -> EnvelopeId {
        lock(&self.metrics).record_enqueue(payload.len());
        let id = lock(&self.queue).enqueue(payload);
        log::debug!("Queued envelope {}", id);
        id
    }

    /// Encode and queue a message
    pub fn enqueue_message(&self, message: &Message) -> Result<EnvelopeId, EncodeError> {
        let payload = message.encode()?;
        Ok(self.enqueue(payload))
    }

    /// Number of queued envelopes
    pub fn queue_depth(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Copy of the queued envelopes, oldest first
    pub fn queued(&self) -> Vec<Envelope> {
        lock(&self.queue).iter().cloned().collect()
    }

    /// Try to deliver every queued envelope, newest first
    ///
    /// Holds the transport for the whole drain. Envelopes enqueued while
    /// the drain runs wait for the next one. On a transport error the
    /// drain stops and everything not yet confirmed stays queued.
    pub fn drain(&self) -> Result<DrainReport, TransportError> {
        let mut transport = lock(&self.transport);
        let snapshot = lock(&self.queue).snapshot_lifo();
        let mut report = DrainReport::default();

        if !snapshot.is_empty() {
            log::info!("Draining {} envelope(s)", snapshot.len());
        }

        for envelope in snapshot {
            if lock(&self.queue).get(envelope.id).is_none() {
                continue;
            }
            match send_envelope(&mut *transport, &envelope, &self.retry) {
                Ok(outcome) => {
                    report.attempts += outcome.attempts();
                    lock(&self.queue).settle(&envelope, &outcome, &mut report);
                }
                Err(interrupted) => {
                    report.attempts += interrupted.attempts;
                    lock(&self.queue).record_attempts(envelope.id, interrupted.attempts);
                    let mut metrics = lock(&self.metrics);
                    metrics.record_drain(&report);
                    metrics.record_transport_error();
                    return Err(interrupted.error);
                }
            }
        }

        lock(&self.metrics).record_drain(&report);
        Ok(report)
    }

    /// Fetch one inbound message if the modem signals one
    ///
    /// A transfer runs only when the ring indicator is up or the previous
    /// transfer reported more messages at the gateway. The MO buffer is
    /// emptied first; only a drain may send queued envelopes.
    pub fn poll(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut transport = lock(&self.transport);
        let result = self.poll_locked(&mut *transport);
        if result.is_err() {
            lock(&self.metrics).record_transport_error();
        }
        result
    }

    fn poll_locked(&self, transport: &mut T) -> Result<Option<Vec<u8>>, TransportError> {
        let status = transport.status()?;
        if status.ring_alert {
            log::info!("Ring alert received, an MT message may be waiting");
        }
        if !status.ring_alert && !self.mt_pending() {
            return Ok(None);
        }

        if status.mo_flag {
            log::debug!("Clearing a staged MO payload before answering");
            transport.clear_outbound()?;
        }

        log::info!("Pulling messages from the satellites");
        match with_retry(&self.retry, |_| transport.transfer(true))? {
            RetryOutcome::Succeeded { status, attempts } => {
                self.mt_pending.store(status.mt_pending(), Ordering::SeqCst);
                if status.mt_pending() {
                    log::debug!("{} MT message(s) still queued", status.mt_queued);
                }
                let message = if status.has_mt_message() {
                    let data = transport.read_inbound()?;
                    log::info!("Received {} byte(s), mtmsn {}", data.len(), status.mtmsn);
                    Some(data)
                } else {
                    None
                };
                lock(&self.metrics).record_poll(attempts, message.as_ref().map(Vec::len));
                Ok(message)
            }
            RetryOutcome::Exhausted { attempts, .. } => {
                log::warn!("No inbound session succeeded after {} attempt(s)", attempts);
                lock(&self.metrics).record_poll(attempts, None);
                Ok(None)
            }
        }
    }

    /// Whether the gateway reported more inbound messages
    pub fn mt_pending(&self) -> bool {
        self.mt_pending.load(Ordering::SeqCst)
    }

    /// Current rest intervals
    pub fn rest_intervals(&self) -> RestIntervals {
        RestIntervals {
            output: Duration::from_millis(self.output_rest_ms.load(Ordering::SeqCst)),
            input: Duration::from_millis(self.input_rest_ms.load(Ordering::SeqCst)),
        }
    }

    /// Change the outbound rest interval
    pub fn set_output_rest(&self, rest: Duration) {
        log::info!("Setting data output rest time to {} seconds", rest.as_secs());
        self.output_rest_ms.store(millis(rest), Ordering::SeqCst);
    }

    /// Change the inbound rest interval
    pub fn set_input_rest(&self, rest: Duration) {
        log::info!("Setting data input rest time to {} seconds", rest.as_secs());
        self.input_rest_ms.store(millis(rest), Ordering::SeqCst);
    }

    /// Record a heartbeat
    pub fn beat(&self) {
        lock(&self.heartbeat).beat();
    }

    /// Record a command frame outcome
    pub fn record_command(&self, parsed: bool) {
        lock(&self.metrics).record_command(parsed);
    }

    /// Copy of the link counters
    pub fn metrics(&self) -> LinkMetrics {
        lock(&self.metrics).clone()
    }

    /// Snapshot for the status endpoint
    pub fn status(&self) -> LinkStatus {
        let now = Utc::now();
        let heartbeat = *lock(&self.heartbeat);
        let seconds = heartbeat.seconds_since(now);
        let queue_depth = self.queue_depth();
        let rest = self.rest_intervals();

        LinkStatus {
            utc_time_now: now,
            utc_time_last_heartbeat: heartbeat.last(),
            seconds_since_last_heartbeat: seconds,
            queue_depth,
            mt_pending: self.mt_pending(),
            output_rest_secs: rest.output.as_secs(),
            input_rest_secs: rest.input.as_secs(),
            health: self.health.assess(queue_depth, seconds),
            metrics: self.metrics(),
        }
    }

    /// Read modem identification
    pub fn modem_info(&self) -> Result<ModemInfo, TransportError> {
        lock(&self.transport).info()
    }

    /// Run `f` with exclusive access to the transport
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *lock(&self.transport))
    }
}
