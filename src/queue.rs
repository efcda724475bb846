//! Store-and-forward outbound queue
//!
//! Encoded envelopes wait here until a satellite session confirms them.
//! An envelope leaves the queue only after a successful session; one that
//! exhausts its attempts stays queued for the next drain.
//!
//! Drains run newest first. Telemetry therefore arrives out of
//! chronological order when a backlog builds up; receivers must not assume
//! FIFO delivery.

use crate::error::TransportError;
use crate::recovery::{with_retry, RetryOutcome, RetryPolicy};
use crate::transport::Transport;

/// Identifier of a queued envelope, unique for the queue's lifetime
pub type EnvelopeId = u64;

/// One encoded message awaiting transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Queue-assigned identifier
    pub id: EnvelopeId,
    /// Encoded bytes
    pub payload: Vec<u8>,
    /// Transfer attempts made so far, across all drains
    pub attempts: u32,
}

/// What happened during one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Envelopes delivered and removed, in send order
    pub delivered: Vec<EnvelopeId>,
    /// Envelopes that ran out of attempts and stay queued
    pub exhausted: Vec<EnvelopeId>,
    /// Sessions run during this drain
    pub attempts: u32,
}

impl DrainReport {
    /// True when nothing was left behind
    pub fn is_complete(&self) -> bool {
        self.exhausted.is_empty()
    }
}

/// Outbound store-and-forward queue
#[derive(Debug, Default)]
pub struct OutboundQueue {
    /// Oldest first
    envelopes: Vec<Envelope>,
    next_id: EnvelopeId,
}

impl OutboundQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope; always succeeds
    pub fn enqueue(&mut self, payload: Vec<u8>) -> EnvelopeId {
        let id = self.next_id;
        self.next_id += 1;
        self.envelopes.push(Envelope {
            id,
            payload,
            attempts: 0,
        });
        id
    }

    /// Number of queued envelopes
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Iterate oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter()
    }

    /// Get an envelope by id
    pub fn get(&self, id: EnvelopeId) -> Option<&Envelope> {
        self.envelopes.iter().find(|e| e.id == id)
    }

    /// Remove an envelope; removing an unknown id is a no-op
    pub fn remove(&mut self, id: EnvelopeId) -> Option<Envelope> {
        let pos = self.envelopes.iter().position(|e| e.id == id)?;
        Some(self.envelopes.remove(pos))
    }

    /// Add to an envelope's attempt counter
    pub fn record_attempts(&mut self, id: EnvelopeId, attempts: u32) {
        if let Some(env) = self.envelopes.iter_mut().find(|e| e.id == id) {
            env.attempts += attempts;
        }
    }

    /// Copy of the queue, newest first
    pub fn snapshot_lifo(&self) -> Vec<Envelope> {
        self.envelopes.iter().rev().cloned().collect()
    }

    /// Try to deliver every queued envelope, newest first
    ///
    /// A transport error stops the drain; envelopes not yet confirmed stay
    /// queued.
    pub fn drain<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        policy: &RetryPolicy,
    ) -> Result<DrainReport, TransportError> {
        let mut report = DrainReport::default();
        for envelope in self.snapshot_lifo() {
            match send_envelope(transport, &envelope, policy) {
                Ok(outcome) => {
                    report.attempts += outcome.attempts();
                    self.settle(&envelope, &outcome, &mut report);
                }
                Err(interrupted) => {
                    report.attempts += interrupted.attempts;
                    self.record_attempts(envelope.id, interrupted.attempts);
                    return Err(interrupted.error);
                }
            }
        }
        Ok(report)
    }

    /// Apply the outcome of one envelope's sessions
    pub(crate) fn settle(
        &mut self,
        envelope: &Envelope,
        outcome: &RetryOutcome,
        report: &mut DrainReport,
    ) {
        match outcome {
            RetryOutcome::Succeeded { .. } => {
                self.remove(envelope.id);
                report.delivered.push(envelope.id);
            }
            RetryOutcome::Exhausted { attempts, .. } => {
                self.record_attempts(envelope.id, *attempts);
                report.exhausted.push(envelope.id);
            }
        }
    }
}

/// An envelope's sessions cut short by a transport error
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Interrupted {
    pub(crate) error: TransportError,
    /// Transfers started before the error, the failing one included
    pub(crate) attempts: u32,
}

/// Stage one envelope and run sessions until it is confirmed or the
/// policy runs out
///
/// Unless the envelope is confirmed, the MO buffer is emptied afterwards
/// so that an unrelated session (a ring answer) cannot send it behind the
/// queue's back.
pub(crate) fn send_envelope<T: Transport + ?Sized>(
    transport: &mut T,
    envelope: &Envelope,
    policy: &RetryPolicy,
) -> Result<RetryOutcome, Interrupted> {
    log::info!(
        "Sending envelope {} ({} bytes, {} earlier attempts)",
        envelope.id,
        envelope.payload.len(),
        envelope.attempts
    );
    let mut attempts = 0;
    let sent = transport.write_outbound(&envelope.payload).and_then(|()| {
        with_retry(policy, |_| {
            attempts += 1;
            transport.transfer(false)
        })
    });
    let outcome = match sent {
        Ok(outcome) => outcome,
        Err(error) => {
            log::warn!("Envelope {} interrupted: {}", envelope.id, error);
            discard_staged(transport, envelope.id);
            return Err(Interrupted { error, attempts });
        }
    };

    match &outcome {
        RetryOutcome::Succeeded { status, attempts } => log::info!(
            "Envelope {} delivered after {} attempt(s), momsn {}",
            envelope.id,
            attempts,
            status.momsn
        ),
        RetryOutcome::Exhausted { attempts, .. } => {
            log::warn!(
                "Envelope {} not delivered after {} attempt(s), keeping it queued",
                envelope.id,
                attempts
            );
            discard_staged(transport, envelope.id);
        }
    }
    Ok(outcome)
}

fn discard_staged<T: Transport + ?Sized>(transport: &mut T, id: EnvelopeId) {
    if let Err(e) = transport.clear_outbound() {
        log::warn!("Could not clear the MO buffer after envelope {}: {}", id, e);
    }
}
