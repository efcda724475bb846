//! Transport abstraction module
//!
//! This module provides the trait implemented by satellite modem drivers,
//! the session status types they report, and an in-memory scripted
//! transport for testing and dry runs.

use crate::error::TransportError;
use serde::Serialize;
use std::collections::VecDeque;

/// Highest MO status code the modem reports for a successful session.
///
/// Part of the modem's status protocol; kept as an opaque threshold.
pub const SUCCESS_THRESHOLD: u8 = 5;

/// Result of one SBD session (`+SBDIX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TransferStatus {
    /// Mobile-originated status code (0-255)
    pub mo_status: u8,
    /// Mobile-originated message sequence number
    pub momsn: u16,
    /// Mobile-terminated status: 0 none, 1 received, 2 mailbox check error
    pub mt_status: u8,
    /// Mobile-terminated message sequence number
    pub mtmsn: u16,
    /// Length of the received MT message
    pub mt_length: u16,
    /// MT messages still queued at the gateway
    pub mt_queued: u16,
}

impl TransferStatus {
    /// Status with only the MO code set
    pub fn with_mo(mo_status: u8) -> Self {
        Self {
            mo_status,
            ..Default::default()
        }
    }

    /// Whether the session succeeded
    pub fn is_success(&self) -> bool {
        self.mo_status <= SUCCESS_THRESHOLD
    }

    /// Whether an MT message was received into the modem buffer
    pub fn has_mt_message(&self) -> bool {
        self.mt_status == 1
    }

    /// Whether the gateway holds more MT messages
    pub fn mt_pending(&self) -> bool {
        self.mt_queued > 0
    }

    /// Human readable description of the MO status
    pub fn describe(&self) -> &'static str {
        mo_status_message(self.mo_status)
    }
}

/// Modem buffer and ring indicator state (`+SBDSX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModemStatus {
    /// A message is staged in the MO buffer
    pub mo_flag: bool,
    /// Next MO sequence number
    pub momsn: u16,
    /// A message is held in the MT buffer
    pub mt_flag: bool,
    /// Sequence number of the MT buffer message
    pub mtmsn: u16,
    /// A ring alert was received and not yet answered
    pub ring_alert: bool,
    /// MT messages waiting at the gateway
    pub waiting: u16,
}

/// Modem identification
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ModemInfo {
    pub model: String,
    pub revision: String,
    pub serial_number: String,
}

/// Trait for satellite transports
pub trait Transport {
    /// Read buffer and ring indicator state
    fn status(&mut self) -> Result<ModemStatus, TransportError>;

    /// Stage a payload in the MO buffer
    fn write_outbound(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Empty the MO buffer so no later session sends a stale payload
    fn clear_outbound(&mut self) -> Result<(), TransportError>;

    /// Run one SBD session, answering a pending ring alert if asked
    fn transfer(&mut self, answer_ring: bool) -> Result<TransferStatus, TransportError>;

    /// Read the MT buffer
    fn read_inbound(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Modem identification
    fn info(&mut self) -> Result<ModemInfo, TransportError> {
        Ok(ModemInfo::default())
    }

    /// Stage a payload and run one session
    fn send(&mut self, payload: &[u8]) -> Result<TransferStatus, TransportError> {
        self.write_outbound(payload)?;
        self.transfer(false)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn status(&mut self) -> Result<ModemStatus, TransportError> {
        (**self).status()
    }

    fn write_outbound(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).write_outbound(payload)
    }

    fn clear_outbound(&mut self) -> Result<(), TransportError> {
        (**self).clear_outbound()
    }

    fn transfer(&mut self, answer_ring: bool) -> Result<TransferStatus, TransportError> {
        (**self).transfer(answer_ring)
    }

    fn read_inbound(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).read_inbound()
    }

    fn info(&mut self) -> Result<ModemInfo, TransportError> {
        (**self).info()
    }
}

/// Description of an MO status code, as documented for the 9602/9603 modems
pub fn mo_status_message(code: u8) -> &'static str {
    match code {
        0 => "MO message, if any, transferred successfully",
        1 => "MO message, if any, transferred successfully, but the MT message in the queue was too big to be transferred",
        2 => "MO message, if any, transferred successfully, but the requested Location Update was not accepted",
        3..=4 => "Reserved, but indicate MO session success if used",
        5..=8 => "Reserved, but indicate MO session failure if used",
        10 => "GSS reported that the call did not complete in the allowed time",
        11 => "MO message queue at the GSS is full",
        12 => "MO message has too many segments",
        13 => "GSS reported that the session did not complete",
        14 => "Invalid segment size",
        15 => "Access is denied",
        16 => "ISU has been locked and may not make SBD calls",
        17 => "Gateway not responding (local session timeout)",
        18 => "Connection lost (RF drop)",
        19 => "Link failure (A protocol error caused termination of the call)",
        32 => "No network service, unable to initiate call",
        33 => "Antenna fault, unable to initiate call",
        34 => "Radio is disabled, unable to initiate call",
        35 => "ISU is busy, unable to initiate call",
        36 => "Try later, must wait 3 minutes since last registration",
        37 => "SBD service is temporarily disabled",
        38 => "Try later, traffic management period",
        64 => "Band violation",
        65 => "PLL lock failure; hardware error during attempted transmit",
        _ => "Reserved, but indicate failure if used",
    }
}

/// Scripted in-memory transport for testing and dry runs
///
/// MO status codes are taken from a script, one per session; once the
/// script runs out every session reports `default_mo_status`. Payloads
/// staged when a session succeeds are recorded as delivered.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    mo_script: VecDeque<u8>,
    default_mo_status: u8,
    staged: Option<Vec<u8>>,
    delivered: Vec<Vec<u8>>,
    mt_queue: VecDeque<Vec<u8>>,
    mt_buffer: Vec<u8>,
    ring_alert: bool,
    momsn: u16,
    mtmsn: u16,
    sessions: u32,
    ring_answers: u32,
    fail_next: Option<TransportError>,
    fail_session: Option<(u32, TransportError)>,
    info: ModemInfo,
}

impl MemoryTransport {
    /// Create a transport whose sessions always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose sessions always report `mo_status`
    pub fn always(mo_status: u8) -> Self {
        Self {
            default_mo_status: mo_status,
            ..Self::default()
        }
    }

    /// Queue MO status codes returned by the next sessions
    pub fn script(mut self, codes: impl IntoIterator<Item = u8>) -> Self {
        self.mo_script.extend(codes);
        self
    }

    /// Set the status reported once the script is exhausted
    pub fn set_default_status(&mut self, mo_status: u8) {
        self.default_mo_status = mo_status;
    }

    /// Make the next call fail with `err`
    pub fn fail_next(&mut self, err: TransportError) {
        self.fail_next = Some(err);
    }

    /// Make session number `session` (counting every session run so far)
    /// fail with `err` instead of reaching the gateway
    pub fn fail_session(&mut self, session: u32, err: TransportError) {
        self.fail_session = Some((session, err));
    }

    /// Queue an MT message at the "gateway"
    pub fn push_incoming(&mut self, message: impl Into<Vec<u8>>) {
        self.mt_queue.push_back(message.into());
    }

    /// Raise the ring indicator
    pub fn ring(&mut self) {
        self.ring_alert = true;
    }

    /// Payloads delivered so far, in delivery order
    pub fn delivered(&self) -> &[Vec<u8>] {
        &self.delivered
    }

    /// Number of sessions run
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// Number of sessions that answered a ring alert
    pub fn ring_answers(&self) -> u32 {
        self.ring_answers
    }

    /// MT messages still held at the "gateway"
    pub fn pending_incoming(&self) -> usize {
        self.mt_queue.len()
    }

    fn check_failure(&mut self) -> Result<(), TransportError> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Transport for MemoryTransport {
    fn status(&mut self) -> Result<ModemStatus, TransportError> {
        self.check_failure()?;
        Ok(ModemStatus {
            mo_flag: self.staged.is_some(),
            momsn: self.momsn,
            mt_flag: !self.mt_buffer.is_empty(),
            mtmsn: self.mtmsn,
            ring_alert: self.ring_alert,
            waiting: self.mt_queue.len() as u16,
        })
    }

    fn write_outbound(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.check_failure()?;
        self.staged = Some(payload.to_vec());
        Ok(())
    }

    fn clear_outbound(&mut self) -> Result<(), TransportError> {
        self.check_failure()?;
        self.staged = None;
        Ok(())
    }

    fn transfer(&mut self, answer_ring: bool) -> Result<TransferStatus, TransportError> {
        self.check_failure()?;
        let fail_now = matches!(&self.fail_session, Some((at, _)) if *at == self.sessions + 1);
        if fail_now {
            if let Some((_, err)) = self.fail_session.take() {
                return Err(err);
            }
        }
        self.sessions += 1;
        if answer_ring {
            self.ring_answers += 1;
        }

        let mo_status = self.mo_script.pop_front().unwrap_or(self.default_mo_status);
        let mut status = TransferStatus::with_mo(mo_status);
        status.momsn = self.momsn;
        if !status.is_success() {
            return Ok(status);
        }

        if let Some(payload) = self.staged.take() {
            self.delivered.push(payload);
            self.momsn = self.momsn.wrapping_add(1);
        }
        if answer_ring {
            self.ring_alert = false;
        }
        if let Some(mt) = self.mt_queue.pop_front() {
            self.mtmsn = self.mtmsn.wrapping_add(1);
            status.mt_status = 1;
            status.mtmsn = self.mtmsn;
            status.mt_length = mt.len() as u16;
            self.mt_buffer = mt;
        }
        status.mt_queued = self.mt_queue.len() as u16;
        Ok(status)
    }

    fn read_inbound(&mut self) -> Result<Vec<u8>, TransportError> {
        self.check_failure()?;
        Ok(self.mt_buffer.clone())
    }

    fn info(&mut self) -> Result<ModemInfo, TransportError> {
        self.check_failure()?;
        Ok(self.info.clone())
    }
}
