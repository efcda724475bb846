//! Iridium 9602/9603 (RockBLOCK) driver
//!
//! Speaks the SBD subset of the AT command set over any byte stream:
//!
//! ```text
//! AT+SBDWB=<n>  -> READY, <payload><checksum:2 BE> -> 0..3, OK
//! AT+SBDIX[A]   -> +SBDIX: mo, momsn, mt, mtmsn, mtlen, mtq
//! AT+SBDRB      -> <len:2 BE><payload><checksum:2 BE>, OK
//! AT+SBDSX      -> +SBDSX: mo, momsn, mt, mtmsn, ra, waiting
//! ```
//!
//! The checksum is the low 16 bits of the byte sum.

use crate::error::TransportError;
use crate::transport::{ModemInfo, ModemStatus, TransferStatus, Transport};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Largest payload the MO buffer accepts
pub const MAX_MO_PAYLOAD: usize = 340;

/// Serial and timing settings for the modem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Timeout for ordinary commands, in seconds
    pub command_timeout_secs: u64,
    /// Timeout for an SBD session, in seconds
    pub session_timeout_secs: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
            command_timeout_secs: 5,
            session_timeout_secs: 90,
        }
    }
}

impl ModemConfig {
    /// Configuration for a given serial device
    pub fn with_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

/// SBD checksum: low 16 bits of the byte sum
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16))
}

/// Satellite modem on a byte stream
#[derive(Debug)]
pub struct RockBlock<P> {
    port: P,
    config: ModemConfig,
    /// Unsolicited SBDRING seen since the last answered session
    ring_seen: bool,
}

impl<P: Read + Write> RockBlock<P> {
    /// Wrap an open port. Call [`RockBlock::init`] before use.
    pub fn new(port: P, config: ModemConfig) -> Self {
        Self {
            port,
            config,
            ring_seen: false,
        }
    }

    /// Disable echo and enable ring alerts
    pub fn init(&mut self) -> Result<(), TransportError> {
        self.command("ATE0")?;
        self.command("AT+SBDMTA=1")?;
        Ok(())
    }

    /// Release the underlying port
    pub fn into_inner(self) -> P {
        self.port
    }

    fn send_line(&mut self, cmd: &str) -> Result<(), TransportError> {
        log::trace!("modem <- {}", cmd);
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(b'\r');
        self.port.write_all(&buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, cmd: &str, deadline: Instant) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(_) => return Ok(byte[0]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout {
                            command: cmd.to_string(),
                        });
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Next non-empty line, skipping command echo and ring notifications
    fn read_line(&mut self, cmd: &str, deadline: Instant) -> Result<String, TransportError> {
        loop {
            let mut line = Vec::new();
            loop {
                match self.read_byte(cmd, deadline)? {
                    b'\n' => break,
                    b'\r' => {}
                    b => line.push(b),
                }
            }
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if line.is_empty() || line == cmd {
                continue;
            }
            if line == "SBDRING" {
                log::debug!("Ring alert notification");
                self.ring_seen = true;
                continue;
            }
            log::trace!("modem -> {}", line);
            return Ok(line);
        }
    }

    /// Collect response lines until the final `OK`
    fn read_until_ok(&mut self, cmd: &str, deadline: Instant) -> Result<Vec<String>, TransportError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line(cmd, deadline)?;
            match line.as_str() {
                "OK" => return Ok(lines),
                "ERROR" => {
                    return Err(TransportError::UnexpectedResponse {
                        command: cmd.to_string(),
                        response: line,
                    })
                }
                _ => lines.push(line),
            }
        }
    }

    fn command_with_timeout(
        &mut self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, TransportError> {
        self.send_line(cmd)?;
        self.read_until_ok(cmd, Instant::now() + timeout)
    }

    fn command(&mut self, cmd: &str) -> Result<Vec<String>, TransportError> {
        let timeout = self.config.command_timeout();
        self.command_with_timeout(cmd, timeout)
    }

    /// Run a command whose answer is a single `+TAG: a, b, ...` line
    fn tagged_numbers(
        &mut self,
        cmd: &str,
        tag: &str,
        timeout: Duration,
    ) -> Result<Vec<u32>, TransportError> {
        let lines = self.command_with_timeout(cmd, timeout)?;
        let unexpected = || TransportError::UnexpectedResponse {
            command: cmd.to_string(),
            response: lines.join(" | "),
        };
        let line = lines
            .iter()
            .find_map(|l| l.strip_prefix(tag))
            .ok_or_else(unexpected)?;
        parse_numbers(line).ok_or_else(unexpected)
    }

    fn read_exact_bytes(
        &mut self,
        cmd: &str,
        n: usize,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            out.push(self.read_byte(cmd, deadline)?);
        }
        Ok(out)
    }
}

/// Parse `" 0, 12, 1, 4, 20, 0"` into numbers
fn parse_numbers(s: &str) -> Option<Vec<u32>> {
    s.trim_start_matches(':')
        .split(',')
        .map(|part| part.trim().parse().ok())
        .collect()
}

impl<P: Read + Write> Transport for RockBlock<P> {
    fn status(&mut self) -> Result<ModemStatus, TransportError> {
        let timeout = self.config.command_timeout();
        let n = self.tagged_numbers("AT+SBDSX", "+SBDSX", timeout)?;
        if n.len() < 6 {
            return Err(TransportError::UnexpectedResponse {
                command: "AT+SBDSX".to_string(),
                response: format!("{:?}", n),
            });
        }
        Ok(ModemStatus {
            mo_flag: n[0] != 0,
            momsn: n[1] as u16,
            mt_flag: n[2] != 0,
            mtmsn: n[3] as u16,
            ring_alert: n[4] != 0 || self.ring_seen,
            waiting: n[5] as u16,
        })
    }

    fn write_outbound(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_MO_PAYLOAD {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_MO_PAYLOAD,
            });
        }
        let cmd = format!("AT+SBDWB={}", payload.len());
        let deadline = Instant::now() + self.config.command_timeout();
        self.send_line(&cmd)?;
        let ready = self.read_line(&cmd, deadline)?;
        if ready != "READY" {
            return Err(TransportError::UnexpectedResponse {
                command: cmd,
                response: ready,
            });
        }

        let mut frame = Vec::with_capacity(payload.len() + 2);
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&checksum(payload).to_be_bytes());
        self.port.write_all(&frame)?;
        self.port.flush()?;

        let lines = self.read_until_ok(&cmd, deadline)?;
        match lines.first().map(|l| l.parse::<u8>()) {
            Some(Ok(0)) => Ok(()),
            Some(Ok(code)) => Err(TransportError::WriteRejected(code)),
            _ => Err(TransportError::UnexpectedResponse {
                command: cmd,
                response: lines.join(" | "),
            }),
        }
    }

    fn clear_outbound(&mut self) -> Result<(), TransportError> {
        let cmd = "AT+SBDD0";
        let lines = self.command(cmd)?;
        match lines.first().map(|l| l.parse::<u8>()) {
            Some(Ok(0)) => Ok(()),
            _ => Err(TransportError::UnexpectedResponse {
                command: cmd.to_string(),
                response: lines.join(" | "),
            }),
        }
    }

    fn transfer(&mut self, answer_ring: bool) -> Result<TransferStatus, TransportError> {
        let cmd = if answer_ring { "AT+SBDIXA" } else { "AT+SBDIX" };
        let timeout = self.config.session_timeout();
        let n = self.tagged_numbers(cmd, "+SBDIX", timeout)?;
        if n.len() < 6 {
            return Err(TransportError::UnexpectedResponse {
                command: cmd.to_string(),
                response: format!("{:?}", n),
            });
        }
        let status = TransferStatus {
            mo_status: n[0].min(u8::MAX as u32) as u8,
            momsn: n[1] as u16,
            mt_status: n[2] as u8,
            mtmsn: n[3] as u16,
            mt_length: n[4] as u16,
            mt_queued: n[5] as u16,
        };
        if answer_ring && status.is_success() {
            self.ring_seen = false;
        }
        Ok(status)
    }

    fn read_inbound(&mut self) -> Result<Vec<u8>, TransportError> {
        let cmd = "AT+SBDRB";
        let deadline = Instant::now() + self.config.command_timeout();
        self.send_line(cmd)?;
        let len_bytes = self.read_exact_bytes(cmd, 2, deadline)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let payload = self.read_exact_bytes(cmd, len, deadline)?;
        let ck = self.read_exact_bytes(cmd, 2, deadline)?;
        let expected = u16::from_be_bytes([ck[0], ck[1]]);
        let actual = checksum(&payload);
        self.read_until_ok(cmd, deadline)?;
        if expected != actual {
            return Err(TransportError::ChecksumMismatch { expected, actual });
        }
        Ok(payload)
    }

    fn info(&mut self) -> Result<ModemInfo, TransportError> {
        let model = self.command("AT+CGMM")?.join(" ");
        let revision = self.command("AT+CGMR")?.join(" ");
        let serial_number = self.command("AT+CGSN")?.join(" ");
        Ok(ModemInfo {
            model,
            revision,
            serial_number,
        })
    }
}

/// Open the modem on a serial device and initialise it (19200 8N1)
#[cfg(feature = "serial")]
pub fn open_serial(
    config: &ModemConfig,
) -> Result<RockBlock<Box<dyn serialport::SerialPort>>, TransportError> {
    use serialport::{DataBits, FlowControl, Parity, StopBits};

    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_secs(1))
        .open()?;

    log::info!("Opened modem on {} at {} baud", config.port, config.baud_rate);

    let mut modem = RockBlock::new(port, config.clone());
    modem.init()?;
    Ok(modem)
}
