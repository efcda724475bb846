//! Command dispatcher
//!
//! Turns inbound frames into autopilot actions. Every frame, valid or not,
//! is acknowledged with a `cmd_ack:<frame>` text message, followed by one
//! drain so the ground station hears back promptly.

use crate::command::{Command, VehicleMode};
use crate::error::{ActuatorError, ParseError, TransportError};
use crate::message::Message;
use crate::queue::{DrainReport, EnvelopeId};
use crate::session::TransferSession;
use crate::transport::Transport;
use std::thread;
use std::time::Duration;

/// Autopilot parameter holding the pause at a waypoint
pub const MISSION_PAUSE_PARAM: &str = "MISSION_PAUSE_S";

/// Prefix of acknowledgement messages
pub const ACK_PREFIX: &str = "cmd_ack:";

/// Vehicle control surface used by the dispatcher
pub trait Actuator {
    /// Set an autopilot parameter
    fn set_param(&self, name: &str, value: f32) -> Result<(), ActuatorError>;

    /// Change flight mode
    fn set_mode(&self, mode: &VehicleMode) -> Result<(), ActuatorError>;

    /// Fly to a position in guided mode
    fn goto_waypoint(&self, lat: f64, lon: f64) -> Result<(), ActuatorError>;

    /// Select the mission item to continue from
    fn set_current_mission_item(&self, seq: u16) -> Result<(), ActuatorError>;

    fn arm(&self) -> Result<(), ActuatorError>;

    fn disarm(&self) -> Result<(), ActuatorError>;

    /// Current mode as reported by the autopilot
    fn current_mode(&self) -> Result<String, ActuatorError>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_param(&self, name: &str, value: f32) -> Result<(), ActuatorError> {
        (**self).set_param(name, value)
    }

    fn set_mode(&self, mode: &VehicleMode) -> Result<(), ActuatorError> {
        (**self).set_mode(mode)
    }

    fn goto_waypoint(&self, lat: f64, lon: f64) -> Result<(), ActuatorError> {
        (**self).goto_waypoint(lat, lon)
    }

    fn set_current_mission_item(&self, seq: u16) -> Result<(), ActuatorError> {
        (**self).set_current_mission_item(seq)
    }

    fn arm(&self) -> Result<(), ActuatorError> {
        (**self).arm()
    }

    fn disarm(&self) -> Result<(), ActuatorError> {
        (**self).disarm()
    }

    fn current_mode(&self) -> Result<String, ActuatorError> {
        (**self).current_mode()
    }
}

/// Settle delays between the steps of a waypoint command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// After setting the pause parameter
    pub param_settle: Duration,
    /// After switching to guided mode
    pub mode_settle: Duration,
    /// After sending the waypoint
    pub waypoint_settle: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            param_settle: Duration::from_secs(10),
            mode_settle: Duration::from_secs(10),
            waypoint_settle: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    /// No waiting between steps
    pub fn immediate() -> Self {
        Self {
            param_settle: Duration::ZERO,
            mode_settle: Duration::ZERO,
            waypoint_settle: Duration::ZERO,
        }
    }
}

/// What handling one frame did
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Frame as text
    pub text: String,
    /// Parsed command, or why it was ignored
    pub command: Result<Command, ParseError>,
    /// Result of the side effect; `Ok` when nothing ran
    pub effect: Result<(), ActuatorError>,
    /// Acknowledgement envelope
    pub ack: Option<EnvelopeId>,
    /// Drain run after queuing the acknowledgement
    pub drain: Result<DrainReport, TransportError>,
}

impl DispatchOutcome {
    /// Whether a command parsed and its effect succeeded
    pub fn is_success(&self) -> bool {
        self.command.is_ok() && self.effect.is_ok()
    }
}

/// Executes inbound commands against an actuator
#[derive(Debug)]
pub struct Dispatcher<A> {
    actuator: A,
    config: DispatcherConfig,
}

fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

impl<A: Actuator> Dispatcher<A> {
    /// Create a dispatcher with default settle delays
    pub fn new(actuator: A) -> Self {
        Self::with_config(actuator, DispatcherConfig::default())
    }

    /// Create a dispatcher with custom settle delays
    pub fn with_config(actuator: A, config: DispatcherConfig) -> Self {
        Self { actuator, config }
    }

    /// Borrow the actuator
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Handle one inbound frame
    ///
    /// Never fails: parse errors, actuator errors and drain errors are
    /// logged and reported in the outcome.
    pub fn handle<T: Transport>(&self, session: &TransferSession<T>, frame: &[u8]) -> DispatchOutcome {
        let text = String::from_utf8_lossy(frame)
            .trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0')
            .to_string();
        log::debug!("Data received: {:?}", text);

        let command = Command::parse(&text);
        session.record_command(command.is_ok());

        let effect = match &command {
            Ok(cmd) => {
                let effect = self.execute(session, cmd);
                if let Err(err) = &effect {
                    log::warn!("Command {:?} failed: {}", text, err);
                }
                effect
            }
            Err(err) => {
                log::warn!("Ignoring inbound frame {:?}: {}", text, err);
                Ok(())
            }
        };

        let ack = match session.enqueue_message(&Message::text(&format!("{}{}", ACK_PREFIX, text))) {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("Could not queue acknowledgement: {}", err);
                None
            }
        };

        let drain = session.drain();
        if let Err(err) = &drain {
            log::warn!("Drain after acknowledgement failed: {}", err);
        }

        DispatchOutcome {
            text,
            command,
            effect,
            ack,
            drain,
        }
    }

    fn execute<T: Transport>(
        &self,
        session: &TransferSession<T>,
        command: &Command,
    ) -> Result<(), ActuatorError> {
        match command {
            Command::Waypoint {
                lat,
                lon,
                wait_time,
                next_id,
            } => {
                log::info!(
                    "Going to waypoint {}/{} for {}s, next waypoint will be {}",
                    lat,
                    lon,
                    wait_time,
                    next_id
                );
                self.actuator.set_param(MISSION_PAUSE_PARAM, *wait_time)?;
                settle(self.config.param_settle);
                self.actuator.set_mode(&VehicleMode::Guided)?;
                settle(self.config.mode_settle);
                self.actuator.goto_waypoint(*lat, *lon)?;
                settle(self.config.waypoint_settle);
                self.actuator.set_current_mission_item(*next_id)
            }
            Command::OutputRestTime(secs) => {
                session.set_output_rest(Duration::from_secs(*secs));
                Ok(())
            }
            Command::InputRestTime(secs) => {
                session.set_input_rest(Duration::from_secs(*secs));
                Ok(())
            }
            Command::SetMode(mode) => {
                log::info!("Setting autopilot mode to {}", mode);
                self.actuator.set_mode(mode)
            }
            Command::GetMode => {
                let mode = self.actuator.current_mode()?;
                log::info!("Sending autopilot mode {} to ground station", mode);
                let report = Message::text(&format!("Autopilot mode: {}", mode));
                if let Err(err) = session.enqueue_message(&report) {
                    log::warn!("Could not queue mode report: {}", err);
                }
                Ok(())
            }
            Command::Arm => {
                log::info!("Arming vehicle");
                self.actuator.arm()
            }
            Command::Disarm => {
                log::info!("Disarming vehicle");
                self.actuator.disarm()
            }
            Command::SetParam { name, value } => {
                log::info!("Setting {} to {}", name, value);
                self.actuator.set_param(name, *value)
            }
        }
    }
}

/// Actuator call, as recorded by [`RecordingActuator`]
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    SetParam(String, f32),
    SetMode(VehicleMode),
    GotoWaypoint(f64, f64),
    SetCurrentMissionItem(u16),
    Arm,
    Disarm,
    CurrentMode,
}

/// Actuator that records calls instead of moving anything
///
/// Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    calls: std::sync::Mutex<Vec<ActuatorCall>>,
    mode: String,
    fail: Option<ActuatorError>,
}

impl RecordingActuator {
    /// Actuator reporting mode `"0"` and accepting every call
    pub fn new() -> Self {
        Self {
            mode: "0".to_string(),
            ..Default::default()
        }
    }

    /// Report `mode` from [`Actuator::current_mode`]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Fail every call with `err` (calls are still recorded)
    pub fn failing(mut self, err: ActuatorError) -> Self {
        self.fail = Some(err);
        self
    }

    /// Calls made so far
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: ActuatorCall) -> Result<(), ActuatorError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
        match &self.fail {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Actuator for RecordingActuator {
    fn set_param(&self, name: &str, value: f32) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::SetParam(name.to_string(), value))
    }

    fn set_mode(&self, mode: &VehicleMode) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::SetMode(mode.clone()))
    }

    fn goto_waypoint(&self, lat: f64, lon: f64) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::GotoWaypoint(lat, lon))
    }

    fn set_current_mission_item(&self, seq: u16) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::SetCurrentMissionItem(seq))
    }

    fn arm(&self) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Arm)
    }

    fn disarm(&self) -> Result<(), ActuatorError> {
        self.record(ActuatorCall::Disarm)
    }

    fn current_mode(&self) -> Result<String, ActuatorError> {
        self.record(ActuatorCall::CurrentMode)?;
        Ok(self.mode.clone())
    }
}
