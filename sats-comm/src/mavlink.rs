// Sats Comm - Satellite communication daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Mavlink2Rest actuator
//!
//! Commands go out as `POST {base}/mavlink` with a `{header, message}`
//! body; vehicle state is read from
//! `GET {base}/mavlink/vehicles/1/components/1/messages/<NAME>/message`.

use crate::config::MavlinkConfig;
use sats_link::{Actuator, ActuatorError, VehicleMode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Ground control station identity used in outgoing headers
const GCS_SYSTEM_ID: u8 = 255;
const GCS_COMPONENT_ID: u8 = 240;

/// Longest MAVLink parameter id
const PARAM_ID_LEN: usize = 16;

/// Wrap a message for the Mavlink2Rest POST endpoint
pub fn envelope(message: Value) -> Value {
    json!({
        "header": {
            "system_id": GCS_SYSTEM_ID,
            "component_id": GCS_COMPONENT_ID,
            "sequence": 0,
        },
        "message": message,
    })
}

/// COMMAND_LONG with up to seven parameters, missing ones zero
pub fn command_long(command: &str, params: &[f32]) -> Value {
    let p = |i: usize| params.get(i).copied().unwrap_or(0.0);
    json!({
        "type": "COMMAND_LONG",
        "param1": p(0),
        "param2": p(1),
        "param3": p(2),
        "param4": p(3),
        "param5": p(4),
        "param6": p(5),
        "param7": p(6),
        "command": { "type": command },
        "target_system": 1,
        "target_component": 1,
        "confirmation": 0,
    })
}

/// PARAM_SET for a REAL32 parameter
pub fn param_set(name: &str, value: f32) -> Value {
    let mut param_id: Vec<String> = name.chars().take(PARAM_ID_LEN).map(String::from).collect();
    param_id.resize(PARAM_ID_LEN, "\u{0}".to_string());
    json!({
        "type": "PARAM_SET",
        "param_value": value,
        "target_system": 1,
        "target_component": 0,
        "param_id": param_id,
        "param_type": { "type": "MAV_PARAM_TYPE_REAL32" },
    })
}

/// Guided-mode waypoint (MISSION_ITEM_INT with `current = 2`)
pub fn mission_item_int(lat: f64, lon: f64) -> Value {
    json!({
        "type": "MISSION_ITEM_INT",
        "param1": 0.0,
        "param2": 0.0,
        "param3": 0.0,
        "param4": 0.0,
        "x": (lat * 1e7) as i32,
        "y": (lon * 1e7) as i32,
        "z": 1.0,
        "seq": 0,
        "command": { "type": "MAV_CMD_NAV_WAYPOINT" },
        "target_system": 1,
        "target_component": 1,
        "frame": { "type": "MAV_FRAME_GLOBAL_INT" },
        "current": 2,
        "autocontinue": 1,
        "mission_type": { "type": "MAV_MISSION_TYPE_MISSION" },
    })
}

/// MISSION_SET_CURRENT
pub fn mission_set_current(seq: u16) -> Value {
    json!({
        "type": "MISSION_SET_CURRENT",
        "seq": seq,
        "target_system": 1,
        "target_component": 0,
    })
}

/// DO_SET_MODE with a custom mode number
pub fn set_mode_command(mode: &VehicleMode) -> Result<Value, ActuatorError> {
    let number = mode
        .number()
        .ok_or_else(|| ActuatorError::UnsupportedMode(mode.name().to_string()))?;
    Ok(command_long("MAV_CMD_DO_SET_MODE", &[1.0, number as f32]))
}

/// Mode name from a HEARTBEAT message
pub fn mode_from_heartbeat(heartbeat: &Value) -> Option<String> {
    let custom = heartbeat.get("custom_mode")?.as_u64()?;
    Some(VehicleMode::from_number(custom as u32).name().to_string())
}

/// Autopilot bridge over HTTP
#[derive(Debug, Clone)]
pub struct Mavlink2Rest {
    client: reqwest::blocking::Client,
    base_url: String,
}

fn request_error(err: reqwest::Error) -> ActuatorError {
    ActuatorError::Request(err.to_string())
}

impl Mavlink2Rest {
    /// Build the HTTP client
    pub fn new(config: &MavlinkConfig) -> Result<Self, ActuatorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(request_error)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Post one message
    pub fn send(&self, message: Value) -> Result<(), ActuatorError> {
        let body = envelope(message);
        debug!("Sending mavlink package to Mavlink2Rest: {}", body);
        let response = self
            .client
            .post(format!("{}/mavlink", self.base_url))
            .json(&body)
            .send()
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ActuatorError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Latest copy of a vehicle message
    pub fn message(&self, name: &str) -> Result<Value, ActuatorError> {
        let url = format!(
            "{}/mavlink/vehicles/1/components/1/messages/{}/message",
            self.base_url, name
        );
        let response = self.client.get(url).send().map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ActuatorError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        response
            .json()
            .map_err(|e| ActuatorError::InvalidResponse(e.to_string()))
    }
}

impl Actuator for Mavlink2Rest {
    fn set_param(&self, name: &str, value: f32) -> Result<(), ActuatorError> {
        self.send(param_set(name, value))
    }

    fn set_mode(&self, mode: &VehicleMode) -> Result<(), ActuatorError> {
        self.send(set_mode_command(mode)?)
    }

    fn goto_waypoint(&self, lat: f64, lon: f64) -> Result<(), ActuatorError> {
        self.send(mission_item_int(lat, lon))
    }

    fn set_current_mission_item(&self, seq: u16) -> Result<(), ActuatorError> {
        self.send(mission_set_current(seq))
    }

    fn arm(&self) -> Result<(), ActuatorError> {
        self.send(command_long("MAV_CMD_COMPONENT_ARM_DISARM", &[1.0]))
    }

    fn disarm(&self) -> Result<(), ActuatorError> {
        self.send(command_long("MAV_CMD_COMPONENT_ARM_DISARM", &[0.0]))
    }

    fn current_mode(&self) -> Result<String, ActuatorError> {
        let heartbeat = self.message("HEARTBEAT")?;
        mode_from_heartbeat(&heartbeat)
            .ok_or_else(|| ActuatorError::InvalidResponse(format!("no custom_mode in {}", heartbeat)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_header() {
        let body = envelope(json!({"type": "X"}));
        assert_eq!(body["header"]["system_id"], 255);
        assert_eq!(body["header"]["component_id"], 240);
        assert_eq!(body["message"]["type"], "X");
    }

    #[test]
    fn test_command_long_pads_params() {
        let msg = command_long("MAV_CMD_COMPONENT_ARM_DISARM", &[1.0]);
        assert_eq!(msg["param1"], 1.0);
        assert_eq!(msg["param7"], 0.0);
        assert_eq!(msg["command"]["type"], "MAV_CMD_COMPONENT_ARM_DISARM");
    }

    #[test]
    fn test_param_set_id_padding() {
        let msg = param_set("MISSION_PAUSE_S", 30.0);
        let id = msg["param_id"].as_array().unwrap();
        assert_eq!(id.len(), 16);
        assert_eq!(id[0], "M");
        assert_eq!(id[14], "S");
        assert_eq!(id[15], "\u{0}");
        assert_eq!(msg["param_value"], 30.0);
    }

    #[test]
    fn test_set_mode_numbers() {
        let msg = set_mode_command(&VehicleMode::Guided).unwrap();
        assert_eq!(msg["param1"], 1.0);
        assert_eq!(msg["param2"], 15.0);

        let msg = set_mode_command(&VehicleMode::from_name("4")).unwrap();
        assert_eq!(msg["param2"], 4.0);

        assert_eq!(
            set_mode_command(&VehicleMode::from_name("hold")),
            Err(ActuatorError::UnsupportedMode("hold".into()))
        );
    }

    #[test]
    fn test_mission_item_scaling() {
        let msg = mission_item_int(-22.5, -43.25);
        assert_eq!(msg["x"], -225_000_000);
        assert_eq!(msg["y"], -432_500_000);
        assert_eq!(msg["current"], 2);
    }

    #[test]
    fn test_mode_from_heartbeat() {
        let hb = json!({"type": "HEARTBEAT", "custom_mode": 10, "base_mode": {"bits": 209}});
        assert_eq!(mode_from_heartbeat(&hb), Some("auto".to_string()));
        assert_eq!(mode_from_heartbeat(&json!({})), None);
    }

    #[test]
    fn test_unreachable_bridge() {
        let bridge = Mavlink2Rest::new(&MavlinkConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(matches!(bridge.arm(), Err(ActuatorError::Request(_))));
    }
}
