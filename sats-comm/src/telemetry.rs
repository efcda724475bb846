// Sats Comm - Satellite communication daemon
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Telemetry sampling
//!
//! Gathers one `global` snapshot from the autopilot bridge and the payload
//! services. Each source is read independently; a source that fails leaves
//! its readings empty and the snapshot is still produced.

use crate::config::SensorConfig;
use crate::mavlink::Mavlink2Rest;
use sats_link::GlobalTelemetry;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Source of outbound telemetry snapshots
pub trait TelemetrySource {
    fn sample(&self) -> GlobalTelemetry;
}

/// Raw sensor readings in engineering units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings {
    /// Degrees
    pub heading: Option<f64>,
    /// Degrees
    pub roll: Option<f64>,
    /// Degrees
    pub pitch: Option<f64>,
    /// Volts
    pub battery_voltage: Option<f64>,
    /// Amperes
    pub battery_current: Option<f64>,
    /// Volts
    pub solar_voltage: Option<f64>,
    /// Watts
    pub solar_power: Option<f64>,
    /// Microseconds
    pub left_motor_pwm: Option<f64>,
    /// Microseconds
    pub right_motor_pwm: Option<f64>,
    /// Percent
    pub cpu: Option<f64>,
    /// Percent
    pub memory: Option<f64>,
    /// Percent
    pub disk: Option<f64>,
    pub sat_number: Option<f64>,
    /// Degrees
    pub lattitude: Option<f64>,
    /// Degrees
    pub longitude: Option<f64>,
    pub vdop: Option<f64>,
    pub hdop: Option<f64>,
}

/// Map `value` in `[0, full_scale]` onto a byte; missing readings give 0
fn scaled(value: Option<f64>, full_scale: f64) -> u8 {
    value.map_or(0, |v| (v * 255.0 / full_scale).clamp(0.0, 255.0) as u8)
}

fn throttle(pwm: Option<f64>) -> u8 {
    scaled(pwm.map(|p| p - 1100.0), 800.0)
}

impl Readings {
    /// Pack readings into the wire snapshot
    ///
    /// Byte fields are scaled to their full-scale range. An unknown
    /// position is sent as NaN.
    pub fn to_telemetry(&self) -> GlobalTelemetry {
        GlobalTelemetry {
            heading: scaled(self.heading, 360.0),
            max_abs_roll: scaled(self.roll.map(f64::abs), 180.0),
            max_abs_pitch: scaled(self.pitch.map(f64::abs), 180.0),
            battery_voltage: scaled(self.battery_voltage, 20.0),
            battery_current: scaled(self.battery_current, 64.0),
            solar_voltage: scaled(self.solar_voltage, 64.0),
            solar_power: scaled(self.solar_power, 200.0),
            throttle_first: throttle(self.left_motor_pwm),
            throttle_second: throttle(self.right_motor_pwm),
            cpu: scaled(self.cpu, 100.0),
            memory: scaled(self.memory, 100.0),
            disk: scaled(self.disk, 100.0),
            gps_fix_type: 255,
            sat_number: self.sat_number.map_or(0, |n| n.clamp(0.0, 255.0) as u8),
            lattitude: self.lattitude.map_or(f32::NAN, |v| v as f32),
            longitude: self.longitude.map_or(f32::NAN, |v| v as f32),
            vdop: self.vdop.map_or(0, |v| v.clamp(0.0, 65535.0) as u16),
            hdop: self.hdop.map_or(0, |v| v.clamp(0.0, 65535.0) as u16),
            ..Default::default()
        }
    }
}

fn number(v: &Value, key: &str) -> Option<f64> {
    v.get(key)?.as_f64()
}

/// GLOBAL_POSITION_INT: heading, lat, lon
pub fn apply_position(r: &mut Readings, v: &Value) {
    r.heading = number(v, "hdg").map(|h| h / 100.0);
    r.lattitude = number(v, "lat").map(|l| l / 1e7);
    r.longitude = number(v, "lon").map(|l| l / 1e7);
}

/// GPS2_RAW: dilution of precision and satellites
pub fn apply_gps(r: &mut Readings, v: &Value) {
    r.vdop = number(v, "epv");
    r.hdop = number(v, "eph");
    r.sat_number = number(v, "satellites_visible");
}

/// ATTITUDE: roll and pitch in radians
pub fn apply_attitude(r: &mut Readings, v: &Value) {
    r.roll = number(v, "roll").map(f64::to_degrees);
    r.pitch = number(v, "pitch").map(f64::to_degrees);
}

/// BATTERY_STATUS: centiamperes and millivolts
pub fn apply_battery(r: &mut Readings, v: &Value) {
    r.battery_current = number(v, "current_battery").map(|c| c / 100.0);
    r.battery_voltage = v
        .get("voltages")
        .and_then(|a| a.get(0))
        .and_then(Value::as_f64)
        .map(|mv| mv / 1000.0);
}

/// SERVO_OUTPUT_RAW: left and right motor channels
pub fn apply_servos(r: &mut Readings, v: &Value) {
    r.left_motor_pwm = number(v, "servo1_raw");
    r.right_motor_pwm = number(v, "servo3_raw");
}

/// Solar charge controller: panel millivolts and watts
pub fn apply_solar(r: &mut Readings, v: &Value) {
    r.solar_voltage = v
        .get("VPV")
        .and_then(|x| x.as_f64().or_else(|| x.as_str()?.parse().ok()))
        .map(|mv| mv / 1000.0);
    r.solar_power = v
        .get("PPV")
        .and_then(|x| x.as_f64().or_else(|| x.as_str()?.parse().ok()));
}

/// Companion computer: CPU, memory and disk usage
pub fn apply_system(r: &mut Readings, v: &Value) {
    r.cpu = v.get("cpu").and_then(Value::as_array).and_then(|cpus| {
        let usages: Vec<f64> = cpus.iter().filter_map(|c| number(c, "usage")).collect();
        if usages.is_empty() {
            None
        } else {
            Some(usages.iter().sum::<f64>() / usages.len() as f64)
        }
    });
    r.disk = v
        .get("disk")
        .and_then(|d| d.get(0))
        .and_then(|d| {
            let total = number(d, "total_space_B")?;
            let available = number(d, "available_space_B")?;
            (total > 0.0).then(|| (total - available) * 100.0 / total)
        });
    r.memory = v
        .get("memory")
        .and_then(|m| m.get("ram"))
        .and_then(|ram| {
            let total = number(ram, "total_kB")?;
            let used = number(ram, "used_kB")?;
            (total > 0.0).then(|| used * 100.0 / total)
        });
}

/// Samples the live vehicle over HTTP
#[derive(Debug)]
pub struct HttpSampler {
    bridge: Mavlink2Rest,
    client: reqwest::blocking::Client,
    config: SensorConfig,
}

impl HttpSampler {
    pub fn new(bridge: Mavlink2Rest, config: SensorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            bridge,
            client,
            config,
        })
    }

    fn vehicle(&self, r: &mut Readings, name: &str, apply: fn(&mut Readings, &Value)) {
        match self.bridge.message(name) {
            Ok(v) => apply(r, &v),
            Err(e) => warn!("Failed fetching autopilot {} data: {}", name, e),
        }
    }

    fn service(&self, r: &mut Readings, url: &str, apply: fn(&mut Readings, &Value)) {
        let result = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Value>());
        match result {
            Ok(v) => apply(r, &v),
            Err(e) => warn!("Failed fetching {}: {}", url, e),
        }
    }
}

impl TelemetrySource for HttpSampler {
    fn sample(&self) -> GlobalTelemetry {
        let mut r = Readings::default();
        self.service(&mut r, &self.config.solar_url, apply_solar);
        self.service(&mut r, &self.config.system_url, apply_system);
        self.vehicle(&mut r, "GLOBAL_POSITION_INT", apply_position);
        self.vehicle(&mut r, "GPS2_RAW", apply_gps);
        self.vehicle(&mut r, "ATTITUDE", apply_attitude);
        self.vehicle(&mut r, "BATTERY_STATUS", apply_battery);
        self.vehicle(&mut r, "SERVO_OUTPUT_RAW", apply_servos);
        r.to_telemetry()
    }
}

/// Fixed snapshot, for dry runs
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub GlobalTelemetry);

impl TelemetrySource for StaticSource {
    fn sample(&self) -> GlobalTelemetry {
        self.0
    }
}
