//! Inbound command grammar
//!
//! Ground stations send plain ASCII frames of the form
//! `verb[:arg1[:arg2...]]`:
//!
//! ```text
//! waypoint:<lat>:<lon>:<wait_s>:<next_id>
//! output_rest_time:<seconds>
//! input_rest_time:<seconds>
//! set_mode:<mode>
//! get_mode
//! arm
//! disarm
//! set_param:<name>:<value>
//! ```

use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

/// Longest MAVLink parameter id
pub const MAX_PARAM_NAME_LEN: usize = 16;

/// Autopilot flight mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleMode {
    Manual,
    Auto,
    SmartRtl,
    Guided,
    /// Any other name, passed through to the autopilot bridge
    Other(String),
}

impl VehicleMode {
    /// Parse a mode name; unknown names become [`VehicleMode::Other`]
    pub fn from_name(name: &str) -> Self {
        match name {
            "manual" => VehicleMode::Manual,
            "auto" => VehicleMode::Auto,
            "smart_rtl" => VehicleMode::SmartRtl,
            "guided" => VehicleMode::Guided,
            other => VehicleMode::Other(other.to_string()),
        }
    }

    /// Mode for an ArduRover custom mode number
    pub fn from_number(number: u32) -> Self {
        match number {
            0 => VehicleMode::Manual,
            10 => VehicleMode::Auto,
            12 => VehicleMode::SmartRtl,
            15 => VehicleMode::Guided,
            other => VehicleMode::Other(other.to_string()),
        }
    }

    /// Name as written in command frames
    pub fn name(&self) -> &str {
        match self {
            VehicleMode::Manual => "manual",
            VehicleMode::Auto => "auto",
            VehicleMode::SmartRtl => "smart_rtl",
            VehicleMode::Guided => "guided",
            VehicleMode::Other(name) => name,
        }
    }

    /// ArduRover custom mode number, if known
    ///
    /// A numeric [`VehicleMode::Other`] is taken as the mode number itself.
    pub fn number(&self) -> Option<u32> {
        match self {
            VehicleMode::Manual => Some(0),
            VehicleMode::Auto => Some(10),
            VehicleMode::SmartRtl => Some(12),
            VehicleMode::Guided => Some(15),
            VehicleMode::Other(name) => name.parse().ok(),
        }
    }
}

impl fmt::Display for VehicleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed ground station command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Pause at a position, then continue the mission from `next_id`
    Waypoint {
        lat: f64,
        lon: f64,
        wait_time: f32,
        next_id: u16,
    },
    /// Seconds between outbound iterations
    OutputRestTime(u64),
    /// Seconds between inbound polls
    InputRestTime(u64),
    SetMode(VehicleMode),
    /// Report the autopilot mode back to the ground
    GetMode,
    Arm,
    Disarm,
    SetParam { name: String, value: f32 },
}

fn expect_args(verb: &'static str, args: &[&str], expected: usize) -> Result<(), ParseError> {
    if args.len() != expected {
        return Err(ParseError::WrongArity {
            verb,
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn parse_arg<T: FromStr>(verb: &'static str, arg: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidArgument {
        verb,
        arg,
        value: value.to_string(),
    })
}

fn parse_finite<T>(verb: &'static str, arg: &'static str, value: &str) -> Result<T, ParseError>
where
    T: FromStr + Into<f64> + Copy,
{
    let v: T = parse_arg(verb, arg, value)?;
    if !v.into().is_finite() {
        return Err(ParseError::InvalidArgument {
            verb,
            arg,
            value: value.to_string(),
        });
    }
    Ok(v)
}

impl Command {
    /// Parse one command frame
    ///
    /// Surrounding whitespace and NUL padding are ignored. Verbs match
    /// exactly.
    pub fn parse(frame: &str) -> Result<Self, ParseError> {
        if !frame.is_ascii() {
            return Err(ParseError::NotAscii);
        }
        let frame = frame.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
        if frame.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut parts = frame.split(':');
        let verb = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match verb {
            "waypoint" => {
                const V: &str = "waypoint";
                expect_args(V, &args, 4)?;
                let lat: f64 = parse_finite(V, "lat", args[0])?;
                let lon: f64 = parse_finite(V, "lon", args[1])?;
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(ParseError::InvalidArgument {
                        verb: V,
                        arg: "lat",
                        value: args[0].to_string(),
                    });
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(ParseError::InvalidArgument {
                        verb: V,
                        arg: "lon",
                        value: args[1].to_string(),
                    });
                }
                Ok(Command::Waypoint {
                    lat,
                    lon,
                    wait_time: parse_finite(V, "wait_time", args[2])?,
                    next_id: parse_arg(V, "next_id", args[3])?,
                })
            }
            "output_rest_time" => {
                expect_args("output_rest_time", &args, 1)?;
                Ok(Command::OutputRestTime(parse_arg(
                    "output_rest_time",
                    "seconds",
                    args[0],
                )?))
            }
            "input_rest_time" => {
                expect_args("input_rest_time", &args, 1)?;
                Ok(Command::InputRestTime(parse_arg(
                    "input_rest_time",
                    "seconds",
                    args[0],
                )?))
            }
            "set_mode" => {
                expect_args("set_mode", &args, 1)?;
                if args[0].is_empty() {
                    return Err(ParseError::InvalidArgument {
                        verb: "set_mode",
                        arg: "mode",
                        value: String::new(),
                    });
                }
                Ok(Command::SetMode(VehicleMode::from_name(args[0])))
            }
            "get_mode" => expect_args("get_mode", &args, 0).map(|_| Command::GetMode),
            "arm" => expect_args("arm", &args, 0).map(|_| Command::Arm),
            "disarm" => expect_args("disarm", &args, 0).map(|_| Command::Disarm),
            "set_param" => {
                expect_args("set_param", &args, 2)?;
                let name = args[0];
                if name.is_empty() || name.len() > MAX_PARAM_NAME_LEN {
                    return Err(ParseError::InvalidArgument {
                        verb: "set_param",
                        arg: "name",
                        value: name.to_string(),
                    });
                }
                Ok(Command::SetParam {
                    name: name.to_string(),
                    value: parse_finite("set_param", "value", args[1])?,
                })
            }
            other => Err(ParseError::UnknownVerb(other.to_string())),
        }
    }

    /// Verb of this command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Waypoint { .. } => "waypoint",
            Command::OutputRestTime(_) => "output_rest_time",
            Command::InputRestTime(_) => "input_rest_time",
            Command::SetMode(_) => "set_mode",
            Command::GetMode => "get_mode",
            Command::Arm => "arm",
            Command::Disarm => "disarm",
            Command::SetParam { .. } => "set_param",
        }
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

/// Formats the command as a frame that parses back to it
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Waypoint {
                lat,
                lon,
                wait_time,
                next_id,
            } => write!(f, "waypoint:{}:{}:{}:{}", lat, lon, wait_time, next_id),
            Command::OutputRestTime(s) => write!(f, "output_rest_time:{}", s),
            Command::InputRestTime(s) => write!(f, "input_rest_time:{}", s),
            Command::SetMode(mode) => write!(f, "set_mode:{}", mode),
            Command::SetParam { name, value } => write!(f, "set_param:{}:{}", name, value),
            other => f.write_str(other.verb()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_waypoint() {
        let cmd = Command::parse("waypoint:-22.9068:-43.1729:60:3").unwrap();
        assert_eq!(
            cmd,
            Command::Waypoint {
                lat: -22.9068,
                lon: -43.1729,
                wait_time: 60.0,
                next_id: 3,
            }
        );
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(Command::parse("arm"), Ok(Command::Arm));
        assert_eq!(Command::parse("disarm"), Ok(Command::Disarm));
        assert_eq!(Command::parse("get_mode"), Ok(Command::GetMode));
        assert_eq!(
            Command::parse("output_rest_time:300"),
            Ok(Command::OutputRestTime(300))
        );
        assert_eq!(
            Command::parse("input_rest_time:5"),
            Ok(Command::InputRestTime(5))
        );
    }

    #[test]
    fn test_parse_set_mode() {
        assert_eq!(
            Command::parse("set_mode:auto"),
            Ok(Command::SetMode(VehicleMode::Auto))
        );
        assert_eq!(
            Command::parse("set_mode:hold"),
            Ok(Command::SetMode(VehicleMode::Other("hold".into())))
        );
    }

    #[test]
    fn test_parse_set_param() {
        assert_eq!(
            Command::parse("set_param:CRUISE_SPEED:1.5"),
            Ok(Command::SetParam {
                name: "CRUISE_SPEED".into(),
                value: 1.5,
            })
        );
        assert!(matches!(
            Command::parse("set_param:THIS_NAME_IS_TOO_LONG:1"),
            Err(ParseError::InvalidArgument { arg: "name", .. })
        ));
    }

    #[test]
    fn test_trailing_padding_ignored() {
        assert_eq!(Command::parse("arm\r\n"), Ok(Command::Arm));
        assert_eq!(Command::parse("arm\0\0\0"), Ok(Command::Arm));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(""), Err(ParseError::Empty));
        assert_eq!(Command::parse("  "), Err(ParseError::Empty));
        assert_eq!(Command::parse("armé"), Err(ParseError::NotAscii));
        assert_eq!(
            Command::parse("foo:bar"),
            Err(ParseError::UnknownVerb("foo".into()))
        );
        assert_eq!(
            Command::parse("arm:now"),
            Err(ParseError::WrongArity {
                verb: "arm",
                expected: 0,
                found: 1,
            })
        );
        assert_eq!(
            Command::parse("waypoint:1:2:3"),
            Err(ParseError::WrongArity {
                verb: "waypoint",
                expected: 4,
                found: 3,
            })
        );
        assert!(matches!(
            Command::parse("output_rest_time:-5"),
            Err(ParseError::InvalidArgument { arg: "seconds", .. })
        ));
        assert!(matches!(
            Command::parse("waypoint:95:0:10:1"),
            Err(ParseError::InvalidArgument { arg: "lat", .. })
        ));
        assert!(matches!(
            Command::parse("waypoint:NaN:0:10:1"),
            Err(ParseError::InvalidArgument { arg: "lat", .. })
        ));
    }

    #[test]
    fn test_verbs_match_exactly() {
        assert_eq!(
            Command::parse("armed"),
            Err(ParseError::UnknownVerb("armed".into()))
        );
    }

    #[test]
    fn test_display_parses_back() {
        for frame in [
            "waypoint:-22.5:-43.25:60:3",
            "set_mode:smart_rtl",
            "set_param:MISSION_PAUSE_S:30",
            "get_mode",
            "input_rest_time:15",
        ] {
            let cmd: Command = frame.parse().unwrap();
            assert_eq!(cmd.to_string(), frame);
        }
    }

    #[test]
    fn test_mode_numbers() {
        assert_eq!(VehicleMode::Manual.number(), Some(0));
        assert_eq!(VehicleMode::Auto.number(), Some(10));
        assert_eq!(VehicleMode::SmartRtl.number(), Some(12));
        assert_eq!(VehicleMode::Guided.number(), Some(15));
        assert_eq!(VehicleMode::from_name("4").number(), Some(4));
        assert_eq!(VehicleMode::from_name("hold").number(), None);
        assert_eq!(VehicleMode::from_number(12), VehicleMode::SmartRtl);
        assert_eq!(VehicleMode::from_number(4).name(), "4");
    }
}
