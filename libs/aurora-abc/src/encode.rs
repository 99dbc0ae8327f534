//! Writable properties and their encoders
//!
//! Each property validates its input and produces exactly one register
//! write. Encoders are written per property, never derived from decoders.

use std::fmt;
use std::str::FromStr;

use crate::constants::MANUAL_CONTROL_OFF;
use crate::error::{AbcError, Result};
use crate::registry::tables::{self, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumidistatMode {
    Auto,
    Manual,
}

impl FromStr for HumidistatMode {
    type Err = AbcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(HumidistatMode::Auto),
            "manual" => Ok(HumidistatMode::Manual),
            other => Err(AbcError::validation(format!(
                "Unknown humidistat mode '{}', expected auto or manual",
                other
            ))),
        }
    }
}

/// User-supplied value for a property
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Number(f64),
    Choice(String),
    Switch(bool),
    /// Two numbers, e.g. humidification and dehumidification targets
    Pair(f64, f64),
    Modes {
        humidifier: HumidistatMode,
        dehumidifier: HumidistatMode,
    },
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Number(v) => write!(f, "{}", v),
            Setting::Choice(s) => f.write_str(s),
            Setting::Switch(b) => write!(f, "{}", if *b { "on" } else { "off" }),
            Setting::Pair(a, b) => write!(f, "{},{}", a, b),
            Setting::Modes {
                humidifier,
                dehumidifier,
            } => write!(f, "{:?},{:?}", humidifier, dehumidifier),
        }
    }
}

/// Parses `72.5`, `on`/`off`, `40,55`, `auto,manual` or a bare word choice
impl FromStr for Setting {
    type Err = AbcError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AbcError::validation("Empty setting"));
        }
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" => return Ok(Setting::Switch(true)),
            "off" | "false" | "no" => return Ok(Setting::Switch(false)),
            _ => {}
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(Setting::Number(v));
        }
        if let Some((a, b)) = s.split_once(',') {
            if let (Ok(a), Ok(b)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                return Ok(Setting::Pair(a, b));
            }
            return Ok(Setting::Modes {
                humidifier: a.parse()?,
                dehumidifier: b.parse()?,
            });
        }
        Ok(Setting::Choice(s.to_string()))
    }
}

/// Register write produced by an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    Value(u16),
    /// Replace only the `mask` bits of the current register value
    Masked { bits: u16, mask: u16 },
}

impl Encoded {
    pub fn apply(&self, current: u16) -> u16 {
        match *self {
            Encoded::Value(v) => v,
            Encoded::Masked { bits, mask } => (current & !mask) | (bits & mask),
        }
    }

    pub fn needs_current(&self) -> bool {
        matches!(self, Encoded::Masked { .. })
    }
}

const AUTO_HUMIDIFICATION: u16 = 0x8000;
const AUTO_DEHUMIDIFICATION: u16 = 0x4000;

#[derive(Debug, Clone, Copy)]
pub enum EncodeRule {
    /// Fixed point: `round(value * scale)` in two's complement
    Scaled { min: f64, max: f64, scale: f64 },
    Integer { min: i64, max: i64 },
    Stepped { min: i64, max: i64, step: i64 },
    Choice(Table),
    Switch,
    /// Speed within bounds, or `off` for automatic control
    SpeedOrOff { min: i64, max: i64 },
    /// High byte and low byte, each with its own bounds
    PackedPair {
        high: (i64, i64),
        low: (i64, i64),
    },
    /// Humidifier / dehumidifier auto bits
    ModeBits,
}

fn whole(value: f64) -> Result<i64> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(AbcError::validation(format!("{} is not a whole number", value)));
    }
    Ok(value as i64)
}

fn check_bounds(value: i64, min: i64, max: i64) -> Result<i64> {
    if value < min || value > max {
        return Err(AbcError::validation(format!(
            "{} outside {}..={}",
            value, min, max
        )));
    }
    Ok(value)
}

fn twos_complement(value: i64) -> Result<u16> {
    if !(i64::from(i16::MIN)..=i64::from(u16::MAX)).contains(&value) {
        return Err(AbcError::validation(format!("{} does not fit a register", value)));
    }
    Ok((value & 0xffff) as u16)
}

fn mismatch(rule: &EncodeRule, setting: &Setting) -> AbcError {
    AbcError::validation(format!("{:?} does not accept '{}'", rule, setting))
}

impl EncodeRule {
    pub fn encode(&self, setting: &Setting) -> Result<Encoded> {
        let raw = match (self, setting) {
            (EncodeRule::Scaled { min, max, scale }, Setting::Number(v)) => {
                if !(*min..=*max).contains(v) {
                    return Err(AbcError::validation(format!(
                        "{} outside {}..={}",
                        v, min, max
                    )));
                }
                twos_complement((v * scale).round() as i64)?
            }
            (EncodeRule::Integer { min, max }, Setting::Number(v)) => {
                twos_complement(check_bounds(whole(*v)?, *min, *max)?)?
            }
            (EncodeRule::Stepped { min, max, step }, Setting::Number(v)) => {
                let v = check_bounds(whole(*v)?, *min, *max)?;
                if v % step != 0 {
                    return Err(AbcError::validation(format!(
                        "{} is not a multiple of {}",
                        v, step
                    )));
                }
                twos_complement(v)?
            }
            (EncodeRule::Choice(table), Setting::Choice(_) | Setting::Switch(_)) => {
                // "off" parses as a switch but is also a heating mode
                let name = setting.to_string().to_ascii_lowercase();
                tables::code_for(*table, &name).ok_or_else(|| {
                    let allowed: Vec<&str> = table.iter().map(|(_, n)| *n).collect();
                    AbcError::validation(format!(
                        "Unknown choice '{}', expected one of {}",
                        name,
                        allowed.join(", ")
                    ))
                })?
            }
            (EncodeRule::Switch, Setting::Switch(on)) => u16::from(*on),
            (EncodeRule::SpeedOrOff { .. }, Setting::Switch(false)) => MANUAL_CONTROL_OFF,
            (EncodeRule::SpeedOrOff { min, max }, Setting::Number(v)) => {
                twos_complement(check_bounds(whole(*v)?, *min, *max)?)?
            }
            (EncodeRule::PackedPair { high, low }, Setting::Pair(h, l)) => {
                let h = check_bounds(whole(*h)?, high.0, high.1)?;
                let l = check_bounds(whole(*l)?, low.0, low.1)?;
                ((h << 8) + l) as u16
            }
            (
                EncodeRule::ModeBits,
                Setting::Modes {
                    humidifier,
                    dehumidifier,
                },
            ) => {
                let mut bits = 0;
                if *humidifier == HumidistatMode::Auto {
                    bits |= AUTO_HUMIDIFICATION;
                }
                if *dehumidifier == HumidistatMode::Auto {
                    bits |= AUTO_DEHUMIDIFICATION;
                }
                return Ok(Encoded::Masked {
                    bits,
                    mask: AUTO_HUMIDIFICATION | AUTO_DEHUMIDIFICATION,
                });
            }
            (rule, setting) => return Err(mismatch(rule, setting)),
        };
        Ok(Encoded::Value(raw))
    }
}

#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: String,
    pub address: u16,
    pub rule: EncodeRule,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, address: u16, rule: EncodeRule) -> Self {
        Self {
            name: name.into(),
            address,
            rule,
        }
    }

    pub fn encode(&self, setting: &Setting) -> Result<Encoded> {
        self.rule.encode(setting).map_err(|e| match e {
            AbcError::ValidationError(msg) => {
                AbcError::validation(format!("{}: {}", self.name, msg))
            }
            other => other,
        })
    }
}

const SETPOINT_HEATING: EncodeRule = EncodeRule::Scaled {
    min: 40.0,
    max: 90.0,
    scale: 10.0,
};
const SETPOINT_COOLING: EncodeRule = EncodeRule::Scaled {
    min: 54.0,
    max: 99.0,
    scale: 10.0,
};
const FAN_ON_TIME: EncodeRule = EncodeRule::Stepped {
    min: 0,
    max: 25,
    step: 5,
};
const FAN_OFF_TIME: EncodeRule = EncodeRule::Stepped {
    min: 0,
    max: 40,
    step: 5,
};
const ECM_SPEED: EncodeRule = EncodeRule::Integer { min: 1, max: 12 };
const PUMP_SPEED: EncodeRule = EncodeRule::Integer { min: 1, max: 100 };
const HUMIDISTAT_TARGETS: EncodeRule = EncodeRule::PackedPair {
    high: (15, 50),
    low: (35, 65),
};

/// Every writable property, in a fixed order
#[derive(Debug, Clone)]
pub struct PropertyTable {
    properties: Vec<PropertySpec>,
}

impl PropertyTable {
    pub fn new(properties: Vec<PropertySpec>) -> Self {
        Self { properties }
    }

    pub fn aurora() -> Self {
        use EncodeRule::*;

        let mut properties = vec![
            PropertySpec::new("target_mode", 12606, Choice(tables::HEATING_MODE)),
            PropertySpec::new("heating_target_temperature", 12619, SETPOINT_HEATING),
            PropertySpec::new("cooling_target_temperature", 12620, SETPOINT_COOLING),
            PropertySpec::new("target_fan_mode", 12621, Choice(tables::FAN_MODE)),
            PropertySpec::new("fan_intermittent_on", 12622, FAN_ON_TIME),
            PropertySpec::new("fan_intermittent_off", 12623, FAN_OFF_TIME),
        ];

        for zone in 1..=6u16 {
            let base = 21202 + (zone - 1) * 9;
            properties.extend([
                PropertySpec::new(format!("zone{}_target_mode", zone), base, Choice(tables::HEATING_MODE)),
                PropertySpec::new(format!("zone{}_heating_target_temperature", zone), base + 1, SETPOINT_HEATING),
                PropertySpec::new(format!("zone{}_cooling_target_temperature", zone), base + 2, SETPOINT_COOLING),
                PropertySpec::new(format!("zone{}_target_fan_mode", zone), base + 3, Choice(tables::FAN_MODE)),
                PropertySpec::new(format!("zone{}_fan_intermittent_on", zone), base + 4, FAN_ON_TIME),
                PropertySpec::new(format!("zone{}_fan_intermittent_off", zone), base + 5, FAN_OFF_TIME),
            ]);
        }

        properties.extend([
            PropertySpec::new("blower_only_speed", 340, ECM_SPEED),
            PropertySpec::new("low_compressor_speed", 341, ECM_SPEED),
            PropertySpec::new("high_compressor_speed", 342, ECM_SPEED),
            PropertySpec::new("aux_heat_speed", 347, ECM_SPEED),
            PropertySpec::new("cooling_airflow_adjustment", 346, Integer { min: -50, max: 50 }),
            PropertySpec::new("pump_minimum_speed", 321, PUMP_SPEED),
            PropertySpec::new("pump_maximum_speed", 322, PUMP_SPEED),
            PropertySpec::new("pump_manual_control", 323, SpeedOrOff { min: 1, max: 100 }),
            PropertySpec::new("dhw_enabled", 400, Switch),
            PropertySpec::new(
                "dhw_set_point",
                401,
                Scaled {
                    min: 100.0,
                    max: 140.0,
                    scale: 10.0,
                },
            ),
            PropertySpec::new("humidistat_targets", 12310, HUMIDISTAT_TARGETS),
            PropertySpec::new("humidistat_mode", 12309, ModeBits),
            PropertySpec::new("iz2_humidistat_targets", 21115, HUMIDISTAT_TARGETS),
            PropertySpec::new("iz2_humidistat_mode", 21114, ModeBits),
        ]);

        Self { properties }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties.iter()
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.properties.iter().map(|p| p.address)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::convert::UnaryRule;
    use crate::value::RegisterValue;

    fn encode(name: &str, setting: &str) -> Result<Encoded> {
        let table = PropertyTable::aurora();
        table
            .get(name)
            .unwrap()
            .encode(&setting.parse().unwrap())
    }

    #[test]
    fn test_setting_parse() {
        assert_eq!("72.5".parse::<Setting>().unwrap(), Setting::Number(72.5));
        assert_eq!("off".parse::<Setting>().unwrap(), Setting::Switch(false));
        assert_eq!("40,55".parse::<Setting>().unwrap(), Setting::Pair(40.0, 55.0));
        assert_eq!(
            "auto, manual".parse::<Setting>().unwrap(),
            Setting::Modes {
                humidifier: HumidistatMode::Auto,
                dehumidifier: HumidistatMode::Manual,
            }
        );
        assert_eq!("heat".parse::<Setting>().unwrap(), Setting::Choice("heat".into()));
        assert!("auto,sometimes".parse::<Setting>().is_err());
    }

    #[test]
    fn test_tenths_round_trip() {
        let rule = EncodeRule::Scaled {
            min: 0.0,
            max: 100.0,
            scale: 10.0,
        };
        let Encoded::Value(raw) = rule.encode(&Setting::Number(31.7)).unwrap() else {
            panic!("expected plain value");
        };
        assert_eq!(raw, 317);
        assert_eq!(UnaryRule::Tenths.apply(raw), RegisterValue::Number(31.7));
    }

    #[test]
    fn test_setpoint_bounds() {
        assert_eq!(encode("heating_target_temperature", "68").unwrap(), Encoded::Value(680));
        assert!(matches!(
            encode("heating_target_temperature", "91"),
            Err(AbcError::ValidationError(_))
        ));
        assert!(encode("cooling_target_temperature", "53.9").is_err());
        assert_eq!(encode("zone3_cooling_target_temperature", "75.5").unwrap(), Encoded::Value(755));
        assert_eq!(encode("dhw_set_point", "130").unwrap(), Encoded::Value(1300));
        assert!(encode("dhw_set_point", "99").is_err());
    }

    #[test]
    fn test_choices_and_steps() {
        assert_eq!(encode("target_mode", "eheat").unwrap(), Encoded::Value(4));
        assert_eq!(encode("zone2_target_fan_mode", "continuous").unwrap(), Encoded::Value(1));
        assert!(encode("target_mode", "turbo").is_err());
        assert_eq!(encode("zone1_target_mode", "off").unwrap(), Encoded::Value(0));
        assert_eq!(encode("fan_intermittent_on", "15").unwrap(), Encoded::Value(15));
        assert!(encode("fan_intermittent_on", "12").is_err());
        assert!(encode("fan_intermittent_on", "30").is_err());
        assert_eq!(encode("fan_intermittent_off", "40").unwrap(), Encoded::Value(40));
    }

    #[test]
    fn test_speeds() {
        assert_eq!(encode("blower_only_speed", "12").unwrap(), Encoded::Value(12));
        assert!(encode("blower_only_speed", "13").is_err());
        assert!(encode("aux_heat_speed", "2.5").is_err());
        assert_eq!(encode("pump_manual_control", "off").unwrap(), Encoded::Value(0x7fff));
        assert_eq!(encode("pump_manual_control", "75").unwrap(), Encoded::Value(75));
        assert_eq!(encode("cooling_airflow_adjustment", "-5").unwrap(), Encoded::Value(0xfffb));
    }

    #[test]
    fn test_humidistat() {
        assert_eq!(
            encode("humidistat_targets", "40,55").unwrap(),
            Encoded::Value((40 << 8) + 55)
        );
        assert!(encode("humidistat_targets", "10,55").is_err());
        assert!(encode("iz2_humidistat_targets", "40,70").is_err());

        let mode = encode("humidistat_mode", "auto,manual").unwrap();
        assert!(mode.needs_current());
        assert_eq!(mode.apply(0x4000 | 0x0012), 0x8000 | 0x0012);
    }

    #[test]
    fn test_wrong_setting_kind() {
        assert!(matches!(
            encode("dhw_enabled", "42"),
            Err(AbcError::ValidationError(_))
        ));
        assert_eq!(encode("dhw_enabled", "on").unwrap(), Encoded::Value(1));
    }

    #[test]
    fn test_table_has_every_zone() {
        let table = PropertyTable::aurora();
        assert_eq!(table.len(), 6 + 36 + 14);
        assert_eq!(table.get("zone6_fan_intermittent_off").unwrap().address, 21252);
        assert!(table.get("zone7_target_mode").is_none());
    }
}
