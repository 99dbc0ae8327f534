//! Conversion rules from raw register words to typed values
//!
//! A converter is either unary (it only sees the raw word of its own
//! register) or contextual (it reads neighbouring registers of the snapshot
//! being decoded).

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::constants::MANUAL_CONTROL_OFF;
use crate::registry::tables::{self, Table};
use crate::value::{FlagSet, RegisterValue};

/// Decode a bitmask against `(bit, name)` pairs given in ascending order
pub fn from_bitmask(value: u16, flags: Table) -> FlagSet {
    let mut working = value;
    let mut names = Vec::new();
    for &(bit, name) in flags {
        if working & bit == bit {
            names.push(name);
        }
        working &= !bit;
    }
    FlagSet {
        names,
        residual: (working != 0).then_some(working),
    }
}

pub fn negatable(value: u16) -> i64 {
    if value & 0x8000 == 0x8000 {
        i64::from(value) - 0x10000
    } else {
        i64::from(value)
    }
}

pub fn to_uint32(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) + u32::from(low)
}

pub fn to_int32(high: u16, low: u16) -> i64 {
    let v = i64::from(to_uint32(high, low));
    if v & 0x8000_0000 == 0x8000_0000 {
        v - 0x1_0000_0000
    } else {
        v
    }
}

/// Pack registers high byte first into Latin-1 text, trimming trailing
/// spaces and NULs. `None` entries become U+FFFD.
pub fn to_text<I>(words: I) -> String
where
    I: IntoIterator<Item = Option<u16>>,
{
    let mut text = String::new();
    for word in words {
        match word {
            Some(w) => {
                text.push(char::from((w >> 8) as u8));
                text.push(char::from((w & 0xff) as u8));
            }
            None => text.push(char::REPLACEMENT_CHARACTER),
        }
    }
    let trimmed = text.trim_end_matches(&[' ', '\0'][..]).len();
    text.truncate(trimmed);
    text
}

#[derive(Clone, Copy)]
pub enum UnaryRule {
    Hundredths,
    Tenths,
    SignedTenths,
    /// Two's complement integer
    Negatable,
    /// Low 15 bits when the lockout flag (bit 15) is set, otherwise nothing
    LastLockout,
    NonZero,
    OpenClosed,
    Bitmask(Table),
    Lookup {
        table: Table,
        fallback: &'static str,
    },
    Composite(fn(u16) -> RegisterValue),
}

impl UnaryRule {
    pub fn apply(&self, value: u16) -> RegisterValue {
        match self {
            UnaryRule::Hundredths => RegisterValue::Number(f64::from(value) / 100.0),
            UnaryRule::Tenths => RegisterValue::Number(f64::from(value) / 10.0),
            UnaryRule::SignedTenths => RegisterValue::Number(negatable(value) as f64 / 10.0),
            UnaryRule::Negatable => RegisterValue::Integer(negatable(value)),
            UnaryRule::LastLockout => {
                if value & 0x8000 == 0x8000 {
                    RegisterValue::Integer(i64::from(value & 0x7fff))
                } else {
                    RegisterValue::Empty
                }
            }
            UnaryRule::NonZero => RegisterValue::Bool(value != 0),
            UnaryRule::OpenClosed => {
                RegisterValue::Symbol(if value == 0 { "closed" } else { "open" })
            }
            UnaryRule::Bitmask(flags) => RegisterValue::Flags(from_bitmask(value, *flags)),
            UnaryRule::Lookup { table, fallback } => {
                RegisterValue::Symbol(tables::lookup(*table, value).unwrap_or(*fallback))
            }
            UnaryRule::Composite(decode) => decode(value),
        }
    }
}

impl fmt::Debug for UnaryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryRule::Hundredths => write!(f, "Hundredths"),
            UnaryRule::Tenths => write!(f, "Tenths"),
            UnaryRule::SignedTenths => write!(f, "SignedTenths"),
            UnaryRule::Negatable => write!(f, "Negatable"),
            UnaryRule::LastLockout => write!(f, "LastLockout"),
            UnaryRule::NonZero => write!(f, "NonZero"),
            UnaryRule::OpenClosed => write!(f, "OpenClosed"),
            UnaryRule::Bitmask(flags) => write!(f, "Bitmask({} flags)", flags.len()),
            UnaryRule::Lookup { fallback, .. } => write!(f, "Lookup(fallback={})", fallback),
            UnaryRule::Composite(_) => write!(f, "Composite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextualRule {
    /// This register is the high word, the next one the low word
    Uint32,
    Int32,
    /// String packed across this and the following registers
    Text(u16),
    /// Zone heating setpoint borrows its high bit from the previous register
    ZoneConfiguration2,
}

impl ContextualRule {
    /// Decode `address` against the working map of the current decode pass.
    ///
    /// Registers below `address` are already decoded, the ones above still
    /// hold raw words.
    pub fn apply(&self, working: &BTreeMap<u16, RegisterValue>, address: u16) -> RegisterValue {
        let raw_at = |addr: u16| working.get(&addr).and_then(RegisterValue::as_raw);
        let Some(value) = raw_at(address) else {
            return working.get(&address).cloned().unwrap_or(RegisterValue::Empty);
        };

        match self {
            ContextualRule::Uint32 | ContextualRule::Int32 => {
                let Some(low) = address.checked_add(1).and_then(raw_at) else {
                    warn!("Missing register {} (low word of {})", u32::from(address) + 1, address);
                    return RegisterValue::Raw(value);
                };
                if *self == ContextualRule::Uint32 {
                    RegisterValue::Integer(i64::from(to_uint32(value, low)))
                } else {
                    RegisterValue::Integer(to_int32(value, low))
                }
            }
            ContextualRule::Text(len) => {
                let end = u32::from(address) + u32::from(*len);
                let words = (u32::from(address)..end).map(|a| {
                    let word = u16::try_from(a).ok().and_then(raw_at);
                    if word.is_none() {
                        warn!("Missing register {} in string at {}", a, address);
                    }
                    word
                });
                RegisterValue::Text(to_text(words.collect::<Vec<_>>()))
            }
            ContextualRule::ZoneConfiguration2 => {
                let prior = address.checked_sub(1).and_then(|a| working.get(&a));
                zone_configuration2(value, prior)
            }
        }
    }
}

/// Converter attached to a register address
#[derive(Debug, Clone, Copy)]
pub enum Converter {
    Unary(UnaryRule),
    Contextual(ContextualRule),
}

impl Converter {
    pub fn apply(&self, working: &BTreeMap<u16, RegisterValue>, address: u16) -> Option<RegisterValue> {
        match self {
            Converter::Unary(rule) => working
                .get(&address)
                .and_then(RegisterValue::as_raw)
                .map(|v| rule.apply(v)),
            Converter::Contextual(rule) => Some(rule.apply(working, address)),
        }
    }
}

impl From<UnaryRule> for Converter {
    fn from(rule: UnaryRule) -> Self {
        Converter::Unary(rule)
    }
}

impl From<ContextualRule> for Converter {
    fn from(rule: ContextualRule) -> Self {
        Converter::Contextual(rule)
    }
}

fn symbol_or_unknown(table: Table, value: u16) -> RegisterValue {
    RegisterValue::Symbol(tables::lookup(table, value).unwrap_or("unknown"))
}

fn leftover(fields: &mut Vec<(&'static str, RegisterValue)>, bits: u16) {
    if bits != 0 {
        fields.push(("unknown", RegisterValue::Text(format!("0x{:04x}", bits))));
    }
}

fn bit(value: u16, mask: u16) -> bool {
    value & mask == mask
}

pub fn dipswitch_settings(value: u16) -> RegisterValue {
    if value == MANUAL_CONTROL_OFF {
        return RegisterValue::Symbol("manual");
    }
    RegisterValue::Record(vec![
        ("fp1", RegisterValue::Integer(if bit(value, 0x01) { 30 } else { 15 })),
        (
            "fp2",
            if bit(value, 0x02) {
                RegisterValue::Integer(30)
            } else {
                RegisterValue::Symbol("off")
            },
        ),
        ("reversing_valve", RegisterValue::Symbol(if bit(value, 0x04) { "o" } else { "b" })),
        (
            "accessory_relay",
            symbol_or_unknown(tables::ACCESSORY_RELAY_SETTINGS, (value >> 3) & 0x3),
        ),
        ("compressor", RegisterValue::Integer(if bit(value, 0x20) { 1 } else { 2 })),
        (
            "lockout",
            RegisterValue::Symbol(if bit(value, 0x40) { "continuous" } else { "pulse" }),
        ),
        (
            "dehumidifier_reheat",
            RegisterValue::Symbol(if bit(value, 0x80) { "dehumidifier" } else { "reheat" }),
        ),
    ])
}

pub fn status(value: u16) -> RegisterValue {
    let switch = |mask| RegisterValue::Symbol(if bit(value, mask) { "closed" } else { "open" });
    let mut fields = vec![("lps", switch(0x80)), ("hps", switch(0x100))];
    for &(mask, name) in tables::SYSTEM_INPUTS {
        if bit(value, mask) {
            fields.push((name, RegisterValue::Bool(true)));
        }
    }
    leftover(&mut fields, value & !0x03ff);
    RegisterValue::Record(fields)
}

pub fn thermostat_override(value: u16) -> RegisterValue {
    if value == MANUAL_CONTROL_OFF {
        return RegisterValue::Flags(FlagSet {
            names: vec!["off"],
            residual: None,
        });
    }
    RegisterValue::Flags(from_bitmask(value, tables::SYSTEM_INPUTS))
}

pub fn axb_inputs(value: u16) -> RegisterValue {
    let accessory_relay2 = match (bit(value, 0x080), bit(value, 0x100)) {
        (true, true) => "blower",
        (false, true) => "low_capacity_compressor",
        (true, false) => "high_capacity_compressor",
        (false, false) => "dehumidifier",
    };
    let mut fields = vec![
        ("smart_grid", RegisterValue::Bool(bit(value, 0x001))),
        ("ha1", RegisterValue::Bool(bit(value, 0x002))),
        ("ha2", RegisterValue::Bool(bit(value, 0x004))),
        ("pump_slave", RegisterValue::Bool(bit(value, 0x008))),
        ("mb_address", RegisterValue::Integer(if bit(value, 0x010) { 3 } else { 4 })),
        ("sw1_2", RegisterValue::Bool(bit(value, 0x020))),
        ("sw1_3", RegisterValue::Bool(bit(value, 0x040))),
        ("accessory_relay2", RegisterValue::Symbol(accessory_relay2)),
    ];
    leftover(&mut fields, value & !0x1ff);
    RegisterValue::Record(fields)
}

pub fn manual_operation(value: u16) -> RegisterValue {
    if value == MANUAL_CONTROL_OFF {
        return RegisterValue::Symbol("off");
    }
    let mut fields = vec![(
        "mode",
        RegisterValue::Symbol(if bit(value, 0x100) { "cooling" } else { "heating" }),
    )];
    if bit(value, 0x200) {
        fields.push(("aux_heat", RegisterValue::Bool(true)));
    }
    fields.push(("compressor_speed", RegisterValue::Integer(i64::from(value & 0xf))));
    let blower = if bit(value, 0xf0) {
        RegisterValue::Symbol("with_compressor")
    } else {
        RegisterValue::Integer(i64::from(value & 0xf0))
    };
    fields.push(("blower_speed", blower));
    leftover(&mut fields, value & !0x03ff);
    RegisterValue::Record(fields)
}

pub fn vs_manual_control(value: u16) -> RegisterValue {
    if value == MANUAL_CONTROL_OFF {
        RegisterValue::Symbol("off")
    } else {
        RegisterValue::Integer(i64::from(value))
    }
}

/// VS pump fault code with its band description, e.g. "80 RPM Sensor Signal Fault"
pub fn vs_pump_fault(value: u16) -> RegisterValue {
    match tables::VS_FAULTS
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&value))
    {
        Some((_, _, name)) => RegisterValue::Text(format!("{} {}", value, name)),
        None => RegisterValue::Text(value.to_string()),
    }
}

pub fn iz2_demand(value: u16) -> RegisterValue {
    RegisterValue::Record(vec![
        ("fan_demand", RegisterValue::Integer(i64::from(value >> 8))),
        ("unit_demand", RegisterValue::Integer(i64::from(value & 0xff))),
    ])
}

/// Blower demand level to percentage
pub fn iz2_fan_desired(value: u16) -> RegisterValue {
    let percent = match value {
        1 => 25,
        2 => 40,
        3 => 55,
        4 => 70,
        5 => 85,
        6 => 100,
        other => i64::from(other),
    };
    RegisterValue::Integer(percent)
}

pub fn thermostat_configuration2(value: u16) -> RegisterValue {
    let mut fields = vec![("mode", symbol_or_unknown(tables::HEATING_MODE, (value >> 8) & 0x07))];
    leftover(&mut fields, value & !0x0700);
    RegisterValue::Record(fields)
}

pub fn zone_configuration1(value: u16) -> RegisterValue {
    let fan = if bit(value, 0x80) {
        "continuous"
    } else if bit(value, 0x100) {
        "intermittent"
    } else {
        "auto"
    };
    let mut fields = vec![
        ("fan", RegisterValue::Symbol(fan)),
        ("on_time", RegisterValue::Integer(i64::from((value >> 9) & 0x7) * 5)),
        ("off_time", RegisterValue::Integer((i64::from((value >> 12) & 0x7) + 1) * 5)),
        (
            "cooling_target_temperature",
            RegisterValue::Integer(i64::from((value & 0x7e) >> 1) + 36),
        ),
        ("heating_target_temperature_carry", RegisterValue::Integer(i64::from(value & 0x01))),
    ];
    leftover(&mut fields, value & !0x7fff);
    RegisterValue::Record(fields)
}

/// `prior` is the working value of the previous register: a decoded
/// configuration 1 record, a raw word, or absent.
pub fn zone_configuration2(value: u16, prior: Option<&RegisterValue>) -> RegisterValue {
    let mut fields = vec![
        ("call", symbol_or_unknown(tables::CALLS, (value >> 1) & 0x7)),
        ("mode", symbol_or_unknown(tables::HEATING_MODE, (value >> 8) & 0x03)),
        ("damper", RegisterValue::Symbol(if bit(value, 0x10) { "open" } else { "closed" })),
    ];
    let carry = prior.and_then(|p| match p {
        RegisterValue::Raw(raw) => Some(i64::from(raw & 0x01)),
        other => other
            .field("heating_target_temperature_carry")
            .and_then(RegisterValue::as_i64),
    });
    if let Some(carry) = carry {
        let setpoint = ((carry << 5) | i64::from((value & 0xf800) >> 11)) + 36;
        fields.push(("heating_target_temperature", RegisterValue::Integer(setpoint)));
    }
    leftover(&mut fields, value & !0xfb1e);
    RegisterValue::Record(fields)
}

/// High byte is the normalized zone size
pub fn zone_configuration3(value: u16) -> RegisterValue {
    let size = (value >> 3) & 0x3;
    let zone_size = tables::ZONE_SIZES
        .iter()
        .find(|(code, _)| *code == size)
        .map_or(0, |(_, pct)| *pct);
    let mut fields = vec![
        (
            "zone_priority",
            RegisterValue::Symbol(if bit(value, 0x20) { "economy" } else { "comfort" }),
        ),
        ("zone_size", RegisterValue::Integer(zone_size)),
        ("normalized_size", RegisterValue::Integer(i64::from(value >> 8))),
    ];
    leftover(&mut fields, value & !0xff38);
    RegisterValue::Record(fields)
}

pub fn humidistat_targets(value: u16) -> RegisterValue {
    RegisterValue::Record(vec![
        ("humidification_target", RegisterValue::Integer(i64::from(value >> 8))),
        ("dehumidification_target", RegisterValue::Integer(i64::from(value & 0xff))),
    ])
}
