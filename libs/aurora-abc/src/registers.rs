//! Decoding, display and diffing of register snapshots

use std::collections::BTreeMap;

use tracing::debug;

use crate::registry::Registry;
use crate::snapshot::RegisterSnapshot;
use crate::value::RegisterValue;

/// Decode a raw snapshot.
///
/// Converters run once per address in ascending address order, so a
/// contextual converter sees the registers below it already decoded. The
/// result keeps the input order; addresses without a converter keep their
/// raw value.
pub fn decode(registry: &Registry, raw: &RegisterSnapshot) -> RegisterSnapshot {
    let mut working: BTreeMap<u16, RegisterValue> =
        raw.iter().map(|(addr, v)| (addr, v.clone())).collect();

    let addresses: Vec<u16> = working.keys().copied().collect();
    let mut converted = 0usize;
    for address in addresses {
        let Some(converter) = registry.converter(address) else {
            continue;
        };
        if let Some(value) = converter.apply(&working, address) {
            working.insert(address, value);
            converted += 1;
        }
    }
    debug!("Decoded {} of {} registers", converted, raw.len());

    raw.addresses()
        .filter_map(|addr| working.remove(&addr).map(|v| (addr, v)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Spec {
    zero_pad: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

fn render(spec: &Spec, value: &RegisterValue) -> String {
    let pad = |s: String| {
        if s.len() >= spec.width {
            s
        } else if spec.zero_pad {
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => ("-", rest.to_string()),
                None => ("", s.clone()),
            };
            format!("{}{}{}", sign, "0".repeat(spec.width - s.len()), digits)
        } else {
            format!("{}{}", " ".repeat(spec.width - s.len()), s)
        }
    };

    match spec.conversion {
        'd' => match value {
            RegisterValue::Number(v) => pad(format!("{}", v.trunc() as i64)),
            other => match other.as_i64() {
                Some(v) => pad(v.to_string()),
                None => other.to_string(),
            },
        },
        'x' => match value.as_i64() {
            Some(v) => pad(format!("{:x}", v & 0xffff)),
            None => value.to_string(),
        },
        'f' => match value.as_f64() {
            Some(v) => pad(format!("{:.*}", spec.precision.unwrap_or(6), v)),
            None => value.to_string(),
        },
        _ => pad(value.to_string()),
    }
}

/// printf-style formatting of one value: `%d`, `%x`, `%f` and `%s` with
/// optional zero padding, width and precision, and `%%`.
pub fn format_value(format: &str, value: &RegisterValue) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut flags = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                flags.push(c);
                chars.next();
            } else {
                break;
            }
        }
        let Some(conversion) = chars.next() else {
            out.push('%');
            out.push_str(&flags);
            break;
        };
        let (width, precision) = match flags.split_once('.') {
            Some((w, p)) => (w, p.parse().ok()),
            None => (flags.as_str(), None),
        };
        let spec = Spec {
            zero_pad: width.starts_with('0'),
            width: width.parse().unwrap_or(0),
            precision,
            conversion,
        };
        out.push_str(&render(&spec, value));
    }
    out
}

/// `"<name> (<address>): <value>"`, or `None` for hidden addresses.
///
/// Unnamed addresses show the value in decimal and hex; named ones use their
/// display format, or the value's own rendering without one.
pub fn format_register(registry: &Registry, address: u16, value: &RegisterValue) -> Option<String> {
    if registry.is_hidden(address) {
        return None;
    }
    let rendered = match (registry.name(address), value) {
        (_, RegisterValue::Empty) => String::new(),
        (None, v) => match v.as_i64() {
            Some(n) => format!("{} (0x{:04x})", n, n & 0xffff),
            None => v.to_string(),
        },
        (Some(_), v) => match registry.format(address) {
            Some(format) => format_value(format, v),
            None => v.to_string(),
        },
    };
    Some(format!(
        "{} ({}): {}",
        registry.name(address).unwrap_or("???"),
        address,
        rendered
    ))
}

/// One line per visible register of a decoded snapshot, in snapshot order
pub fn print_registers(registry: &Registry, registers: &RegisterSnapshot) -> Vec<String> {
    registers
        .iter()
        .filter_map(|(addr, value)| format_register(registry, addr, value))
        .collect()
}

/// Addresses whose value differs between `lhs` and `rhs`, with the `rhs`
/// value. An address missing from `rhs` maps to `Empty`.
pub fn diff_registers(lhs: &RegisterSnapshot, rhs: &RegisterSnapshot) -> RegisterSnapshot {
    let mut diff = RegisterSnapshot::new();
    let rhs_only = rhs.addresses().filter(|a| !lhs.contains(*a));
    for address in lhs.addresses().chain(rhs_only) {
        let (left, right) = (lhs.get(address), rhs.get(address));
        if left != right {
            diff.insert(address, right.cloned().unwrap_or(RegisterValue::Empty));
        }
    }
    diff
}
