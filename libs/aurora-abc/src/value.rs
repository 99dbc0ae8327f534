//! Decoded register values

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Named flags decomposed from a bitmask, plus any undeclared bits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub names: Vec<&'static str>,
    pub residual: Option<u16>,
}

impl FlagSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| *n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.residual.is_none()
    }

    /// Flag names followed by the residual rendered as `0x%04x`
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.names.iter().map(|n| n.to_string()).collect();
        if let Some(residual) = self.residual {
            terms.push(format!("0x{:04x}", residual));
        }
        terms
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.terms().join(", "))
    }
}

/// Value of one register after decoding
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterValue {
    /// No converter applies
    Raw(u16),
    Integer(i64),
    /// Fixed point
    Number(f64),
    Bool(bool),
    Symbol(&'static str),
    Text(String),
    Flags(FlagSet),
    /// Named sub-fields of one register
    Record(Vec<(&'static str, RegisterValue)>),
    /// The converter yields nothing for this raw value
    Empty,
}

impl RegisterValue {
    pub fn as_raw(&self) -> Option<u16> {
        match self {
            RegisterValue::Raw(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RegisterValue::Raw(v) => Some(i64::from(*v)),
            RegisterValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RegisterValue::Raw(v) => Some(f64::from(*v)),
            RegisterValue::Integer(v) => Some(*v as f64),
            RegisterValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Sub-field of a record
    pub fn field(&self, name: &str) -> Option<&RegisterValue> {
        match self {
            RegisterValue::Record(fields) => fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<u16> for RegisterValue {
    fn from(v: u16) -> Self {
        RegisterValue::Raw(v)
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Raw(v) => write!(f, "{}", v),
            RegisterValue::Integer(v) => write!(f, "{}", v),
            RegisterValue::Number(v) => write!(f, "{}", v),
            RegisterValue::Bool(v) => write!(f, "{}", v),
            RegisterValue::Symbol(s) => f.write_str(s),
            RegisterValue::Text(s) => f.write_str(s),
            RegisterValue::Flags(flags) => write!(f, "{}", flags),
            RegisterValue::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            RegisterValue::Empty => Ok(()),
        }
    }
}

impl Serialize for RegisterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RegisterValue::Raw(v) => serializer.serialize_u16(*v),
            RegisterValue::Integer(v) => serializer.serialize_i64(*v),
            RegisterValue::Number(v) => serializer.serialize_f64(*v),
            RegisterValue::Bool(v) => serializer.serialize_bool(*v),
            RegisterValue::Symbol(s) => serializer.serialize_str(s),
            RegisterValue::Text(s) => serializer.serialize_str(s),
            RegisterValue::Flags(flags) => {
                let terms = flags.terms();
                let mut seq = serializer.serialize_seq(Some(terms.len()))?;
                for term in &terms {
                    seq.serialize_element(term)?;
                }
                seq.end()
            }
            RegisterValue::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            RegisterValue::Empty => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(RegisterValue::Number(31.7).to_string(), "31.7");
        assert_eq!(RegisterValue::Symbol("auto").to_string(), "auto");
        assert_eq!(RegisterValue::Empty.to_string(), "");

        let flags = FlagSet {
            names: vec!["cc", "blower"],
            residual: Some(0x1000),
        };
        assert_eq!(RegisterValue::Flags(flags).to_string(), "cc, blower, 0x1000");

        let record = RegisterValue::Record(vec![
            ("fan_demand", RegisterValue::Integer(4)),
            ("unit_demand", RegisterValue::Integer(2)),
        ]);
        assert_eq!(record.to_string(), "{fan_demand: 4, unit_demand: 2}");
        assert_eq!(record.field("unit_demand"), Some(&RegisterValue::Integer(2)));
    }

    #[test]
    fn test_serialize_json() {
        let record = RegisterValue::Record(vec![
            ("mode", RegisterValue::Symbol("heat")),
            ("outputs", RegisterValue::Flags(FlagSet { names: vec!["cc"], residual: None })),
            ("lockout", RegisterValue::Empty),
        ]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"mode":"heat","outputs":["cc"],"lockout":null}"#
        );
        assert_eq!(serde_json::to_string(&RegisterValue::Raw(7)).unwrap(), "7");
    }
}
