//! Device registry
//!
//! Everything the client knows about the ABC address space: names, the
//! ranges the device answers, planner breakpoints, the writable set and the
//! converter / display format attached to each address. Built once and
//! shared behind an `Arc`.

pub(crate) mod layout;
pub(crate) mod names;
pub mod tables;

use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::convert::Converter;
use crate::encode::PropertyTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterName {
    Named(String),
    /// Documented but not displayed on its own
    Hidden,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    names: HashMap<u16, RegisterName>,
    valid_ranges: Vec<RangeInclusive<u16>>,
    breakpoints: Vec<u16>,
    writable: BTreeSet<u16>,
    converters: HashMap<u16, Converter>,
    formats: HashMap<u16, &'static str>,
}

impl Registry {
    /// Empty registry: no names, no converters, nothing writable
    pub fn new() -> Self {
        Self::default()
    }

    /// Register map of the Aurora ABC
    pub fn aurora() -> Self {
        let mut names: HashMap<u16, RegisterName> = names::NAMES
            .iter()
            .map(|(addr, name)| (*addr, RegisterName::Named(name.to_string())))
            .collect();
        for range in names::HIDDEN_RANGES {
            names.extend(range.clone().map(|a| (a, RegisterName::Hidden)));
        }
        names.extend(names::HIDDEN.iter().map(|a| (*a, RegisterName::Hidden)));
        names.extend(
            names::FAULT_HISTORY.map(|a| (a, RegisterName::Named(names::fault_name(a)))),
        );
        names.extend(
            names::zone_names()
                .into_iter()
                .map(|(a, name)| (a, RegisterName::Named(name))),
        );

        let mut converters = HashMap::new();
        for (converter, addresses) in layout::converters() {
            converters.extend(addresses.iter().map(|a| (*a, converter)));
        }

        let mut formats = HashMap::new();
        for (format, addresses) in layout::FORMATS {
            formats.extend(addresses.iter().map(|a| (*a, *format)));
        }

        let writable = layout::RAW_WRITABLE
            .iter()
            .copied()
            .chain(PropertyTable::aurora().addresses())
            .collect();

        Self {
            names,
            valid_ranges: layout::VALID_RANGES.to_vec(),
            breakpoints: layout::BREAKPOINTS.to_vec(),
            writable,
            converters,
            formats,
        }
    }

    /// Shared handle to the ABC register map
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::aurora())
    }

    pub fn with_valid_ranges<I>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = RangeInclusive<u16>>,
    {
        self.valid_ranges = ranges.into_iter().collect();
        self.valid_ranges.sort_by_key(|r| *r.start());
        self
    }

    pub fn with_breakpoints(mut self, breakpoints: &[u16]) -> Self {
        self.breakpoints = breakpoints.to_vec();
        self
    }

    pub fn with_name(mut self, address: u16, name: impl Into<String>) -> Self {
        self.names.insert(address, RegisterName::Named(name.into()));
        self
    }

    pub fn with_hidden(mut self, address: u16) -> Self {
        self.names.insert(address, RegisterName::Hidden);
        self
    }

    pub fn with_writable<I: IntoIterator<Item = u16>>(mut self, addresses: I) -> Self {
        self.writable.extend(addresses);
        self
    }

    pub fn with_converter(mut self, address: u16, converter: impl Into<Converter>) -> Self {
        self.converters.insert(address, converter.into());
        self
    }

    pub fn with_format(mut self, address: u16, format: &'static str) -> Self {
        self.formats.insert(address, format);
        self
    }

    /// Display name, `None` for unnamed and hidden addresses
    pub fn name(&self, address: u16) -> Option<&str> {
        match self.names.get(&address) {
            Some(RegisterName::Named(name)) => Some(name),
            _ => None,
        }
    }

    pub fn is_hidden(&self, address: u16) -> bool {
        matches!(self.names.get(&address), Some(RegisterName::Hidden))
    }

    /// Every documented address, hidden ones included, ascending
    pub fn known_addresses(&self) -> Vec<u16> {
        let mut addresses: Vec<u16> = self.names.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    pub fn valid_ranges(&self) -> &[RangeInclusive<u16>] {
        &self.valid_ranges
    }

    pub fn breakpoints(&self) -> &[u16] {
        &self.breakpoints
    }

    pub fn is_writable(&self, address: u16) -> bool {
        self.writable.contains(&address)
    }

    pub fn writable(&self) -> impl Iterator<Item = u16> + '_ {
        self.writable.iter().copied()
    }

    pub fn converter(&self, address: u16) -> Option<&Converter> {
        self.converters.get(&address)
    }

    pub fn format(&self, address: u16) -> Option<&'static str> {
        self.formats.get(&address).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aurora_names() {
        let registry = Registry::aurora();
        assert_eq!(registry.name(745), Some("Heating Set Point"));
        assert_eq!(registry.name(602), Some("E2 (High Pressure)"));
        assert_eq!(registry.name(21203), Some("Zone 1 Heating Setpoint (write)"));
        assert_eq!(registry.name(31447), Some("Dealer Email"));
        assert!(registry.is_hidden(1147));
        assert!(registry.is_hidden(31448));
        assert_eq!(registry.name(1147), None);
        assert_eq!(registry.name(7), None);
        assert!(!registry.is_hidden(7));
    }

    #[test]
    fn test_aurora_writable_set() {
        let registry = Registry::aurora();
        for addr in [112, 340, 346, 347, 401, 12606, 12619, 21114, 21202, 21252] {
            assert!(registry.is_writable(addr), "{}", addr);
        }
        for addr in [0, 19, 745, 31003] {
            assert!(!registry.is_writable(addr), "{}", addr);
        }
    }

    #[test]
    fn test_aurora_converters_and_formats() {
        let registry = Registry::aurora();
        assert!(registry.converter(19).is_some());
        assert!(registry.converter(21231).is_some());
        assert!(registry.converter(22131).is_none());
        assert_eq!(registry.format(19), Some("%0.1f°F"));
        assert_eq!(registry.format(25), Some("E%d"));
        assert_eq!(registry.format(30), None);
        assert_eq!(registry.breakpoints(), &[12100, 12500]);
    }

    #[test]
    fn test_known_addresses_sorted() {
        let known = Registry::aurora().known_addresses();
        assert!(known.windows(2).all(|w| w[0] < w[1]));
        assert!(known.contains(&0));
        assert!(known.contains(&1165));
    }
}
