//! Ordered register snapshots

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::value::RegisterValue;

/// Address to value map that keeps insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterSnapshot {
    entries: Vec<(u16, RegisterValue)>,
    index: HashMap<u16, usize>,
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Snapshot of raw values in the given order
    pub fn from_raw<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (u16, u16)>,
    {
        values
            .into_iter()
            .map(|(addr, v)| (addr, RegisterValue::Raw(v)))
            .collect()
    }

    /// Insert or replace; a replaced address keeps its position
    pub fn insert(&mut self, address: u16, value: RegisterValue) {
        match self.index.get(&address) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(address, self.entries.len());
                self.entries.push((address, value));
            }
        }
    }

    pub fn get(&self, address: u16) -> Option<&RegisterValue> {
        self.index.get(&address).map(|&i| &self.entries[i].1)
    }

    /// Raw value at `address`, if present and undecoded
    pub fn raw(&self, address: u16) -> Option<u16> {
        self.get(address).and_then(RegisterValue::as_raw)
    }

    pub fn contains(&self, address: u16) -> bool {
        self.index.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|(addr, _)| *addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &RegisterValue)> {
        self.entries.iter().map(|(addr, v)| (*addr, v))
    }
}

impl FromIterator<(u16, RegisterValue)> for RegisterSnapshot {
    fn from_iter<I: IntoIterator<Item = (u16, RegisterValue)>>(iter: I) -> Self {
        let mut snapshot = RegisterSnapshot::new();
        for (addr, value) in iter {
            snapshot.insert(addr, value);
        }
        snapshot
    }
}

impl IntoIterator for RegisterSnapshot {
    type Item = (u16, RegisterValue);
    type IntoIter = std::vec::IntoIter<(u16, RegisterValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for RegisterSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (addr, value) in &self.entries {
            map.serialize_entry(addr, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_kept() {
        let mut snapshot = RegisterSnapshot::from_raw([(745, 680), (19, 300), (30, 8)]);
        assert_eq!(snapshot.addresses().collect::<Vec<_>>(), vec![745, 19, 30]);

        snapshot.insert(19, RegisterValue::Number(30.0));
        assert_eq!(snapshot.addresses().collect::<Vec<_>>(), vec![745, 19, 30]);
        assert_eq!(snapshot.get(19), Some(&RegisterValue::Number(30.0)));
        assert_eq!(snapshot.raw(19), None);
        assert_eq!(snapshot.raw(30), Some(8));
        assert!(!snapshot.contains(31));
    }
}
