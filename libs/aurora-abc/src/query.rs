//! Query expressions
//!
//! A query is a comma separated list of addresses (`745`), inclusive ranges
//! (`740..747` or `740-747`) and the symbolic sets `known`, `valid` and
//! `all`. A query with any symbolic item is implicit: registers the device
//! refuses are left out instead of failing the whole fetch.

use std::fmt;
use std::str::FromStr;

use crate::error::{AbcError, Result};
use crate::planner::Span;
use crate::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryItem {
    Address(u16),
    Range(u16, u16),
    /// Every documented register
    Known,
    /// Every register in the ranges the device answers
    Valid,
    /// The whole address space
    All,
}

impl QueryItem {
    pub fn is_symbolic(&self) -> bool {
        matches!(self, QueryItem::Known | QueryItem::Valid | QueryItem::All)
    }
}

impl fmt::Display for QueryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryItem::Address(a) => write!(f, "{}", a),
            QueryItem::Range(a, b) => write!(f, "{}..{}", a, b),
            QueryItem::Known => write!(f, "known"),
            QueryItem::Valid => write!(f, "valid"),
            QueryItem::All => write!(f, "all"),
        }
    }
}

fn parse_address(text: &str) -> Result<u16> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AbcError::invalid_query(format!("'{}' is not a register address", text)));
    }
    // digits only, so a parse failure means the number is too large
    text.parse::<u16>()
        .map_err(|_| AbcError::illegal_address(format!("register {} does not exist", text)))
}

impl FromStr for QueryItem {
    type Err = AbcError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "known" => return Ok(QueryItem::Known),
            "valid" => return Ok(QueryItem::Valid),
            "all" => return Ok(QueryItem::All),
            _ => {}
        }

        let bounds = s.split_once("..").or_else(|| s.split_once('-'));
        match bounds {
            Some((start, end)) => {
                let (start, end) = (parse_address(start)?, parse_address(end)?);
                if start > end {
                    return Err(AbcError::invalid_query(format!(
                        "range {}..{} runs backwards",
                        start, end
                    )));
                }
                Ok(if start == end {
                    QueryItem::Address(start)
                } else {
                    QueryItem::Range(start, end)
                })
            }
            None => parse_address(s).map(QueryItem::Address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    items: Vec<QueryItem>,
}

impl Query {
    pub fn new(items: Vec<QueryItem>) -> Self {
        Self { items }
    }

    pub fn parse(text: &str) -> Result<Self> {
        text.parse()
    }

    /// Explicit addresses, strict
    pub fn addresses<I: IntoIterator<Item = u16>>(addresses: I) -> Self {
        Self::new(addresses.into_iter().map(QueryItem::Address).collect())
    }

    pub fn items(&self) -> &[QueryItem] {
        &self.items
    }

    /// Strict queries surface every device error
    pub fn is_strict(&self) -> bool {
        !self.items.iter().any(QueryItem::is_symbolic)
    }

    /// Spans in query order, symbolic items expanded against `registry`
    pub fn resolve(&self, registry: &Registry) -> Vec<Span> {
        let mut spans = Vec::new();
        for item in &self.items {
            match item {
                QueryItem::Address(a) => spans.push(Span::Single(*a)),
                QueryItem::Range(a, b) => spans.push(Span::range(*a, *b)),
                QueryItem::Known => {
                    spans.extend(registry.known_addresses().into_iter().map(Span::Single))
                }
                QueryItem::Valid => spans.extend(
                    registry
                        .valid_ranges()
                        .iter()
                        .map(|r| Span::range(*r.start(), *r.end())),
                ),
                QueryItem::All => spans.push(Span::range(0, u16::MAX)),
            }
        }
        spans
    }

    /// Requested addresses, first occurrence wins
    pub fn ordered_addresses(&self, registry: &Registry) -> Vec<u16> {
        let mut seen = vec![false; usize::from(u16::MAX) + 1];
        let mut ordered = Vec::new();
        for span in self.resolve(registry) {
            for addr in span.addresses() {
                if !std::mem::replace(&mut seen[usize::from(addr)], true) {
                    ordered.push(addr);
                }
            }
        }
        ordered
    }
}

impl FromStr for Query {
    type Err = AbcError;

    fn from_str(s: &str) -> Result<Self> {
        let items = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<QueryItem>>>()?;
        if items.is_empty() {
            return Err(AbcError::invalid_query("empty query"));
        }
        Ok(Self { items })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let query = Query::parse("745, 19..20,1146-1153,known").unwrap();
        assert_eq!(
            query.items(),
            &[
                QueryItem::Address(745),
                QueryItem::Range(19, 20),
                QueryItem::Range(1146, 1153),
                QueryItem::Known,
            ]
        );
        assert!(!query.is_strict());
        assert!(Query::parse("745,19..20").unwrap().is_strict());
        assert_eq!(query.to_string(), "745,19..20,1146..1153,known");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Query::parse("99999"),
            Err(AbcError::IllegalDataAddress(_))
        ));
        assert!(matches!(
            Query::parse("10..70000"),
            Err(AbcError::IllegalDataAddress(_))
        ));
        assert!(matches!(Query::parse("20..10"), Err(AbcError::InvalidQuery(_))));
        assert!(matches!(Query::parse("heat"), Err(AbcError::InvalidQuery(_))));
        assert!(matches!(Query::parse(" , "), Err(AbcError::InvalidQuery(_))));
    }

    #[test]
    fn test_resolve_symbolic() {
        let registry = Registry::new()
            .with_name(3, "three")
            .with_name(1, "one")
            .with_valid_ranges([10..=12, 20..=20]);

        assert_eq!(
            Query::parse("known").unwrap().resolve(&registry),
            vec![Span::Single(1), Span::Single(3)]
        );
        assert_eq!(
            Query::parse("valid").unwrap().resolve(&registry),
            vec![Span::range(10, 12), Span::Single(20)]
        );
        assert_eq!(
            Query::parse("all").unwrap().resolve(&registry),
            vec![Span::range(0, u16::MAX)]
        );
    }

    #[test]
    fn test_ordered_addresses_dedup_first_wins() {
        let registry = Registry::new();
        let query = Query::parse("30,19..21,20,5").unwrap();
        assert_eq!(query.ordered_addresses(&registry), vec![30, 19, 20, 21, 5]);
    }
}
