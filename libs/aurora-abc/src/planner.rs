//! Query planning
//!
//! Turns an arbitrary set of addresses and ranges into the transactions the
//! ABC will answer: at most [`MAX_REGISTERS_PER_REQUEST`] registers per
//! transaction, and no contiguous run crossing a breakpoint. Some register
//! blocks cannot be read in the same run as the block before them even
//! though their addresses are contiguous.

use std::fmt;
use std::ops::RangeInclusive;

use crate::constants::MAX_REGISTERS_PER_REQUEST;

/// One single register or one inclusive run of registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Span {
    Single(u16),
    Range { start: u16, end: u16 },
}

impl Span {
    /// Build a span from an inclusive range; reversed bounds are swapped
    pub fn range(start: u16, end: u16) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if start == end {
            Span::Single(start)
        } else {
            Span::Range { start, end }
        }
    }

    pub fn first(&self) -> u16 {
        match *self {
            Span::Single(addr) => addr,
            Span::Range { start, .. } => start,
        }
    }

    pub fn last(&self) -> u16 {
        match *self {
            Span::Single(addr) => addr,
            Span::Range { end, .. } => end,
        }
    }

    /// Register count
    pub fn len(&self) -> usize {
        usize::from(self.last() - self.first()) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Span::Range { .. })
    }

    pub fn addresses(&self) -> RangeInclusive<u16> {
        self.first()..=self.last()
    }
}

impl From<u16> for Span {
    fn from(addr: u16) -> Self {
        Span::Single(addr)
    }
}

impl From<RangeInclusive<u16>> for Span {
    fn from(range: RangeInclusive<u16>) -> Self {
        Span::range(*range.start(), *range.end())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Single(addr) => write!(f, "{}", addr),
            Span::Range { start, end } => write!(f, "{}..{}", start, end),
        }
    }
}

/// Spans served by one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    spans: Vec<Span>,
}

impl Chunk {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn register_count(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }

    /// Addresses in the order the device answers them
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.spans.iter().flat_map(Span::addresses)
    }

    /// Needs FC65 rather than FC66
    pub fn has_range(&self) -> bool {
        self.spans.iter().any(Span::is_range)
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", span)?;
        }
        write!(f, "]")
    }
}

/// Split `spans` into transaction-sized chunks.
///
/// Input may be unsorted and overlapping. Runs are closed at gaps, at
/// [`MAX_REGISTERS_PER_REQUEST`] registers, and right before a breakpoint;
/// a chunk is closed before a run that would push it over the limit.
pub fn plan<I>(spans: I, breakpoints: &[u16]) -> Vec<Chunk>
where
    I: IntoIterator<Item = Span>,
{
    let mut addresses: Vec<u16> = spans.into_iter().flat_map(|s| s.addresses()).collect();
    addresses.sort_unstable();
    addresses.dedup();

    let mut chunks = Vec::new();
    let mut current: Vec<Span> = Vec::new();
    let mut count = 0usize;
    let mut run_start: Option<u16> = None;

    for (i, &addr) in addresses.iter().enumerate() {
        let start = *run_start.get_or_insert(addr);
        let run_len = usize::from(addr - start) + 1;

        // Sorted and deduplicated, so a successor implies addr < u16::MAX
        let closes = match addresses.get(i + 1) {
            None => true,
            Some(&next) => {
                next != addr + 1
                    || run_len == MAX_REGISTERS_PER_REQUEST
                    || breakpoints.contains(&next)
            }
        };
        if !closes {
            continue;
        }

        if count + run_len > MAX_REGISTERS_PER_REQUEST {
            chunks.push(Chunk::new(std::mem::take(&mut current)));
            count = 0;
        }
        current.push(Span::range(start, addr));
        count += run_len;
        run_start = None;
    }

    if !current.is_empty() {
        chunks.push(Chunk::new(current));
    }
    chunks
}
