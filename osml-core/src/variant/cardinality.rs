//! Cardinality sets: unions of integer ranges
//!
//! A [`Cardinality`] describes how many instances of something are permitted.
//! It is a set of ranges, each a single point, a closed interval `[a, b]`, or
//! an unbounded interval `[a, ∞)`. The set is kept normalized (sorted,
//! overlapping and adjacent ranges merged), so structural equality is set
//! equality.

use std::cmp::Ordering;
use std::fmt;

/// One inclusive range of permitted counts; `end == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl CardinalityRange {
    pub fn point(n: usize) -> Self {
        CardinalityRange {
            start: n,
            end: Some(n),
        }
    }

    pub fn bounded(start: usize, end: usize) -> Self {
        CardinalityRange {
            start,
            end: Some(end.max(start)),
        }
    }

    pub fn open(start: usize) -> Self {
        CardinalityRange { start, end: None }
    }

    pub fn permits(&self, n: usize) -> bool {
        n >= self.start && self.end.map_or(true, |e| n <= e)
    }

    fn cmp_key(&self) -> (usize, usize) {
        (self.start, self.end.unwrap_or(usize::MAX))
    }
}

impl PartialOrd for CardinalityRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CardinalityRange {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_key().cmp(&other.cmp_key())
    }
}

impl fmt::Display for CardinalityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(e) if e == self.start => write!(f, "{}", self.start),
            Some(e) => write!(f, "{}..{}", self.start, e),
            None => write!(f, "{}..", self.start),
        }
    }
}

/// A normalized union of [`CardinalityRange`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cardinality {
    ranges: Vec<CardinalityRange>,
}

impl Cardinality {
    /// The empty set: permits nothing.
    pub fn new() -> Self {
        Cardinality { ranges: Vec::new() }
    }

    /// `[0, ∞)`: permits anything.
    pub fn any() -> Self {
        let mut c = Cardinality::new();
        c.merge(CardinalityRange::open(0));
        c
    }

    pub fn merge(&mut self, range: CardinalityRange) {
        self.ranges.push(range);
        self.normalize();
    }

    pub fn permits(&self, n: usize) -> bool {
        self.ranges.iter().any(|r| r.permits(n))
    }

    pub fn ranges(&self) -> &[CardinalityRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn normalize(&mut self) {
        self.ranges.sort();
        let mut merged: Vec<CardinalityRange> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if joins(last, &r) => {
                    last.end = match (last.end, r.end) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    };
                }
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }
}

/// True if `next` overlaps or is adjacent to `prev` (assuming sorted order).
fn joins(prev: &CardinalityRange, next: &CardinalityRange) -> bool {
    match prev.end {
        None => true,
        Some(e) => next.start <= e.saturating_add(1),
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, "}}")
    }
}

impl PartialOrd for Cardinality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cardinality {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ranges.cmp(&other.ranges)
    }
}
