//! Address canonicalisation and civic-number parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static LEADING_CIVIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").expect("static regex"));
static CIVIC_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)(?:-([0-9]+))?").expect("static regex"));

/// Lowercase, turn `.` `,` `-` into spaces, collapse whitespace, trim.
///
/// Total and idempotent.
pub fn normalize_address(addr: &str) -> String {
    let replaced: String = addr
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '.' | ',' | '-') { ' ' } else { c })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The digits at the very start of the raw string, if any.
///
/// No trimming: an address with leading whitespace has no leading civic.
pub fn leading_civic(addr: &str) -> Option<&str> {
    LEADING_CIVIC.find(addr).map(|m| m.as_str())
}

/// Inclusive run of civic numbers parsed from the front of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CivicRange {
    start: u64,
    end: u64,
}

impl CivicRange {
    pub const EMPTY: CivicRange = CivicRange { start: 1, end: 0 };

    pub fn new(start: u64, end: u64) -> Self {
        if end < start {
            Self::EMPTY
        } else {
            Self { start, end }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    pub fn contains(&self, civic: u64) -> bool {
        !self.is_empty() && self.start <= civic && civic <= self.end
    }

    pub fn overlaps(&self, other: &CivicRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start <= other.end
            && other.start <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }
}

/// Parse `"123"` as {123} and `"123-125"` as {123, 124, 125}.
///
/// Only the first dash-delimited group counts; digits later in the street
/// name are ignored. A reversed range (`"125-123"`) is empty, as is any
/// address without a leading number or with an out-of-range one.
pub fn civic_range(addr: &str) -> CivicRange {
    let Some(caps) = CIVIC_RANGE.captures(addr.trim()) else {
        return CivicRange::EMPTY;
    };
    let Some(start) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
        return CivicRange::EMPTY;
    };
    let end = match caps.get(2) {
        Some(m) => match m.as_str().parse::<u64>() {
            Ok(end) => end,
            Err(_) => return CivicRange::EMPTY,
        },
        None => start,
    };
    CivicRange::new(start, end)
}
