use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::evidence::Finding;

/// Marker written wherever extraction was attempted but nothing was located.
pub const NOT_FOUND: &str = "not found";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable handle of one listing's storage location. Assigned in discovery
/// order, never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u32);

impl Slot {
    pub fn index(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Slot {
        Slot(self.0 + 1)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An extracted text value, or the explicit "not found" marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextField {
    Found(String),
    NotFound,
}

impl TextField {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(v) => Self::Found(v),
            None => Self::NotFound,
        }
    }

    pub fn as_found(&self) -> Option<&str> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// The value, or the sentinel text when nothing was found.
    pub fn as_str(&self) -> &str {
        self.as_found().unwrap_or(NOT_FOUND)
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TextField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Accumulated totals
// ---------------------------------------------------------------------------

/// The additive numeric columns of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalField {
    FloorArea,
    BuildingArea,
    AssessedValue,
}

impl TotalField {
    pub const ALL: [TotalField; 3] = [Self::FloorArea, Self::BuildingArea, Self::AssessedValue];

    pub fn name(self) -> &'static str {
        match self {
            Self::FloorArea => "floor_area",
            Self::BuildingArea => "building_area",
            Self::AssessedValue => "assessed_value",
        }
    }
}

impl fmt::Display for TotalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default)]
    pub floor_area: f64,
    #[serde(default)]
    pub building_area: f64,
    #[serde(default)]
    pub assessed_value: f64,
}

impl Totals {
    pub fn get(&self, field: TotalField) -> f64 {
        match field {
            TotalField::FloorArea => self.floor_area,
            TotalField::BuildingArea => self.building_area,
            TotalField::AssessedValue => self.assessed_value,
        }
    }

    pub fn set(&mut self, field: TotalField, value: f64) {
        match field {
            TotalField::FloorArea => self.floor_area = value,
            TotalField::BuildingArea => self.building_area = value,
            TotalField::AssessedValue => self.assessed_value = value,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One brokerage listing. Identity fields are fixed at creation; only the
/// totals change afterwards, through [`crate::aggregate::TotalsSink`].
#[derive(Debug, Clone, Serialize)]
pub struct PrimaryRecord {
    slot: Slot,
    identifier: TextField,
    address: TextField,
    price: TextField,
    source: String,
    pub(crate) totals: Totals,
}

impl PrimaryRecord {
    pub fn new(slot: Slot, identifier: TextField, address: TextField, price: TextField) -> Self {
        Self {
            slot,
            identifier,
            address,
            price,
            source: String::new(),
            totals: Totals::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn identifier(&self) -> &TextField {
        &self.identifier
    }

    pub fn address(&self) -> &TextField {
        &self.address
    }

    pub fn price(&self) -> &TextField {
        &self.price
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }
}

/// One appraisal roll. Absent numbers stay `None`: absence is not zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryRecord {
    pub source: String,
    pub address: TextField,
    pub floor_area: Option<f64>,
    pub building_area: Option<f64>,
    pub assessed_value: Option<f64>,
}

impl SecondaryRecord {
    pub fn new(source: impl Into<String>, address: TextField) -> Self {
        Self {
            source: source.into(),
            address,
            floor_area: None,
            building_area: None,
            assessed_value: None,
        }
    }

    pub fn value(&self, field: TotalField) -> Option<f64> {
        match field {
            TotalField::FloorArea => self.floor_area,
            TotalField::BuildingArea => self.building_area,
            TotalField::AssessedValue => self.assessed_value,
        }
    }

    pub fn set_value(&mut self, field: TotalField, value: Option<f64>) {
        match field {
            TotalField::FloorArea => self.floor_area = value,
            TotalField::BuildingArea => self.building_area = value,
            TotalField::AssessedValue => self.assessed_value = value,
        }
    }
}

/// All listings of a run, in discovery order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Listings {
    records: Vec<PrimaryRecord>,
}

impl Listings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Slots must arrive strictly increasing.
    pub fn push(&mut self, record: PrimaryRecord) {
        debug_assert!(
            self.records.last().map_or(true, |last| last.slot < record.slot),
            "slots must be strictly increasing"
        );
        self.records.push(record);
    }

    pub fn get(&self, slot: Slot) -> Option<&PrimaryRecord> {
        self.position(slot).map(|i| &self.records[i])
    }

    pub(crate) fn get_mut(&mut self, slot: Slot) -> Option<&mut PrimaryRecord> {
        self.position(slot).map(move |i| &mut self.records[i])
    }

    fn position(&self, slot: Slot) -> Option<usize> {
        self.records.binary_search_by_key(&slot, |r| r.slot).ok()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PrimaryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<PrimaryRecord> {
        self.records
    }
}

impl From<Vec<PrimaryRecord>> for Listings {
    fn from(mut records: Vec<PrimaryRecord>) -> Self {
        records.sort_by_key(|r| r.slot);
        records.dedup_by_key(|r| r.slot);
        Self { records }
    }
}

impl<'a> IntoIterator for &'a Listings {
    type Item = &'a PrimaryRecord;
    type IntoIter = std::slice::Iter<'a, PrimaryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// How two addresses compared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchVerdict {
    /// Token-set similarity, 0–100. Zero when the civic gate rejected.
    pub score: f64,
    /// Both addresses carry a leading civic number and they differ.
    pub civic_conflict: bool,
    /// The civic ranges of both addresses intersect.
    pub civic_overlap: bool,
    pub accepted: bool,
}

/// Outcome of looking one appraisal up among the listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    pub target_slot: Option<Slot>,
    pub matched_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<MatchVerdict>,
}

impl MatchResult {
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            target_slot: None,
            matched_identifier: None,
            verdict: None,
        }
    }
}

/// An appraisal that was merged into a listing.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedAppraisal {
    pub source: String,
    pub address: TextField,
    pub target_slot: Slot,
    pub identifier: TextField,
    pub listing_address: TextField,
    pub score: f64,
    pub civic_overlap: bool,
    /// Only the fields that were present, in the order they were added.
    pub contributed: Vec<(TotalField, f64)>,
}

/// A listing section dropped because its identifier was already taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateListing {
    pub source: String,
    pub section: usize,
    pub identifier: String,
    pub kept_slot: Slot,
}

// ---------------------------------------------------------------------------
// Input + Output
// ---------------------------------------------------------------------------

/// One source document, already decoded to per-page text.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    pub name: String,
    pub pages: Vec<String>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self { name: name.into(), pages }
    }
}

/// Everything one run consumes.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub listings: Vec<SourceDocument>,
    pub appraisals: Vec<SourceDocument>,
    /// Totals already stored for a slot before this run.
    pub prior: BTreeMap<Slot, Totals>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub threshold: u8,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub listing_documents: usize,
    pub sections: usize,
    pub listings: usize,
    pub duplicates: usize,
    pub appraisals: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub finding_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub listings: Listings,
    pub matches: Vec<MatchedAppraisal>,
    pub unmatched: Vec<SecondaryRecord>,
    pub duplicates: Vec<DuplicateListing>,
    pub findings: Vec<Finding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_field_sentinel() {
        assert_eq!(TextField::NotFound.as_str(), "not found");
        assert_eq!(TextField::Found("123 rue A".into()).to_string(), "123 rue A");
        assert_eq!(
            serde_json::to_string(&TextField::NotFound).unwrap(),
            "\"not found\""
        );
    }

    #[test]
    fn listings_lookup_by_slot() {
        let listings: Listings = vec![
            PrimaryRecord::new(Slot(2), TextField::NotFound, TextField::NotFound, TextField::NotFound),
            PrimaryRecord::new(Slot(0), TextField::NotFound, TextField::NotFound, TextField::NotFound),
        ]
        .into();
        assert_eq!(listings.iter().next().unwrap().slot(), Slot(0));
        assert!(listings.get(Slot(2)).is_some());
        assert!(listings.get(Slot(1)).is_none());
    }

    #[test]
    fn totals_get_set() {
        let mut t = Totals::default();
        t.set(TotalField::AssessedValue, 10.0);
        assert_eq!(t.get(TotalField::AssessedValue), 10.0);
        assert_eq!(t.get(TotalField::FloorArea), 0.0);
    }
}
