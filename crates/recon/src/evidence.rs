use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::{
    DuplicateListing, Listings, MatchedAppraisal, ReconSummary, SecondaryRecord, Slot,
};

/// A recoverable problem met while processing one document. None of these
/// stop a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A field's pattern matched nowhere in the section or document.
    FieldNotFound {
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        section: Option<usize>,
        field: String,
    },
    /// A listing section reused an identifier that was already accepted.
    DuplicateIdentifier {
        source: String,
        section: usize,
        identifier: String,
        kept_slot: Slot,
    },
    /// A captured number was empty or not numeric after cleaning.
    UnparsableNumber {
        source: String,
        field: String,
        raw: String,
    },
    /// An appraisal matched no listing.
    NoMatch { source: String, address: String },
}

impl Finding {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FieldNotFound { .. } => "field_not_found",
            Self::DuplicateIdentifier { .. } => "duplicate_identifier",
            Self::UnparsableNumber { .. } => "unparsable_number",
            Self::NoMatch { .. } => "no_match",
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldNotFound { source, section: Some(section), field } => {
                write!(f, "{source}, listing {}: {field} not found", section + 1)
            }
            Self::FieldNotFound { source, section: None, field } => {
                write!(f, "{source}: {field} not found")
            }
            Self::DuplicateIdentifier { source, section, identifier, kept_slot } => write!(
                f,
                "{source}, listing {}: duplicate identifier {identifier} (kept {kept_slot})",
                section + 1
            ),
            Self::UnparsableNumber { source, field, raw } => {
                write!(f, "{source}: cannot parse {field} from '{raw}'")
            }
            Self::NoMatch { source, address } => {
                write!(f, "{source}: no listing matches '{address}'")
            }
        }
    }
}

/// Compute summary statistics for a finished run.
pub fn compute_summary(
    listing_documents: usize,
    sections: usize,
    listings: &Listings,
    duplicates: &[DuplicateListing],
    matches: &[MatchedAppraisal],
    unmatched: &[SecondaryRecord],
    findings: &[Finding],
) -> ReconSummary {
    let mut finding_counts: BTreeMap<String, usize> = BTreeMap::new();
    for finding in findings {
        *finding_counts.entry(finding.kind().to_string()).or_insert(0) += 1;
    }

    ReconSummary {
        listing_documents,
        sections,
        listings: listings.len(),
        duplicates: duplicates.len(),
        appraisals: matches.len() + unmatched.len(),
        matched: matches.len(),
        unmatched: unmatched.len(),
        finding_counts,
    }
}
