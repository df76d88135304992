use crate::model::{Listings, MatchResult, MatchVerdict, TextField};
use crate::normalize::{civic_range, leading_civic, normalize_address};
use crate::similarity::token_set_ratio;

pub const DEFAULT_THRESHOLD: u8 = 80;

/// Scores at or above the threshold are accepted.
pub fn meets_threshold(score: f64, threshold: u8) -> bool {
    score >= f64::from(threshold)
}

/// Whether two address strings denote the same property.
pub fn matches(addr_a: &str, addr_b: &str, threshold: u8) -> bool {
    AddressMatcher::new(threshold).matches(addr_a, addr_b)
}

/// Tolerant address comparator: civic-number gate, token-set similarity,
/// civic-range overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMatcher {
    threshold: u8,
}

impl Default for AddressMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AddressMatcher {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Compare two raw addresses.
    ///
    /// Differing leading civic numbers veto the similarity path outright.
    /// Range overlap is judged on its own, so "123-125 Main" still meets
    /// "124 Main" even though 123 != 124.
    pub fn compare(&self, addr_a: &str, addr_b: &str) -> MatchVerdict {
        let civic_conflict = matches!(
            (leading_civic(addr_a), leading_civic(addr_b)),
            (Some(a), Some(b)) if a != b
        );
        let score = if civic_conflict {
            0.0
        } else {
            token_set_ratio(&normalize_address(addr_a), &normalize_address(addr_b))
        };
        let civic_overlap = civic_range(addr_a).overlaps(&civic_range(addr_b));
        let accepted =
            (!civic_conflict && meets_threshold(score, self.threshold)) || civic_overlap;

        MatchVerdict {
            score,
            civic_conflict,
            civic_overlap,
            accepted,
        }
    }

    pub fn matches(&self, addr_a: &str, addr_b: &str) -> bool {
        self.compare(addr_a, addr_b).accepted
    }

    /// First listing, in discovery order, whose address matches.
    ///
    /// A missing address on either side never matches.
    pub fn find_target(&self, address: &TextField, listings: &Listings) -> MatchResult {
        let Some(address) = address.as_found() else {
            return MatchResult::unmatched();
        };

        for listing in listings {
            let Some(candidate) = listing.address().as_found() else {
                continue;
            };
            let verdict = self.compare(address, candidate);
            if verdict.accepted {
                return MatchResult {
                    matched: true,
                    target_slot: Some(listing.slot()),
                    matched_identifier: Some(listing.identifier().as_str().to_string()),
                    verdict: Some(verdict),
                };
            }
        }

        MatchResult::unmatched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrimaryRecord, Slot};

    fn listing(slot: u32, id: &str, address: &str) -> PrimaryRecord {
        PrimaryRecord::new(
            Slot(slot),
            TextField::Found(id.into()),
            TextField::Found(address.into()),
            TextField::NotFound,
        )
    }

    #[test]
    fn civic_gate_rejects_different_numbers() {
        assert!(!matches("123 Main St", "456 Main St", 80));
        assert!(!matches("123 Main St", "456 Main St", 0));
        let v = AddressMatcher::default().compare("123 Main St", "456 Main St");
        assert!(v.civic_conflict);
        assert_eq!(v.score, 0.0);
    }

    #[test]
    fn civic_range_overlap_bypasses_gate() {
        assert!(matches("123-125 Main", "124 Main", 80));
        assert!(matches("124 Main", "123-125 Main", 80));
        let v = AddressMatcher::default().compare("123-125 Main", "124 Main");
        assert!(v.civic_conflict);
        assert!(v.civic_overlap);
    }

    #[test]
    fn overlap_alone_accepts_different_street_text() {
        assert!(matches("124 Main", "124 Totally Other Road", 80));
    }

    #[test]
    fn formatting_noise_is_tolerated() {
        assert!(matches("123, RUE MAIN.", "123 rue Main", 80));
        assert!(matches("rue Main", "Main rue", 80));
    }

    #[test]
    fn threshold_boundary() {
        assert!(meets_threshold(80.0, 80));
        assert!(!meets_threshold(79.0, 80));
        assert!(!meets_threshold(79.99, 80));
        // token-set score of exactly 80, no civic numbers involved
        assert!(matches("abcd", "abcdef", 80));
        assert!(!matches("abcd", "abcdef", 81));
    }

    #[test]
    fn score_just_under_threshold_is_rejected() {
        // one token each, no shared tokens: lcs 19 over 19 + 29 chars
        let a = "abcdefghijklmnopqrs";
        let b = "abcdefghijklmnopqrstuvwxyzabc";
        let v = AddressMatcher::default().compare(a, b);
        assert!((v.score - 3800.0 / 48.0).abs() < 1e-9, "score was {}", v.score);
        assert!(v.score >= 79.0 && v.score < 80.0);
        assert!(!v.civic_conflict);
        assert!(!v.civic_overlap);
        assert!(!matches(a, b, 80));
        assert!(matches(a, b, 79));
    }

    #[test]
    fn distinct_streets_rejected() {
        assert!(!matches("rue Sherbrooke", "avenue du Parc", 80));
    }

    #[test]
    fn unmatched_record() {
        let listings: Listings = vec![listing(0, "111", "123 Main St")].into();
        let result = AddressMatcher::default()
            .find_target(&TextField::Found("999 Nowhere Ave".into()), &listings);
        assert!(!result.matched);
        assert_eq!(result.target_slot, None);
        assert_eq!(result.matched_identifier, None);
    }

    #[test]
    fn first_match_wins_in_discovery_order() {
        let listings: Listings = vec![
            listing(0, "111", "10 rue A"),
            listing(1, "222", "124 Main St"),
            listing(2, "333", "124 Main Street"),
        ]
        .into();
        let result = AddressMatcher::default()
            .find_target(&TextField::Found("124 Main Street".into()), &listings);
        assert!(result.matched);
        assert_eq!(result.target_slot, Some(Slot(1)));
        assert_eq!(result.matched_identifier.as_deref(), Some("222"));
    }

    #[test]
    fn missing_addresses_never_match() {
        let listings: Listings = vec![PrimaryRecord::new(
            Slot(0),
            TextField::Found("1".into()),
            TextField::NotFound,
            TextField::NotFound,
        )]
        .into();
        let m = AddressMatcher::default();
        assert!(!m.find_target(&TextField::NotFound, &listings).matched);
        assert!(!m.find_target(&TextField::Found("not found".into()), &listings).matched);
    }
}
