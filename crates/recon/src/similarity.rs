//! Lexical similarity scores on a 0–100 scale.
//!
//! `ratio` is the normalised Indel similarity (insertions and deletions
//! only), and `token_set_ratio` compares the sorted token intersection and
//! differences of two strings so that word order and repeated words do
//! not matter.

use std::collections::BTreeSet;

use rapidfuzz::distance::indel;

/// Turn a distance over `total_len` chars into a 0–100 similarity.
fn normalized(distance: usize, total_len: usize) -> f64 {
    if total_len == 0 {
        return 100.0;
    }
    (total_len - distance) as f64 * 100.0 / total_len as f64
}

/// Indel similarity of two whole strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized(
        indel::distance(a.chars(), b.chars()),
        a.chars().count() + b.chars().count(),
    )
}

/// Order-independent token overlap score.
///
/// Returns 0 when either side has no tokens, 100 when one token set is
/// contained in the other (and they share at least one token).
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let ab = diff_ab.join(" ");
    let ba = diff_ba.join(" ");
    let sect_len = sect.chars().count();
    let ab_len = ab.chars().count();
    let ba_len = ba.chars().count();

    // "sect ab" / "sect ba" share the intersection prefix, so their distance
    // is the distance between the differences alone.
    let sep = usize::from(sect_len > 0);
    let sect_ab_len = sect_len + sep + ab_len;
    let sect_ba_len = sect_len + sep + ba_len;

    let diff_score = normalized(
        indel::distance(ab.chars(), ba.chars()),
        sect_ab_len + sect_ba_len,
    );
    if sect_len == 0 {
        return diff_score;
    }

    // Distance from "sect" to "sect ab" is the separator plus the suffix.
    let sect_ab_score = normalized(sep + ab_len, sect_len + sect_ab_len);
    let sect_ba_score = normalized(sep + ba_len, sect_len + sect_ba_len);

    diff_score.max(sect_ab_score).max(sect_ba_score)
}
