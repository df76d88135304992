use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};

use crate::aggregate::{accumulate, TotalsSink};
use crate::config::{ReconConfig, Rules};
use crate::error::ReconError;
use crate::evidence::{compute_summary, Finding};
use crate::extract::{AppraisalRules, ListingRules};
use crate::matcher::AddressMatcher;
use crate::model::{
    DuplicateListing, Listings, MatchedAppraisal, PrimaryRecord, ReconInput, ReconMeta,
    ReconResult, SecondaryRecord, Slot, TotalField, Totals,
};
use crate::segment::{split_sections, PageMarkers};

/// Run the whole pipeline: every listing document is segmented before any
/// appraisal is matched, since an appraisal may belong to a listing found
/// in a later document.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let rules = config.compile()?;

    let mut collector = ListingCollector::new(&rules.markers, &rules.listing);
    for doc in &input.listings {
        collector.add_document(&doc.name, &doc.pages);
    }
    let collected = collector.finish();
    let mut listings = collected.listings;
    let mut findings = collected.findings;

    seed_prior(&mut listings, &input.prior);

    let mut appraisals = Vec::with_capacity(input.appraisals.len());
    for doc in &input.appraisals {
        let (record, doc_findings) = extract_secondary(&doc.name, &doc.pages, &rules.appraisal);
        findings.extend(doc_findings);
        appraisals.push(record);
    }

    let outcome = reconcile(&mut listings, appraisals, &rules.matcher);
    for record in &outcome.unmatched {
        findings.push(Finding::NoMatch {
            source: record.source.clone(),
            address: record.address.as_str().to_string(),
        });
    }

    let summary = compute_summary(
        collected.documents,
        collected.sections,
        &listings,
        &collected.duplicates,
        &outcome.matches,
        &outcome.unmatched,
        &findings,
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            threshold: rules.matcher.threshold(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        listings,
        matches: outcome.matches,
        unmatched: outcome.unmatched,
        duplicates: collected.duplicates,
        findings,
    })
}

fn seed_prior(listings: &mut Listings, prior: &BTreeMap<Slot, Totals>) {
    for (&slot, totals) in prior {
        if listings.get(slot).is_none() {
            warn!("prior totals for slot {slot} have no listing; ignored");
            continue;
        }
        for field in TotalField::ALL {
            listings.write(slot, field, totals.get(field));
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Listings gathered from one or more documents.
#[derive(Debug, Default)]
pub struct CollectedListings {
    pub listings: Listings,
    pub duplicates: Vec<DuplicateListing>,
    pub findings: Vec<Finding>,
    pub documents: usize,
    pub sections: usize,
}

/// Segments listing documents and turns sections into records, dropping
/// repeated identifiers and handing out slots in discovery order.
pub struct ListingCollector<'r> {
    markers: &'r PageMarkers,
    rules: &'r ListingRules,
    seen: HashMap<String, Slot>,
    next_slot: Slot,
    out: CollectedListings,
}

impl<'r> ListingCollector<'r> {
    pub fn new(markers: &'r PageMarkers, rules: &'r ListingRules) -> Self {
        Self {
            markers,
            rules,
            seen: HashMap::new(),
            next_slot: Slot(0),
            out: CollectedListings::default(),
        }
    }

    /// Process one document; returns how many listings it contributed.
    pub fn add_document<S: AsRef<str>>(&mut self, name: &str, pages: &[S]) -> usize {
        let sections = split_sections(pages, self.markers);
        debug!("{name}: {} page(s), {} listing section(s)", pages.len(), sections.len());
        self.out.documents += 1;
        self.out.sections += sections.len();

        let mut accepted = 0;
        for section in &sections {
            let fields = self.rules.extract(&section.text);

            for (field, value) in [
                ("identifier", &fields.identifier),
                ("address", &fields.address),
                ("price", &fields.price),
            ] {
                if !value.is_found() {
                    self.out.findings.push(Finding::FieldNotFound {
                        source: name.to_string(),
                        section: Some(section.index),
                        field: field.to_string(),
                    });
                }
            }

            if let Some(id) = fields.identifier.as_found() {
                if let Some(&kept_slot) = self.seen.get(id) {
                    warn!(
                        "{name}, listing {}: duplicate identifier {id}, keeping slot {kept_slot}",
                        section.index + 1
                    );
                    self.out.duplicates.push(DuplicateListing {
                        source: name.to_string(),
                        section: section.index,
                        identifier: id.to_string(),
                        kept_slot,
                    });
                    self.out.findings.push(Finding::DuplicateIdentifier {
                        source: name.to_string(),
                        section: section.index,
                        identifier: id.to_string(),
                        kept_slot,
                    });
                    continue;
                }
                self.seen.insert(id.to_string(), self.next_slot);
            }

            let slot = self.next_slot;
            self.next_slot = slot.next();
            info!(
                "{name}, listing {} -> slot {slot}: {} | {} | {}",
                section.index + 1,
                fields.address,
                fields.price,
                fields.identifier
            );
            self.out.listings.push(
                PrimaryRecord::new(slot, fields.identifier, fields.address, fields.price)
                    .with_source(name),
            );
            accepted += 1;
        }
        accepted
    }

    pub fn finish(self) -> CollectedListings {
        self.out
    }
}

/// Listings of a single document, slots starting at 0.
pub fn extract_primary<S: AsRef<str>>(
    pages: &[S],
    markers: &PageMarkers,
    rules: &ListingRules,
) -> Vec<PrimaryRecord> {
    let mut collector = ListingCollector::new(markers, rules);
    collector.add_document("", pages);
    collector.finish().listings.into_vec()
}

/// The appraisal record of one document's pages, with whatever could not
/// be read from them.
pub fn extract_secondary<S: AsRef<str>>(
    source: &str,
    pages: &[S],
    rules: &AppraisalRules,
) -> (SecondaryRecord, Vec<Finding>) {
    let text = pages.iter().map(AsRef::as_ref).collect::<Vec<&str>>().join("\n");
    let (record, findings) = rules.extract(source, &text);
    for finding in &findings {
        debug!("{finding}");
    }
    (record, findings)
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub matches: Vec<MatchedAppraisal>,
    pub unmatched: Vec<SecondaryRecord>,
}

/// Match each appraisal to the first listing whose address agrees and add
/// its values onto that listing's stored totals in `sink`.
pub fn reconcile_into<S, I>(
    listings: &Listings,
    sink: &mut S,
    appraisals: I,
    matcher: &AddressMatcher,
) -> ReconcileOutcome
where
    S: TotalsSink + ?Sized,
    I: IntoIterator<Item = SecondaryRecord>,
{
    let mut outcome = ReconcileOutcome::default();

    for record in appraisals {
        let result = matcher.find_target(&record.address, listings);
        let (Some(slot), Some(verdict)) = (result.target_slot, result.verdict) else {
            warn!("{}: no listing matches '{}'", record.source, record.address);
            outcome.unmatched.push(record);
            continue;
        };
        let Some(listing) = listings.get(slot) else {
            outcome.unmatched.push(record);
            continue;
        };

        let contributed = accumulate(sink, slot, &record);
        info!(
            "{}: '{}' -> slot {slot} '{}' (score {:.1}{})",
            record.source,
            record.address,
            listing.address(),
            verdict.score,
            if verdict.civic_overlap { ", civic overlap" } else { "" }
        );

        outcome.matches.push(MatchedAppraisal {
            source: record.source,
            address: record.address,
            target_slot: slot,
            identifier: listing.identifier().clone(),
            listing_address: listing.address().clone(),
            score: verdict.score,
            civic_overlap: verdict.civic_overlap,
            contributed,
        });
    }

    outcome
}

/// [`reconcile_into`] with the listings themselves holding the totals.
///
/// Matching runs against a snapshot of the totals; the sums are written
/// back onto the listings once every appraisal has been placed.
pub fn reconcile<I>(
    listings: &mut Listings,
    appraisals: I,
    matcher: &AddressMatcher,
) -> ReconcileOutcome
where
    I: IntoIterator<Item = SecondaryRecord>,
{
    let mut totals: BTreeMap<Slot, Totals> =
        listings.iter().map(|r| (r.slot(), *r.totals())).collect();
    let outcome = reconcile_into(listings, &mut totals, appraisals, matcher);
    for (slot, sums) in totals {
        for field in TotalField::ALL {
            listings.write(slot, field, sums.get(field));
        }
    }
    outcome
}
