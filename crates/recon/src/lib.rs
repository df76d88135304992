//! `comparables-recon`: listing/appraisal reconciliation engine.
//!
//! Pure engine crate: receives per-page document text, returns listings
//! with accumulated appraisal totals. No CLI or file IO.
//!
//! Pipeline: [`segment`] splits listing documents into sections,
//! [`extract`] reads fields out of sections and appraisal rolls,
//! [`matcher`] pairs each appraisal with a listing by address, and
//! [`aggregate`] sums the appraisal values onto the listing's slot.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod segment;
pub mod similarity;

pub use aggregate::TotalsSink;
pub use config::ReconConfig;
pub use engine::run;
pub use error::ReconError;
pub use evidence::Finding;
pub use model::{
    Listings, PrimaryRecord, ReconInput, ReconResult, SecondaryRecord, Slot, SourceDocument,
    TextField, TotalField, Totals,
};
