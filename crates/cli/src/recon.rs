//! `comps run`, `comps listings`, `comps appraisal`: the pipeline and its
//! two extraction halves.

use std::path::{Path, PathBuf};

use comparables_recon::engine::{extract_secondary, ListingCollector};
use comparables_recon::{ReconConfig, ReconInput};
use log::info;

use crate::exit_codes::{recon_exit_code, EXIT_UNMATCHED};
use crate::export::{load_prior, write_result};
use crate::text::load_documents;
use crate::CliError;

fn recon_err(err: comparables_recon::ReconError) -> CliError {
    CliError { code: recon_exit_code(&err), message: err.to_string(), hint: None }
}

/// Built-in defaults unless a TOML file is given.
pub fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    ReconConfig::from_toml(&config_str)
        .map_err(|e| recon_err(e).with_hint(format!("in {}", path.display())))
}

pub struct RunArgs {
    pub listings: Vec<PathBuf>,
    pub appraisals: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub prior: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub json: bool,
    pub strict: bool,
    pub quiet: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    let input = ReconInput {
        listings: load_documents(&args.listings)?,
        appraisals: load_documents(&args.appraisals)?,
        prior: match &args.prior {
            Some(path) => load_prior(path)?,
            None => Default::default(),
        },
    };
    info!(
        "{} listing document(s), {} appraisal document(s), {} prior slot(s)",
        input.listings.len(),
        input.appraisals.len(),
        input.prior.len()
    );

    let result = comparables_recon::run(&config, &input).map_err(recon_err)?;

    if let Some(ref path) = args.out {
        write_result(&result, &config.sheet, path)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }

    if args.json {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    if !args.quiet {
        let s = &result.summary;
        eprintln!(
            "{} listings from {} document(s) ({} duplicate(s) skipped); {} appraisal(s): {} matched, {} unmatched",
            s.listings, s.listing_documents, s.duplicates, s.appraisals, s.matched, s.unmatched,
        );
        for m in &result.matches {
            eprintln!(
                "  {} -> {} {} (score {:.1}{})",
                m.address,
                m.target_slot,
                m.listing_address,
                m.score,
                if m.civic_overlap { ", civic overlap" } else { "" }
            );
        }
        for u in &result.unmatched {
            eprintln!("  {} ({}): no matching listing", u.address, u.source);
        }
    }

    if args.strict && result.summary.unmatched > 0 {
        return Err(CliError {
            code: EXIT_UNMATCHED,
            message: format!("{} appraisal(s) matched no listing", result.summary.unmatched),
            hint: Some("lower [matching] threshold or check the listing addresses".to_string()),
        });
    }

    Ok(())
}

pub fn cmd_listings(files: Vec<PathBuf>, config: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let rules = config.compile().map_err(recon_err)?;

    let mut collector = ListingCollector::new(&rules.markers, &rules.listing);
    for doc in load_documents(&files)? {
        collector.add_document(&doc.name, &doc.pages);
    }
    let collected = collector.finish();

    let out = serde_json::json!({
        "documents": collected.documents,
        "sections": collected.sections,
        "listings": collected.listings,
        "duplicates": collected.duplicates,
        "findings": collected.findings,
    });
    print_json(&out)
}

pub fn cmd_appraisal(files: Vec<PathBuf>, config: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let rules = config.compile().map_err(recon_err)?;

    let mut records = Vec::new();
    let mut findings = Vec::new();
    for doc in load_documents(&files)? {
        let (record, doc_findings) = extract_secondary(&doc.name, &doc.pages, &rules.appraisal);
        records.push(record);
        findings.extend(doc_findings);
    }

    print_json(&serde_json::json!({
        "appraisals": records,
        "findings": findings,
    }))
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    println!("{json_str}");
    Ok(())
}
