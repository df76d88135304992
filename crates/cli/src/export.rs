//! Result persistence (`--out`) and prior totals (`--prior`).
//!
//! - `.xlsx`: the comparables sheet, one row per listing slot at the
//!   configured columns, plus an `Appraisals` sheet with every match.
//! - `.csv`: one row per listing. Readable back through `--prior`.
//! - `.json`: the full `ReconResult`.

use std::collections::BTreeMap;
use std::path::Path;

use comparables_recon::config::SheetLayout;
use comparables_recon::{ReconResult, Slot, TotalField, Totals};
use rust_xlsxwriter::{Format, Workbook};
use serde::Deserialize;

use crate::exit_codes::recon_exit_code;
use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xlsx") => Ok(Self::Xlsx),
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(CliError::args(format!(
                "cannot infer output format from {}",
                path.display()
            ))
            .with_hint("use a .xlsx, .csv or .json extension")),
        }
    }
}

pub fn write_result(result: &ReconResult, layout: &SheetLayout, path: &Path) -> Result<(), CliError> {
    match OutputFormat::from_path(path)? {
        OutputFormat::Xlsx => write_xlsx(result, layout, path),
        OutputFormat::Csv => write_csv(result, path),
        OutputFormat::Json => write_json(result, path),
    }
}

// ── XLSX ────────────────────────────────────────────────────────────

fn write_xlsx(result: &ReconResult, layout: &SheetLayout, path: &Path) -> Result<(), CliError> {
    let cols = layout
        .columns()
        .map_err(|e| CliError { code: recon_exit_code(&e), message: e.to_string(), hint: None })?;
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| CliError::io(format!("cannot write XLSX: {e}"));

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet().set_name(&layout.name).map_err(xlsx_err)?;

    // Header on the row above the first listing, when there is one.
    if layout.first_row >= 2 {
        let header = layout.first_row - 2;
        for (col, title) in [
            (cols.identifier, "No Centris"),
            (cols.address, "Adresse"),
            (cols.price, "Prix"),
            (cols.floor_area, "Aire d'étages (pi²)"),
            (cols.building_area, "Superficie (pi²)"),
            (cols.assessed_value, "Valeur de l'immeuble"),
        ] {
            sheet.write_string_with_format(header, col, title, &bold).map_err(xlsx_err)?;
        }
    }

    for listing in &result.listings {
        let row = layout
            .row_for(listing.slot())
            .map_err(|e| CliError { code: recon_exit_code(&e), message: e.to_string(), hint: None })?;
        sheet.write_string(row, cols.identifier, listing.identifier().as_str()).map_err(xlsx_err)?;
        sheet.write_string(row, cols.address, listing.address().as_str()).map_err(xlsx_err)?;
        sheet.write_string(row, cols.price, listing.price().as_str()).map_err(xlsx_err)?;

        // Untouched totals stay blank, like a sheet nobody has filled in.
        let totals = listing.totals();
        for (field, col) in [
            (TotalField::FloorArea, cols.floor_area),
            (TotalField::BuildingArea, cols.building_area),
            (TotalField::AssessedValue, cols.assessed_value),
        ] {
            let value = totals.get(field);
            if value != 0.0 {
                sheet.write_number(row, col, value).map_err(xlsx_err)?;
            }
        }
    }

    let appraisals = workbook.add_worksheet().set_name("Appraisals").map_err(xlsx_err)?;
    for (col, title) in ["Source", "Adresse", "Slot", "Listing", "Score", "Civic overlap"]
        .into_iter()
        .enumerate()
    {
        appraisals.write_string_with_format(0, col as u16, title, &bold).map_err(xlsx_err)?;
    }
    let mut row = 1u32;
    for m in &result.matches {
        appraisals.write_string(row, 0, &m.source).map_err(xlsx_err)?;
        appraisals.write_string(row, 1, m.address.as_str()).map_err(xlsx_err)?;
        appraisals.write_number(row, 2, f64::from(m.target_slot.index())).map_err(xlsx_err)?;
        appraisals.write_string(row, 3, m.listing_address.as_str()).map_err(xlsx_err)?;
        appraisals.write_number(row, 4, m.score).map_err(xlsx_err)?;
        appraisals.write_boolean(row, 5, m.civic_overlap).map_err(xlsx_err)?;
        row += 1;
    }
    for u in &result.unmatched {
        appraisals.write_string(row, 0, &u.source).map_err(xlsx_err)?;
        appraisals.write_string(row, 1, u.address.as_str()).map_err(xlsx_err)?;
        row += 1;
    }

    workbook.save(path).map_err(xlsx_err)
}

// ── CSV ─────────────────────────────────────────────────────────────

const CSV_HEADER: [&str; 7] = [
    "slot",
    "identifier",
    "address",
    "price",
    "floor_area",
    "building_area",
    "assessed_value",
];

fn write_csv(result: &ReconResult, path: &Path) -> Result<(), CliError> {
    let csv_err = |e: csv::Error| CliError::io(format!("cannot write {}: {e}", path.display()));
    let mut wtr = csv::WriterBuilder::new().from_path(path).map_err(csv_err)?;

    wtr.write_record(CSV_HEADER).map_err(csv_err)?;
    for listing in &result.listings {
        let totals = listing.totals();
        wtr.write_record([
            listing.slot().index().to_string(),
            listing.identifier().as_str().to_string(),
            listing.address().as_str().to_string(),
            listing.price().as_str().to_string(),
            format_total(totals.floor_area),
            format_total(totals.building_area),
            format_total(totals.assessed_value),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))
}

fn format_total(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    rounded.to_string()
}

// ── JSON ────────────────────────────────────────────────────────────

fn write_json(result: &ReconResult, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))
}

// ── Prior totals ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PriorRow {
    slot: u32,
    #[serde(default)]
    floor_area: Option<f64>,
    #[serde(default)]
    building_area: Option<f64>,
    #[serde(default)]
    assessed_value: Option<f64>,
}

/// Read totals stored by an earlier run. Columns are matched by header
/// name; anything besides `slot` and the three totals is ignored, so a
/// CSV written by `--out` can be fed straight back.
pub fn load_prior(path: &Path) -> Result<BTreeMap<Slot, Totals>, CliError> {
    let data = std::fs::read(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    parse_prior(&data)
}

fn parse_prior(data: &[u8]) -> Result<BTreeMap<Slot, Totals>, CliError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut prior = BTreeMap::new();
    for (i, row) in rdr.deserialize::<PriorRow>().enumerate() {
        let row = row.map_err(|e| CliError::parse(format!("prior CSV row {}: {e}", i + 1)))?;
        let totals = Totals {
            floor_area: row.floor_area.unwrap_or(0.0),
            building_area: row.building_area.unwrap_or(0.0),
            assessed_value: row.assessed_value.unwrap_or(0.0),
        };
        if prior.insert(Slot(row.slot), totals).is_some() {
            return Err(CliError::parse(format!(
                "prior CSV row {}: slot {} listed twice",
                i + 1,
                row.slot
            )));
        }
    }
    Ok(prior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::{EXIT_PARSE, EXIT_USAGE};

    #[test]
    fn format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out.XLSX")).unwrap(), OutputFormat::Xlsx);
        assert_eq!(OutputFormat::from_path(Path::new("a/b.csv")).unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("r.json")).unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("r.txt")).unwrap_err().code, EXIT_USAGE);
    }

    #[test]
    fn prior_ignores_extra_columns() {
        let csv = "slot,identifier,address,price,floor_area,building_area,assessed_value\n\
                   0,10001,1 rue A,1 $,12.5,,300000\n\
                   2,10003,3 rue C,3 $,,,\n";
        let prior = parse_prior(csv.as_bytes()).unwrap();
        assert_eq!(prior.len(), 2);
        assert_eq!(prior[&Slot(0)].floor_area, 12.5);
        assert_eq!(prior[&Slot(0)].building_area, 0.0);
        assert_eq!(prior[&Slot(0)].assessed_value, 300_000.0);
        assert_eq!(prior[&Slot(2)], Totals::default());
    }

    #[test]
    fn prior_rejects_bad_numbers() {
        let err = parse_prior(b"slot,assessed_value\n0,lots\n").unwrap_err();
        assert_eq!(err.code, EXIT_PARSE);
    }

    #[test]
    fn prior_rejects_repeated_slot() {
        let err = parse_prior(b"slot,assessed_value\n1,5\n1,6\n").unwrap_err();
        assert!(err.message.contains("slot 1 listed twice"));
    }

    #[test]
    fn totals_rounded_to_cents() {
        assert_eq!(format_total(1937.46 + 1886.33), "3823.79");
        assert_eq!(format_total(0.0), "0");
    }
}
