use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::ReconError;
use crate::extract::{AppraisalField, AppraisalRules, Conversion, FieldRule, ListingRules};
use crate::matcher::{AddressMatcher, DEFAULT_THRESHOLD};
use crate::segment::PageMarkers;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration. Every section has defaults matching Centris listing
/// sheets and Québec municipal rolls, so an empty file is a valid config.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub appraisal: AppraisalConfig,
    #[serde(default)]
    pub sheet: SheetLayout,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            matching: MatchingConfig::default(),
            listing: ListingConfig::default(),
            appraisal: AppraisalConfig::default(),
            sheet: SheetLayout::default(),
        }
    }
}

fn default_name() -> String {
    "Comparables".into()
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Minimum token-set score (0–100) for two addresses to match.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

// ---------------------------------------------------------------------------
// Listing sheets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Page stamp with two captures: page number, page count.
    #[serde(default = "default_page_marker")]
    pub page_marker: String,
    /// The line after the first line containing this is the address.
    #[serde(default = "default_currency_marker")]
    pub currency_marker: String,
    #[serde(default = "default_price_pattern")]
    pub price_pattern: String,
    /// Capture 1 is the listing identifier.
    #[serde(default = "default_identifier_pattern")]
    pub identifier_pattern: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_marker: default_page_marker(),
            currency_marker: default_currency_marker(),
            price_pattern: default_price_pattern(),
            identifier_pattern: default_identifier_pattern(),
        }
    }
}

fn default_page_marker() -> String {
    r"Page\s+(\d+)\s+de\s+(\d+)".into()
}

fn default_currency_marker() -> String {
    "$".into()
}

fn default_price_pattern() -> String {
    r"\d[\d\s,.]*\s*\$".into()
}

fn default_identifier_pattern() -> String {
    r"(?i)No Centris\s*[:\s]*(\d+)\s*\(".into()
}

// ---------------------------------------------------------------------------
// Appraisal rolls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppraisalConfig {
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldRuleConfig>,
}

impl Default for AppraisalConfig {
    fn default() -> Self {
        Self {
            fields: default_fields(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldRuleConfig {
    /// Substring a line must contain before the pattern is tried.
    pub label: String,
    /// Capture 1 (or the whole match) is the value.
    pub pattern: String,
    pub field: AppraisalField,
    /// Defaults to the field's natural conversion.
    #[serde(default)]
    pub convert: Option<Conversion>,
}

impl FieldRuleConfig {
    fn new(label: &str, pattern: &str, field: AppraisalField) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
            field,
            convert: None,
        }
    }
}

fn default_fields() -> Vec<FieldRuleConfig> {
    vec![
        FieldRuleConfig::new("Adresse", r"Adresse\s*:\s*(.*)", AppraisalField::Address),
        FieldRuleConfig::new(
            "Aire d'étages",
            r"Aire d'étages\s*:\s*([\d\s.,$]+)",
            AppraisalField::FloorArea,
        ),
        FieldRuleConfig::new(
            "Superficie",
            r"Superficie\s*:\s*([\d\s.,$]+)",
            AppraisalField::BuildingArea,
        ),
        FieldRuleConfig::new(
            "Valeur de l'immeuble",
            r"Valeur de l'immeuble\s*:\s*([\d\s.,$]+)",
            AppraisalField::AssessedValue,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Sheet layout
// ---------------------------------------------------------------------------

/// Where results land in the comparables workbook. Listing slot `n` is
/// written on row `first_row + n` (1-based, as shown in a spreadsheet).
#[derive(Debug, Clone, Deserialize)]
pub struct SheetLayout {
    #[serde(default = "default_sheet_name")]
    pub name: String,
    #[serde(default = "default_first_row")]
    pub first_row: u32,
    #[serde(default = "default_identifier_column")]
    pub identifier: String,
    #[serde(default = "default_address_column")]
    pub address: String,
    #[serde(default = "default_price_column")]
    pub price: String,
    #[serde(default = "default_floor_area_column")]
    pub floor_area: String,
    #[serde(default = "default_building_area_column")]
    pub building_area: String,
    #[serde(default = "default_assessed_value_column")]
    pub assessed_value: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            name: default_sheet_name(),
            first_row: default_first_row(),
            identifier: default_identifier_column(),
            address: default_address_column(),
            price: default_price_column(),
            floor_area: default_floor_area_column(),
            building_area: default_building_area_column(),
            assessed_value: default_assessed_value_column(),
        }
    }
}

fn default_sheet_name() -> String {
    "Feuil1".into()
}
fn default_first_row() -> u32 {
    11
}
fn default_identifier_column() -> String {
    "N".into()
}
fn default_address_column() -> String {
    "O".into()
}
fn default_price_column() -> String {
    "P".into()
}
fn default_floor_area_column() -> String {
    "Q".into()
}
fn default_building_area_column() -> String {
    "R".into()
}
fn default_assessed_value_column() -> String {
    "T".into()
}

/// Rows in an xlsx worksheet.
pub const MAX_SHEET_ROWS: u32 = 1_048_576;

/// Resolved 0-based column indices of a [`SheetLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetColumns {
    pub identifier: u16,
    pub address: u16,
    pub price: u16,
    pub floor_area: u16,
    pub building_area: u16,
    pub assessed_value: u16,
}

/// Convert a column letter to a 0-based index (A = 0, Z = 25, AA = 26).
pub fn column_index(letters: &str) -> Option<u16> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    // XFD is the last Excel column.
    if index > 16_384 {
        return None;
    }
    u16::try_from(index - 1).ok()
}

impl SheetLayout {
    pub fn columns(&self) -> Result<SheetColumns, ReconError> {
        let resolve = |key: &str, letters: &str| {
            column_index(letters).ok_or_else(|| {
                ReconError::ConfigValidation(format!("sheet.{key}: invalid column '{letters}'"))
            })
        };
        Ok(SheetColumns {
            identifier: resolve("identifier", &self.identifier)?,
            address: resolve("address", &self.address)?,
            price: resolve("price", &self.price)?,
            floor_area: resolve("floor_area", &self.floor_area)?,
            building_area: resolve("building_area", &self.building_area)?,
            assessed_value: resolve("assessed_value", &self.assessed_value)?,
        })
    }

    /// 0-based worksheet row for a listing slot.
    ///
    /// Fails when the slot would land past the last worksheet row.
    pub fn row_for(&self, slot: crate::model::Slot) -> Result<u32, ReconError> {
        self.first_row
            .checked_sub(1)
            .and_then(|base| base.checked_add(slot.index()))
            .filter(|row| *row < MAX_SHEET_ROWS)
            .ok_or_else(|| {
                ReconError::ConfigValidation(format!(
                    "slot {slot} does not fit on sheet '{}' starting at row {}",
                    self.name, self.first_row
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Compiled rules
// ---------------------------------------------------------------------------

/// Everything the engine needs, with patterns compiled.
#[derive(Debug, Clone)]
pub struct Rules {
    pub markers: PageMarkers,
    pub listing: ListingRules,
    pub appraisal: AppraisalRules,
    pub matcher: AddressMatcher,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.matching.threshold > 100 {
            return Err(ReconError::ConfigValidation(format!(
                "matching.threshold must be between 0 and 100, got {}",
                self.matching.threshold
            )));
        }

        if self.appraisal.fields.is_empty() {
            return Err(ReconError::ConfigValidation(
                "appraisal.fields must list at least one rule".into(),
            ));
        }

        let mut labels = BTreeSet::new();
        for rule in &self.appraisal.fields {
            if rule.label.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "appraisal.fields: label must not be empty".into(),
                ));
            }
            if !labels.insert(rule.label.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "appraisal.fields: duplicate label '{}'",
                    rule.label
                )));
            }
        }

        if self.sheet.first_row == 0 {
            return Err(ReconError::ConfigValidation(
                "sheet.first_row is 1-based and must be at least 1".into(),
            ));
        }
        if self.sheet.first_row > MAX_SHEET_ROWS {
            return Err(ReconError::ConfigValidation(format!(
                "sheet.first_row must be at most {MAX_SHEET_ROWS}, got {}",
                self.sheet.first_row
            )));
        }
        self.sheet.columns()?;

        self.compile().map(|_| ())
    }

    /// Compile every pattern into ready-to-run rules.
    pub fn compile(&self) -> Result<Rules, ReconError> {
        let markers = PageMarkers::new(&self.listing.page_marker)?;
        let listing = ListingRules::new(
            &self.listing.currency_marker,
            &self.listing.price_pattern,
            &self.listing.identifier_pattern,
        )?;
        let appraisal = AppraisalRules::new(
            self.appraisal
                .fields
                .iter()
                .map(|f| {
                    FieldRule::new(
                        &f.label,
                        &f.pattern,
                        f.field,
                        f.convert.unwrap_or_else(|| f.field.default_conversion()),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?,
        );

        Ok(Rules {
            markers,
            listing,
            appraisal,
            matcher: AddressMatcher::new(self.matching.threshold),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Slot;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config.name, "Comparables");
        assert_eq!(config.matching.threshold, 80);
        assert_eq!(config.appraisal.fields.len(), 4);
        assert_eq!(config.sheet.first_row, 11);
        assert_eq!(config.sheet.name, "Feuil1");
    }

    #[test]
    fn parse_overrides() {
        let input = r#"
name = "Plateau duplexes"

[matching]
threshold = 90

[listing]
page_marker = 'Page\s+(\d+)\s+of\s+(\d+)'
identifier_pattern = 'MLS#\s*(\d+)'

[[appraisal.fields]]
label = "Address"
pattern = 'Address\s*:\s*(.*)'
field = "address"

[[appraisal.fields]]
label = "Assessment"
pattern = 'Assessment\s*:\s*(.+)'
field = "assessed_value"

[[appraisal.fields]]
label = "Living area (sq ft)"
pattern = 'Living area \(sq ft\)\s*:\s*([\d,.]+)'
field = "floor_area"
convert = "currency"

[sheet]
first_row = 2
address = "B"
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.name, "Plateau duplexes");
        assert_eq!(config.matching.threshold, 90);
        assert_eq!(config.listing.currency_marker, "$");
        assert_eq!(config.appraisal.fields.len(), 3);
        assert_eq!(config.appraisal.fields[2].convert, Some(Conversion::Currency));

        let rules = config.compile().unwrap();
        assert_eq!(rules.matcher.threshold(), 90);
        assert_eq!(rules.appraisal.rules()[1].convert, Conversion::Currency);
        assert_eq!(config.sheet.columns().unwrap().address, 1);
        assert_eq!(config.sheet.row_for(Slot(0)).unwrap(), 1);
    }

    #[test]
    fn reject_first_row_past_sheet_end() {
        let err = ReconConfig::from_toml("[sheet]\nfirst_row = 1048577").unwrap_err();
        assert!(err.to_string().contains("at most 1048576"), "{err}");
        assert!(ReconConfig::from_toml("[sheet]\nfirst_row = 1048576").is_ok());
    }

    #[test]
    fn row_past_sheet_end_is_an_error() {
        let mut layout = SheetLayout::default();
        layout.first_row = MAX_SHEET_ROWS;
        assert_eq!(layout.row_for(Slot(0)).unwrap(), MAX_SHEET_ROWS - 1);
        assert!(layout.row_for(Slot(1)).is_err());
        assert!(layout.row_for(Slot(u32::MAX)).is_err());
        assert_eq!(SheetLayout::default().row_for(Slot(2)).unwrap(), 12);
    }

    #[test]
    fn reject_threshold_over_100() {
        let err = ReconConfig::from_toml("[matching]\nthreshold = 101").unwrap_err();
        assert!(err.to_string().contains("between 0 and 100"));
    }

    #[test]
    fn reject_threshold_out_of_u8() {
        let err = ReconConfig::from_toml("[matching]\nthreshold = 300").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn reject_duplicate_label() {
        let input = r#"
[[appraisal.fields]]
label = "Adresse"
pattern = 'Adresse\s*:\s*(.*)'
field = "address"

[[appraisal.fields]]
label = "Adresse"
pattern = 'Adresse\s*-\s*(.*)'
field = "address"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("duplicate label 'Adresse'"));
    }

    #[test]
    fn reject_unknown_field() {
        let input = r#"
[[appraisal.fields]]
label = "Taxes"
pattern = 'Taxes\s*:\s*(.*)'
field = "taxes"
"#;
        assert!(matches!(
            ReconConfig::from_toml(input).unwrap_err(),
            ReconError::ConfigParse(_)
        ));
    }

    #[test]
    fn reject_bad_patterns() {
        let err = ReconConfig::from_toml("[listing]\npage_marker = 'Page (\\d+)'").unwrap_err();
        assert!(matches!(err, ReconError::InvalidPattern { .. }));

        let err = ReconConfig::from_toml("[listing]\nidentifier_pattern = 'No Centris'").unwrap_err();
        assert!(err.to_string().contains("listing.identifier_pattern"));

        let err = ReconConfig::from_toml("[listing]\nprice_pattern = '(['").unwrap_err();
        assert!(matches!(err, ReconError::InvalidPattern { .. }));
    }

    #[test]
    fn reject_bad_sheet_layout() {
        assert!(ReconConfig::from_toml("[sheet]\nfirst_row = 0").is_err());
        let err = ReconConfig::from_toml("[sheet]\nprice = \"P1\"").unwrap_err();
        assert!(err.to_string().contains("sheet.price"));
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("o"), Some(14));
        assert_eq!(column_index("T"), Some(19));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("XFD"), Some(16_383));
        assert_eq!(column_index("XFE"), None);
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }
}
