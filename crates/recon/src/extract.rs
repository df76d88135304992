//! Field extraction from listing sections and appraisal documents.
//!
//! Rules are data: a label to look for on a line, a pattern whose first
//! capture is the value, and the conversion applied to that value.

use std::collections::BTreeSet;

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::evidence::Finding;
use crate::model::{SecondaryRecord, TextField, TotalField};

/// Metres to feet, as used for the square-metre conversion.
pub const FEET_PER_METER: f64 = 3.2808;

fn compile(name: &str, pattern: &str, min_groups: usize) -> Result<Regex, ReconError> {
    let re = Regex::new(pattern).map_err(|e| ReconError::InvalidPattern {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    if re.captures_len() < min_groups + 1 {
        return Err(ReconError::InvalidPattern {
            name: name.to_string(),
            message: format!("expected at least {min_groups} capture group(s)"),
        });
    }
    Ok(re)
}

/// First capture group if the pattern has one, otherwise the whole match.
fn capture<'t>(re: &Regex, line: &'t str) -> Option<&'t str> {
    let caps = re.captures(line)?;
    caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Square metres (as printed on a roll) to square feet, rounded to cents.
///
/// Spaces are thousands separators and a comma is the decimal mark. Empty
/// or unparsable input is `None`, never zero.
pub fn square_meters_to_feet(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .replace(' ', "")
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let square_meters: f64 = cleaned.parse().ok()?;
    Some(round2(square_meters * FEET_PER_METER * FEET_PER_METER))
}

/// Keep only digits and dots, then parse. `"1 234 500 $"` → 1234500.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Identity fields located in one listing section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingFields {
    pub identifier: TextField,
    pub address: TextField,
    pub price: TextField,
}

#[derive(Debug, Clone)]
pub struct ListingRules {
    currency_marker: String,
    price: Regex,
    identifier: Regex,
}

impl ListingRules {
    pub fn new(
        currency_marker: &str,
        price_pattern: &str,
        identifier_pattern: &str,
    ) -> Result<Self, ReconError> {
        if currency_marker.is_empty() {
            return Err(ReconError::ConfigValidation(
                "listing.currency_marker must not be empty".into(),
            ));
        }
        Ok(Self {
            currency_marker: currency_marker.to_string(),
            price: compile("listing.price_pattern", price_pattern, 0)?,
            identifier: compile("listing.identifier_pattern", identifier_pattern, 1)?,
        })
    }

    /// Locate address, price and identifier in a section's text.
    ///
    /// - address: the line after the first line carrying the currency
    ///   marker (the price banner is followed by the civic address);
    /// - price: the first currency-formatted token;
    /// - identifier: the number following the listing-id label.
    pub fn extract(&self, text: &str) -> ListingFields {
        let lines: Vec<&str> = text.lines().collect();

        let address = lines
            .iter()
            .enumerate()
            .find(|(i, line)| line.contains(self.currency_marker.as_str()) && i + 1 < lines.len())
            .map(|(i, _)| lines[i + 1].trim())
            .filter(|addr| !addr.is_empty())
            .map(str::to_string);

        let price = lines
            .iter()
            .find_map(|line| self.price.find(line))
            .map(|m| m.as_str().trim().to_string());

        let identifier = lines
            .iter()
            .find_map(|line| capture(&self.identifier, line))
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        ListingFields {
            identifier: TextField::from_option(identifier),
            address: TextField::from_option(address),
            price: TextField::from_option(price),
        }
    }
}

// ---------------------------------------------------------------------------
// Appraisals
// ---------------------------------------------------------------------------

/// Which appraisal value a rule fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppraisalField {
    Address,
    FloorArea,
    BuildingArea,
    AssessedValue,
}

impl AppraisalField {
    pub fn name(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::FloorArea => "floor_area",
            Self::BuildingArea => "building_area",
            Self::AssessedValue => "assessed_value",
        }
    }

    pub fn total_field(self) -> Option<TotalField> {
        match self {
            Self::Address => None,
            Self::FloorArea => Some(TotalField::FloorArea),
            Self::BuildingArea => Some(TotalField::BuildingArea),
            Self::AssessedValue => Some(TotalField::AssessedValue),
        }
    }

    pub fn default_conversion(self) -> Conversion {
        match self {
            Self::Address => Conversion::Text,
            Self::FloorArea | Self::BuildingArea => Conversion::SquareMeters,
            Self::AssessedValue => Conversion::Currency,
        }
    }
}

/// Post-processing applied to a captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    Text,
    SquareMeters,
    Currency,
}

impl Conversion {
    fn to_number(self, raw: &str) -> Option<f64> {
        match self {
            Self::Text => raw.trim().parse().ok(),
            Self::SquareMeters => square_meters_to_feet(raw),
            Self::Currency => parse_currency(raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub label: String,
    pub pattern: Regex,
    pub field: AppraisalField,
    pub convert: Conversion,
}

impl FieldRule {
    pub fn new(
        label: &str,
        pattern: &str,
        field: AppraisalField,
        convert: Conversion,
    ) -> Result<Self, ReconError> {
        Ok(Self {
            label: label.to_string(),
            pattern: compile(&format!("appraisal.fields[{label}]"), pattern, 0)?,
            field,
            convert,
        })
    }

    /// The trimmed value on `line`, if the line carries this rule's label
    /// and the pattern matches.
    fn capture<'t>(&self, line: &'t str) -> Option<&'t str> {
        if !line.contains(self.label.as_str()) {
            return None;
        }
        capture(&self.pattern, line)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct AppraisalRules {
    rules: Vec<FieldRule>,
}

impl AppraisalRules {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Scan every line of one appraisal document.
    ///
    /// The first captured value of each field wins; later lines carrying
    /// the same label are ignored. A field whose captured number cannot be
    /// parsed stays absent and is reported.
    pub fn extract(&self, source: &str, text: &str) -> (SecondaryRecord, Vec<Finding>) {
        let mut record = SecondaryRecord::new(source, TextField::NotFound);
        let mut findings = Vec::new();
        let mut filled: BTreeSet<AppraisalField> = BTreeSet::new();

        for line in text.lines() {
            for rule in &self.rules {
                if filled.contains(&rule.field) {
                    continue;
                }
                let Some(raw) = rule.capture(line) else {
                    continue;
                };
                filled.insert(rule.field);
                debug!("{source}: {} = {raw:?}", rule.field.name());

                match rule.field.total_field() {
                    None => record.address = TextField::Found(raw.to_string()),
                    Some(total) => {
                        let value = rule.convert.to_number(raw);
                        if value.is_none() {
                            warn!("{source}: cannot read {} from {raw:?}", rule.field.name());
                            findings.push(Finding::UnparsableNumber {
                                source: source.to_string(),
                                field: rule.field.name().to_string(),
                                raw: raw.to_string(),
                            });
                        }
                        record.set_value(total, value);
                    }
                }
            }
        }

        let wanted: BTreeSet<AppraisalField> = self.rules.iter().map(|r| r.field).collect();
        for field in wanted.difference(&filled) {
            findings.push(Finding::FieldNotFound {
                source: source.to_string(),
                section: None,
                field: field.name().to_string(),
            });
        }

        (record, findings)
    }
}
