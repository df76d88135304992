use std::collections::BTreeMap;

use log::warn;

use crate::model::{Listings, SecondaryRecord, Slot, TotalField, Totals};

/// Storage for per-slot totals. Whatever persists the results (a sheet, a
/// CSV, a database) only has to offer these two operations.
pub trait TotalsSink {
    /// Current value, or zero when nothing is stored for the slot.
    fn read(&self, slot: Slot, field: TotalField) -> f64;
    fn write(&mut self, slot: Slot, field: TotalField, value: f64);
}

impl TotalsSink for Listings {
    fn read(&self, slot: Slot, field: TotalField) -> f64 {
        self.get(slot).map_or(0.0, |r| r.totals.get(field))
    }

    fn write(&mut self, slot: Slot, field: TotalField, value: f64) {
        match self.get_mut(slot) {
            Some(record) => record.totals.set(field, value),
            None => warn!("no listing at slot {slot}; dropping {field} = {value}"),
        }
    }
}

impl TotalsSink for BTreeMap<Slot, Totals> {
    fn read(&self, slot: Slot, field: TotalField) -> f64 {
        self.get(&slot).map_or(0.0, |t| t.get(field))
    }

    fn write(&mut self, slot: Slot, field: TotalField, value: f64) {
        self.entry(slot).or_default().set(field, value);
    }
}

/// Add one appraisal's present values onto the slot's stored totals.
///
/// Reads the current total and writes back the sum; absent values leave the
/// total untouched. Returns what was added.
pub fn accumulate<S: TotalsSink + ?Sized>(
    sink: &mut S,
    slot: Slot,
    record: &SecondaryRecord,
) -> Vec<(TotalField, f64)> {
    let mut contributed = Vec::new();
    for field in [
        TotalField::BuildingArea,
        TotalField::AssessedValue,
        TotalField::FloorArea,
    ] {
        if let Some(value) = record.value(field) {
            let current = sink.read(slot, field);
            sink.write(slot, field, current + value);
            contributed.push((field, value));
        }
    }
    contributed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextField;

    fn appraisal(assessed: Option<f64>, floor: Option<f64>) -> SecondaryRecord {
        let mut rec = SecondaryRecord::new("roll.pdf", TextField::Found("1 rue A".into()));
        rec.assessed_value = assessed;
        rec.floor_area = floor;
        rec
    }

    #[test]
    fn contributions_add_up_in_any_order() {
        let a = appraisal(Some(100_000.0), None);
        let b = appraisal(Some(50_000.0), None);

        let mut forward: BTreeMap<Slot, Totals> = BTreeMap::new();
        accumulate(&mut forward, Slot(0), &a);
        accumulate(&mut forward, Slot(0), &b);

        let mut backward: BTreeMap<Slot, Totals> = BTreeMap::new();
        accumulate(&mut backward, Slot(0), &b);
        accumulate(&mut backward, Slot(0), &a);

        assert_eq!(forward.read(Slot(0), TotalField::AssessedValue), 150_000.0);
        assert_eq!(backward.read(Slot(0), TotalField::AssessedValue), 150_000.0);
    }

    #[test]
    fn absent_values_leave_totals_alone() {
        let mut sink: BTreeMap<Slot, Totals> = BTreeMap::new();
        sink.write(Slot(3), TotalField::FloorArea, 500.0);
        let added = accumulate(&mut sink, Slot(3), &appraisal(None, None));
        assert!(added.is_empty());
        assert_eq!(sink.read(Slot(3), TotalField::FloorArea), 500.0);
    }

    #[test]
    fn prior_values_are_kept() {
        let mut sink: BTreeMap<Slot, Totals> = BTreeMap::new();
        sink.write(Slot(1), TotalField::FloorArea, 1000.0);
        let added = accumulate(&mut sink, Slot(1), &appraisal(Some(10.0), Some(250.5)));
        assert_eq!(sink.read(Slot(1), TotalField::FloorArea), 1250.5);
        assert_eq!(
            added,
            vec![(TotalField::AssessedValue, 10.0), (TotalField::FloorArea, 250.5)]
        );
    }

    #[test]
    fn unknown_slot_reads_zero() {
        let sink: BTreeMap<Slot, Totals> = BTreeMap::new();
        assert_eq!(sink.read(Slot(9), TotalField::BuildingArea), 0.0);
        assert_eq!(Listings::new().read(Slot(9), TotalField::BuildingArea), 0.0);
    }

    /// Records every call so the read-then-write order can be checked.
    #[derive(Default)]
    struct Journal {
        stored: BTreeMap<Slot, Totals>,
        calls: Vec<String>,
    }

    impl TotalsSink for Journal {
        fn read(&self, slot: Slot, field: TotalField) -> f64 {
            self.stored.read(slot, field)
        }

        fn write(&mut self, slot: Slot, field: TotalField, value: f64) {
            self.calls.push(format!("{slot} {field} {value}"));
            self.stored.write(slot, field, value);
        }
    }

    #[test]
    fn writes_the_sum_never_the_bare_value() {
        let mut journal = Journal::default();
        journal.stored.write(Slot(0), TotalField::AssessedValue, 7.0);
        accumulate(&mut journal, Slot(0), &appraisal(Some(3.0), None));
        assert_eq!(journal.calls, vec!["#0 assessed_value 10"]);
    }
}
