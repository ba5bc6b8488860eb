//! Joins between the sales sheet and its reference sheets.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument};

use crate::model::{AgingEntry, AgingKey, ItemCode, Record};

/// Item codes that have a credit note. Duplicates collapse on insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditNoteSet {
    codes: HashSet<ItemCode>,
}

impl CreditNoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: ItemCode) {
        if !code.is_empty() {
            self.codes.insert(code);
        }
    }

    pub fn contains(&self, code: &ItemCode) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl FromIterator<ItemCode> for CreditNoteSet {
    fn from_iter<I: IntoIterator<Item = ItemCode>>(iter: I) -> Self {
        let mut set = Self::new();
        for code in iter {
            set.insert(code);
        }
        set
    }
}

/// Sets the credit-note flag on every record whose code is in `credit_notes`.
/// Returns the number of flagged records.
#[instrument(level = "debug", skip_all, fields(records = records.len(), codes = credit_notes.len()))]
pub fn flag_credit_notes(records: &mut [Record], credit_notes: &CreditNoteSet) -> usize {
    let mut flagged = 0;
    for record in records.iter_mut() {
        record.has_credit_note = credit_notes.contains(&record.code);
        if record.has_credit_note {
            flagged += 1;
        }
    }
    debug!(flagged, "credit notes matched");
    flagged
}

/// Negative-margin records whose code has no credit note.
#[instrument(level = "info", skip_all, fields(records = records.len(), codes = credit_notes.len()))]
pub fn unmatched_negative_margin(records: &[Record], credit_notes: &CreditNoteSet) -> Vec<Record> {
    let unmatched: Vec<Record> = records
        .iter()
        .filter(|record| record.margin_pct() < 0.0 && !credit_notes.contains(&record.code))
        .cloned()
        .map(|mut record| {
            record.has_credit_note = false;
            record
        })
        .collect();
    info!(unmatched = unmatched.len(), "negative margin items without credit notes");
    unmatched
}

/// Outcome of an aging merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub matched: usize,
    pub unmatched: usize,
}

/// Attaches stock and average monthly sales from `entries` to each record with
/// the same (name, category, barcode) key. Later entries for the same key
/// replace earlier ones.
#[instrument(level = "info", skip_all, fields(records = records.len(), entries = entries.len()))]
pub fn merge_aging(records: &mut [Record], entries: &[AgingEntry]) -> MergeSummary {
    let by_key: HashMap<AgingKey, &AgingEntry> =
        entries.iter().map(|entry| (entry.key(), entry)).collect();

    let mut summary = MergeSummary::default();
    for record in records.iter_mut() {
        match by_key.get(&record.aging_key()) {
            Some(entry) => {
                record.stock = entry.stock;
                record.avg_monthly_sales = Some(entry.avg_monthly_sales);
                summary.matched += 1;
            }
            None => {
                record.avg_monthly_sales = None;
                summary.unmatched += 1;
            }
        }
    }
    info!(matched = summary.matched, unmatched = summary.unmatched, "aging merged");
    summary
}

/// Builds records straight from aging entries, for runs where the aging sheet
/// is the only input.
pub fn records_from_aging(entries: &[AgingEntry]) -> Vec<Record> {
    entries
        .iter()
        .map(|entry| Record {
            category: entry.category.clone(),
            stock: entry.stock,
            avg_monthly_sales: Some(entry.avg_monthly_sales),
            ..Record::new(entry.barcode.clone(), entry.name.clone())
        })
        .collect()
}
