//! User-selected predicates over a working copy of the records.
//!
//! All predicates are conjunctive, so the order they are applied in never
//! changes the result. An empty membership list places no restriction.

use serde::{Deserialize, Serialize};

use crate::aggregate::{CoverBucket, MarginBucket, safety_factor};
use crate::config::CoverThresholds;
use crate::model::Record;

/// One predicate over a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    OutletIn(Vec<String>),
    ItemIn(Vec<String>),
    CategoryIn(Vec<String>),
    CategoryNotIn(Vec<String>),
    Margin(MarginBucket),
    Cover(CoverBucket, CoverThresholds),
    /// Case-insensitive substring over item name and code. Stored lowercase.
    Search(String),
}

impl Predicate {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::OutletIn(outlets) => contains_label(outlets, &record.outlet),
            Predicate::ItemIn(items) => contains_label(items, &record.name),
            Predicate::CategoryIn(categories) => contains_label(categories, &record.category),
            Predicate::CategoryNotIn(categories) => !contains_label(categories, &record.category),
            Predicate::Margin(bucket) => MarginBucket::classify(record.margin_pct()) == *bucket,
            Predicate::Cover(bucket, thresholds) => record.avg_monthly_sales.is_some_and(|avg| {
                CoverBucket::classify(safety_factor(record.stock, avg), thresholds) == *bucket
            }),
            Predicate::Search(needle) => {
                record.name.to_lowercase().contains(needle.as_str())
                    || record.code.as_str().to_lowercase().contains(needle.as_str())
            }
        }
    }
}

fn contains_label(labels: &[String], value: &str) -> bool {
    let value = value.trim();
    labels.iter().any(|label| label.trim() == value)
}

/// The filter selections of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub outlets: Vec<String>,
    pub items: Vec<String>,
    pub categories: Vec<String>,
    pub exclude_categories: Vec<String>,
    pub margin: Option<MarginBucket>,
    pub cover: Option<CoverBucket>,
    pub search: Option<String>,
}

impl FilterSet {
    /// The search term, trimmed, when one was given.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn has_outlet_filter(&self) -> bool {
        !self.outlets.is_empty()
    }

    pub fn predicates(&self, thresholds: &CoverThresholds) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if !self.outlets.is_empty() {
            predicates.push(Predicate::OutletIn(self.outlets.clone()));
        }
        if !self.items.is_empty() {
            predicates.push(Predicate::ItemIn(self.items.clone()));
        }
        if !self.categories.is_empty() {
            predicates.push(Predicate::CategoryIn(self.categories.clone()));
        }
        if !self.exclude_categories.is_empty() {
            predicates.push(Predicate::CategoryNotIn(self.exclude_categories.clone()));
        }
        if let Some(bucket) = self.margin {
            predicates.push(Predicate::Margin(bucket));
        }
        if let Some(bucket) = self.cover {
            predicates.push(Predicate::Cover(bucket, *thresholds));
        }
        if let Some(term) = self.search_term() {
            predicates.push(Predicate::Search(term.to_lowercase()));
        }
        predicates
    }

    /// Returns the matching records as a fresh working copy; `records` is
    /// left untouched.
    pub fn apply(&self, records: &[Record], thresholds: &CoverThresholds) -> Vec<Record> {
        apply_predicates(&self.predicates(thresholds), records)
    }
}

pub fn apply_predicates(predicates: &[Predicate], records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .filter(|record| predicates.iter().all(|predicate| predicate.matches(record)))
        .cloned()
        .collect()
}

/// Distinct outlet names in sorted order, for listing the available choices.
pub fn distinct_outlets(records: &[Record]) -> Vec<String> {
    let mut outlets: Vec<String> = records.iter().map(|record| record.outlet.clone()).collect();
    outlets.sort();
    outlets.dedup();
    outlets
}
