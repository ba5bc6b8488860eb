//! Reductions and derived ratios over record sets.
//!
//! Every ratio substitutes zero when its denominator is zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{CoverThresholds, UnsoldBasis};
use crate::model::Record;

/// Profit as a percentage of sales.
pub fn margin_pct(profit: f64, sales: f64) -> f64 {
    if sales == 0.0 {
        0.0
    } else {
        profit * 100.0 / sales
    }
}

/// Months of cover: stock divided by average monthly sales.
pub fn safety_factor(stock: f64, avg_monthly_sales: f64) -> f64 {
    if avg_monthly_sales == 0.0 {
        0.0
    } else {
        stock / avg_monthly_sales
    }
}

pub fn unsold(record: &Record, basis: UnsoldBasis) -> f64 {
    match basis {
        UnsoldBasis::PurchasedMinusSold => record.qty_purchased - record.qty_sold,
        UnsoldBasis::StockOnHand => record.stock,
    }
}

/// Replaces every stored margin with the value recomputed from profit and
/// sales. Applying it twice changes nothing.
pub fn recompute_margins(records: &mut [Record]) {
    for record in records {
        record.stored_margin_pct = Some(margin_pct(record.profit, record.sales_value));
    }
}

/// Stock-cover classification of a safety factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverBucket {
    LowStock,
    Healthy,
    Overstock,
}

impl CoverBucket {
    /// Below `low` is low stock, strictly above `over` is overstock; the
    /// boundaries themselves are healthy.
    pub fn classify(safety_factor: f64, thresholds: &CoverThresholds) -> Self {
        if safety_factor < thresholds.low {
            CoverBucket::LowStock
        } else if safety_factor > thresholds.over {
            CoverBucket::Overstock
        } else {
            CoverBucket::Healthy
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CoverBucket::LowStock => "Low stock",
            CoverBucket::Healthy => "Healthy",
            CoverBucket::Overstock => "Overstock",
        }
    }
}

impl fmt::Display for CoverBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Margin range used by the margin filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginBucket {
    /// Below 0 %.
    Negative,
    /// 0 % up to, not including, 10 %.
    Low,
    /// 10 % up to, not including, 25 %.
    Moderate,
    /// 25 % and above.
    High,
}

impl MarginBucket {
    pub fn classify(margin_pct: f64) -> Self {
        if margin_pct < 0.0 {
            MarginBucket::Negative
        } else if margin_pct < 10.0 {
            MarginBucket::Low
        } else if margin_pct < 25.0 {
            MarginBucket::Moderate
        } else {
            MarginBucket::High
        }
    }
}

/// Sums over a record set plus the derived ratios.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub rows: usize,
    pub qty_purchased: f64,
    pub qty_sold: f64,
    pub stock: f64,
    pub unsold: f64,
    pub purchase_value: f64,
    pub sales_value: f64,
    pub profit: f64,
}

impl Totals {
    fn add(&mut self, record: &Record, basis: UnsoldBasis) {
        self.rows += 1;
        self.qty_purchased += record.qty_purchased;
        self.qty_sold += record.qty_sold;
        self.stock += record.stock;
        self.unsold += unsold(record, basis);
        self.purchase_value += record.purchase_value;
        self.sales_value += record.sales_value;
        self.profit += record.profit;
    }

    pub fn margin_pct(&self) -> f64 {
        margin_pct(self.profit, self.sales_value)
    }

    pub fn mean_purchase_value(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.purchase_value / self.rows as f64
        }
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::QtyPurchased => self.qty_purchased,
            Metric::QtySold => self.qty_sold,
            Metric::Stock => self.stock,
            Metric::Unsold => self.unsold,
            Metric::PurchaseValue => self.purchase_value,
            Metric::SalesValue => self.sales_value,
            Metric::Profit => self.profit,
        }
    }
}

pub fn summarize(records: &[Record], basis: UnsoldBasis) -> Totals {
    let mut totals = Totals::default();
    for record in records {
        totals.add(record, basis);
    }
    totals
}

/// Numeric measure a ranking can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    QtyPurchased,
    QtySold,
    Stock,
    Unsold,
    PurchaseValue,
    SalesValue,
    Profit,
}

/// Grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Item,
    Outlet,
    Category,
}

impl GroupKey {
    fn of(self, record: &Record) -> &str {
        match self {
            GroupKey::Item => &record.name,
            GroupKey::Outlet => &record.outlet,
            GroupKey::Category => &record.category,
        }
    }
}

/// Totals for one group label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub label: String,
    pub totals: Totals,
}

/// Per-group totals, sorted by label.
pub fn group_by(records: &[Record], key: GroupKey, basis: UnsoldBasis) -> Vec<Group> {
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();
    for record in records {
        groups.entry(key.of(record)).or_default().add(record, basis);
    }
    groups
        .into_iter()
        .map(|(label, totals)| Group {
            label: label.to_string(),
            totals,
        })
        .collect()
}

/// Treats each record as its own group, labelled by item name.
pub fn per_record(records: &[Record], basis: UnsoldBasis) -> Vec<Group> {
    records
        .iter()
        .map(|record| {
            let mut totals = Totals::default();
            totals.add(record, basis);
            Group {
                label: record.name.clone(),
                totals,
            }
        })
        .collect()
}

/// The `n` largest groups by `metric`, descending. Ties keep their input
/// order.
pub fn top_n(mut groups: Vec<Group>, metric: Metric, n: usize) -> Vec<Group> {
    groups.sort_by(|lhs, rhs| rhs.totals.metric(metric).total_cmp(&lhs.totals.metric(metric)));
    groups.truncate(n);
    groups
}
