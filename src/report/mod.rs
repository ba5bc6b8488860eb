//! Data-only reports: metric cards, bar chart series and a row table.
//!
//! Reports carry no business logic of their own; the views in [`views`]
//! assemble them from aggregates and [`render`] turns them into text or JSON.

pub mod render;
pub mod views;

use serde::Serialize;

use crate::aggregate::{CoverBucket, Group, Metric, safety_factor, unsold};
use crate::config::{Config, Field};
use crate::model::{Cell, Record, SheetTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub metrics: Vec<MetricCard>,
    pub charts: Vec<Chart>,
    pub table: SheetTable,
    /// User-facing warnings, such as an empty selection.
    pub notices: Vec<String>,
}

impl Report {
    pub fn new(title: impl Into<String>, table: SheetTable) -> Self {
        Self {
            title: title.into(),
            metrics: Vec::new(),
            charts: Vec::new(),
            table,
            notices: Vec::new(),
        }
    }

    pub fn metric(&self, label: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|card| card.label == label)
            .map(|card| card.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: f64,
}

impl MetricCard {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chart {
    /// Several series side by side per category, e.g. purchased vs sold.
    Grouped(GroupedBarChart),
    /// One bar per label, already in rank order.
    Ranked(RankedBarChart),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedBarChart {
    pub title: String,
    pub series: Vec<String>,
    pub categories: Vec<GroupedBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedBar {
    pub label: String,
    pub values: Vec<f64>,
}

impl GroupedBarChart {
    pub fn from_groups(title: impl Into<String>, groups: &[Group], series: &[(&str, Metric)]) -> Self {
        Self {
            title: title.into(),
            series: series.iter().map(|(name, _)| (*name).to_string()).collect(),
            categories: groups
                .iter()
                .map(|group| GroupedBar {
                    label: group.label.clone(),
                    values: series
                        .iter()
                        .map(|(_, metric)| group.totals.metric(*metric))
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBarChart {
    pub title: String,
    pub value_label: String,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    /// Second measure shown alongside the bar, e.g. profit next to purchase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<f64>,
}

impl RankedBarChart {
    pub fn from_groups(
        title: impl Into<String>,
        groups: &[Group],
        metric: (&str, Metric),
        secondary: Option<Metric>,
    ) -> Self {
        Self {
            title: title.into(),
            value_label: metric.0.to_string(),
            bars: groups
                .iter()
                .map(|group| Bar {
                    label: group.label.clone(),
                    value: group.totals.metric(metric.1),
                    secondary: secondary.map(|extra| group.totals.metric(extra)),
                })
                .collect(),
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.bars.iter().map(|bar| bar.label.as_str()).collect()
    }
}

/// A column of the row table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Field(Field),
    Unsold,
    SafetyFactor,
    Cover,
    CreditNote,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Field(field) => field.display_name(),
            Column::Unsold => "Unsold",
            Column::SafetyFactor => "Safety Factor",
            Column::Cover => "Cover",
            Column::CreditNote => "Credit Note",
        }
    }

    fn value(self, record: &Record, config: &Config) -> Cell {
        match self {
            Column::Field(field) => match field {
                Field::ItemCode => Cell::Text(record.code.to_string()),
                Field::ItemName => Cell::Text(record.name.clone()),
                Field::Category => Cell::Text(record.category.clone()),
                Field::Outlet => Cell::Text(record.outlet.clone()),
                Field::QtyPurchased => Cell::Number(record.qty_purchased),
                Field::QtySold => Cell::Number(record.qty_sold),
                Field::Stock => Cell::Number(record.stock),
                Field::PurchaseValue => Cell::Number(record.purchase_value),
                Field::SalesValue => Cell::Number(record.sales_value),
                Field::Profit => Cell::Number(record.profit),
                Field::MarginPct => Cell::Number(record.margin_pct()),
                Field::AvgMonthlySales => record
                    .avg_monthly_sales
                    .map(Cell::Number)
                    .unwrap_or_default(),
            },
            Column::Unsold => Cell::Number(unsold(record, config.unsold_basis)),
            Column::SafetyFactor => record
                .avg_monthly_sales
                .map(|avg| Cell::Number(safety_factor(record.stock, avg)))
                .unwrap_or_default(),
            Column::Cover => record
                .avg_monthly_sales
                .map(|avg| {
                    let bucket = CoverBucket::classify(safety_factor(record.stock, avg), &config.cover);
                    Cell::Text(bucket.label().to_string())
                })
                .unwrap_or_default(),
            Column::CreditNote => Cell::Bool(record.has_credit_note),
        }
    }
}

/// Builds the row table of a report.
pub fn records_table(sheet_name: &str, records: &[Record], columns: &[Column], config: &Config) -> SheetTable {
    let mut table = SheetTable::new(
        sheet_name,
        columns.iter().map(|column| column.header().to_string()).collect(),
    );
    for record in records {
        table.push_row(columns.iter().map(|column| column.value(record, config)).collect());
    }
    table
}
