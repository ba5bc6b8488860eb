//! Runtime configuration: the column-alias map and the tunable thresholds.
//!
//! Every key is optional in the JSON file; anything left out falls back to
//! [`Config::default`]. Alias lists given in the file replace the built-in
//! list for that field rather than extending it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InsightsError, Result};

/// Logical columns the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ItemCode,
    ItemName,
    Category,
    Outlet,
    QtyPurchased,
    QtySold,
    Stock,
    PurchaseValue,
    SalesValue,
    Profit,
    MarginPct,
    AvgMonthlySales,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::ItemCode,
        Field::ItemName,
        Field::Category,
        Field::Outlet,
        Field::QtyPurchased,
        Field::QtySold,
        Field::Stock,
        Field::PurchaseValue,
        Field::SalesValue,
        Field::Profit,
        Field::MarginPct,
        Field::AvgMonthlySales,
    ];

    /// Header spellings seen in the outlet exports.
    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            Field::ItemCode => &["Item Code", "Barcode", "Code", "Item No"],
            Field::ItemName => &["Items", "Item", "Item Name", "Description"],
            Field::Category => &["Category", "Department"],
            Field::Outlet => &["Outlet", "Branch", "Store"],
            Field::QtyPurchased => &["Qty Purchased", "Purchase Qty", "Qty In"],
            Field::QtySold => &["QTY Sold", "Sold Qty", "Qty Out"],
            Field::Stock => &["Stock", "Stock Qty", "Closing Stock", "Qty On Hand"],
            Field::PurchaseValue => &["TOTEL PURCHASE", "Total Purchase", "Purchase Value"],
            Field::SalesValue => &["Total Sales", "Sales", "Sales Value"],
            Field::Profit => &["Total Profit", "Profit"],
            Field::MarginPct => &["Excise Margin (%)", "Margin (%)", "Margin %"],
            Field::AvgMonthlySales => &["Avg Monthly Sales", "Average Monthly Sales", "AMS"],
        }
    }

    /// Header used when the field is written back out.
    pub fn display_name(self) -> &'static str {
        match self {
            Field::ItemCode => "Item Code",
            Field::ItemName => "Items",
            Field::Category => "Category",
            Field::Outlet => "Outlet",
            Field::QtyPurchased => "Qty Purchased",
            Field::QtySold => "QTY Sold",
            Field::Stock => "Stock",
            Field::PurchaseValue => "Total Purchase",
            Field::SalesValue => "Total Sales",
            Field::Profit => "Total Profit",
            Field::MarginPct => "Margin (%)",
            Field::AvgMonthlySales => "Avg Monthly Sales",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Field → accepted header spellings, matched case-insensitively after
/// trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnAliases(BTreeMap<Field, Vec<String>>);

impl Default for ColumnAliases {
    fn default() -> Self {
        let map = Field::ALL
            .iter()
            .map(|field| {
                let names = field
                    .default_aliases()
                    .iter()
                    .map(|name| (*name).to_string())
                    .collect();
                (*field, names)
            })
            .collect();
        Self(map)
    }
}

impl ColumnAliases {
    pub fn aliases(&self, field: Field) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Replaces the accepted spellings for one field.
    pub fn set(&mut self, field: Field, names: Vec<String>) {
        self.0.insert(field, names);
    }

    /// Finds the column index for `field` among `headers`. Aliases are tried
    /// in declaration order so the first listed spelling wins.
    pub fn resolve(&self, field: Field, headers: &[String]) -> Option<usize> {
        self.aliases(field).iter().find_map(|alias| {
            let wanted = alias.trim();
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(wanted))
        })
    }

    fn merge(&mut self, overrides: ColumnAliases) {
        for (field, names) in overrides.0 {
            self.0.insert(field, names);
        }
    }
}

/// How the unsold quantity is derived, matching the two export variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsoldBasis {
    /// Quantity purchased minus quantity sold.
    #[default]
    PurchasedMinusSold,
    /// Stock on hand.
    StockOnHand,
}

/// Months-of-cover boundaries. A safety factor below `low` is low stock and
/// strictly above `over` is overstock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverThresholds {
    pub low: f64,
    pub over: f64,
}

impl Default for CoverThresholds {
    fn default() -> Self {
        Self {
            low: 1.0,
            over: 3.0,
        }
    }
}

/// Row limits for the ranked charts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopN {
    pub compare: usize,
    pub compare_search: usize,
    pub unsold: usize,
    pub cover: usize,
}

impl Default for TopN {
    fn default() -> Self {
        Self {
            compare: 30,
            compare_search: 10,
            unsold: 15,
            cover: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aliases: ColumnAliases,
    pub unsold_basis: UnsoldBasis,
    pub cover: CoverThresholds,
    pub top_n: TopN,
    /// Ignore margin columns in the source sheets and derive every margin
    /// from profit and sales.
    pub recompute_margins: bool,
}

#[derive(Deserialize)]
struct RawConfig {
    aliases: Option<ColumnAliases>,
    unsold_basis: Option<UnsoldBasis>,
    cover: Option<CoverThresholds>,
    top_n: Option<TopN>,
    recompute_margins: Option<bool>,
}

impl Config {
    /// Loads a JSON configuration file, layering it over the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InsightsError::MissingInput(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json(&data)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(data)?;
        let mut config = Self::default();
        if let Some(aliases) = raw.aliases {
            config.aliases.merge(aliases);
        }
        if let Some(basis) = raw.unsold_basis {
            config.unsold_basis = basis;
        }
        if let Some(cover) = raw.cover {
            config.cover = cover;
        }
        if let Some(top_n) = raw.top_n {
            config.top_n = top_n;
        }
        if let Some(recompute) = raw.recompute_margins {
            config.recompute_margins = recompute;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.cover.low >= 0.0 && self.cover.low <= self.cover.over) {
            return Err(InsightsError::InvalidConfig(format!(
                "cover thresholds must satisfy 0 <= low <= over (got low={}, over={})",
                self.cover.low, self.cover.over
            )));
        }
        if let Some(field) = Field::ALL
            .iter()
            .find(|field| self.aliases.aliases(**field).is_empty())
        {
            return Err(InsightsError::InvalidConfig(format!(
                "no column aliases declared for {field}"
            )));
        }
        Ok(())
    }
}
