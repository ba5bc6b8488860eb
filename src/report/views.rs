use tracing::debug;

use crate::aggregate::{
    CoverBucket, GroupKey, Metric, group_by, per_record, safety_factor, summarize, top_n,
};
use crate::config::{Config, Field};
use crate::filter::FilterSet;
use crate::model::Record;

use super::{
    Bar, Chart, Column, GroupedBarChart, MetricCard, RankedBarChart, Report, records_table,
};

/// Default file name for the credit-note export.
pub const UNMATCHED_EXPORT_NAME: &str = "negative_margin_unmatched_items.xlsx";

const EMPTY_SELECTION: &str = "No rows match the selected filters; check the filters or the data.";

/// Label of the metric counting rows with a credit note.
pub const CREDIT_NOTE_METRIC: &str = "Items with Credit Notes";

/// Appends the credit-note column and its count when the records were
/// checked against a credit-note sheet.
fn with_credit_notes(mut columns: Vec<Column>, credit_checked: bool) -> Vec<Column> {
    if credit_checked {
        columns.push(Column::CreditNote);
    }
    columns
}

fn push_credit_note_metric(report: &mut Report, records: &[Record], credit_checked: bool) {
    if credit_checked {
        let flagged = records.iter().filter(|record| record.has_credit_note).count();
        report.metrics.push(MetricCard::new(CREDIT_NOTE_METRIC, flagged as f64));
    }
}

/// Purchase and profit per item, with an outlet breakdown when items are
/// picked without an outlet.
pub fn purchase(
    filtered: &[Record],
    filters: &FilterSet,
    config: &Config,
    credit_checked: bool,
) -> Report {
    let basis = config.unsold_basis;
    let totals = summarize(filtered, basis);

    let columns = with_credit_notes(
        vec![
            Column::Field(Field::ItemCode),
            Column::Field(Field::ItemName),
            Column::Field(Field::Category),
            Column::Field(Field::Outlet),
            Column::Field(Field::PurchaseValue),
            Column::Field(Field::Profit),
            Column::Field(Field::MarginPct),
        ],
        credit_checked,
    );
    let table = records_table("Filtered Data", filtered, &columns, config);
    let mut report = Report::new("Purchase & Profit Insights", table);
    report.metrics.push(MetricCard::new("Total Purchase", totals.purchase_value));
    report.metrics.push(MetricCard::new("Total Profit", totals.profit));
    if filters.outlets.len() == 1 {
        report.metrics.push(MetricCard::new(
            "Avg Purchase (Selected Outlet)",
            totals.mean_purchase_value(),
        ));
    }
    push_credit_note_metric(&mut report, filtered, credit_checked);

    if filtered.is_empty() {
        report.notices.push(EMPTY_SELECTION.to_string());
        return report;
    }

    let items = per_record(filtered, basis);
    let ranked = top_n(items, Metric::PurchaseValue, filtered.len());
    report.charts.push(Chart::Ranked(RankedBarChart::from_groups(
        "Items Purchase & Profit",
        &ranked,
        ("Total Purchase", Metric::PurchaseValue),
        Some(Metric::Profit),
    )));

    if !filters.items.is_empty() && !filters.has_outlet_filter() {
        let outlets = group_by(filtered, GroupKey::Outlet, basis);
        let outlets = top_n(outlets, Metric::PurchaseValue, usize::MAX);
        report.charts.push(Chart::Ranked(RankedBarChart::from_groups(
            "Outlet-wise Purchase (Selected Item)",
            &outlets,
            ("Total Purchase", Metric::PurchaseValue),
            None,
        )));
    }

    debug!(rows = filtered.len(), charts = report.charts.len(), "purchase report built");
    report
}

/// Purchased against sold quantities, and the items left unsold.
///
/// With a search term and no outlet selected, rows for the same item across
/// outlets are summed before ranking.
pub fn variance(
    filtered: &[Record],
    filters: &FilterSet,
    config: &Config,
    credit_checked: bool,
) -> Report {
    let basis = config.unsold_basis;
    let searching = filters.search_term().is_some();
    let per_item = searching && !filters.has_outlet_filter();
    let top_limit = if searching {
        config.top_n.compare_search
    } else {
        config.top_n.compare
    };

    let columns = with_credit_notes(
        vec![
            Column::Field(Field::ItemCode),
            Column::Field(Field::ItemName),
            Column::Field(Field::Outlet),
            Column::Field(Field::QtyPurchased),
            Column::Field(Field::QtySold),
            Column::Unsold,
        ],
        credit_checked,
    );
    let table = records_table("Purchase vs Sold", filtered, &columns, config);
    let mut report = Report::new("Purchase vs Sold", table);

    let totals = summarize(filtered, basis);
    report.metrics.push(MetricCard::new("Qty Purchased", totals.qty_purchased));
    report.metrics.push(MetricCard::new("QTY Sold", totals.qty_sold));
    report.metrics.push(MetricCard::new("Unsold", totals.unsold));
    push_credit_note_metric(&mut report, filtered, credit_checked);

    if filtered.is_empty() {
        report.notices.push(EMPTY_SELECTION.to_string());
        return report;
    }

    let groups = if per_item {
        group_by(filtered, GroupKey::Item, basis)
    } else {
        per_record(filtered, basis)
    };

    let compared = top_n(groups.clone(), Metric::QtyPurchased, top_limit);
    report.charts.push(Chart::Grouped(GroupedBarChart::from_groups(
        format!("Top {top_limit} Items: Purchase vs Sold"),
        &compared,
        &[("Qty Purchased", Metric::QtyPurchased), ("QTY Sold", Metric::QtySold)],
    )));

    // A search scoped to one outlet lists every hit rather than the top few.
    let unsold_limit = if searching && !per_item {
        groups.len()
    } else {
        config.top_n.unsold
    };
    let unsold = top_n(groups, Metric::Unsold, unsold_limit);
    report.charts.push(Chart::Ranked(RankedBarChart::from_groups(
        "Highest Unsold Items",
        &unsold,
        ("Unsold", Metric::Unsold),
        None,
    )));

    debug!(rows = filtered.len(), per_item, top_limit, "variance report built");
    report
}

/// Negative-margin items that have no credit note. `flagged` is the number of
/// filtered sales rows that did match a credit note.
pub fn credit_notes(unmatched: &[Record], flagged: usize, config: &Config) -> Report {
    let table = records_table(
        "Unmatched Items",
        unmatched,
        &[
            Column::Field(Field::ItemCode),
            Column::Field(Field::ItemName),
            Column::Field(Field::Category),
            Column::Field(Field::SalesValue),
            Column::Field(Field::Profit),
            Column::Field(Field::MarginPct),
        ],
        config,
    );
    let mut report = Report::new("Negative Margin Items NOT in Credit Notes", table);
    let totals = summarize(unmatched, config.unsold_basis);
    report.metrics.push(MetricCard::new(
        "Total unmatched negative margin items",
        unmatched.len() as f64,
    ));
    report.metrics.push(MetricCard::new("Total Sales", totals.sales_value));
    report.metrics.push(MetricCard::new("Total Profit", totals.profit));
    report.metrics.push(MetricCard::new(CREDIT_NOTE_METRIC, flagged as f64));

    if unmatched.is_empty() {
        report
            .notices
            .push("Every negative margin item has a credit note.".to_string());
    }
    report
}

/// Months of cover per item for records that went through the aging merge.
pub fn stock_cover(records: &[Record], config: &Config) -> Report {
    let covered: Vec<Record> = records
        .iter()
        .filter(|record| record.avg_monthly_sales.is_some())
        .cloned()
        .collect();

    let table = records_table(
        "Stock Cover",
        &covered,
        &[
            Column::Field(Field::ItemCode),
            Column::Field(Field::ItemName),
            Column::Field(Field::Category),
            Column::Field(Field::Outlet),
            Column::Field(Field::Stock),
            Column::Field(Field::AvgMonthlySales),
            Column::SafetyFactor,
            Column::Cover,
        ],
        config,
    );
    let mut report = Report::new("Stock Cover (Safety Factor)", table);

    let factors: Vec<(String, f64)> = covered
        .iter()
        .map(|record| {
            let avg = record.avg_monthly_sales.unwrap_or_default();
            (record.name.clone(), safety_factor(record.stock, avg))
        })
        .collect();

    for bucket in [CoverBucket::LowStock, CoverBucket::Healthy, CoverBucket::Overstock] {
        let count = factors
            .iter()
            .filter(|(_, factor)| CoverBucket::classify(*factor, &config.cover) == bucket)
            .count();
        report.metrics.push(MetricCard::new(bucket.label(), count as f64));
    }

    let without_aging = records.len() - covered.len();
    if without_aging > 0 {
        report
            .notices
            .push(format!("{without_aging} item(s) had no matching aging entry."));
    }
    if covered.is_empty() {
        report.notices.push(EMPTY_SELECTION.to_string());
        return report;
    }

    let mut ranked = factors;
    ranked.sort_by(|lhs, rhs| rhs.1.total_cmp(&lhs.1));
    ranked.truncate(config.top_n.cover);
    report.charts.push(Chart::Ranked(RankedBarChart {
        title: "Highest Months of Cover".to_string(),
        value_label: "Safety Factor".to_string(),
        bars: ranked
            .into_iter()
            .map(|(label, value)| Bar {
                label,
                value,
                secondary: None,
            })
            .collect(),
    }));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    fn record(code: &str, name: &str, outlet: &str, purchased: f64, sold: f64) -> Record {
        Record {
            outlet: outlet.into(),
            qty_purchased: purchased,
            qty_sold: sold,
            purchase_value: purchased * 10.0,
            profit: purchased - sold,
            ..Record::new(code, name)
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record("1", "Rice", "Salem", 100.0, 40.0),
            record("1", "Rice", "Erode", 80.0, 70.0),
            record("2", "Oil", "Salem", 60.0, 60.0),
            record("3", "Soap", "Erode", 20.0, 5.0),
        ]
    }

    fn ranked(report: &Report, index: usize) -> &RankedBarChart {
        match &report.charts[index] {
            Chart::Ranked(chart) => chart,
            other => panic!("expected ranked chart, got {other:?}"),
        }
    }

    #[test]
    fn purchase_shows_average_only_for_single_outlet() {
        let config = Config::default();
        let all = FilterSet::default();
        let report = purchase(&sample(), &all, &config, false);
        assert_eq!(report.metric("Total Purchase"), Some(2600.0));
        assert_eq!(report.metric("Avg Purchase (Selected Outlet)"), None);

        let salem = FilterSet {
            outlets: vec!["Salem".into()],
            ..FilterSet::default()
        };
        let rows = salem.apply(&sample(), &config.cover);
        let report = purchase(&rows, &salem, &config, false);
        assert_eq!(report.metric("Avg Purchase (Selected Outlet)"), Some(800.0));
        assert_eq!(report.charts.len(), 1);
    }

    #[test]
    fn purchase_breaks_selected_items_down_by_outlet() {
        let config = Config::default();
        let filters = FilterSet {
            items: vec!["Rice".into()],
            ..FilterSet::default()
        };
        let rows = filters.apply(&sample(), &config.cover);
        let report = purchase(&rows, &filters, &config, false);

        assert_eq!(report.charts.len(), 2);
        let outlets = ranked(&report, 1);
        assert_eq!(outlets.labels(), vec!["Salem", "Erode"]);
        assert_eq!(outlets.bars[0].value, 1000.0);
    }

    #[test]
    fn purchase_warns_on_empty_selection() {
        let report = purchase(&[], &FilterSet::default(), &Config::default(), false);
        assert!(report.charts.is_empty());
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.metric("Total Profit"), Some(0.0));
    }

    #[test]
    fn variance_aggregates_per_item_when_searching_all_outlets() {
        let config = Config::default();
        let filters = FilterSet {
            search: Some("rice".into()),
            ..FilterSet::default()
        };
        let rows = filters.apply(&sample(), &config.cover);
        let report = variance(&rows, &filters, &config, false);

        match &report.charts[0] {
            Chart::Grouped(chart) => {
                assert_eq!(chart.title, "Top 10 Items: Purchase vs Sold");
                assert_eq!(chart.categories.len(), 1);
                assert_eq!(chart.categories[0].values, vec![180.0, 110.0]);
            }
            other => panic!("expected grouped chart, got {other:?}"),
        }
        assert_eq!(ranked(&report, 1).bars[0].value, 70.0);
    }

    #[test]
    fn variance_ranks_rows_without_search() {
        let config = Config::default();
        let report = variance(&sample(), &FilterSet::default(), &config, false);
        match &report.charts[0] {
            Chart::Grouped(chart) => {
                assert_eq!(chart.title, "Top 30 Items: Purchase vs Sold");
                assert_eq!(chart.categories.len(), 4);
            }
            other => panic!("expected grouped chart, got {other:?}"),
        }
        let unsold = ranked(&report, 1);
        assert_eq!(unsold.labels(), vec!["Rice", "Soap", "Rice", "Oil"]);
        assert_eq!(report.metric("Unsold"), Some(85.0));
    }

    #[test]
    fn credit_note_report_counts_rows() {
        let rows = vec![Record {
            sales_value: 100.0,
            profit: -10.0,
            ..Record::new("123", "Rice")
        }];
        let report = credit_notes(&rows, 3, &Config::default());
        assert_eq!(report.metric("Total unmatched negative margin items"), Some(1.0));
        assert_eq!(
            report.table.columns,
            vec!["Item Code", "Items", "Category", "Total Sales", "Total Profit", "Margin (%)"]
        );
        assert_eq!(report.metric(CREDIT_NOTE_METRIC), Some(3.0));
        assert!(report.notices.is_empty());
    }

    #[test]
    fn credit_note_column_appears_once_checked() {
        let mut rows = sample();
        rows[2].has_credit_note = true;
        let config = Config::default();

        let plain = variance(&rows, &FilterSet::default(), &config, false);
        assert!(!plain.table.columns.contains(&"Credit Note".to_string()));
        assert_eq!(plain.metric(CREDIT_NOTE_METRIC), None);

        let checked = variance(&rows, &FilterSet::default(), &config, true);
        assert_eq!(checked.table.columns.last().map(String::as_str), Some("Credit Note"));
        assert_eq!(checked.metric(CREDIT_NOTE_METRIC), Some(1.0));
        assert_eq!(checked.table.cell(2, 6), &Cell::Bool(true));
        assert_eq!(checked.table.cell(0, 6), &Cell::Bool(false));
    }

    #[test]
    fn stock_cover_buckets_and_ranks() {
        let config = Config::default();
        let records = vec![
            Record {
                stock: 90.0,
                avg_monthly_sales: Some(30.0),
                ..Record::new("1", "Rice")
            },
            Record {
                stock: 400.0,
                avg_monthly_sales: Some(20.0),
                ..Record::new("2", "Oil")
            },
            Record {
                stock: 5.0,
                avg_monthly_sales: Some(10.0),
                ..Record::new("3", "Soap")
            },
            Record::new("4", "Salt"),
        ];
        let report = stock_cover(&records, &config);

        assert_eq!(report.metric("Low stock"), Some(1.0));
        assert_eq!(report.metric("Healthy"), Some(1.0));
        assert_eq!(report.metric("Overstock"), Some(1.0));
        assert_eq!(report.table.len(), 3);
        assert_eq!(ranked(&report, 0).labels(), vec!["Oil", "Rice", "Soap"]);
        assert_eq!(report.notices.len(), 1);
    }
}
