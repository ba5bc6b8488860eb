use std::fs;
use std::path::Path;

use outlet_insights::InsightsError;
use outlet_insights::config::Config;
use outlet_insights::dashboard::{self, Dashboard};
use outlet_insights::filter::FilterSet;
use outlet_insights::io::excel_read::{SheetRequest, read_sheet};
use outlet_insights::model::Cell;
use outlet_insights::report::Chart;
use outlet_insights::report::render::{OutputFormat, render};
use rust_xlsxwriter::Workbook;
use tempfile::tempdir;

enum Value {
    Text(&'static str),
    Number(f64),
}

use Value::{Number as N, Text as T};

fn write_sheets(path: &Path, sheets: Vec<(&str, Vec<&str>, Vec<Vec<Value>>)>) {
    let mut workbook = Workbook::new();
    for (name, headers, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).expect("sheet named");
        for (col, header) in headers.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, *header)
                .expect("header written");
        }
        for (row_idx, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                let (row, col) = ((row_idx + 1) as u32, col as u16);
                let written = match value {
                    Value::Text(text) => worksheet.write_string(row, col, *text),
                    Value::Number(number) => worksheet.write_number(row, col, *number),
                };
                written.expect("cell written");
            }
        }
    }
    workbook.save(path).expect("workbook saved");
}

fn sales_rows() -> Vec<Vec<Value>> {
    vec![
        vec![N(123.0), T("Rice 5kg"), T("Grocery"), T("Salem"), N(100.0), N(60.0), N(1000.0), N(100.0), N(-10.0), N(-10.0)],
        vec![N(456.0), T("Oil 1L"), T("Grocery"), T("Salem"), N(50.0), N(50.0), N(600.0), N(500.0), N(-25.0), N(-5.0)],
        vec![N(789.0), T("Dish Soap"), T("Household"), T("Erode"), N(20.0), N(5.0), N(200.0), N(80.0), N(8.0), N(10.0)],
        vec![N(123.0), T("Rice 5kg"), T("Grocery"), T("Erode"), N(40.0), N(30.0), N(400.0), N(300.0), N(-3.0), N(-1.0)],
    ]
}

const SALES_HEADERS: &[&str] = &[
    "Item Code",
    "Items",
    "Category",
    "outlet ",
    "Qty Purchased",
    "QTY Sold",
    "TOTEL PURCHASE",
    "Total Sales",
    "Total Profit",
    "Excise Margin (%)",
];

fn write_sales(path: &Path) {
    write_sheets(path, vec![("Sales", SALES_HEADERS.to_vec(), sales_rows())]);
}

#[test]
fn credit_note_reconciliation_exports_unmatched_rows() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("Salem.xlsx");
    let credit = dir.path().join("credit.xlsx");
    write_sales(&sales);
    write_sheets(
        &credit,
        vec![(
            "Credit",
            vec!["Note No", "Amount"],
            vec![vec![T(" 456 "), N(25.0)], vec![T("456.0"), N(5.0)], vec![T("999"), N(1.0)]],
        )],
    );

    let mut dashboard = Dashboard::new(Config::default());
    let report = dashboard
        .credit_notes(
            &SheetRequest::new(&sales),
            &SheetRequest::new(&credit),
            &FilterSet::default(),
        )
        .expect("credit note report");

    assert_eq!(report.metric("Total unmatched negative margin items"), Some(2.0));
    assert_eq!(report.metric("Total Profit"), Some(-13.0));
    assert_eq!(report.metric("Items with Credit Notes"), Some(1.0));
    assert_eq!(report.table.cell(0, 0), &Cell::Text("123".into()));
    assert_eq!(report.table.cell(1, 0), &Cell::Text("123".into()));

    let output = dir.path().join("negative_margin_unmatched_items.xlsx");
    dashboard::export(&report, &output).expect("export written");
    let exported = read_sheet(&SheetRequest::new(&output)).expect("export read back");
    assert_eq!(
        exported.columns,
        vec!["Item Code", "Items", "Category", "Total Sales", "Total Profit", "Margin (%)"]
    );
    assert_eq!(exported.len(), 2);
    assert_eq!(exported.cell(0, 1), &Cell::Text("Rice 5kg".into()));
    assert_eq!(exported.cell(0, 4), &Cell::Number(-10.0));
}

#[test]
fn purchase_view_respects_outlet_selection() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("purchase.xlsx");
    write_sales(&sales);

    let mut dashboard = Dashboard::new(Config::default());
    let filters = FilterSet {
        outlets: vec!["Erode".into()],
        ..FilterSet::default()
    };
    let report = dashboard
        .purchase(&SheetRequest::new(&sales), None, &filters)
        .expect("purchase report");

    assert_eq!(report.metric("Total Purchase"), Some(600.0));
    assert_eq!(report.metric("Total Profit"), Some(5.0));
    assert_eq!(report.metric("Avg Purchase (Selected Outlet)"), Some(300.0));
    assert_eq!(report.table.len(), 2);

    let text = render(&report, OutputFormat::Text).expect("text rendered");
    assert!(text.contains("Items Purchase & Profit"));
    assert!(text.contains("Dish Soap"));
    assert!(!text.contains("Oil 1L"));
}

#[test]
fn variance_view_sums_searched_items_across_outlets() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("variance.xlsx");
    write_sales(&sales);

    let mut dashboard = Dashboard::new(Config::default());
    let filters = FilterSet {
        search: Some("RICE".into()),
        ..FilterSet::default()
    };
    let report = dashboard
        .variance(&SheetRequest::new(&sales), None, &filters)
        .expect("variance report");

    match &report.charts[0] {
        Chart::Grouped(chart) => {
            assert_eq!(chart.categories.len(), 1);
            assert_eq!(chart.categories[0].label, "Rice 5kg");
            assert_eq!(chart.categories[0].values, vec![140.0, 90.0]);
        }
        other => panic!("expected grouped chart, got {other:?}"),
    }
    assert_eq!(report.metric("Unsold"), Some(50.0));
}

#[test]
fn stock_cover_merges_aging_from_the_same_workbook() {
    let dir = tempdir().expect("temporary directory");
    let workbook = dir.path().join("stock.xlsx");
    write_sheets(
        &workbook,
        vec![
            ("Sales", SALES_HEADERS.to_vec(), sales_rows()),
            (
                "Aging",
                vec!["Barcode", "Item Name", "Category", "Stock", "Avg Monthly Sales"],
                vec![
                    vec![T("123"), T("rice 5KG"), T("grocery"), N(90.0), N(30.0)],
                    vec![N(456.0), T("Oil 1L"), T("Grocery"), N(200.0), N(20.0)],
                ],
            ),
        ],
    );

    let mut dashboard = Dashboard::new(Config::default());
    let sales = SheetRequest::new(&workbook).with_sheet(Some("Sales".into()));
    let aging = SheetRequest::new(&workbook).with_sheet(Some("Aging".into()));
    let report = dashboard
        .stock_cover(Some(&sales), &aging, &FilterSet::default())
        .expect("stock cover report");

    // Both Rice rows share the aging key, so both pick up 3.0 months.
    assert_eq!(report.metric("Healthy"), Some(2.0));
    assert_eq!(report.metric("Overstock"), Some(1.0));
    assert_eq!(report.metric("Low stock"), Some(0.0));
    assert_eq!(report.table.len(), 3);
    assert_eq!(report.notices, vec!["1 item(s) had no matching aging entry.".to_string()]);

    let json = render(&report, OutputFormat::Json).expect("json rendered");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["charts"][0]["bars"][0]["label"], "Oil 1L");
    assert_eq!(value["charts"][0]["bars"][0]["value"], 10.0);
}

#[test]
fn missing_columns_are_listed_together() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("thin.xlsx");
    write_sheets(
        &sales,
        vec![("Sheet1", vec!["Items", "Outlet"], vec![vec![T("Rice"), T("Salem")]])],
    );

    let mut dashboard = Dashboard::new(Config::default());
    let err = dashboard
        .variance(&SheetRequest::new(&sales), None, &FilterSet::default())
        .expect_err("columns missing");

    match err {
        InsightsError::MissingColumns { source_name, missing } => {
            assert_eq!(source_name, "Sheet1");
            assert_eq!(missing, vec!["Qty Purchased", "QTY Sold"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn configured_aliases_and_recomputed_margins_apply() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("renamed.xlsx");
    write_sheets(
        &sales,
        vec![(
            "Sheet1",
            vec!["SKU", "Product", "Dept", "Net Sales", "Net Profit", "Excise Margin (%)"],
            vec![
                vec![T("A-1"), T("Tea"), T("Drinks"), N(100.0), N(-10.0), N(5.0)],
                vec![T("A-2"), T("Coffee"), T("Drinks"), N(100.0), N(10.0), N(-5.0)],
            ],
        )],
    );
    let credit = dir.path().join("credit.xlsx");
    write_sheets(&credit, vec![("Sheet1", vec!["SKU"], vec![vec![T("A-9")]])]);

    let config_path = dir.path().join("aliases.json");
    fs::write(
        &config_path,
        r#"{
            "aliases": {
                "item_code": ["SKU"],
                "item_name": ["Product"],
                "category": ["Dept"],
                "sales_value": ["Net Sales"],
                "profit": ["Net Profit"]
            },
            "recompute_margins": true
        }"#,
    )
    .expect("config written");

    let config = Config::from_path(&config_path).expect("config loaded");
    let mut dashboard = Dashboard::new(config);
    let report = dashboard
        .credit_notes(
            &SheetRequest::new(&sales),
            &SheetRequest::new(&credit),
            &FilterSet::default(),
        )
        .expect("credit note report");

    assert_eq!(report.table.len(), 1);
    assert_eq!(report.table.cell(0, 1), &Cell::Text("Tea".into()));
    assert_eq!(report.table.cell(0, 5), &Cell::Number(-10.0));
}

#[test]
fn missing_workbook_is_reported() {
    let dir = tempdir().expect("temporary directory");
    let mut dashboard = Dashboard::new(Config::default());
    let err = dashboard
        .purchase(
            &SheetRequest::new(dir.path().join("absent.xlsx")),
            None,
            &FilterSet::default(),
        )
        .expect_err("missing workbook");
    assert!(matches!(err, InsightsError::MissingInput(_)));
}

#[test]
fn purchase_view_flags_rows_with_credit_notes() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("purchase.xlsx");
    let credit = dir.path().join("credit.xlsx");
    write_sales(&sales);
    write_sheets(
        &credit,
        vec![("Sheet1", vec!["Item Code"], vec![vec![N(123.0)], vec![T("999")]])],
    );

    let mut dashboard = Dashboard::new(Config::default());
    let credit_request = SheetRequest::new(&credit);
    let report = dashboard
        .purchase(
            &SheetRequest::new(&sales),
            Some(&credit_request),
            &FilterSet::default(),
        )
        .expect("purchase report");

    assert_eq!(report.metric("Items with Credit Notes"), Some(2.0));
    let column = report
        .table
        .columns
        .iter()
        .position(|name| name == "Credit Note")
        .expect("credit note column");
    let flags: Vec<&Cell> = (0..report.table.len())
        .map(|row| report.table.cell(row, column))
        .collect();
    assert_eq!(
        flags,
        vec![&Cell::Bool(true), &Cell::Bool(false), &Cell::Bool(false), &Cell::Bool(true)]
    );

    let output = dir.path().join("flagged.xlsx");
    dashboard::export(&report, &output).expect("export written");
    let exported = read_sheet(&SheetRequest::new(&output)).expect("export read back");
    assert_eq!(exported.columns.last().map(String::as_str), Some("Credit Note"));
    assert_eq!(exported.cell(0, column), &Cell::Bool(true));
}

#[test]
fn invalid_values_name_the_worksheet_row_after_blank_rows() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("gappy.xlsx");
    write_sheets(
        &sales,
        vec![(
            "Sheet1",
            vec!["Items", "Outlet", "TOTEL PURCHASE", "Total Profit"],
            vec![
                vec![T("Rice"), T("Salem"), N(100.0), N(5.0)],
                vec![],
                vec![T("Oil"), T("Salem"), T("abc"), N(1.0)],
            ],
        )],
    );

    let mut dashboard = Dashboard::new(Config::default());
    let err = dashboard
        .purchase(&SheetRequest::new(&sales), None, &FilterSet::default())
        .expect_err("bad value rejected");
    assert_eq!(
        err.to_string(),
        "invalid value 'abc' in column TOTEL PURCHASE at row 4"
    );
}

#[test]
fn non_finite_text_is_rejected() {
    let dir = tempdir().expect("temporary directory");
    let sales = dir.path().join("nan.xlsx");
    write_sheets(
        &sales,
        vec![(
            "Sheet1",
            vec!["Items", "Outlet", "TOTEL PURCHASE", "Total Profit"],
            vec![vec![T("Rice"), T("Salem"), T("NaN"), N(5.0)]],
        )],
    );

    let mut dashboard = Dashboard::new(Config::default());
    let err = dashboard
        .purchase(&SheetRequest::new(&sales), None, &FilterSet::default())
        .expect_err("NaN rejected");
    assert!(matches!(err, InsightsError::InvalidValue { row: 2, .. }));
}
