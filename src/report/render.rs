use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Cell, SheetTable};

use super::{Chart, GroupedBarChart, RankedBarChart, Report};

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

/// Plain-text rendering: metric cards, ASCII bars and an aligned table.
pub fn render_text(report: &Report) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, report)?;
    Ok(out)
}

fn write_report(out: &mut String, report: &Report) -> fmt::Result {
    writeln!(out, "{}", report.title)?;
    writeln!(out, "{}", "=".repeat(report.title.chars().count()))?;

    for notice in &report.notices {
        writeln!(out, "! {notice}")?;
    }

    if !report.metrics.is_empty() {
        out.push('\n');
        let width = report
            .metrics
            .iter()
            .map(|card| card.label.chars().count())
            .max()
            .unwrap_or(0);
        for card in &report.metrics {
            writeln!(out, "{:<width$}  {:>14}", card.label, format_amount(card.value, 0))?;
        }
    }

    for chart in &report.charts {
        out.push('\n');
        match chart {
            Chart::Ranked(chart) => write_ranked(out, chart)?,
            Chart::Grouped(chart) => write_grouped(out, chart)?,
        }
    }

    out.push('\n');
    write_table(out, &report.table)
}

fn write_ranked(out: &mut String, chart: &RankedBarChart) -> fmt::Result {
    writeln!(out, "{} ({})", chart.title, chart.value_label)?;
    let label_width = label_width(chart.bars.iter().map(|bar| bar.label.as_str()));
    let scale = max_abs(chart.bars.iter().map(|bar| bar.value));
    for bar in &chart.bars {
        write!(
            out,
            "  {:<label_width$} {:<BAR_WIDTH$} {:>12}",
            bar.label,
            bar_glyphs(bar.value, scale),
            format_amount(bar.value, 0)
        )?;
        if let Some(secondary) = bar.secondary {
            write!(out, "  ({})", format_amount(secondary, 0))?;
        }
        out.push('\n');
    }
    Ok(())
}

fn write_grouped(out: &mut String, chart: &GroupedBarChart) -> fmt::Result {
    writeln!(out, "{}", chart.title)?;
    let label_width = label_width(chart.categories.iter().map(|bar| bar.label.as_str()));
    let series_width = label_width_of(&chart.series);
    let scale = max_abs(chart.categories.iter().flat_map(|bar| bar.values.iter().copied()));
    for category in &chart.categories {
        for (index, (series, value)) in chart.series.iter().zip(&category.values).enumerate() {
            let label = if index == 0 { category.label.as_str() } else { "" };
            writeln!(
                out,
                "  {:<label_width$} {:<series_width$} {:<BAR_WIDTH$} {:>12}",
                label,
                series,
                bar_glyphs(*value, scale),
                format_amount(*value, 0)
            )?;
        }
    }
    Ok(())
}

fn write_table(out: &mut String, table: &SheetTable) -> fmt::Result {
    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            (0..table.columns.len())
                .map(|column| format_cell(row.get(column).unwrap_or(&Cell::Empty)))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(column, header)| {
            rendered
                .iter()
                .map(|row| row[column].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(name, width)| format!("{name:<width$}"))
        .collect();
    writeln!(out, "{}", header.join(" | ").trim_end())?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(out, "{}", rule.join("-+-"))?;

    for (row_idx, row) in rendered.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(column, (value, width))| {
                if matches!(table.cell(row_idx, column), Cell::Number(_)) {
                    format!("{value:>width$}")
                } else {
                    format!("{value:<width$}")
                }
            })
            .collect();
        writeln!(out, "{}", cells.join(" | ").trim_end())?;
    }
    writeln!(out, "({} rows)", table.len())
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(value) => value.clone(),
        Cell::Number(value) => format_amount(*value, 2),
        Cell::Bool(true) => "yes".to_string(),
        Cell::Bool(false) => "no".to_string(),
    }
}

fn label_width<'a>(labels: impl Iterator<Item = &'a str>) -> usize {
    labels.map(|label| label.chars().count()).max().unwrap_or(0)
}

fn label_width_of(labels: &[String]) -> usize {
    label_width(labels.iter().map(String::as_str))
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.map(f64::abs).fold(0.0, f64::max)
}

fn bar_glyphs(value: f64, scale: f64) -> String {
    if scale <= 0.0 {
        return String::new();
    }
    let length = ((value.abs() / scale) * BAR_WIDTH as f64).round() as usize;
    let glyph = if value < 0.0 { '-' } else { '#' };
    std::iter::repeat_n(glyph, length.min(BAR_WIDTH)).collect()
}

/// Formats a number with thousands separators, e.g. `1234567.891` with two
/// decimals becomes `1,234,567.89`.
pub fn format_amount(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && formatted.chars().any(|ch| ch != '0' && ch != '.');
    let mut result = String::new();
    if negative {
        result.push('-');
    }
    result.push_str(&grouped);
    if let Some(fraction) = fraction {
        result.push('.');
        result.push_str(fraction);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Bar, MetricCard};

    #[test]
    fn amounts_get_thousands_separators() {
        assert_eq!(format_amount(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(format_amount(-1500.0, 0), "-1,500");
        assert_eq!(format_amount(999.0, 0), "999");
        assert_eq!(format_amount(-0.001, 2), "0.00");
        assert_eq!(format_amount(0.0, 0), "0");
    }

    #[test]
    fn bars_scale_to_the_largest_value() {
        assert_eq!(bar_glyphs(50.0, 100.0).len(), BAR_WIDTH / 2);
        assert_eq!(bar_glyphs(-100.0, 100.0), "-".repeat(BAR_WIDTH));
        assert_eq!(bar_glyphs(5.0, 0.0), "");
    }

    #[test]
    fn text_report_lists_metrics_charts_and_rows() {
        let mut table = SheetTable::new("Rows", vec!["Items".into(), "Total Sales".into()]);
        table.push_row(vec![Cell::from("Rice"), Cell::Number(1200.0)]);
        let mut report = Report::new("Sales", table);
        report.metrics.push(MetricCard::new("Total Sales", 1200.0));
        report.charts.push(Chart::Ranked(RankedBarChart {
            title: "Top Items".into(),
            value_label: "Total Sales".into(),
            bars: vec![Bar {
                label: "Rice".into(),
                value: 1200.0,
                secondary: Some(-20.0),
            }],
        }));

        let text = render_text(&report).expect("text rendered");
        assert!(text.starts_with("Sales\n=====\n"));
        assert!(text.contains("Total Sales  "));
        assert!(text.contains("Top Items (Total Sales)"));
        assert!(text.contains("(-20)"));
        assert!(text.contains("Rice  |    1,200.00"));
        assert!(text.ends_with("(1 rows)\n"));
    }

    #[test]
    fn json_output_tags_charts() {
        let mut report = Report::new("Empty", SheetTable::new("Rows", vec!["Items".into()]));
        report.charts.push(Chart::Grouped(GroupedBarChart {
            title: "Compare".into(),
            series: vec!["A".into()],
            categories: Vec::new(),
        }));
        let json = render(&report, OutputFormat::Json).expect("json rendered");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["charts"][0]["kind"], "grouped");
        assert_eq!(value["title"], "Empty");
    }
}
