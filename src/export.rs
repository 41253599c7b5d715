//! Spreadsheet and printable report output.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::aggregate;
use crate::error::Result;
use crate::models::{DateRange, ExpenseEntry, IncomeEntry};

pub const SHEET_INCOME: &str = "Income";
pub const SHEET_EXPENSES: &str = "Expenses";
pub const SHEET_SUMMARY: &str = "Summary";

pub const EMPTY_NOTE: &str = "(no details)";

/// Format a Decimal as BRL (e.g., 1234.5 -> "R$ 1.234,50")
pub fn format_brl(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let is_negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if is_negative {
        format!("-R$ {},{}", grouped, frac_part)
    } else {
        format!("R$ {},{}", grouped, frac_part)
    }
}

/// Entries selected for a report, already filtered to `range`.
#[derive(Debug, Clone)]
pub struct Report<'a> {
    pub range: DateRange,
    pub generated_at: DateTime<Local>,
    pub income: &'a [IncomeEntry],
    pub expenses: &'a [ExpenseEntry],
}

impl Report<'_> {
    fn stem(&self) -> String {
        format!("carwash-report-{}", self.generated_at.format("%Y%m%d-%H%M%S"))
    }
}

#[derive(Serialize)]
struct IncomeRow<'a> {
    date: String,
    service: &'a str,
    vehicle_size: String,
    payment_method: String,
    amount: Decimal,
}

#[derive(Serialize)]
struct ExpenseRow<'a> {
    date: String,
    note: &'a str,
    amount: Decimal,
}

#[derive(Serialize)]
struct SummaryRow {
    metric: &'static str,
    value: String,
}

impl SummaryRow {
    fn new(metric: &'static str, value: impl ToString) -> Self {
        Self {
            metric,
            value: value.to_string(),
        }
    }
}

fn local_datetime(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Write the workbook as a directory with one CSV per sheet. Returns the
/// workbook directory.
pub fn export_workbook(dir: &Path, report: &Report) -> Result<PathBuf> {
    let workbook = dir.join(report.stem());
    fs::create_dir_all(&workbook)?;

    let mut wtr = csv::Writer::from_path(workbook.join(format!("{SHEET_INCOME}.csv")))?;
    for entry in report.income {
        wtr.serialize(IncomeRow {
            date: local_datetime(entry.timestamp),
            service: &entry.service_type,
            vehicle_size: entry.vehicle_size.to_string(),
            payment_method: entry.payment_method.to_string(),
            amount: entry.amount,
        })?;
    }
    wtr.flush()?;

    let mut wtr = csv::Writer::from_path(workbook.join(format!("{SHEET_EXPENSES}.csv")))?;
    for entry in report.expenses {
        wtr.serialize(ExpenseRow {
            date: local_datetime(entry.timestamp),
            note: &entry.note,
            amount: entry.amount,
        })?;
    }
    wtr.flush()?;

    let summary = aggregate::report_summary(report.income, report.expenses);
    let rows = [
        SummaryRow::new("Period", report.range.title()),
        SummaryRow::new("Generated", report.generated_at.format("%Y-%m-%d %H:%M")),
        SummaryRow::new("Washes", summary.income_count),
        SummaryRow::new("Average ticket", summary.average_ticket),
        SummaryRow::new("Total income", summary.totals.total_income),
        SummaryRow::new("Expenses", summary.expense_count),
        SummaryRow::new("Total expenses", summary.totals.total_expenses),
        SummaryRow::new("Profit", summary.totals.profit),
    ];
    let mut wtr = csv::Writer::from_path(workbook.join(format!("{SHEET_SUMMARY}.csv")))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    tracing::info!(path = %workbook.display(), "Exported workbook");
    Ok(workbook)
}

/// Plain-text statement laid out for printing.
pub fn render_statement(report: &Report) -> String {
    let summary = aggregate::report_summary(report.income, report.expenses);
    let rule = "=".repeat(72);
    let thin = "-".repeat(72);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "CAR WASH - GENERAL STATEMENT");
    let _ = writeln!(
        out,
        "Period: {}    Generated: {}",
        report.range.title(),
        report.generated_at.format("%d/%m/%Y %H:%M")
    );
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Washes:         {:>12}", summary.income_count);
    let _ = writeln!(out, "Average ticket: {:>20}", format_brl(summary.average_ticket));
    let _ = writeln!(out, "Total income:   {:>20}", format_brl(summary.totals.total_income));
    let _ = writeln!(out, "Total expenses: {:>20}", format_brl(summary.totals.total_expenses));
    let _ = writeln!(out);

    let _ = writeln!(out, "INCOME DETAIL");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(
        out,
        "{:<17} {:<28} {:<8} {:>16}",
        "Date/Time", "Service", "Payment", "Amount"
    );
    for entry in report.income {
        let service = format!("{} ({})", entry.service_type, entry.vehicle_size);
        let _ = writeln!(
            out,
            "{:<17} {:<28} {:<8} {:>16}",
            local_datetime(entry.timestamp),
            truncate(&service, 28),
            entry.payment_method,
            format_brl(entry.amount)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "EXPENSE DETAIL");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(out, "{:<17} {:<37} {:>16}", "Date", "Note", "Amount");
    for entry in report.expenses {
        let note = if entry.note.is_empty() { EMPTY_NOTE } else { &entry.note };
        let _ = writeln!(
            out,
            "{:<17} {:<37} {:>16}",
            local_datetime(entry.timestamp),
            truncate(note, 37),
            format_brl(entry.amount)
        );
    }
    let _ = writeln!(out);

    let status = if summary.totals.profit >= Decimal::ZERO {
        "SURPLUS"
    } else {
        "DEFICIT"
    };
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "OPERATING RESULT: {}  [{}]",
        format_brl(summary.totals.profit),
        status
    );
    let _ = writeln!(out, "{rule}");
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Write the printable statement next to the workbooks.
pub fn write_statement(dir: &Path, report: &Report) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.txt", report.stem()));
    fs::write(&path, render_statement(report))?;
    tracing::info!(path = %path.display(), "Wrote printable statement");
    Ok(path)
}
