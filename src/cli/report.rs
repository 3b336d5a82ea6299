use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::api::Backend;
use crate::error::Result;
use crate::fmt::{money, number, percent};
use crate::reports::{
    self, FinancialReport, NO_ANOMALIES, NO_DATA, NO_RARELY_USED, NO_RECURRING,
};

pub const DEFAULT_PDF_NAME: &str = "financial_report.pdf";

fn section(title: &str) -> String {
    format!("\n{}", title.yellow().bold())
}

pub fn format_report(report: &FinancialReport) -> String {
    let mut out = vec!["Financial Report".bold().to_string()];

    out.push(section("Key Metrics"));
    let mut metrics = Table::new();
    metrics.set_header(vec!["Metric", "Value"]);
    metrics.add_row(vec![
        Cell::new("Total Transactions"),
        Cell::new(number(report.transaction_count)),
    ]);
    metrics.add_row(vec![
        Cell::new("Total Debit"),
        Cell::new(money(report.totals.debit).red().to_string()),
    ]);
    metrics.add_row(vec![
        Cell::new("Total Credit"),
        Cell::new(money(report.totals.credit).green().to_string()),
    ]);
    let net = report.totals.net();
    let net_text = if net >= 0.0 {
        money(net).green().bold()
    } else {
        money(net).red().bold()
    };
    metrics.add_row(vec![Cell::new("Net Balance Change".bold()), Cell::new(net_text)]);
    metrics.add_row(vec![
        Cell::new("Savings Target (20%)"),
        Cell::new(money(report.savings_target())),
    ]);
    out.push(metrics.to_string());

    out.push(section("Financial Health"));
    out.push(format!(
        "Spending vs income: {} {}",
        crate::tui::bar(report.spending_ratio(), 1.0, 30),
        percent(report.spending_ratio())
    ));
    let verdict = if report.totals.within_income() {
        report.spending_verdict().green()
    } else {
        report.spending_verdict().red()
    };
    out.push(verdict.to_string());
    out.push(report.savings_verdict());

    out.push(section("Rarely Used Subscriptions"));
    let rarely = report.rarely_used();
    if rarely.is_empty() {
        out.push(NO_RARELY_USED.to_string());
    } else {
        for g in rarely {
            out.push(format!("  \u{2022} {} (used {}x)", g.label, g.count));
        }
    }

    out.push(section("Summary"));
    out.push(textwrap::fill(&report.summary_paragraph(), crate::cli::text_width()));

    out.push(section("Top 5 Spending Categories"));
    let mut cats = Table::new();
    cats.set_header(vec!["Category", "Spent", "Count"]);
    for c in &report.top_categories {
        cats.add_row(vec![
            Cell::new(&c.name),
            Cell::new(money(c.total)),
            Cell::new(c.count),
        ]);
    }
    out.push(cats.to_string());

    out.push(section("Monthly Earnings vs Expenses"));
    let mut months = Table::new();
    months.set_header(vec!["Month", "Income", "Expenses", "Net"]);
    for m in &report.months {
        months.add_row(vec![
            Cell::new(&m.label),
            Cell::new(money(m.income).green().to_string()),
            Cell::new(money(m.expense).red().to_string()),
            Cell::new(money(m.income - m.expense)),
        ]);
    }
    out.push(months.to_string());

    out.push(section("Recurring Payments"));
    if report.recurring.is_empty() {
        out.push(NO_RECURRING.to_string());
    } else {
        let mut rec = Table::new();
        rec.set_header(vec!["Payment", "Times", "Total"]);
        for g in &report.recurring {
            rec.add_row(vec![
                Cell::new(&g.label),
                Cell::new(g.count),
                Cell::new(money(g.total)),
            ]);
        }
        out.push(rec.to_string());
    }

    out.push(section("Anomalies"));
    if report.anomalies.is_empty() {
        out.push(NO_ANOMALIES.to_string());
    } else {
        let mut anomalies = Table::new();
        anomalies.set_header(vec!["Date", "Description", "Amount"]);
        for t in &report.anomalies {
            anomalies.add_row(vec![
                Cell::new(t.day_label()),
                Cell::new(&t.description),
                Cell::new(money(t.amount).red().to_string()),
            ]);
        }
        out.push(anomalies.to_string());
    }

    out.join("\n")
}

/// Printable report, or the no-data line when nothing was uploaded.
pub fn text(backend: &dyn Backend, user_id: &str) -> Result<String> {
    let statements = backend.statements(user_id)?;
    Ok(match reports::get_report(&statements) {
        Some(report) => format_report(&report),
        None => NO_DATA.to_string(),
    })
}

pub fn run(backend: &dyn Backend, user_id: &str, pdf: bool, output: Option<PathBuf>) -> Result<()> {
    if pdf || output.is_some() {
        let path = export_pdf(backend, user_id, output)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    println!("{}", text(backend, user_id)?);
    Ok(())
}

#[cfg(feature = "pdf")]
pub fn export_pdf(backend: &dyn Backend, user_id: &str, output: Option<PathBuf>) -> Result<PathBuf> {
    let statements = backend.statements(user_id)?;
    let report = reports::get_report(&statements)
        .ok_or_else(|| crate::error::FinwizzError::Other(NO_DATA.into()))?;
    let bytes = crate::pdf::render_report(&report, user_id)?;
    let path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_PDF_NAME));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), "report exported");
    Ok(path)
}

#[cfg(not(feature = "pdf"))]
pub fn export_pdf(
    _backend: &dyn Backend,
    _user_id: &str,
    _output: Option<PathBuf>,
) -> Result<PathBuf> {
    Err(crate::error::FinwizzError::Other(
        "PDF export requires the 'pdf' feature".into(),
    ))
}
