use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::api::{check_extension, Backend};
use crate::error::Result;
use crate::fmt::{money, number};
use crate::models::{ParseResponse, StatementsResponse, UserSummary};
use crate::reports::NO_DATA;

/// Rows shown per upload in the statement listing.
pub const PREVIEW_ROWS: usize = 20;

pub fn format_summary(summary: &UserSummary) -> String {
    if summary.total_uploads == 0 && summary.total_transactions == 0 {
        return NO_DATA.to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        Cell::new("Total Debit"),
        Cell::new(money(summary.total_debit).red().to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Total Credit"),
        Cell::new(money(summary.total_credit).green().to_string()),
    ]);
    let savings = summary.savings();
    let savings_text = if savings >= 0.0 {
        money(savings).green().bold()
    } else {
        money(savings).red().bold()
    };
    table.add_row(vec![Cell::new("Savings".bold()), Cell::new(savings_text)]);
    table.add_row(vec![
        Cell::new("Transactions"),
        Cell::new(number(summary.total_transactions)),
    ]);
    table.add_row(vec![Cell::new("Uploads"), Cell::new(number(summary.total_uploads))]);
    format!("Account Summary\n{table}")
}

pub fn format_statements(statements: &StatementsResponse) -> String {
    if statements.uploads.is_empty() {
        return "No statements uploaded yet. Run `finwizz upload <file>`.".to_string();
    }
    let mut out = Vec::new();
    for upload in &statements.uploads {
        let name = upload.filename.as_deref().unwrap_or("(unnamed)");
        let when = upload.uploaded_at.as_deref().unwrap_or("unknown date");
        out.push(format!(
            "{} {}  [{}]  uploaded {}",
            "Statement".bold(),
            name,
            upload.id,
            when
        ));

        let mut table = Table::new();
        table.set_header(vec!["Date", "Description", "Amount", "Category", "Balance"]);
        for t in upload.data.iter().take(PREVIEW_ROWS) {
            let amount = if t.is_debit() {
                money(t.amount).red().to_string()
            } else {
                money(t.amount).green().to_string()
            };
            table.add_row(vec![
                Cell::new(t.day_label()),
                Cell::new(&t.description),
                Cell::new(amount),
                Cell::new(t.category.as_deref().unwrap_or("\u{2014}")),
                Cell::new(t.balance.map(money).unwrap_or_default()),
            ]);
        }
        out.push(table.to_string());
        let total = upload.data.len();
        out.push(format!(
            "Showing {} of {} transactions",
            total.min(PREVIEW_ROWS),
            number(total)
        ));
        out.push(String::new());
    }
    out.join("\n").trim_end().to_string()
}

pub fn format_upload(file: &Path, resp: &ParseResponse) -> String {
    let mut lines = vec![resp
        .message
        .clone()
        .unwrap_or_else(|| format!("Uploaded {}", file.display()))];
    if let Some(id) = &resp.upload_id {
        lines.push(format!("Upload id:    {id}"));
    }
    if let Some(count) = resp.count {
        lines.push(format!("Transactions: {}", number(count)));
    }
    if let Some(insights) = &resp.insights {
        if !insights.hidden_subscriptions.is_empty() {
            lines.push(format!(
                "Hidden subscriptions found: {}",
                insights.hidden_subscriptions.len()
            ));
        }
        if !insights.daily_anomalies.is_empty() {
            lines.push(format!("Heavy-spend days: {}", insights.daily_anomalies.len()));
        }
    }
    lines.join("\n")
}

pub fn summary(backend: &dyn Backend, user_id: &str) -> Result<String> {
    Ok(format_summary(&backend.summary(user_id)?))
}

pub fn statements(backend: &dyn Backend, user_id: &str) -> Result<String> {
    Ok(format_statements(&backend.statements(user_id)?))
}

/// Extension is checked before anything is sent.
pub fn upload(backend: &dyn Backend, user_id: &str, file: &Path) -> Result<String> {
    check_extension(file)?;
    let resp = backend.upload(user_id, file)?;
    Ok(format_upload(file, &resp))
}

pub fn enrich(backend: &dyn Backend, upload_id: &str) -> Result<String> {
    backend.enrich(upload_id.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::sample;
    use crate::api::tests::FakeBackend;
    use crate::models::Upload;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_summary_table() {
        plain();
        let backend = FakeBackend {
            summary: UserSummary {
                total_uploads: 2,
                total_transactions: 1234,
                total_debit: 500.0,
                total_credit: 2000.0,
            },
            ..Default::default()
        };
        let out = summary(&backend, "u1").unwrap();
        assert!(out.contains("₹1,500.00"));
        assert!(out.contains("1,234"));
    }

    #[test]
    fn test_summary_empty() {
        let out = summary(&FakeBackend::default(), "u1").unwrap();
        assert_eq!(out, NO_DATA);
    }

    #[test]
    fn test_statements_preview_caps_rows() {
        plain();
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend(sample());
        }
        let backend = FakeBackend::with_uploads(vec![Upload {
            id: "U1".into(),
            filename: Some("jan.csv".into()),
            data,
            ..Default::default()
        }]);
        let out = statements(&backend, "u1").unwrap();
        assert!(out.contains("jan.csv"));
        assert!(out.contains("Showing 20 of 24 transactions"));
    }

    #[test]
    fn test_statements_empty() {
        let out = statements(&FakeBackend::default(), "u1").unwrap();
        assert!(out.starts_with("No statements uploaded yet"));
    }

    #[test]
    fn test_upload_rejects_extension_first() {
        let backend = FakeBackend::default();
        assert!(upload(&backend, "u1", Path::new("notes.txt")).is_err());
        let out = upload(&backend, "u1", Path::new("jan.PDF")).unwrap();
        assert!(out.contains("Upload id:    new"));
    }

    #[test]
    fn test_enrich_passes_message_through() {
        let out = enrich(&FakeBackend::default(), " U9 ").unwrap();
        assert_eq!(out, "Transactions enriched for upload U9");
    }
}
