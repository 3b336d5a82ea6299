use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::analytics::{self, is_anomalous, paginate, DateRange, Page, TxnFilter, TxnKind, PAGE_SIZE};
use crate::api::Backend;
use crate::browser::TransactionBrowser;
use crate::categories;
use crate::cli::{confirm_write, TransactionArgs};
use crate::error::{FinwizzError, Result};
use crate::fmt::{money, number};
use crate::models::{CategoryUpdate, HiddenSubscription, Transaction};

pub fn build_filter(args: &TransactionArgs) -> Result<TxnFilter> {
    Ok(TxnFilter {
        search: args.search.clone(),
        range: DateRange::parse(args.from_date.as_deref(), args.to_date.as_deref())?,
        kind: args.kind,
        category: args.category.clone(),
    })
}

/// Human-readable list of the active filters, empty when none are set.
pub fn describe_filter(args: &TransactionArgs) -> String {
    let mut parts = Vec::new();
    if let Some(s) = args.search.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("search: {s}"));
    }
    if let Some(from) = &args.from_date {
        parts.push(format!("from: {from}"));
    }
    if let Some(to) = &args.to_date {
        parts.push(format!("to: {to}"));
    }
    match args.kind {
        TxnKind::All => {}
        TxnKind::Debit => parts.push("debits".into()),
        TxnKind::Credit => parts.push("credits".into()),
    }
    if let Some(c) = &args.category {
        parts.push(format!("category: {c}"));
    }
    parts.join(", ")
}

pub fn format_page(page: &Page<Transaction>) -> String {
    if page.total_items == 0 {
        return "No transactions match.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["", "Date", "Description", "Amount", "Category"]);
    for t in &page.items {
        let flag = if is_anomalous(t) { "!".red().bold().to_string() } else { String::new() };
        let amount = if t.is_debit() {
            money(t.amount).red().to_string()
        } else {
            money(t.amount).green().to_string()
        };
        table.add_row(vec![
            Cell::new(flag),
            Cell::new(t.day_label()),
            Cell::new(&t.description),
            Cell::new(amount),
            Cell::new(t.category.as_deref().unwrap_or("\u{2014}")),
        ]);
    }
    format!(
        "{table}\nPage {} of {} ({} transactions)",
        page.number,
        page.total_pages,
        number(page.total_items)
    )
}

pub fn format_hidden_subscriptions(subs: &[HiddenSubscription]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Handle", "Amount", "Charges"]);
    for s in subs {
        table.add_row(vec![
            Cell::new(&s.handle),
            Cell::new(money(s.amount)),
            Cell::new(s.transactions.len()),
        ]);
    }
    format!("{}\n{table}", "Hidden Subscriptions".yellow().bold())
}

/// All transactions, oldest first, with the filter applied.
pub fn load(
    backend: &dyn Backend,
    user_id: &str,
    filter: &TxnFilter,
) -> Result<(Vec<Transaction>, Vec<HiddenSubscription>)> {
    let statements = backend.statements(user_id)?;
    let mut txns = statements.flatten();
    analytics::sort_by_date(&mut txns);
    Ok((filter.apply(&txns), statements.hidden_subscriptions()))
}

pub fn list(backend: &dyn Backend, user_id: &str, args: &TransactionArgs) -> Result<String> {
    let filter = build_filter(args)?;
    let (rows, subs) = load(backend, user_id, &filter)?;
    let mut out = format_page(&paginate(&rows, args.page, PAGE_SIZE));
    if !subs.is_empty() {
        out.push_str("\n\n");
        out.push_str(&format_hidden_subscriptions(&subs));
    }
    Ok(out)
}

pub fn run(backend: &dyn Backend, user_id: &str, args: &TransactionArgs) -> Result<()> {
    if args.browse {
        let filter = build_filter(args)?;
        let (rows, _) = load(backend, user_id, &filter)?;
        let mut browser = TransactionBrowser::new(rows, describe_filter(args));
        return browser.run(backend);
    }
    println!("{}", list(backend, user_id, args)?);
    Ok(())
}

/// Find the stored date of the one record in `upload_id` with this description
/// whose raw date or calendar day equals `date`.
pub fn stored_date(
    txns: &[Transaction],
    upload_id: &str,
    date: &str,
    description: &str,
) -> Result<String> {
    let date = date.trim();
    let mut found: Vec<&str> = txns
        .iter()
        .filter(|t| t.upload_id == upload_id && t.description == description)
        .filter(|t| t.date == date || t.day_label() == date)
        .map(|t| t.date.as_str())
        .collect();
    found.sort_unstable();
    found.dedup();
    match found.as_slice() {
        [] => Err(FinwizzError::Other(format!(
            "No transaction '{description}' on {date} in upload {upload_id}"
        ))),
        [raw] => Ok(raw.to_string()),
        many => Err(FinwizzError::Other(format!(
            "{} transactions '{description}' on {date} in upload {upload_id}; pass the exact date ({})",
            many.len(),
            many.join(" | ")
        ))),
    }
}

/// Resolve the category and the stored date, confirm, then send.
/// Unknown categories never reach the backend.
pub fn recategorize(
    backend: &dyn Backend,
    user_id: &str,
    update: CategoryUpdate,
    yes: bool,
) -> Result<String> {
    let category = categories::resolve(&update.category)?;
    let mut txns = backend.statements(user_id)?.flatten();
    let date = stored_date(&txns, &update.upload_id, &update.date, &update.description)?;
    confirm_write(
        &format!(
            "Set category of '{}' on {} (upload {}) to {category}.",
            update.description, date, update.upload_id
        ),
        yes,
    )?;
    let update = CategoryUpdate {
        category: category.to_string(),
        date,
        ..update
    };
    categories::update_category(backend, &mut txns, update)
}
