use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{FinwizzError, Result};
use crate::models::{Insights, Transaction};

/// Debits above this absolute amount are flagged.
pub const ANOMALY_LIMIT: f64 = 50_000.0;
/// Daily debits above this share of the busiest day are highlighted.
pub const THRESHOLD_RATIO: f64 = 0.75;
/// Slices below this share of the total are folded into "Others".
pub const MIN_SLICE_SHARE: f64 = 0.05;
pub const SAVINGS_TARGET: f64 = 0.20;
pub const PAGE_SIZE: usize = 10;
pub const OTHERS: &str = "Others";

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// Inclusive calendar-day range. Open ends match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let range = Self {
            from: from.map(parse_arg_date).transpose()?,
            to: to.map(parse_arg_date).transpose()?,
        };
        if let (Some(f), Some(t)) = (range.from, range.to) {
            if f > t {
                return Err(FinwizzError::Other(format!(
                    "--from {f} is after --to {t}"
                )));
            }
        }
        Ok(range)
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Transactions without a parseable date only match an open range.
    pub fn contains(&self, txn: &Transaction) -> bool {
        if self.is_open() {
            return true;
        }
        let Some(day) = txn.day() else {
            return false;
        };
        self.from.map_or(true, |f| day >= f) && self.to.map_or(true, |t| day <= t)
    }
}

fn parse_arg_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| FinwizzError::Other(format!("Invalid date '{s}', expected YYYY-MM-DD")))
}

pub fn filter_range(txns: &[Transaction], range: &DateRange) -> Vec<Transaction> {
    txns.iter().filter(|t| range.contains(t)).cloned().collect()
}

/// Stable sort by calendar day; unparseable dates sort first.
pub fn sort_by_date(txns: &mut [Transaction]) {
    txns.sort_by_key(|t| t.day());
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub debit: f64,
    pub credit: f64,
}

impl Totals {
    pub fn net(&self) -> f64 {
        self.credit - self.debit
    }

    /// Share of income kept. `None` when there is no income to compare against.
    pub fn savings_rate(&self) -> Option<f64> {
        (self.credit > 0.0).then(|| self.net() / self.credit)
    }

    pub fn within_income(&self) -> bool {
        self.debit <= self.credit
    }
}

pub fn totals(txns: &[Transaction]) -> Totals {
    txns.iter().fold(Totals::default(), |mut acc, t| {
        if t.is_debit() {
            acc.debit += t.amount.abs();
        } else {
            acc.credit += t.amount;
        }
        acc
    })
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub name: String,
    pub total: f64,
    pub count: usize,
}

/// Spend per category over debits, largest first, ties broken by name.
pub fn category_totals(txns: &[Transaction]) -> Vec<CategoryTotal> {
    let mut map: HashMap<&str, (f64, usize)> = HashMap::new();
    for t in txns.iter().filter(|t| t.is_debit()) {
        let entry = map.entry(t.category_or_default()).or_insert((0.0, 0));
        entry.0 += t.amount.abs();
        entry.1 += 1;
    }
    let mut items: Vec<CategoryTotal> = map
        .into_iter()
        .map(|(name, (total, count))| CategoryTotal {
            name: name.to_string(),
            total,
            count,
        })
        .collect();
    items.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    items
}

pub fn top_categories(totals: &[CategoryTotal], n: usize) -> Vec<CategoryTotal> {
    totals.iter().take(n).cloned().collect()
}

/// Fold every slice under `MIN_SLICE_SHARE` of the total into a single "Others" slice.
pub fn fold_small_slices(totals: &[CategoryTotal]) -> Vec<CategoryTotal> {
    let sum: f64 = totals.iter().map(|c| c.total).sum();
    if sum <= 0.0 {
        return totals.to_vec();
    }
    let (mut kept, small): (Vec<_>, Vec<_>) = totals
        .iter()
        .cloned()
        .partition(|c| c.total / sum >= MIN_SLICE_SHARE);
    if !small.is_empty() {
        kept.push(CategoryTotal {
            name: OTHERS.to_string(),
            total: small.iter().map(|c| c.total).sum(),
            count: small.iter().map(|c| c.count).sum(),
        });
    }
    kept
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    /// e.g. "Jan 2024"
    pub label: String,
    pub income: f64,
    pub expense: f64,
}

/// Income and expense per calendar month, oldest first.
pub fn monthly(txns: &[Transaction]) -> Vec<MonthBucket> {
    let mut map: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();
    for t in txns {
        let Some(day) = t.day() else { continue };
        let entry = map.entry((day.year(), day.month())).or_insert((0.0, 0.0));
        if t.is_debit() {
            entry.1 += t.amount.abs();
        } else {
            entry.0 += t.amount;
        }
    }
    map.into_iter()
        .filter_map(|((y, m), (income, expense))| {
            let first = NaiveDate::from_ymd_opt(y, m, 1)?;
            Some(MonthBucket {
                label: first.format("%b %Y").to_string(),
                income,
                expense,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPoint {
    /// `YYYY-MM-DD`
    pub day: String,
    pub value: f64,
}

/// Cumulative signed sum in date order, keeping the last value of each day.
pub fn running_balance(txns: &[Transaction]) -> Vec<DailyPoint> {
    let mut sorted = txns.to_vec();
    sort_by_date(&mut sorted);
    let mut points: Vec<DailyPoint> = Vec::new();
    let mut balance = 0.0;
    for t in &sorted {
        balance += t.amount;
        let day = t.day_label();
        match points.last_mut() {
            Some(last) if last.day == day => last.value = balance,
            _ => points.push(DailyPoint { day, value: balance }),
        }
    }
    points
}

/// Total absolute debit per day, oldest first.
pub fn daily_debits(txns: &[Transaction]) -> Vec<DailyPoint> {
    let mut map: BTreeMap<String, f64> = BTreeMap::new();
    for t in txns.iter().filter(|t| t.is_debit()) {
        *map.entry(t.day_label()).or_insert(0.0) += t.amount.abs();
    }
    map.into_iter()
        .map(|(day, value)| DailyPoint { day, value })
        .collect()
}

pub fn anomaly_threshold(daily: &[DailyPoint]) -> f64 {
    daily.iter().map(|p| p.value).fold(0.0, f64::max) * THRESHOLD_RATIO
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayFlow {
    pub day: String,
    pub income: f64,
    pub expense: f64,
}

/// Income and expense for the first `limit` days in date order.
pub fn daily_flows(txns: &[Transaction], limit: usize) -> Vec<DayFlow> {
    let mut map: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for t in txns {
        let entry = map.entry(t.day_label()).or_insert((0.0, 0.0));
        if t.is_debit() {
            entry.1 += t.amount.abs();
        } else {
            entry.0 += t.amount;
        }
    }
    map.into_iter()
        .take(limit)
        .map(|(day, (income, expense))| DayFlow { day, income, expense })
        .collect()
}

/// Backend-flagged heavy days, with `Value Date` normalised to a calendar day.
pub fn daily_anomaly_points(insights: Option<&Insights>) -> Vec<DailyPoint> {
    let Some(insights) = insights else {
        return Vec::new();
    };
    insights
        .daily_anomalies
        .iter()
        .filter_map(|a| {
            let day = crate::models::parse_day(&a.value_date)?;
            Some(DailyPoint {
                day: day.format("%Y-%m-%d").to_string(),
                value: a.total_debit,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Recurring payments
// ---------------------------------------------------------------------------

fn recurring_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)netflix|prime|hotstar|spotify|subscription|recurring|monthly").ok()
    })
    .as_ref()
}

pub fn is_recurring(description: &str) -> bool {
    recurring_pattern().is_some_and(|re| re.is_match(description))
}

/// Lower-case and drop everything outside `a-z`.
pub fn normalize_key(description: &str) -> String {
    description
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecurringGroup {
    pub key: String,
    /// First description seen for this key.
    pub label: String,
    pub count: usize,
    pub total: f64,
}

impl RecurringGroup {
    pub fn rarely_used(&self) -> bool {
        self.count <= 2
    }
}

/// Group recurring-looking transactions by normalised description, in first-seen order.
pub fn detect_recurring(txns: &[Transaction]) -> Vec<RecurringGroup> {
    let mut groups: Vec<RecurringGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for t in txns.iter().filter(|t| is_recurring(&t.description)) {
        let key = normalize_key(&t.description);
        match index.get(&key) {
            Some(&i) => {
                groups[i].count += 1;
                groups[i].total += t.amount.abs();
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(RecurringGroup {
                    key,
                    label: t.description.clone(),
                    count: 1,
                    total: t.amount.abs(),
                });
            }
        }
    }
    groups
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

/// Large debits, plus any zero-amount row.
pub fn is_anomalous(txn: &Transaction) -> bool {
    txn.amount == 0.0 || (txn.amount < 0.0 && txn.amount.abs() > ANOMALY_LIMIT)
}

/// Locally flagged transactions followed by the backend's debit anomalies.
pub fn flag_anomalies<'a>(
    txns: &[Transaction],
    insights: impl IntoIterator<Item = &'a Insights>,
) -> Vec<Transaction> {
    let mut flagged: Vec<Transaction> = txns.iter().filter(|t| is_anomalous(t)).cloned().collect();
    for i in insights {
        flagged.extend(i.anomalies.iter().filter(|t| t.is_debit()).cloned());
    }
    flagged
}

// ---------------------------------------------------------------------------
// Transaction list filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TxnKind {
    #[default]
    All,
    Debit,
    Credit,
}

#[derive(Debug, Clone, Default)]
pub struct TxnFilter {
    pub search: Option<String>,
    pub range: DateRange,
    pub kind: TxnKind,
    pub category: Option<String>,
}

impl TxnFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        let search_ok = match self.search.as_deref() {
            Some(s) if !s.is_empty() => txn
                .description
                .to_lowercase()
                .contains(&s.to_lowercase()),
            _ => true,
        };
        let kind_ok = match self.kind {
            TxnKind::All => true,
            TxnKind::Debit => txn.amount < 0.0,
            TxnKind::Credit => txn.amount > 0.0,
        };
        let category_ok = match self.category.as_deref() {
            Some(c) if !c.is_empty() => txn
                .category
                .as_deref()
                .is_some_and(|tc| tc.eq_ignore_ascii_case(c)),
            _ => true,
        };
        search_ok && kind_ok && category_ok && self.range.contains(txn)
    }

    pub fn apply(&self, txns: &[Transaction]) -> Vec<Transaction> {
        txns.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped into range.
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page).max(1);
    let number = page.clamp(1, total_pages);
    let start = (number - 1) * per_page;
    Page {
        items: items.iter().skip(start).take(per_page).cloned().collect(),
        number,
        total_pages,
        total_items: items.len(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn txn(date: &str, description: &str, amount: f64, category: Option<&str>) -> Transaction {
        Transaction {
            date: format!("{date}T00:00:00"),
            description: description.to_string(),
            amount,
            category: category.map(String::from),
            balance: None,
            serial: None,
            note: None,
            upload_id: "U1".to_string(),
        }
    }

    pub(crate) fn sample() -> Vec<Transaction> {
        vec![
            txn("2024-01-03", "Swiggy order", -450.0, Some("Food")),
            txn("2024-01-01", "NETFLIX.COM", -499.0, Some("Subscriptions")),
            txn("2024-01-02", "Salary Jan", 60000.0, Some("Salary")),
            txn("2024-01-02", "Zomato", -300.0, Some("Food")),
            txn("2024-02-01", "Netflix com", -499.0, Some("Subscriptions")),
            txn("2024-02-05", "Uber trip", -120.0, None),
            txn("2024-02-10", "Car down payment", -75000.0, Some("Travel")),
            txn("2024-02-11", "Reversal", 0.0, None),
        ]
    }

    #[test]
    fn test_totals_example() {
        let txns = vec![
            txn("2024-01-01", "a", -500.0, None),
            txn("2024-01-02", "b", 2000.0, None),
        ];
        let t = totals(&txns);
        assert_eq!(t.debit, 500.0);
        assert_eq!(t.credit, 2000.0);
        assert_eq!(t.net(), 1500.0);
        assert!(t.within_income());
        assert_eq!(t.savings_rate(), Some(0.75));
    }

    #[test]
    fn test_savings_rate_without_income() {
        let t = totals(&[txn("2024-01-01", "a", -10.0, None)]);
        assert_eq!(t.savings_rate(), None);
        assert!(!t.within_income());
    }

    #[test]
    fn test_category_totals_sum_to_total_debit() {
        let txns = sample();
        let cats = category_totals(&txns);
        let sum: f64 = cats.iter().map(|c| c.total).sum();
        assert!((sum - totals(&txns).debit).abs() < 1e-9);
        assert_eq!(cats[0].name, "Travel");
        assert!(cats.iter().any(|c| c.name == "Uncategorized" && c.total == 120.0));
        assert!(cats.iter().all(|c| c.name != "Salary"));
    }

    #[test]
    fn test_top_categories_tie_by_name() {
        let txns = vec![
            txn("2024-01-01", "x", -100.0, Some("Rent")),
            txn("2024-01-01", "y", -100.0, Some("Health")),
            txn("2024-01-01", "z", -50.0, Some("Food")),
        ];
        let top = top_categories(&category_totals(&txns), 2);
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Health", "Rent"]);
    }

    #[test]
    fn test_fold_small_slices() {
        let totals = vec![
            CategoryTotal { name: "Rent".into(), total: 900.0, count: 1 },
            CategoryTotal { name: "Food".into(), total: 70.0, count: 3 },
            CategoryTotal { name: "Health".into(), total: 30.0, count: 2 },
        ];
        let folded = fold_small_slices(&totals);
        assert_eq!(folded.len(), 3);
        assert_eq!(folded[1].name, "Food");
        assert_eq!(folded[2].name, OTHERS);
        let folded = fold_small_slices(&[
            totals[0].clone(),
            CategoryTotal { name: "Food".into(), total: 20.0, count: 1 },
            CategoryTotal { name: "Health".into(), total: 10.0, count: 1 },
        ]);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[1].name, OTHERS);
        assert_eq!(folded[1].total, 30.0);
        assert_eq!(folded[1].count, 2);
    }

    #[test]
    fn test_monthly_buckets_chronological() {
        let months = monthly(&sample());
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].label, "Jan 2024");
        assert_eq!(months[0].income, 60000.0);
        assert_eq!(months[0].expense, 1249.0);
        assert_eq!(months[1].label, "Feb 2024");
    }

    #[test]
    fn test_running_balance_ends_at_signed_sum() {
        let txns = sample();
        let points = running_balance(&txns);
        let sum: f64 = txns.iter().map(|t| t.amount).sum();
        assert!((points.last().unwrap().value - sum).abs() < 1e-9);
        assert_eq!(points[0].day, "2024-01-01");
        assert_eq!(points[0].value, -499.0);
        // two rows on 2024-01-02 collapse into one point
        assert_eq!(points[1].day, "2024-01-02");
        assert_eq!(points[1].value, -499.0 + 60000.0 - 300.0);
        assert_eq!(points.len(), 7);
    }

    #[test]
    fn test_daily_debits_and_threshold() {
        let daily = daily_debits(&sample());
        assert_eq!(daily.iter().find(|p| p.day == "2024-02-10").unwrap().value, 75000.0);
        assert_eq!(anomaly_threshold(&daily), 75000.0 * 0.75);
        assert_eq!(anomaly_threshold(&[]), 0.0);
    }

    #[test]
    fn test_daily_flows_limit() {
        let flows = daily_flows(&sample(), 3);
        assert_eq!(flows.len(), 3);
        assert_eq!(flows[0].day, "2024-01-01");
        assert_eq!(flows[1].income, 60000.0);
        assert_eq!(flows[1].expense, 300.0);
    }

    #[test]
    fn test_normalize_key_ignores_case_and_punctuation() {
        assert_eq!(normalize_key("NETFLIX.COM"), normalize_key("Netflix com"));
        assert_eq!(normalize_key("Spotify-123 Premium"), "spotifypremium");
    }

    #[test]
    fn test_detect_recurring_groups() {
        let groups = detect_recurring(&sample());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "NETFLIX.COM");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].total, 998.0);
        assert!(groups[0].rarely_used());
    }

    #[test]
    fn test_zero_amount_always_anomalous() {
        assert!(is_anomalous(&txn("2024-01-01", "x", 0.0, None)));
        assert!(is_anomalous(&txn("2024-01-01", "x", -50000.01, None)));
        assert!(!is_anomalous(&txn("2024-01-01", "x", -50000.0, None)));
        assert!(!is_anomalous(&txn("2024-01-01", "x", 90000.0, None)));
    }

    #[test]
    fn test_flag_anomalies_appends_backend_debits() {
        let insights = Insights {
            anomalies: vec![
                txn("2024-03-01", "ATM", -9000.0, None),
                txn("2024-03-02", "Refund", 9000.0, None),
            ],
            ..Default::default()
        };
        let flagged = flag_anomalies(&sample(), Some(&insights));
        let descs: Vec<&str> = flagged.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["Car down payment", "Reversal", "ATM"]);
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = DateRange::parse(Some("2024-01-02"), Some("2024-02-01")).unwrap();
        let kept = filter_range(&sample(), &range);
        assert_eq!(kept.len(), 4);
        assert!(DateRange::parse(Some("2024-02-01"), Some("2024-01-01")).is_err());
        assert!(DateRange::parse(Some("01/02/2024"), None).is_err());
    }

    #[test]
    fn test_txn_filter_combination() {
        let filter = TxnFilter {
            search: Some("netflix".into()),
            kind: TxnKind::Debit,
            ..Default::default()
        };
        assert_eq!(filter.apply(&sample()).len(), 2);

        let credits = TxnFilter { kind: TxnKind::Credit, ..Default::default() };
        assert_eq!(credits.apply(&sample()).len(), 1);

        let food = TxnFilter { category: Some("food".into()), ..Default::default() };
        assert_eq!(food.apply(&sample()).len(), 2);
    }

    #[test]
    fn test_paginate_clamps() {
        let items: Vec<usize> = (0..23).collect();
        let p = paginate(&items, 3, PAGE_SIZE);
        assert_eq!(p.items, vec![20, 21, 22]);
        assert_eq!(p.total_pages, 3);
        let p = paginate(&items, 99, PAGE_SIZE);
        assert_eq!(p.number, 3);
        let empty: Vec<usize> = Vec::new();
        let p = paginate(&empty, 1, PAGE_SIZE);
        assert_eq!(p.total_pages, 1);
        assert!(p.items.is_empty());
    }
}
