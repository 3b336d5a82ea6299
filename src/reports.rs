use crate::analytics::{
    self, CategoryTotal, DailyPoint, DateRange, DayFlow, MonthBucket, RecurringGroup, Totals,
    SAVINGS_TARGET,
};
use crate::fmt::money;
use crate::models::{HiddenSubscription, InsightsSummary, StatementsResponse, Transaction};

pub const NO_DATA: &str = "No data available.";
pub const NO_RECURRING: &str = "No recurring payments detected.";
pub const NO_ANOMALIES: &str = "No major debit anomalies found.";
pub const NO_RARELY_USED: &str = "No rarely used subscriptions found.";

// ---------------------------------------------------------------------------
// Financial report
// ---------------------------------------------------------------------------

pub struct FinancialReport {
    pub transaction_count: usize,
    pub totals: Totals,
    pub top_categories: Vec<CategoryTotal>,
    pub months: Vec<MonthBucket>,
    pub recurring: Vec<RecurringGroup>,
    pub anomalies: Vec<Transaction>,
}

/// `None` when the user has no uploads at all.
pub fn get_report(statements: &StatementsResponse) -> Option<FinancialReport> {
    if statements.uploads.is_empty() {
        return None;
    }
    let txns = statements.flatten();

    let anomalies = analytics::flag_anomalies(
        &txns,
        statements.uploads.iter().filter_map(|u| u.insights.as_ref()),
    );

    Some(FinancialReport {
        transaction_count: txns.len(),
        totals: analytics::totals(&txns),
        top_categories: analytics::top_categories(&analytics::category_totals(&txns), 5),
        months: analytics::monthly(&txns),
        recurring: analytics::detect_recurring(&txns),
        anomalies,
    })
}

impl FinancialReport {
    pub fn rarely_used(&self) -> Vec<&RecurringGroup> {
        self.recurring.iter().filter(|g| g.rarely_used()).collect()
    }

    pub fn savings_target(&self) -> f64 {
        self.totals.credit * SAVINGS_TARGET
    }

    /// Spending as a share of income, capped at 100%.
    pub fn spending_ratio(&self) -> f64 {
        if self.totals.credit > 0.0 {
            (self.totals.debit / self.totals.credit).min(1.0)
        } else if self.totals.debit > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    pub fn spending_verdict(&self) -> &'static str {
        if self.totals.within_income() {
            "You are spending within your income."
        } else {
            "You are overspending beyond your income!"
        }
    }

    pub fn savings_verdict(&self) -> String {
        match self.totals.savings_rate() {
            Some(rate) if rate < SAVINGS_TARGET => {
                format!("Savings rate {:.1}% (below recommended 20%)", rate * 100.0)
            }
            Some(rate) => format!("Savings rate {:.1}% (good!)", rate * 100.0),
            None => "Savings rate unavailable (no income recorded)".to_string(),
        }
    }

    pub fn summary_paragraph(&self) -> String {
        format!(
            "A total of {} transactions were recorded. The total amount spent (debit) is {} \
             and the total received (credit) is {}. Net balance change: {}.",
            self.transaction_count,
            money(self.totals.debit),
            money(self.totals.credit),
            money(self.totals.net()),
        )
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub const DASHBOARD_DAYS: usize = 7;

pub struct Dashboard {
    /// The range actually applied, widened to the data when open.
    pub range: DateRange,
    pub transaction_count: usize,
    pub totals: Totals,
    pub daily_flows: Vec<DayFlow>,
    pub categories: Vec<CategoryTotal>,
    pub balance: Vec<DailyPoint>,
    pub daily_debits: Vec<DailyPoint>,
    pub threshold: f64,
    /// Heavy days reported by the backend, limited to the range.
    pub flagged_days: Vec<DailyPoint>,
    pub hidden_subscriptions: Vec<HiddenSubscription>,
}

impl Dashboard {
    pub fn is_spike(&self, point: &DailyPoint) -> bool {
        point.value > self.threshold
            || self.flagged_days.iter().any(|d| d.day == point.day)
    }
}

/// Open ends of `range` default to the earliest and latest transaction day.
pub fn effective_range(txns: &[Transaction], range: DateRange) -> DateRange {
    let days: Vec<_> = txns.iter().filter_map(|t| t.day()).collect();
    DateRange {
        from: range.from.or_else(|| days.iter().min().copied()),
        to: range.to.or_else(|| days.iter().max().copied()),
    }
}

pub fn get_dashboard(statements: &StatementsResponse, range: DateRange) -> Dashboard {
    let all = statements.flatten();
    let range = effective_range(&all, range);
    let mut txns = analytics::filter_range(&all, &range);
    analytics::sort_by_date(&mut txns);

    let daily_debits = analytics::daily_debits(&txns);
    let threshold = analytics::anomaly_threshold(&daily_debits);
    let in_range = |day: &str| {
        crate::models::parse_day(day).is_some_and(|d| {
            range.from.map_or(true, |f| d >= f) && range.to.map_or(true, |t| d <= t)
        })
    };
    let flagged_days = statements
        .uploads
        .iter()
        .flat_map(|u| analytics::daily_anomaly_points(u.insights.as_ref()))
        .filter(|p| in_range(&p.day))
        .collect();

    Dashboard {
        range,
        transaction_count: txns.len(),
        totals: analytics::totals(&txns),
        daily_flows: analytics::daily_flows(&txns, DASHBOARD_DAYS),
        categories: analytics::fold_small_slices(&analytics::category_totals(&txns)),
        balance: analytics::running_balance(&txns),
        daily_debits,
        threshold,
        flagged_days,
        hidden_subscriptions: statements.hidden_subscriptions(),
    }
}

// ---------------------------------------------------------------------------
// Gamify
// ---------------------------------------------------------------------------

pub const SAVINGS_GOAL: f64 = 2000.0;
/// Assumed savings when the backend has no estimate.
pub const FALLBACK_SAVINGS: f64 = 800.0;

pub struct GamifyStats {
    pub goal: f64,
    pub actual_savings: f64,
    pub progress_pct: f64,
    pub recurring_cutbacks: usize,
    pub recurring_spend: f64,
    pub iq_score: f64,
}

impl GamifyStats {
    /// Amount shown as "saved so far", derived from the capped progress.
    pub fn saved_so_far(&self) -> f64 {
        self.progress_pct / 100.0 * self.goal
    }
}

pub fn get_gamify(insights: &InsightsSummary) -> GamifyStats {
    let actual_savings = match insights.savings_estimate {
        Some(s) if s != 0.0 && s.is_finite() => s,
        _ => FALLBACK_SAVINGS,
    };
    GamifyStats {
        goal: SAVINGS_GOAL,
        actual_savings,
        progress_pct: (actual_savings / SAVINGS_GOAL * 100.0).min(100.0),
        recurring_cutbacks: insights.recurring.len(),
        recurring_spend: insights.recurring.iter().map(|r| r.amount.abs()).sum(),
        iq_score: 50.0 + (actual_savings / 10.0).min(50.0),
    }
}
