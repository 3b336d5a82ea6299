use colored::Colorize;

use crate::api::Backend;
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{get_gamify, GamifyStats};
use crate::tui::bar;

const BAR_WIDTH: usize = 30;

fn iq_label(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "Money Master",
        s if s >= 70.0 => "Smart Saver",
        _ => "Getting Started",
    }
}

pub fn format_gamify(stats: &GamifyStats) -> String {
    let mut out = vec!["Savings Quest".yellow().bold().to_string(), String::new()];

    out.push("Savings Goal".bold().to_string());
    out.push(format!(
        "  {} {:.0}%",
        bar(stats.progress_pct, 100.0, BAR_WIDTH).green(),
        stats.progress_pct
    ));
    out.push(format!(
        "  Saved {} of {} goal",
        money(stats.saved_so_far()),
        money(stats.goal)
    ));
    if stats.progress_pct >= 100.0 {
        out.push(
            format!(
                "  Goal reached with {} saved! Set a bigger one.",
                money(stats.actual_savings)
            )
            .green()
            .to_string(),
        );
    }
    out.push(String::new());

    out.push("Recurring Challenge".bold().to_string());
    if stats.recurring_cutbacks == 0 {
        out.push("  No recurring payments to cut back on.".to_string());
    } else {
        out.push(format!(
            "  Cancel or downgrade {} recurring payments worth {}",
            stats.recurring_cutbacks,
            money(stats.recurring_spend)
        ));
    }
    out.push(String::new());

    out.push("Financial IQ".bold().to_string());
    out.push(format!(
        "  {} {:.0}/100 \u{2022} {}",
        bar(stats.iq_score, 100.0, BAR_WIDTH).cyan(),
        stats.iq_score,
        iq_label(stats.iq_score)
    ));
    out.join("\n")
}

pub fn run(backend: &dyn Backend, user_id: &str) -> Result<String> {
    Ok(format_gamify(&get_gamify(&backend.insights(user_id)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::FakeBackend;
    use crate::models::{InsightsSummary, RecurringItem};

    #[test]
    fn test_gamify_fallback_savings() {
        colored::control::set_override(false);
        let out = run(&FakeBackend::default(), "u1").unwrap();
        assert!(out.contains("40%"));
        assert!(out.contains("Saved ₹800.00 of ₹2,000.00 goal"));
        assert!(out.contains("100/100"));
        assert!(out.contains("No recurring payments to cut back on."));
    }

    #[test]
    fn test_gamify_with_recurring() {
        colored::control::set_override(false);
        let backend = FakeBackend {
            insights: InsightsSummary {
                recurring: vec![
                    RecurringItem { amount: 199.0, name: Some("Spotify".into()) },
                    RecurringItem { amount: -499.0, name: None },
                ],
                savings_estimate: Some(3000.0),
            },
            ..Default::default()
        };
        let out = run(&backend, "u1").unwrap();
        assert!(out.contains("100%"));
        assert!(out.contains("Goal reached with ₹3,000.00 saved!"));
        assert!(out.contains("2 recurring payments worth ₹698.00"));
    }

    #[test]
    fn test_iq_labels() {
        assert_eq!(iq_label(100.0), "Money Master");
        assert_eq!(iq_label(75.0), "Smart Saver");
        assert_eq!(iq_label(55.0), "Getting Started");
    }
}
