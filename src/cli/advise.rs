use colored::Colorize;

use crate::advisor::{
    self, AdviceRequest, ChartKind, ChatModel, ADVICE_SAMPLING,
};
use crate::analytics;
use crate::api::Backend;
use crate::error::Result;
use crate::markdown;
use crate::reports::NO_DATA;

/// Build the advisory prompt from the user's history and return the rendered answer.
pub fn advise(
    backend: &dyn Backend,
    model: &dyn ChatModel,
    user_id: &str,
    request: &AdviceRequest,
    width: usize,
) -> Result<String> {
    request.validate()?;
    let txns = backend.statements(user_id)?.flatten();
    let prompt = advisor::advisory_prompt(&txns, request)?;
    let answer = model.complete(&prompt, ADVICE_SAMPLING)?;
    Ok(format!(
        "{}\n\n{}",
        "Financial Advice".yellow().bold(),
        markdown::render(&answer, width)
    ))
}

/// Explain one chart. Model failures degrade to the fixed apology line.
pub fn explain(
    backend: &dyn Backend,
    model: &dyn ChatModel,
    user_id: &str,
    chart: ChartKind,
    width: usize,
) -> Result<String> {
    let txns = backend.statements(user_id)?.flatten();
    if txns.is_empty() {
        return Ok(NO_DATA.to_string());
    }
    let data = match chart {
        ChartKind::Balance => advisor::balance_series(&analytics::running_balance(&txns)),
        ChartKind::Category => advisor::category_series(&analytics::category_totals(&txns)),
    };
    let title = match chart {
        ChartKind::Balance => "Balance Trend",
        ChartKind::Category => "Spending by Category",
    };
    Ok(format!(
        "{}\n\n{}",
        title.yellow().bold(),
        markdown::render(&advisor::explain(model, chart, &data), width)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::tests::FakeModel;
    use crate::advisor::{RiskAppetite, EXPLAIN_FALLBACK, EXPLAIN_SAMPLING};
    use crate::analytics::tests::sample;
    use crate::api::tests::FakeBackend;
    use crate::models::Upload;

    fn backend() -> FakeBackend {
        FakeBackend::with_uploads(vec![Upload {
            id: "U1".into(),
            data: sample(),
            ..Default::default()
        }])
    }

    #[test]
    fn test_advise_renders_markdown_answer() {
        colored::control::set_override(false);
        let model = FakeModel::replying("## Plan\n- Cut <b>Netflix</b>");
        let request = AdviceRequest {
            goal: Some("buy a bike".into()),
            risk: Some(RiskAppetite::Low),
            question: None,
        };
        let out = advise(&backend(), &model, "u1", &request, 80).unwrap();
        assert!(out.contains("Plan"));
        assert!(out.contains("• Cut **Netflix**") || out.contains("• Cut Netflix"));

        let prompts = model.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("My goal is to buy a bike."));
        assert!(prompts[0].0.contains("Swiggy order"));
        assert_eq!(prompts[0].1, ADVICE_SAMPLING);
    }

    #[test]
    fn test_advise_requires_goal_or_question() {
        let model = FakeModel::replying("unused");
        let err = advise(&backend(), &model, "u1", &AdviceRequest::default(), 80);
        assert!(err.is_err());
        assert!(model.prompts.borrow().is_empty());
    }

    #[test]
    fn test_advise_model_failure_is_reported() {
        let model = FakeModel {
            reply: None,
            prompts: Default::default(),
        };
        let request = AdviceRequest {
            question: Some("Where does my money go?".into()),
            ..Default::default()
        };
        assert!(advise(&backend(), &model, "u1", &request, 80).is_err());
    }

    #[test]
    fn test_explain_category_sends_series() {
        let model = FakeModel::replying("Travel dominates.");
        let out = explain(&backend(), &model, "u1", ChartKind::Category, 80).unwrap();
        assert!(out.contains("Travel dominates."));
        let prompts = model.prompts.borrow();
        assert!(prompts[0].0.contains("Travel: ₹75000.00"));
        assert_eq!(prompts[0].1, EXPLAIN_SAMPLING);
    }

    #[test]
    fn test_explain_falls_back_on_failure() {
        let model = FakeModel {
            reply: None,
            prompts: Default::default(),
        };
        let out = explain(&backend(), &model, "u1", ChartKind::Balance, 80).unwrap();
        assert!(out.contains(EXPLAIN_FALLBACK));
    }

    #[test]
    fn test_explain_without_data() {
        let model = FakeModel::replying("unused");
        let out = explain(&FakeBackend::default(), &model, "u1", ChartKind::Balance, 80).unwrap();
        assert_eq!(out, NO_DATA);
    }
}
