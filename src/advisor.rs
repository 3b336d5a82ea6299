use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::{CategoryTotal, DailyPoint};
use crate::api::parse_base_url;
use crate::error::{FinwizzError, Result};
use crate::models::Transaction;

pub const HISTORY_LIMIT: usize = 100;
pub const EXPLAIN_FALLBACK: &str = "Sorry, couldn't generate an explanation right now.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
}

pub const ADVICE_SAMPLING: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: Some(500),
    top_p: Some(1.0),
};

pub const EXPLAIN_SAMPLING: Sampling = Sampling {
    temperature: 0.5,
    max_tokens: None,
    top_p: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RiskAppetite {
    Low,
    Moderate,
    High,
}

impl RiskAppetite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdviceRequest {
    pub goal: Option<String>,
    pub risk: Option<RiskAppetite>,
    pub question: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `- YYYY-MM-DD | description | Rs.amount`, one line per transaction, capped at `HISTORY_LIMIT`.
pub fn format_history(txns: &[Transaction]) -> String {
    txns.iter()
        .take(HISTORY_LIMIT)
        .map(|t| format!("- {} | {} | Rs.{}", t.day_label(), t.description, t.amount))
        .collect::<Vec<_>>()
        .join("\n")
}

impl AdviceRequest {
    /// At least one of goal or question must be present.
    pub fn validate(&self) -> Result<()> {
        if non_empty(&self.goal).is_none() && non_empty(&self.question).is_none() {
            return Err(FinwizzError::Other(
                "Enter a goal or question to begin".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn advisory_prompt(txns: &[Transaction], request: &AdviceRequest) -> Result<String> {
    request.validate()?;
    let goal = non_empty(&request.goal);
    let question = non_empty(&request.question);
    let goal_line = goal.map(|g| format!("My goal is to {g}.")).unwrap_or_default();
    let risk = request.risk.map(|r| r.as_str()).unwrap_or_default();
    let question_line = question.map(|q| format!("Question: {q}")).unwrap_or_default();

    Ok(format!(
        "You are a smart financial advisor. The following is a user's recent transaction history:\n\n\
         {history}\n\n\
         The user has asked:\n\
         {goal_line} and their risk appetite is {risk}\n\
         {question_line}\n\n\
         Provide budgeting tips, cost-cutting suggestions, investment ideas (consider their risk appetite as well), \
         and a path to reach their goal in a non-overwhelming manner, neatly and use their transaction history to \
         provide examples of overspending, wastage of money, etc.. Be concise, helpful, and tailored to their habits. \
         Provide the output formatted using markdown for better readability, use bullet points and even table if required.",
        history = format_history(txns),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChartKind {
    /// Running balance over time
    Balance,
    /// Spend per category
    Category,
}

pub fn balance_series(points: &[DailyPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{}: ₹{:.2}", p.day, p.value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn category_series(totals: &[CategoryTotal]) -> String {
    totals
        .iter()
        .map(|c| format!("{}: ₹{:.2}", c.name, c.total))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn explain_prompt(kind: ChartKind, data: &str) -> String {
    let subject = match kind {
        ChartKind::Balance => "balance trend over time",
        ChartKind::Category => "category-wise spending",
    };
    format!(
        "You are a financial assistant. Analyze the following {subject} data and explain it simply to a user.\n\n\
         Data:\n{data}\n\n\
         Respond with a short and clear explanation that summarizes key trends, highlights peaks or anomalies, \
         and suggests what it might mean for the user.\n\
         Use short paragraphs and **bold** for important points.\n\
         Use simple language and avoid technical jargon."
    )
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

pub trait ChatModel {
    fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String>;
}

/// Ask for an explanation, falling back to a fixed apology on any failure.
pub fn explain(model: &dyn ChatModel, kind: ChartKind, data: &str) -> String {
    match model.complete(&explain_prompt(kind, data), EXPLAIN_SAMPLING) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "explanation failed");
            EXPLAIN_FALLBACK.to_string()
        }
    }
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    base_url: Url,
    model: String,
}

impl LlmClient {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        if api_key.trim().is_empty() {
            return Err(FinwizzError::Llm(
                "TOGETHER_API_KEY is not set".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| FinwizzError::Llm(format!("Invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            model: model.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl ChatModel for LlmClient {
    fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String> {
        let endpoint = self
            .base_url
            .join("chat/completions")
            .map_err(|e| FinwizzError::Llm(format!("Cannot build completions URL: {e}")))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            top_p: sampling.top_p,
        };

        debug!(%endpoint, model = %self.model, prompt_len = prompt.len(), "POST chat completion");
        let response = self.http.post(endpoint.clone()).json(&request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FinwizzError::Llm(format!(
                "POST {endpoint} returned {status}: {}",
                body.trim()
            )));
        }
        let parsed: ChatResponse = response.json()?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FinwizzError::Llm("Response had no message content".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::analytics::tests::txn;
    use crate::api::tests::one_shot;

    /// Records prompts and replies with a canned answer, or fails when `reply` is `None`.
    pub(crate) struct FakeModel {
        pub reply: Option<String>,
        pub prompts: RefCell<Vec<(String, Sampling)>>,
    }

    impl FakeModel {
        pub(crate) fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatModel for FakeModel {
        fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String> {
            self.prompts.borrow_mut().push((prompt.to_string(), sampling));
            self.reply
                .clone()
                .ok_or_else(|| FinwizzError::Llm("offline".to_string()))
        }
    }

    #[test]
    fn test_format_history_caps_and_shapes_lines() {
        let txns: Vec<Transaction> = (0..150)
            .map(|i| txn("2024-01-05", &format!("item {i}"), -12.5, None))
            .collect();
        let history = format_history(&txns);
        assert_eq!(history.lines().count(), HISTORY_LIMIT);
        assert_eq!(history.lines().next().unwrap(), "- 2024-01-05 | item 0 | Rs.-12.5");
    }

    #[test]
    fn test_whole_amounts_have_no_decimal() {
        let history = format_history(&[txn("2024-01-01", "Rent", -15000.0, None)]);
        assert_eq!(history, "- 2024-01-01 | Rent | Rs.-15000");
    }

    #[test]
    fn test_history_uses_calendar_day_for_rfc2822_dates() {
        let http_date = |raw: &str, description: &str, amount: f64| Transaction {
            date: raw.to_string(),
            ..txn("2000-01-01", description, amount, None)
        };
        let rows = [
            http_date("Tue, 02 Jan 2024 00:00:00 GMT", "Swiggy order", -450.0),
            http_date("Thu, 04 Jan 2024 00:00:00 GMT", "Salary", 50000.0),
        ];
        let history = format_history(&rows);
        let lines: Vec<&str> = history.lines().collect();
        assert_eq!(lines[0], "- 2024-01-02 | Swiggy order | Rs.-450");
        assert_eq!(lines[1], "- 2024-01-04 | Salary | Rs.50000");
    }

    #[test]
    fn test_prompt_requires_goal_or_question() {
        let err = advisory_prompt(&[], &AdviceRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "Enter a goal or question to begin");
        let blank = AdviceRequest {
            goal: Some("   ".into()),
            ..Default::default()
        };
        assert!(advisory_prompt(&[], &blank).is_err());
    }

    #[test]
    fn test_prompt_embeds_goal_risk_and_question() {
        let request = AdviceRequest {
            goal: Some("buy a bike".into()),
            risk: Some(RiskAppetite::Moderate),
            question: Some("Where do I overspend?".into()),
        };
        let prompt = advisory_prompt(&[txn("2024-01-01", "Swiggy", -300.0, None)], &request).unwrap();
        assert!(prompt.starts_with("You are a smart financial advisor."));
        assert!(prompt.contains("- 2024-01-01 | Swiggy | Rs.-300"));
        assert!(prompt.contains("My goal is to buy a bike. and their risk appetite is moderate\nQuestion: Where do I overspend?"));
        assert!(prompt.ends_with("use bullet points and even table if required."));
    }

    #[test]
    fn test_question_only_prompt() {
        let request = AdviceRequest {
            question: Some("How can I save?".into()),
            ..Default::default()
        };
        let prompt = advisory_prompt(&[], &request).unwrap();
        assert!(prompt.contains("The user has asked:\n and their risk appetite is \nQuestion: How can I save?"));
    }

    #[test]
    fn test_explain_falls_back_on_failure() {
        let model = FakeModel {
            reply: None,
            prompts: RefCell::new(Vec::new()),
        };
        assert_eq!(explain(&model, ChartKind::Balance, "2024-01-01: ₹10.00"), EXPLAIN_FALLBACK);
        let (prompt, sampling) = model.prompts.borrow()[0].clone();
        assert!(prompt.contains("balance trend over time"));
        assert_eq!(sampling, EXPLAIN_SAMPLING);
    }

    #[test]
    fn test_series_formatting() {
        let points = vec![DailyPoint { day: "2024-01-01".into(), value: -499.0 }];
        assert_eq!(balance_series(&points), "2024-01-01: ₹-499.00");
        let totals = vec![CategoryTotal { name: "Food".into(), total: 750.5, count: 2 }];
        assert_eq!(category_series(&totals), "Food: ₹750.50");
    }

    #[test]
    fn test_llm_client_requires_key() {
        let err = LlmClient::new("https://api.together.xyz/v1/", "m", " ", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FinwizzError::Llm(_)));
    }

    #[test]
    fn test_llm_client_round_trip() {
        let (url, handle) = one_shot(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"  Spend less on food.  "}}]}"#,
        );
        let client = LlmClient::new(&format!("{url}/v1"), "test-model", "secret", Duration::from_secs(5)).unwrap();
        let reply = client.complete("hello", ADVICE_SAMPLING).unwrap();
        assert_eq!(reply, "Spend less on food.");
        let request = handle.request();
        assert!(request.starts_with("POST /v1/chat/completions "));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains("\"max_tokens\":500"));
        assert!(request.contains("\"top_p\":1.0"));
    }
}
