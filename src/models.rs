use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// One row of a parsed bank statement, as the backend stores it.
///
/// `date` is kept verbatim: together with `description` it is the key the
/// backend matches on when a category is edited, so it must round-trip
/// byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, alias = "value date", deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub serial: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set when the transaction is flattened out of its upload.
    #[serde(skip)]
    pub upload_id: String,
}

impl Transaction {
    pub fn is_debit(&self) -> bool {
        self.amount < 0.0
    }

    /// Calendar day of the transaction, if the date string is parseable.
    pub fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }

    /// The `YYYY-MM-DD` part of the raw date, or the raw date when it has no time part.
    pub fn day_label(&self) -> String {
        match self.day() {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => self.date.split('T').next().unwrap_or_default().to_string(),
        }
    }

    pub fn category_or_default(&self) -> &str {
        match self.category.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => UNCATEGORIZED,
        }
    }
}

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Upload {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub data: Vec<Transaction>,
    #[serde(default)]
    pub insights: Option<Insights>,
}

/// Analytics the backend computes when a statement is uploaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default)]
    pub hidden_subscriptions: Vec<HiddenSubscription>,
    #[serde(default)]
    pub daily_anomalies: Vec<DailyAnomaly>,
    #[serde(default)]
    pub high_value_anomalies: Vec<HighValueAnomaly>,
    #[serde(default)]
    pub anomalies: Vec<Transaction>,
    #[serde(default, alias = "savingsEstimate")]
    pub savings_estimate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiddenSubscription {
    #[serde(default, deserialize_with = "lenient_string")]
    pub handle: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(default)]
    pub transactions: Vec<SubscriptionCharge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCharge {
    #[serde(rename = "Value Date", default)]
    pub value_date: Option<String>,
    #[serde(rename = "Debit", default)]
    pub debit: Option<f64>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAnomaly {
    #[serde(rename = "Value Date", default, deserialize_with = "lenient_string")]
    pub value_date: String,
    #[serde(default)]
    pub num_transactions: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_debit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighValueAnomaly {
    #[serde(rename = "Value Date", default)]
    pub value_date: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Debit", default)]
    pub debit: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementsResponse {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub total_uploads: Option<usize>,
    #[serde(default)]
    pub uploads: Vec<Upload>,
}

impl StatementsResponse {
    /// All transactions across uploads, each stamped with its upload id.
    pub fn flatten(&self) -> Vec<Transaction> {
        self.uploads
            .iter()
            .flat_map(|upload| {
                upload.data.iter().map(move |txn| Transaction {
                    upload_id: upload.id.clone(),
                    ..txn.clone()
                })
            })
            .collect()
    }

    pub fn hidden_subscriptions(&self) -> Vec<HiddenSubscription> {
        self.uploads
            .iter()
            .filter_map(|u| u.insights.as_ref())
            .flat_map(|i| i.hidden_subscriptions.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub total_uploads: usize,
    #[serde(default)]
    pub total_transactions: usize,
    #[serde(default)]
    pub total_debit: f64,
    #[serde(default)]
    pub total_credit: f64,
}

impl UserSummary {
    pub fn savings(&self) -> f64 {
        self.total_credit - self.total_debit
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: Option<UserSummary>,
}

/// Payload of `/api/user/{id}/insights`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsSummary {
    #[serde(default)]
    pub recurring: Vec<RecurringItem>,
    #[serde(default, rename = "savingsEstimate", alias = "savings_estimate")]
    pub savings_estimate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringItem {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(default, alias = "handle", alias = "description")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub upload_id: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub insights: Option<Insights>,
}

/// Body of `POST /api/transaction/update-category`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryUpdate {
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    pub date: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse the calendar day out of the date shapes the backend emits:
/// ISO timestamps, RFC 2822 (`Mon, 01 Jan 2024 00:00:00 GMT`) and `01 Jan 2024`.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(prefix) = raw.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    ["%d %b %Y", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statements_payload() {
        let json = r#"{
            "user_id": "u1",
            "total_uploads": 1,
            "uploads": [{
                "_id": "abc",
                "count": 2,
                "data": [
                    {"serial": 1, "date": "2024-01-01T00:00:00", "description": "NETFLIX", "amount": -499.0},
                    {"serial": 2, "date": "2024-01-02T00:00:00", "description": "Salary", "amount": 2000.0, "balance": 1501.0, "category": "Salary"}
                ],
                "insights": {"hidden_subscriptions": [], "daily_anomalies": [{"Value Date": "Mon, 01 Jan 2024 00:00:00 GMT", "num_transactions": 1, "total_debit": 499.0}]}
            }]
        }"#;
        let resp: StatementsResponse = serde_json::from_str(json).unwrap();
        let flat = resp.flatten();
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().all(|t| t.upload_id == "abc"));
        assert_eq!(flat[1].balance, Some(1501.0));
        assert_eq!(flat[0].category, None);
        let insights = resp.uploads[0].insights.as_ref().unwrap();
        assert_eq!(insights.daily_anomalies.len(), 1);
    }

    #[test]
    fn test_missing_uploads_is_empty() {
        let resp: StatementsResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.uploads.is_empty());
        assert!(resp.flatten().is_empty());
        assert!(resp.hidden_subscriptions().is_empty());
    }

    #[test]
    fn test_pdf_rows_use_value_date_alias() {
        let json = r#"{"serial": 3, "value date": "2024-03-05T00:00:00", "description": "Rent", "amount": -15000}"#;
        let txn: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.date, "2024-03-05T00:00:00");
        assert_eq!(txn.day_label(), "2024-03-05");
    }

    #[test]
    fn test_null_fields_degrade() {
        let json = r#"{"date": null, "description": null, "amount": null, "type": null, "balance": null}"#;
        let txn: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.amount, 0.0);
        assert!(txn.description.is_empty());
        assert!(txn.day().is_none());
    }

    #[test]
    fn test_parse_day_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(parse_day("2024-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_day("2024-01-01"), Some(expected));
        assert_eq!(parse_day("Mon, 01 Jan 2024 00:00:00 GMT"), Some(expected));
        assert_eq!(parse_day("01 Jan 2024"), Some(expected));
        assert_eq!(parse_day("not a date"), None);
    }

    #[test]
    fn test_category_update_wire_names() {
        let update = CategoryUpdate {
            upload_id: "U".into(),
            date: "2024-01-01T00:00:00".into(),
            description: "Swiggy".into(),
            category: "Food".into(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["uploadId"], "U");
        assert_eq!(json["category"], "Food");
    }

    #[test]
    fn test_insights_summary_camel_case() {
        let json = r#"{"recurring": [{"amount": -199, "handle": "netflix@icici"}], "savingsEstimate": 1200}"#;
        let s: InsightsSummary = serde_json::from_str(json).unwrap();
        assert_eq!(s.recurring.len(), 1);
        assert_eq!(s.savings_estimate, Some(1200.0));
    }
}
