use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{FinwizzError, Result};
use crate::models::{
    CategoryUpdate, InsightsSummary, MessageResponse, ParseResponse, StatementsResponse,
    SummaryResponse, UserSummary,
};

/// File extensions the backend knows how to parse.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "pdf", "jpg", "jpeg", "png"];

/// Everything the client asks of the statements backend.
pub trait Backend {
    fn statements(&self, user_id: &str) -> Result<StatementsResponse>;
    fn summary(&self, user_id: &str) -> Result<UserSummary>;
    fn insights(&self, user_id: &str) -> Result<InsightsSummary>;
    fn upload(&self, user_id: &str, file: &Path) -> Result<ParseResponse>;
    /// Returns the backend's confirmation message.
    fn update_category(&self, update: &CategoryUpdate) -> Result<String>;
    /// Ask the backend to re-run its categorizer over one upload.
    fn enrich(&self, upload_id: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Base URL plus one percent-encoded path segment per element, so ids
    /// containing `/`, `?` or `#` stay inside their segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FinwizzError::Settings(format!("Cannot build a path on {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self.http.get(url).send()?;
        decode(response)
    }
}

/// Accept a base URL with or without a trailing slash so `join` keeps its path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| FinwizzError::Settings(format!("Invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FinwizzError::Settings(format!(
            "Unsupported scheme '{other}' in '{raw}'"
        ))),
    }
}

/// Check the status, surfacing the backend's `{"error": ...}` body when there is one.
fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        let message = serde_json::from_str::<MessageResponse>(&body)
            .ok()
            .and_then(|m| m.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        warn!(status = status.as_u16(), %message, "backend error");
        return Err(FinwizzError::Backend {
            status: status.as_u16(),
            message,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

pub fn check_extension(file: &Path) -> Result<()> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(FinwizzError::UnsupportedFile(format!(
            "{} (expected one of: {})",
            file.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )))
    }
}

impl Backend for HttpBackend {
    fn statements(&self, user_id: &str) -> Result<StatementsResponse> {
        let resp: StatementsResponse = self.get_json(&["api", "user", user_id, "statements"])?;
        debug!(uploads = resp.uploads.len(), "statements loaded");
        Ok(resp)
    }

    fn summary(&self, user_id: &str) -> Result<UserSummary> {
        let resp: SummaryResponse = self.get_json(&["api", "user", user_id, "summary"])?;
        if resp.summary.is_none() {
            warn!("summary response had no summary object");
        }
        Ok(resp.summary.unwrap_or_default())
    }

    fn insights(&self, user_id: &str) -> Result<InsightsSummary> {
        self.get_json(&["api", "user", user_id, "insights"])
    }

    fn upload(&self, user_id: &str, file: &Path) -> Result<ParseResponse> {
        check_extension(file)?;
        let url = self.endpoint(&["api", "parse"])?;
        let form = multipart::Form::new()
            .text("user_id", user_id.to_string())
            .file("file", file)?;
        debug!(%url, file = %file.display(), "POST multipart");
        let resp: ParseResponse = decode(self.http.post(url).multipart(form).send()?)?;
        info!(upload_id = ?resp.upload_id, count = ?resp.count, "statement uploaded");
        Ok(resp)
    }

    fn update_category(&self, update: &CategoryUpdate) -> Result<String> {
        let url = self.endpoint(&["api", "transaction", "update-category"])?;
        debug!(%url, upload_id = %update.upload_id, category = %update.category, "POST");
        let resp: MessageResponse = decode(self.http.post(url).json(update).send()?)?;
        info!(upload_id = %update.upload_id, "category updated");
        Ok(resp.message.unwrap_or_else(|| "Category updated".to_string()))
    }

    fn enrich(&self, upload_id: &str) -> Result<String> {
        let url = self.endpoint(&["api", "enrich", upload_id])?;
        debug!(%url, "POST");
        let resp: MessageResponse = decode(self.http.post(url).send()?)?;
        Ok(resp.message.unwrap_or_else(|| format!("Upload {upload_id} enriched")))
    }
}
