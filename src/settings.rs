use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FinwizzError, Result};

pub const API_URL_ENV: &str = "FINWIZZ_API_URL";
pub const USER_ID_ENV: &str = "FINWIZZ_USER_ID";
pub const API_KEY_ENV: &str = "TOGETHER_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.together.xyz/v1/".to_string()
}

fn default_llm_model() -> String {
    "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo-classifier".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_id: String::new(),
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Apply environment overrides, then explicit command-line overrides on top.
    pub fn resolve(mut self, user: Option<&str>, api_url: Option<&str>) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }
        if let Ok(id) = std::env::var(USER_ID_ENV) {
            if !id.trim().is_empty() {
                self.user_id = id;
            }
        }
        if let Some(url) = api_url {
            self.api_url = url.to_string();
        }
        if let Some(id) = user {
            self.user_id = id.to_string();
        }
        self
    }

    pub fn require_user(&self) -> Result<&str> {
        let id = self.user_id.trim();
        if id.is_empty() {
            return Err(FinwizzError::Settings(format!(
                "No user id configured. Run `finwizz init --user <id>`, set {USER_ID_ENV} or pass --user."
            )));
        }
        Ok(id)
    }
}

/// The language-model key is only ever read from the environment.
pub fn api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("finwizz")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    load_from(&settings_path())
}

/// Missing or unreadable files fall back to defaults.
pub fn load_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_to(&settings_path(), settings)
}

pub fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FinwizzError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}
