use crate::settings::{api_key, settings_file_exists, settings_path, Settings, API_KEY_ENV};

pub fn format_status(settings: &Settings, settings_saved: bool, key_set: bool) -> String {
    let mut lines = vec![
        format!(
            "Settings:   {}{}",
            settings_path().display(),
            if settings_saved { "" } else { " (not saved; using defaults)" }
        ),
        format!("Backend:    {}", settings.api_url),
        format!(
            "User:       {}",
            if settings.user_id.is_empty() { "(not set)" } else { &settings.user_id }
        ),
        format!("Model:      {}", settings.llm_model),
        format!("Model URL:  {}", settings.llm_base_url),
        format!("Timeout:    {}s", settings.request_timeout_secs),
    ];
    lines.push(format!(
        "{API_KEY_ENV}: {}",
        if key_set { "set" } else { "not set (advise/explain unavailable)" }
    ));
    lines.join("\n")
}

pub fn run(settings: &Settings) {
    println!(
        "{}",
        format_status(settings, settings_file_exists(), api_key().is_some())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lists_effective_values() {
        let settings = Settings {
            user_id: "u42".into(),
            ..Default::default()
        };
        let out = format_status(&settings, true, false);
        assert!(out.contains("User:       u42"));
        assert!(out.contains("Backend:    http://127.0.0.1:5000"));
        assert!(out.contains("not set (advise/explain unavailable)"));
        assert!(!out.contains("not saved"));
    }

    #[test]
    fn test_status_unset_user() {
        let out = format_status(&Settings::default(), false, true);
        assert!(out.contains("(not set)"));
        assert!(out.contains("not saved"));
        assert!(out.contains(": set"));
    }
}
