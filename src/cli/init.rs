use tracing::info;

use crate::api::parse_base_url;
use crate::error::{FinwizzError, Result};
use crate::settings::{load_settings, save_settings, settings_path, Settings};

/// Fields `init` may change. `None` keeps what is stored.
#[derive(Debug, Default)]
pub struct InitArgs {
    pub user: Option<String>,
    pub backend: Option<String>,
    pub model: Option<String>,
    pub llm_url: Option<String>,
    pub timeout: Option<u64>,
}

/// Merge the given values over `current`, validating URLs before anything is written.
pub fn apply(mut current: Settings, args: InitArgs) -> Result<Settings> {
    if let Some(url) = args.backend {
        parse_base_url(&url)?;
        current.api_url = url;
    }
    if let Some(url) = args.llm_url {
        parse_base_url(&url)?;
        current.llm_base_url = url;
    }
    if let Some(user) = args.user {
        if user.trim().is_empty() {
            return Err(FinwizzError::Settings("User id cannot be empty".into()));
        }
        current.user_id = user.trim().to_string();
    }
    if let Some(model) = args.model {
        current.llm_model = model;
    }
    if let Some(secs) = args.timeout {
        current.request_timeout_secs = secs.max(1);
    }
    Ok(current)
}

pub fn run(args: InitArgs) -> Result<()> {
    let settings = apply(load_settings(), args)?;
    save_settings(&settings)?;
    info!(path = %settings_path().display(), "settings saved");

    println!("Saved {}", settings_path().display());
    println!("Backend: {}", settings.api_url);
    if settings.user_id.is_empty() {
        println!("User:    (not set; pass --user <id>)");
    } else {
        println!("User:    {}", settings.user_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides_only_given_fields() {
        let s = apply(
            Settings::default(),
            InitArgs {
                user: Some(" alice ".into()),
                timeout: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(s.user_id, "alice");
        assert_eq!(s.request_timeout_secs, 1);
        assert_eq!(s.api_url, Settings::default().api_url);
    }

    #[test]
    fn test_apply_rejects_bad_backend_url() {
        let err = apply(
            Settings::default(),
            InitArgs {
                backend: Some("ftp://example.com".into()),
                ..Default::default()
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_apply_rejects_blank_user() {
        let err = apply(
            Settings::default(),
            InitArgs {
                user: Some("  ".into()),
                ..Default::default()
            },
        );
        assert!(matches!(err, Err(FinwizzError::Settings(_))));
    }
}
