//! Configuration loading from JSON or TOML.
//!
//! A config file carries the portal credentials and the watch-list; an
//! optional `portal` section overrides selectors, labels and timeouts.
//! The password is kept in a `SecretString` and never logged.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::types::{SniperError, WatchTarget};

/// Top-level configuration for one watch session.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub targets: Vec<WatchTarget>,
    #[serde(default)]
    pub portal: PortalSettings,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// Read `SNIPER_USERNAME` / `SNIPER_PASSWORD` from the environment.
    pub fn from_env() -> Result<Self> {
        let username = resolve_env("SNIPER_USERNAME")?;
        let password = resolve_env("SNIPER_PASSWORD")?;
        Ok(Self::new(username, password))
    }

    pub fn validate(&self) -> Result<(), SniperError> {
        if self.username.trim().is_empty() || self.password.expose_secret().is_empty() {
            return Err(SniperError::Configuration(
                "username or password is missing".into(),
            ));
        }
        Ok(())
    }
}

/// Portal endpoints, selectors and wait budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub login_url: String,
    pub exams_url: String,
    pub row_selector: String,
    pub code_field: String,
    pub date_field: String,
    pub signed_marker: String,
    pub available_marker: String,
    pub action_selector: String,
    pub signup_label: String,
    pub loading_selector: String,
    pub date_separator: String,
    pub action_timeout_ms: u64,
    pub loading_timeout_ms: u64,
    pub browser: BrowserSettings,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            login_url: "https://new.kos.cvut.cz/login".into(),
            exams_url: "https://new.kos.cvut.cz/exams".into(),
            row_selector: ".row-headline".into(),
            code_field: r#"[data-testid="course-code"]"#.into(),
            date_field: r#"[data-testid="date"]"#.into(),
            signed_marker: "span.signed-up".into(),
            available_marker: "span.available".into(),
            action_selector: "button.btn-primary".into(),
            signup_label: "Přihlásit".into(),
            loading_selector: "svg.loading-spinner-md".into(),
            date_separator: " - ".into(),
            action_timeout_ms: 1_000,
            loading_timeout_ms: 30_000,
            browser: BrowserSettings::default(),
        }
    }
}

impl PortalSettings {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn loading_timeout(&self) -> Duration {
        Duration::from_millis(self.loading_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit Chromium binary; chromiumoxide's detection is used when unset.
    pub executable: Option<String>,
    pub headless: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => serde_json::from_str(&contents)
                .with_context(|| format!("Invalid JSON in config file: {}", path.display()))?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SniperError> {
        self.credentials.validate()?;
        validate_targets(&self.targets)
    }
}

/// Reject watch-lists the engine cannot act on.
pub fn validate_targets(targets: &[WatchTarget]) -> Result<(), SniperError> {
    if targets.is_empty() {
        return Err(SniperError::Configuration("watch-list is empty".into()));
    }
    for target in targets {
        if target.code.trim().is_empty() {
            return Err(SniperError::Configuration("target with empty code".into()));
        }
        if target.dates.is_empty() {
            return Err(SniperError::Configuration(format!(
                "target {} has no dates",
                target.code
            )));
        }
    }
    Ok(())
}

/// Resolve an environment variable name to its value.
pub fn resolve_env(env_name: &str) -> Result<String> {
    std::env::var(env_name).with_context(|| format!("Environment variable not set: {env_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json_config() {
        let file = write_temp(
            ".json",
            r#"{
                "credentials": { "username": "novak", "password": "hunter2" },
                "targets": [ { "code": "BI-ZMA", "dates": ["2024-05-01", "2024-05-08"] } ]
            }"#,
        );
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.credentials.username, "novak");
        assert_eq!(cfg.credentials.password.expose_secret(), "hunter2");
        assert_eq!(cfg.targets[0].dates[1], "2024-05-08");
        assert_eq!(cfg.portal.signup_label, "Přihlásit");
        assert_eq!(cfg.portal.action_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_toml_config_with_portal_override() {
        let file = write_temp(
            ".toml",
            r#"
            targets = [ { code = "X01", dates = ["2024-05-01"] } ]

            [credentials]
            username = "novak"
            password = "hunter2"

            [portal]
            signup_label = "Sign up"
            action_timeout_ms = 2500

            [portal.browser]
            headless = false
            "#,
        );
        let cfg = AppConfig::load(file.path()).unwrap();
        assert_eq!(cfg.portal.signup_label, "Sign up");
        assert_eq!(cfg.portal.action_timeout_ms, 2500);
        assert_eq!(cfg.portal.row_selector, ".row-headline");
        assert!(!cfg.portal.browser.headless);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let file = write_temp(".json", "{ not json");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_missing_file() {
        assert!(AppConfig::load("/tmp/exam_sniper_missing_config_xyz.json").is_err());
    }

    #[test]
    fn test_empty_password_rejected() {
        let file = write_temp(
            ".json",
            r#"{
                "credentials": { "username": "novak", "password": "" },
                "targets": [ { "code": "X01", "dates": ["2024-05-01"] } ]
            }"#,
        );
        let err = AppConfig::load(file.path()).unwrap_err();
        let err = err.downcast::<SniperError>().unwrap();
        assert!(matches!(err, SniperError::Configuration(_)));
    }

    #[test]
    fn test_validate_targets() {
        assert!(validate_targets(&[]).is_err());
        assert!(validate_targets(&[WatchTarget::new("", &["2024-05-01"])]).is_err());
        assert!(validate_targets(&[WatchTarget::new("X01", &[])]).is_err());
        assert!(validate_targets(&[WatchTarget::new("X01", &["2024-05-01"])]).is_ok());
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let creds = Credentials::new("novak", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
    }
}
