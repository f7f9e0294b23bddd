use std::fs;

use anyhow::Context;
use serde::Deserialize;
use shared::locale::Locale;
use storage::DEFAULT_STORAGE_LIMIT_MB;
use tracing::warn;
use url::Url;

const SETTINGS_FILE: &str = "designflow.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// `None` keeps dispatch local: attempts are logged but nothing is sent.
    pub relay_url: Option<Url>,
    pub admin_email: String,
    pub storage_limit_mb: f64,
    pub locale: Locale,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_url: None,
            admin_email: "designer@example.com".into(),
            storage_limit_mb: DEFAULT_STORAGE_LIMIT_MB,
            locale: Locale::En,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    relay_url: Option<String>,
    admin_email: Option<String>,
    storage_limit_mb: Option<f64>,
    locale: Option<String>,
}

/// Reads `designflow.toml` from the working directory, then `DESIGNFLOW_*` overrides.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn settings_from_sources(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    let file_cfg = match file {
        Some(raw) => toml::from_str::<FileSettings>(raw)
            .with_context(|| format!("failed to parse {SETTINGS_FILE}"))?,
        None => FileSettings::default(),
    };

    let relay_url = env("DESIGNFLOW_RELAY_URL").or(file_cfg.relay_url);
    if let Some(raw) = relay_url.filter(|v| !v.trim().is_empty()) {
        let url = Url::parse(raw.trim())
            .with_context(|| format!("invalid relay url '{raw}'"))?;
        settings.relay_url = Some(url);
    }

    if let Some(v) = env("DESIGNFLOW_ADMIN_EMAIL").or(file_cfg.admin_email) {
        settings.admin_email = v.trim().to_string();
    }

    if let Some(v) = env("DESIGNFLOW_STORAGE_LIMIT_MB") {
        match v.parse::<f64>() {
            Ok(parsed) if parsed > 0.0 => settings.storage_limit_mb = parsed,
            _ => warn!(value = %v, "ignoring invalid DESIGNFLOW_STORAGE_LIMIT_MB"),
        }
    } else if let Some(limit) = file_cfg.storage_limit_mb {
        if limit > 0.0 {
            settings.storage_limit_mb = limit;
        } else {
            warn!(value = limit, "ignoring invalid storage_limit_mb in {SETTINGS_FILE}");
        }
    }

    if let Some(v) = env("DESIGNFLOW_LOCALE").or(file_cfg.locale) {
        match Locale::parse(&v) {
            Some(locale) => settings.locale = locale,
            None => warn!(value = %v, "unknown locale, keeping default"),
        }
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
