use std::{collections::HashMap, fs, sync::Arc};

use relay_api::{LogTransport, MailTransport, SendmailTransport};
use shared::locale::Locale;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Log,
    Sendmail,
}

impl TransportKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "log" => Some(Self::Log),
            "sendmail" => Some(Self::Sendmail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub locale: Locale,
    pub mail_transport: TransportKind,
    pub sendmail_path: String,
    pub fallback_domain: String,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            locale: Locale::En,
            mail_transport: TransportKind::Log,
            sendmail_path: "/usr/sbin/sendmail".into(),
            fallback_domain: "localhost".into(),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    pub fn transport(&self) -> Arc<dyn MailTransport> {
        match self.mail_transport {
            TransportKind::Log => Arc::new(LogTransport),
            TransportKind::Sendmail => Arc::new(SendmailTransport::new(&self.sendmail_path)),
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("relay.toml").ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

pub(crate) fn settings_from_sources(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let value = match value {
                        toml::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    apply(&mut settings, &key, &value);
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable relay.toml"),
        }
    }

    for (var, key) in [
        ("RELAY_BIND", "bind_addr"),
        ("APP__BIND_ADDR", "bind_addr"),
        ("RELAY_LOCALE", "locale"),
        ("RELAY_MAIL_TRANSPORT", "mail_transport"),
        ("RELAY_SENDMAIL_PATH", "sendmail_path"),
        ("RELAY_FALLBACK_DOMAIN", "fallback_domain"),
        ("RELAY_MAX_BODY_BYTES", "max_body_bytes"),
    ] {
        if let Some(value) = env(var) {
            apply(&mut settings, key, &value);
        }
    }

    settings
}

fn apply(settings: &mut Settings, key: &str, value: &str) {
    match key {
        "bind_addr" => settings.server_bind = value.trim().to_string(),
        "locale" => match Locale::parse(value) {
            Some(locale) => settings.locale = locale,
            None => warn!(%value, "unknown locale, keeping default"),
        },
        "mail_transport" => match TransportKind::parse(value) {
            Some(kind) => settings.mail_transport = kind,
            None => warn!(%value, "unknown mail transport, keeping default"),
        },
        "sendmail_path" => settings.sendmail_path = value.trim().to_string(),
        "fallback_domain" => settings.fallback_domain = value.trim().to_string(),
        "max_body_bytes" => match value.trim().parse::<usize>() {
            Ok(parsed) if parsed > 0 => settings.max_body_bytes = parsed,
            _ => warn!(%value, "ignoring invalid max_body_bytes"),
        },
        other => warn!(key = other, "unknown relay setting"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
