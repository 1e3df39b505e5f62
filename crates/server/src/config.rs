use std::{fs, time::Duration};

use anyhow::{bail, Context};
use assistant::{ChatCompletionsConfig, DEFAULT_API_URL, DEFAULT_MODEL};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "support.toml";
pub const API_KEY_MISSING: &str =
    "API key not found. Please set the GROQ_API_KEY environment variable.";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_timeout_seconds: Option<u64>,
    pub session_idle_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/customer.db".into(),
            llm_api_key: String::new(),
            llm_api_url: DEFAULT_API_URL.into(),
            llm_model: DEFAULT_MODEL.into(),
            llm_timeout_seconds: None,
            session_idle_seconds: 30 * 60,
        }
    }
}

impl Settings {
    pub fn assistant_config(&self) -> ChatCompletionsConfig {
        ChatCompletionsConfig {
            api_key: self.llm_api_key.clone(),
            api_url: self.llm_api_url.clone(),
            model: self.llm_model.clone(),
            timeout: self.llm_timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_seconds)
    }
}

/// Keys accepted in `support.toml`. The API key is only read from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    llm_api_url: Option<String>,
    llm_model: Option<String>,
    llm_timeout_seconds: Option<u64>,
    session_idle_seconds: Option<u64>,
}

/// Defaults, then `support.toml`, then environment. Fails when no API key is configured.
pub fn load_settings() -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.bind_addr {
                    settings.server_bind = v;
                }
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.llm_api_url {
                    settings.llm_api_url = v;
                }
                if let Some(v) = file_cfg.llm_model {
                    settings.llm_model = v;
                }
                if file_cfg.llm_timeout_seconds.is_some() {
                    settings.llm_timeout_seconds = file_cfg.llm_timeout_seconds;
                }
                if let Some(v) = file_cfg.session_idle_seconds {
                    settings.session_idle_seconds = v;
                }
            }
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file"),
        }
    }

    let first = |keys: &[&str]| keys.iter().find_map(|&key| env(key));

    if let Some(v) = first(&["APP__BIND_ADDR", "SERVER_BIND"]) {
        settings.server_bind = v;
    }
    if let Some(v) = first(&["APP__DATABASE_URL", "DATABASE_URL"]) {
        settings.database_url = v;
    }
    if let Some(v) = first(&["APP__LLM_API_KEY", "GROQ_API_KEY"]) {
        settings.llm_api_key = v.trim().to_string();
    }
    if let Some(v) = first(&["APP__LLM_API_URL"]) {
        settings.llm_api_url = v;
    }
    if let Some(v) = first(&["APP__LLM_MODEL"]) {
        settings.llm_model = v;
    }
    if let Some(v) = first(&["APP__LLM_TIMEOUT_SECONDS"]) {
        let seconds = v
            .parse::<u64>()
            .with_context(|| format!("APP__LLM_TIMEOUT_SECONDS must be whole seconds, got '{v}'"))?;
        settings.llm_timeout_seconds = Some(seconds);
    }
    if let Some(v) = first(&["APP__SESSION_IDLE_SECONDS"]) {
        settings.session_idle_seconds = v.parse::<u64>().with_context(|| {
            format!("APP__SESSION_IDLE_SECONDS must be whole seconds, got '{v}'")
        })?;
    }

    if settings.llm_api_key.is_empty() {
        bail!(API_KEY_MISSING);
    }
    if settings.session_idle_seconds == 0 {
        bail!("session idle timeout must be at least one second");
    }
    let api_url = Url::parse(&settings.llm_api_url)
        .with_context(|| format!("invalid llm api url '{}'", settings.llm_api_url))?;
    if !matches!(api_url.scheme(), "http" | "https") {
        bail!("llm api url must be http or https, got '{}'", api_url.scheme());
    }

    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
