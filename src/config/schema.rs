use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::error::{ConfabError, Result};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8888";
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub listen: String,

    /// sqlx connection string for the session store
    pub database_url: String,

    pub provider: ProviderConfig,

    pub timeouts: TimeoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            database_url: default_database_url(),
            provider: ProviderConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Per-call timeouts for the completion endpoint, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub intent_secs: u64,
    pub title_secs: u64,
    pub summary_secs: u64,
    pub reply_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            intent_secs: 15,
            title_secs: 20,
            summary_secs: 30,
            reply_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn intent(&self) -> Duration {
        Duration::from_secs(self.intent_secs)
    }

    pub fn title(&self) -> Duration {
        Duration::from_secs(self.title_secs)
    }

    pub fn summary(&self) -> Duration {
        Duration::from_secs(self.summary_secs)
    }

    pub fn reply(&self) -> Duration {
        Duration::from_secs(self.reply_secs)
    }
}

/// Loggable view of a configuration, free of secrets
#[derive(Debug, Clone)]
pub struct SafeSummary {
    pub api_key_configured: bool,
    pub model: String,
    pub listen: String,
    pub in_memory_store: bool,
}

impl Config {
    pub fn get_safe_summary(&self) -> SafeSummary {
        SafeSummary {
            api_key_configured: self
                .provider
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty()),
            model: self.provider.model.clone(),
            listen: self.listen.clone(),
            in_memory_store: self.database_url.contains(":memory:"),
        }
    }

    /// Checks the settings needed to serve requests
    pub fn validate(&self) -> Result<()> {
        if !self.get_safe_summary().api_key_configured {
            return Err(ConfabError::config(
                "no API key configured (set CONFAB_API_KEY or provider.api_key)",
            ));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfabError::config("provider.base_url must not be empty"));
        }
        if self.provider.model.trim().is_empty() {
            return Err(ConfabError::config("provider.model must not be empty"));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfabError::config("database_url must not be empty"));
        }
        let t = &self.timeouts;
        if [t.intent_secs, t.title_secs, t.summary_secs, t.reply_secs].contains(&0) {
            return Err(ConfabError::config("timeouts must be greater than zero"));
        }
        Ok(())
    }
}

fn default_database_url() -> String {
    match dirs::home_dir() {
        Some(home) => format!(
            "sqlite://{}?mode=rwc",
            home.join(".confab").join("confab.db").display()
        ),
        None => "sqlite://confab.db?mode=rwc".to_string(),
    }
}
