//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LINKPEEK_*)
//! 2. TOML config file (if LINKPEEK_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded [`AppConfig`] is built once at startup and handed by reference
//! to the cache gateway, the extraction pipeline and the HTTP layer.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LINKPEEK_*)
/// 2. TOML config file (if LINKPEEK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    ///
    /// Set via LINKPEEK_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via LINKPEEK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via LINKPEEK_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via LINKPEEK_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via LINKPEEK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed by the static fetcher.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Whether the headless browser fallback is enabled.
    ///
    /// Set via LINKPEEK_RENDER_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub render_enabled: bool,

    /// Upper bound for one rendered fetch, including browser launch.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Quiet period after which the rendered page counts as network idle.
    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Launch the browser with `--no-sandbox` (needed in most containers).
    #[serde(default)]
    pub render_no_sandbox: bool,

    /// Browsers allowed to run at once; further renders wait for a slot.
    ///
    /// Set via LINKPEEK_RENDER_MAX_CONCURRENT environment variable.
    #[serde(default = "default_render_max_concurrent")]
    pub render_max_concurrent: usize,

    /// Age in days after which a cached preview is discarded on read.
    ///
    /// Set via LINKPEEK_CACHE_RETENTION_DAYS environment variable.
    #[serde(default = "default_cache_retention_days")]
    pub cache_retention_days: i64,

    /// Origins allowed by CORS.
    ///
    /// Set via LINKPEEK_CORS_ORIGINS, either as a list or `;`-separated.
    #[serde(default, deserialize_with = "deserialize_origins")]
    pub cors_origins: Vec<String>,

    /// Requests allowed per client address within one rate limit window.
    #[serde(default = "default_rate_limit_total")]
    pub rate_limit_total: u32,

    /// Length of the rate limit window in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Directory served for paths no route matches.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./linkpeek-cache.sqlite")
}

fn default_user_agent() -> String {
    "linkpeek/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_network_idle_ms() -> u64 {
    500
}

fn default_render_max_concurrent() -> usize {
    4
}

fn default_cache_retention_days() -> i64 {
    10
}

fn default_rate_limit_total() -> u32 {
    300
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OriginList {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_origins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let origins = match OriginList::deserialize(deserializer)? {
        OriginList::List(list) => list,
        OriginList::Joined(joined) => joined.split(';').map(str::to_string).collect(),
    };

    Ok(origins
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            render_enabled: true,
            render_timeout_ms: default_render_timeout_ms(),
            network_idle_ms: default_network_idle_ms(),
            chrome_executable: None,
            render_no_sandbox: false,
            render_max_concurrent: default_render_max_concurrent(),
            cache_retention_days: default_cache_retention_days(),
            cors_origins: Vec::new(),
            rate_limit_total: default_rate_limit_total(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            static_dir: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache retention window.
    pub fn cache_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_retention_days)
    }

    /// Rate limit window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LINKPEEK_`
    /// 2. TOML file from `LINKPEEK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LINKPEEK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LINKPEEK_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.db_path, PathBuf::from("./linkpeek-cache.sqlite"));
        assert_eq!(config.user_agent, "linkpeek/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert!(config.render_enabled);
        assert_eq!(config.render_max_concurrent, 4);
        assert_eq!(config.cache_retention_days, 10);
        assert_eq!(config.rate_limit_total, 300);
        assert_eq!(config.rate_limit_window_secs, 60);
        assert!(config.cors_origins.is_empty());
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(10_000));
        assert_eq!(config.cache_retention(), chrono::Duration::days(10));
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LINKPEEK_BIND_ADDR", "127.0.0.1:9000");
            jail.set_env("LINKPEEK_RENDER_ENABLED", "false");
            jail.set_env("LINKPEEK_CORS_ORIGINS", "https://a.example;https://b.example");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.bind_addr, "127.0.0.1:9000");
            assert!(!config.render_enabled);
            assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "linkpeek.toml",
                r#"
                cache_retention_days = 3
                cors_origins = ["https://app.example"]
                "#,
            )?;
            jail.set_env("LINKPEEK_CONFIG_FILE", "linkpeek.toml");
            jail.set_env("LINKPEEK_CACHE_RETENTION_DAYS", "4");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_retention_days, 4);
            assert_eq!(config.cors_origins, vec!["https://app.example"]);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LINKPEEK_RATE_LIMIT_TOTAL", "0");
            assert!(matches!(AppConfig::load(), Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }
}
