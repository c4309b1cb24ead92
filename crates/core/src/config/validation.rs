//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` or `render_timeout_ms` is below 100ms or above 5 minutes
    /// - `network_idle_ms` is not shorter than `render_timeout_ms`
    /// - `render_max_concurrent` is 0
    /// - `user_agent` or `bind_addr` is empty
    /// - `cache_retention_days` is not positive
    /// - `rate_limit_total` or `rate_limit_window_secs` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.trim().is_empty() {
            return Err(invalid("bind_addr", "must not be empty"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        check_timeout("timeout_ms", self.timeout_ms)?;
        check_timeout("render_timeout_ms", self.render_timeout_ms)?;

        if self.network_idle_ms >= self.render_timeout_ms {
            return Err(invalid("network_idle_ms", "must be shorter than render_timeout_ms"));
        }

        if self.render_max_concurrent == 0 {
            return Err(invalid("render_max_concurrent", "must be at least 1"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.cache_retention_days <= 0 {
            return Err(invalid("cache_retention_days", "must be at least 1 day"));
        }

        if self.rate_limit_total == 0 {
            return Err(invalid("rate_limit_total", "must be greater than 0"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(invalid("rate_limit_window_secs", "must be greater than 0"));
        }

        if self.cors_origins.is_empty() {
            tracing::warn!("cors_origins is empty; only requests without an Origin header pass CORS");
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < 100 {
        return Err(invalid(field, "must be at least 100ms"));
    }
    if value > 300_000 {
        return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_max_bytes_exceeds_limit() {
        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_render_timeout_exceeds_limit() {
        let config = AppConfig { render_timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "render_timeout_ms"));
    }

    #[test]
    fn test_validate_idle_longer_than_render_timeout() {
        let config = AppConfig { network_idle_ms: 40_000, render_timeout_ms: 30_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "network_idle_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_retention_days() {
        let config = AppConfig { cache_retention_days: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_retention_days"));
    }

    #[test]
    fn test_validate_rate_limit() {
        let config = AppConfig { rate_limit_window_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "rate_limit_window_secs"));
    }

    #[test]
    fn test_validate_render_slots() {
        let config = AppConfig { render_max_concurrent: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "render_max_concurrent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, network_idle_ms: 99, render_timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
