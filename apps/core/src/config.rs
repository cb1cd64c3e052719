//! Runtime configuration read from the environment.
//!
//! The binary loads a `.env` file (via `dotenv`) before calling
//! [`AppConfig::from_env`]; library callers can also build the struct directly.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::error::AppError;

pub const DEFAULT_AGENT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AGENT_MODEL: &str = "gpt-4o-mini";

/// Settings for the analysis service and its external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Credential for the fallback agent. Blank or absent disables the agent.
    #[serde(skip_serializing)]
    pub agent_api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API.
    #[validate(url)]
    pub agent_base_url: String,
    #[validate(length(min = 1))]
    pub agent_model: String,
    #[validate(range(min = 0.0, max = 2.0))]
    pub agent_temperature: f64,
    #[validate(range(min = 1, max = 600))]
    pub agent_timeout_secs: u64,
    /// Directory charts are written to.
    pub charts_dir: PathBuf,
    /// Prefix prepended to chart file names in returned references.
    #[validate(length(min = 1))]
    pub chart_url_prefix: String,
    #[validate(range(min = 1, max = 365))]
    pub default_forecast_periods: u32,
    #[validate(range(min = 1, max = 3650))]
    pub max_forecast_periods: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_api_key: None,
            agent_base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            agent_model: DEFAULT_AGENT_MODEL.to_string(),
            agent_temperature: 0.1,
            agent_timeout_secs: 120,
            charts_dir: PathBuf::from("static").join("charts"),
            chart_url_prefix: "/static/charts".to_string(),
            default_forecast_periods: 14,
            max_forecast_periods: 365,
        }
    }
}

fn env_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{} has an invalid value '{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    /// Reads the configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        let config = Self {
            agent_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            agent_base_url: env_string("AGENT_BASE_URL", &defaults.agent_base_url),
            agent_model: env_string("AGENT_MODEL", &defaults.agent_model),
            agent_temperature: env_parsed("AGENT_TEMPERATURE", defaults.agent_temperature)?,
            agent_timeout_secs: env_parsed("AGENT_TIMEOUT_SECS", defaults.agent_timeout_secs)?,
            charts_dir: env::var_os("CHARTS_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.charts_dir),
            chart_url_prefix: env_string("CHART_URL_PREFIX", &defaults.chart_url_prefix),
            default_forecast_periods: env_parsed(
                "DEFAULT_FORECAST_PERIODS",
                defaults.default_forecast_periods,
            )?,
            max_forecast_periods: env_parsed("MAX_FORECAST_PERIODS", defaults.max_forecast_periods)?,
        };
        config.check()?;
        Ok(config)
    }

    /// Runs field validation plus the cross-field constraints.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        let base = url::Url::parse(&self.agent_base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "AGENT_BASE_URL must be http or https, got '{}'",
                base.scheme()
            )));
        }
        if self.default_forecast_periods > self.max_forecast_periods {
            return Err(AppError::Config(format!(
                "DEFAULT_FORECAST_PERIODS ({}) exceeds MAX_FORECAST_PERIODS ({})",
                self.default_forecast_periods, self.max_forecast_periods
            )));
        }
        Ok(())
    }

    pub fn agent_configured(&self) -> bool {
        self.agent_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    /// Turns a requested horizon into a usable one: missing or non-positive
    /// values fall back to the default, large values are clamped.
    pub fn resolve_periods(&self, requested: Option<i64>) -> u32 {
        match requested {
            Some(p) if p > 0 => p.min(self.max_forecast_periods as i64) as u32,
            _ => self.default_forecast_periods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 9] = [
        "OPENAI_API_KEY",
        "AGENT_BASE_URL",
        "AGENT_MODEL",
        "AGENT_TEMPERATURE",
        "AGENT_TIMEOUT_SECS",
        "CHARTS_DIR",
        "CHART_URL_PREFIX",
        "DEFAULT_FORECAST_PERIODS",
        "MAX_FORECAST_PERIODS",
    ];

    fn unset_all() -> Vec<(&'static str, Option<&'static str>)> {
        KEYS.iter().map(|k| (*k, None)).collect()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        temp_env::with_vars(unset_all(), || {
            let config = AppConfig::from_env().unwrap();
            assert!(!config.agent_configured());
            assert_eq!(config.agent_model, DEFAULT_AGENT_MODEL);
            assert_eq!(config.default_forecast_periods, 14);
            assert_eq!(config.chart_url_prefix, "/static/charts");
        });
    }

    #[test]
    fn test_overrides_are_read() {
        let mut vars = unset_all();
        vars.push(("OPENAI_API_KEY", Some("sk-test")));
        vars.push(("AGENT_MODEL", Some("gpt-test")));
        vars.push(("DEFAULT_FORECAST_PERIODS", Some("30")));
        temp_env::with_vars(vars, || {
            let config = AppConfig::from_env().unwrap();
            assert!(config.agent_configured());
            assert_eq!(config.agent_model, "gpt-test");
            assert_eq!(config.default_forecast_periods, 30);
        });
    }

    #[test]
    fn test_blank_api_key_means_unconfigured() {
        let mut vars = unset_all();
        vars.push(("OPENAI_API_KEY", Some("   ")));
        temp_env::with_vars(vars, || {
            assert!(!AppConfig::from_env().unwrap().agent_configured());
        });
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let mut vars = unset_all();
        vars.push(("AGENT_TEMPERATURE", Some("hot")));
        temp_env::with_vars(vars, || {
            assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));
        });

        let mut vars = unset_all();
        vars.push(("AGENT_TEMPERATURE", Some("3.5")));
        temp_env::with_vars(vars, || {
            assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));
        });

        let mut vars = unset_all();
        vars.push(("AGENT_BASE_URL", Some("not a url")));
        temp_env::with_vars(vars, || {
            assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));
        });

        let mut vars = unset_all();
        vars.push(("AGENT_BASE_URL", Some("ftp://example.com/v1")));
        temp_env::with_vars(vars, || {
            assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));
        });
    }

    #[test]
    fn test_default_periods_cannot_exceed_max() {
        let config = AppConfig {
            default_forecast_periods: 60,
            max_forecast_periods: 30,
            ..AppConfig::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_resolve_periods() {
        let config = AppConfig::default();
        assert_eq!(config.resolve_periods(None), 14);
        assert_eq!(config.resolve_periods(Some(0)), 14);
        assert_eq!(config.resolve_periods(Some(-5)), 14);
        assert_eq!(config.resolve_periods(Some(7)), 7);
        assert_eq!(config.resolve_periods(Some(10_000)), 365);
    }
}
