//! Run configuration and environment validation.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Consecutive failures that stop a run.
pub const DEFAULT_FAILURE_TOLERANCE: u32 = 6;

/// Sampling temperature used when `TEMPERATURE` is unset.
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

const API_KEY_ENV: &str = "API_KEY";
const MODEL_ENV: &str = "MODEL";
const BASE_URL_ENV: &str = "BASE_URL";
const TEMPERATURE_ENV: &str = "TEMPERATURE";

/// Errors in run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("{name} environment variable is not set")]
    MissingEnv {
        /// Variable name.
        name: &'static str,
    },

    /// An environment variable is set to an unusable value.
    #[error("{name} environment variable is invalid: {reason}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric option is out of range.
    #[error("invalid {name}: {reason}")]
    InvalidValue {
        /// Option name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// What a pipeline run harvests; selects the politeness defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Download,
    References,
    Cite,
    Classify,
}

impl Target {
    /// Pause between attempted entries.
    #[must_use]
    pub fn default_delay(self) -> Duration {
        match self {
            Self::Download => Duration::from_secs(10),
            Self::References | Self::Classify => Duration::from_secs(1),
            Self::Cite => Duration::from_secs(5),
        }
    }
}

/// Politeness and failure policy shared by every pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Pause after each entry that was actually attempted.
    pub delay: Duration,
    /// The run stops once this many entries in a row have failed.
    pub failure_tolerance: u32,
}

impl RunConfig {
    /// Defaults for `target`.
    #[must_use]
    pub fn for_target(target: Target) -> Self {
        Self {
            delay: target.default_delay(),
            failure_tolerance: DEFAULT_FAILURE_TOLERANCE,
        }
    }

    /// Applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero tolerance.
    pub fn with_overrides(
        mut self,
        delay_ms: Option<u64>,
        failure_tolerance: Option<u32>,
    ) -> Result<Self, ConfigError> {
        if let Some(ms) = delay_ms {
            self.delay = Duration::from_millis(ms);
        }
        if let Some(tolerance) = failure_tolerance {
            if tolerance == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "failure tolerance",
                    reason: "must be at least 1".to_string(),
                });
            }
            self.failure_tolerance = tolerance;
        }
        Ok(self)
    }
}

/// Credentials and endpoint of the classification oracle.
#[derive(Clone, PartialEq)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OracleConfig {
    /// Reads `API_KEY`, `MODEL`, `BASE_URL` and optional `TEMPERATURE`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] naming the first missing variable,
    /// or [`ConfigError::InvalidEnv`] for an unparsable temperature.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv { name })
        };
        let api_key = required(API_KEY_ENV)?;
        let model = required(MODEL_ENV)?;
        let base_url = required(BASE_URL_ENV)?;
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidEnv {
            name: BASE_URL_ENV,
            reason: e.to_string(),
        })?;

        let temperature = match lookup(TEMPERATURE_ENV).filter(|v| !v.trim().is_empty()) {
            None => DEFAULT_TEMPERATURE,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: TEMPERATURE_ENV,
                reason: format!("`{raw}` is not a number"),
            })?,
        };

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_oracle_config_reports_first_missing_variable() {
        let err = OracleConfig::from_lookup(lookup(&[("API_KEY", "k")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv { name: "MODEL" });
        assert_eq!(err.to_string(), "MODEL environment variable is not set");
    }

    #[test]
    fn test_oracle_config_empty_value_is_missing() {
        let err = OracleConfig::from_lookup(lookup(&[("API_KEY", " ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv { name: "API_KEY" });
    }

    #[test]
    fn test_oracle_config_defaults_temperature_and_trims_base() {
        let config = OracleConfig::from_lookup(lookup(&[
            ("API_KEY", "secret"),
            ("MODEL", "gpt-4o-mini"),
            ("BASE_URL", "https://api.example.com/v1/"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert!((config.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_oracle_config_rejects_bad_temperature() {
        let err = OracleConfig::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("MODEL", "m"),
            ("BASE_URL", "https://x"),
            ("TEMPERATURE", "warm"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "TEMPERATURE", .. }));
    }

    #[test]
    fn test_run_config_defaults_and_overrides() {
        let config = RunConfig::for_target(Target::Download);
        assert_eq!(config.delay, Duration::from_secs(10));
        assert_eq!(config.failure_tolerance, DEFAULT_FAILURE_TOLERANCE);

        let config = RunConfig::for_target(Target::Cite)
            .with_overrides(Some(0), Some(2))
            .unwrap();
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.failure_tolerance, 2);
        assert!(RunConfig::for_target(Target::Classify)
            .with_overrides(None, Some(0))
            .is_err());
    }
}
