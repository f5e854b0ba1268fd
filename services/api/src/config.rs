//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use fitlog_core::{EvaluationSettings, ReadingPolicy};
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub parser_model: String,
    pub pace_tolerance: f64,
    pub metric_reading: ReadingPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let max_connections_str = var_or("DB_MAX_CONNECTIONS", "5");
        let db_max_connections = max_connections_str
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DB_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", max_connections_str),
                )
            })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Parser Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let parser_model = var_or("PARSER_MODEL", "gpt-4.1");

        // --- Evaluation Settings ---
        let tolerance_str = var_or("PACE_TOLERANCE", "0.01");
        let pace_tolerance = tolerance_str
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PACE_TOLERANCE".to_string(),
                    format!("'{}' is not a non-negative number", tolerance_str),
                )
            })?;

        let metric_reading = var_or("METRIC_READING", "last")
            .parse::<ReadingPolicy>()
            .map_err(|e| ConfigError::InvalidValue("METRIC_READING".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            openai_api_key,
            parser_model,
            pace_tolerance,
            metric_reading,
        })
    }

    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            pace_tolerance: self.pace_tolerance,
            reading: self.metric_reading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/fitlog")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.parser_model, "gpt-4.1");
        assert_eq!(config.pace_tolerance, 0.01);
        assert_eq!(config.metric_reading, ReadingPolicy::LastSeen);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"));
    }

    #[test]
    fn evaluation_settings_follow_the_environment() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/fitlog"),
            ("PACE_TOLERANCE", "0.25"),
            ("METRIC_READING", "max"),
        ])
        .unwrap();
        let settings = config.evaluation_settings();
        assert_eq!(settings.pace_tolerance, 0.25);
        assert_eq!(settings.reading, ReadingPolicy::Best);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (key, value) in [
            ("PACE_TOLERANCE", "-1"),
            ("PACE_TOLERANCE", "NaN"),
            ("METRIC_READING", "median"),
            ("DB_MAX_CONNECTIONS", "0"),
            ("BIND_ADDRESS", "nowhere"),
            ("RUST_LOG", "loud"),
        ] {
            let result = load(&[("DATABASE_URL", "postgres://localhost/fitlog"), (key, value)]);
            assert!(
                matches!(&result, Err(ConfigError::InvalidValue(var, _)) if var == key),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}
