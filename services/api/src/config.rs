//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
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
    /// When unset, resources and chat logs are kept in memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub session_flag_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub generation_model: String,
    pub tutor_model: String,
    pub generation_timeout: Duration,
    /// Number of resources listed in the sidebar.
    pub recent_limit: usize,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            session_flag_path: PathBuf::from("./.ascent_session"),
            openai_api_key: None,
            generation_model: "gpt-4o-mini".to_string(),
            tutor_model: "gpt-4o".to_string(),
            generation_timeout: Duration::from_secs(120),
            recent_limit: 5,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
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
        let defaults = Config::default();

        // --- Load Server and Storage Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let session_flag_path = std::env::var("SESSION_FLAG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_flag_path);

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or(defaults.generation_model);
        let tutor_model = std::env::var("TUTOR_MODEL").unwrap_or(defaults.tutor_model);
        let generation_timeout = Duration::from_secs(parse_var(
            "GENERATION_TIMEOUT_SECS",
            defaults.generation_timeout.as_secs(),
        )?);
        let recent_limit = parse_var("RECENT_LIMIT", defaults.recent_limit)?;
        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            session_flag_path,
            openai_api_key,
            generation_model,
            tutor_model,
            generation_timeout,
            recent_limit,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let limit = parse_var("STUDY_TEST_UNSET_LIMIT", 5usize).unwrap();
        assert_eq!(limit, 5);
    }

    #[test]
    fn malformed_numbers_are_reported_by_name() {
        std::env::set_var("STUDY_TEST_BAD_TIMEOUT", "soon");
        let err = parse_var("STUDY_TEST_BAD_TIMEOUT", 120u64).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "STUDY_TEST_BAD_TIMEOUT"));
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.recent_limit, 5);
        assert_eq!(config.generation_timeout, Duration::from_secs(120));
        assert!(config.database_url.is_none());
    }
}
