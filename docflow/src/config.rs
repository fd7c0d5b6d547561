//! Process configuration, loaded from environment variables with typed
//! defaults. Mirrors the `defaults` submodule convention used for
//! `pageserver.toml` options in the grounding repo, adapted to flat env
//! vars since this service has no config-file format of its own.

use std::env::VarError;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

pub mod defaults {
    pub const DEFAULT_STORAGE_BASE_PATH: &str = "storage";
    pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;
    pub const DEFAULT_MAX_FILES_PER_USER_PER_MONTH: i64 = 100;
    pub const DEFAULT_MAX_FILE_AGE: &str = "24h";
    pub const DEFAULT_MAX_TEMP_FILE_AGE: &str = "1h";
    pub const DEFAULT_TERMINAL_JOB_RETENTION: &str = "30d";
    pub const DEFAULT_PDF_PROCESSING_TIMEOUT: &str = "5m";
    pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;
    pub const DEFAULT_SUBMIT_QUEUE_CAPACITY: usize = 100;
    pub const DEFAULT_ACCESS_TOKEN_EXPIRE: &str = "30m";
    pub const DEFAULT_REFRESH_TOKEN_EXPIRE: &str = "7d";
    pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
    pub const DEFAULT_LOG_LEVEL: &str = "info";
    pub const DEFAULT_CLEANUP_INTERVAL: &str = "1h";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub storage_base_path: Utf8PathBuf,
    pub max_file_size_bytes: u64,
    pub max_files_per_user_per_month: i64,
    pub max_file_age: Duration,
    pub max_temp_file_age: Duration,
    pub terminal_job_retention: Duration,
    pub pdf_processing_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub submit_queue_capacity: usize,
    pub secret_key: String,
    pub access_token_expire: Duration,
    pub refresh_token_expire: Duration,
    pub listen_addr: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub cleanup_interval: Duration,
}

fn env_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::Invalid(name, "not valid UTF-8".into())),
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_var(name)? {
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v.clone())),
        None => Ok(default),
    }
}

/// Parses a human-readable duration (`"24h"`, `"5m"`, `"30d"`), the same
/// notation the grounding repo uses for its own `pageserver.toml` duration
/// options.
fn parse_duration_env(name: &'static str, default: &'static str) -> Result<Duration, ConfigError> {
    let raw = env_var(name)?.unwrap_or_else(|| default.to_string());
    humantime::parse_duration(&raw).map_err(|_| ConfigError::Invalid(name, raw))
}

impl ServiceConfig {
    /// Loads configuration from the process environment. Fails closed:
    /// a missing or short `SECRET_KEY` is an initialization failure, not a
    /// silently-defaulted weak secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        use defaults::*;

        let secret_key =
            env_var("SECRET_KEY")?.ok_or(ConfigError::Missing("SECRET_KEY"))?;
        if secret_key.len() < 32 {
            return Err(ConfigError::Invalid(
                "SECRET_KEY",
                "must be at least 32 characters".into(),
            ));
        }

        let database_url =
            env_var("DATABASE_URL")?.ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let storage_base_path = env_var("STORAGE_BASE_PATH")?
            .unwrap_or_else(|| DEFAULT_STORAGE_BASE_PATH.to_string())
            .into();

        let max_file_size_mb: u64 =
            parse_env("MAX_FILE_SIZE_MB", DEFAULT_MAX_FILE_SIZE_MB)?;

        let cors_origins = env_var("CORS_ORIGINS")?
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]);

        Ok(ServiceConfig {
            database_url,
            storage_base_path,
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_files_per_user_per_month: parse_env(
                "MAX_FILES_PER_USER_PER_MONTH",
                DEFAULT_MAX_FILES_PER_USER_PER_MONTH,
            )?,
            max_file_age: parse_duration_env("MAX_FILE_AGE", DEFAULT_MAX_FILE_AGE)?,
            max_temp_file_age: parse_duration_env("MAX_TEMP_FILE_AGE", DEFAULT_MAX_TEMP_FILE_AGE)?,
            terminal_job_retention: parse_duration_env(
                "TERMINAL_JOB_RETENTION",
                DEFAULT_TERMINAL_JOB_RETENTION,
            )?,
            pdf_processing_timeout: parse_duration_env(
                "PDF_PROCESSING_TIMEOUT",
                DEFAULT_PDF_PROCESSING_TIMEOUT,
            )?,
            max_concurrent_jobs: parse_env("MAX_CONCURRENT_JOBS", DEFAULT_MAX_CONCURRENT_JOBS)?,
            submit_queue_capacity: parse_env(
                "SUBMIT_QUEUE_CAPACITY",
                DEFAULT_SUBMIT_QUEUE_CAPACITY,
            )?,
            secret_key,
            access_token_expire: parse_duration_env(
                "ACCESS_TOKEN_EXPIRE",
                DEFAULT_ACCESS_TOKEN_EXPIRE,
            )?,
            refresh_token_expire: parse_duration_env(
                "REFRESH_TOKEN_EXPIRE",
                DEFAULT_REFRESH_TOKEN_EXPIRE,
            )?,
            listen_addr: env_var("LISTEN_ADDR")?
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            log_level: env_var("LOG_LEVEL")?.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            cors_origins,
            cleanup_interval: parse_duration_env("CLEANUP_INTERVAL", DEFAULT_CLEANUP_INTERVAL)?,
        })
    }
}
