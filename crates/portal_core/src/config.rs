//! Environment-driven runtime configuration.
//!
//! # Invariants
//! - Unset keys fall back to defaults and log which default was taken.
//! - Set-but-invalid keys are errors; they never silently fall back.

use crate::logging::{default_log_level, normalize_level};
use crate::service::profile_service::ProfileOptions;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const LOG_LEVEL_KEY: &str = "PORTAL_LOG_LEVEL";
pub const LOG_DIR_KEY: &str = "PORTAL_LOG_DIR";
pub const DB_PATH_KEY: &str = "PORTAL_DB_PATH";
pub const RESOLVE_TIMEOUT_KEY: &str = "PORTAL_RESOLVE_TIMEOUT_MS";

const DEFAULT_DB_PATH: &str = "portal.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                message,
            } => write!(f, "invalid {key} value `{value}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the CLI and embedding hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub log_level: &'static str,
    /// Rolling log directory; logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    /// Local document store file.
    pub db_path: PathBuf,
    pub resolve_timeout: Option<Duration>,
}

impl PortalConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_level = match var(LOG_LEVEL_KEY) {
            Some(value) => {
                normalize_level(&value).map_err(|message| ConfigError::InvalidValue {
                    key: LOG_LEVEL_KEY,
                    value: value.clone(),
                    message,
                })?
            }
            None => {
                let level = default_log_level();
                info!("{LOG_LEVEL_KEY} not set, using default: {level}");
                level
            }
        };

        let db_path = var(DB_PATH_KEY).unwrap_or_else(|| {
            info!("{DB_PATH_KEY} not set, using default: {DEFAULT_DB_PATH}");
            DEFAULT_DB_PATH.to_string()
        });

        let resolve_timeout = var(RESOLVE_TIMEOUT_KEY)
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|err| ConfigError::InvalidValue {
                        key: RESOLVE_TIMEOUT_KEY,
                        value: value.clone(),
                        message: err.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            log_level,
            log_dir: var(LOG_DIR_KEY).map(PathBuf::from),
            db_path: PathBuf::from(db_path),
            resolve_timeout,
        })
    }

    pub fn profile_options(&self) -> ProfileOptions {
        ProfileOptions {
            resolve_timeout: self.resolve_timeout,
        }
    }
}
