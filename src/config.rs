//! Dialog configuration
//!
//! Loaded from a JSON file named by `DIALOG_CONFIG`, with a few values
//! overridable through their own environment variables.

use crate::context::AliasConfig;
use crate::message::to_canonical;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "DIALOG_CONFIG";
pub const DEFAULT_TIMEOUT_VAR: &str = "DIALOG_DEFAULT_TIMEOUT";
pub const TIMEOUT_CHECK_INTERVAL_VAR: &str = "DIALOG_TIMEOUT_CHECK_INTERVAL";
pub const TIMEOUTS_DISABLED_VAR: &str = "DIALOG_TIMEOUTS_DISABLED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{name} must be a positive number of seconds, got {value}")]
    NonPositive { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrainConfig {
    /// Seconds to wait for the next command
    pub default_timeout: f64,
    /// Seconds between timeout checks
    pub timeout_check_interval: f64,
    pub timeouts_disabled: bool,
    /// Assistant names; commands must start with one of them
    pub trigger_phrases: Vec<String>,
    pub unknown_root_command_reply: String,
    pub ambiguous_root_command_reply: String,
    /// Apologies said when a command fails
    pub error_phrases: Vec<String>,
    pub command_aliases: Vec<AliasConfig>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            default_timeout: 10.0,
            timeout_check_interval: 1.0,
            timeouts_disabled: false,
            trigger_phrases: vec!["ирина".into(), "ирины".into(), "ирину".into()],
            unknown_root_command_reply: "Извини, я не поняла".into(),
            ambiguous_root_command_reply: "Извини, я не совсем поняла".into(),
            error_phrases: vec!["Извини, что-то пошло не так".into()],
            command_aliases: Vec::new(),
        }
    }
}

impl BrainConfig {
    /// Load configuration from the environment.
    ///
    /// Starts from the file named by `DIALOG_CONFIG` when set, otherwise
    /// from defaults, then applies the individual overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = var(DEFAULT_TIMEOUT_VAR) {
            self.default_timeout = parse_seconds(DEFAULT_TIMEOUT_VAR, &value)?;
        }
        if let Some(value) = var(TIMEOUT_CHECK_INTERVAL_VAR) {
            self.timeout_check_interval = parse_seconds(TIMEOUT_CHECK_INTERVAL_VAR, &value)?;
        }
        if let Some(value) = var(TIMEOUTS_DISABLED_VAR) {
            self.timeouts_disabled = parse_flag(TIMEOUTS_DISABLED_VAR, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("defaultTimeout", self.default_timeout)?;
        check_positive("timeoutCheckInterval", self.timeout_check_interval)?;
        Ok(())
    }

    pub fn default_timeout(&self) -> Result<Duration, ConfigError> {
        to_duration("defaultTimeout", self.default_timeout)
    }

    pub fn timeout_check_interval(&self) -> Result<Duration, ConfigError> {
        to_duration("timeoutCheckInterval", self.timeout_check_interval)
    }

    /// Trigger phrases split into canonical words
    pub fn trigger_phrase_words(&self) -> Vec<Vec<String>> {
        self.trigger_phrases
            .iter()
            .map(String::as_str)
            .map(to_canonical)
            .filter(|phrase| !phrase.is_empty())
            .map(|phrase| phrase.split(' ').map(str::to_string).collect())
            .collect()
    }
}

fn parse_seconds(name: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn to_duration(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    check_positive(name, value)?;
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}
