//! Environment variable names used by this crate for convenient
//! configuration of the logger from microservices.
//!
//! These are purely helpers; [`LoggerConfig`] itself stays decoupled from
//! environment access.

use crate::config::LoggerConfig;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Service name used as the first component of file names.
pub const LOGGER_SERVICE_NAME_ENV: &str = "LOGGER_SERVICE_NAME";

/// Folder for log files, e.g. `/var/log/billing`.
pub const LOGGER_FOLDER_ENV: &str = "LOGGER_FOLDER";

/// Octal mode for new files, e.g. `0644`.
pub const LOGGER_PERMISSIONS_ENV: &str = "LOGGER_PERMISSIONS";

/// Rotation bucket width in hours (1-24).
pub const LOGGER_ROTATION_HOURS_ENV: &str = "LOGGER_ROTATION_HOURS";

/// Records buffered per destination before a handoff.
pub const LOGGER_BUFFER_THRESHOLD_ENV: &str = "LOGGER_BUFFER_THRESHOLD";

/// Batches queued per destination before producers block.
pub const LOGGER_CHANNEL_CAPACITY_ENV: &str = "LOGGER_CHANNEL_CAPACITY";

/// Idle flush period in seconds.
pub const LOGGER_FLUSH_INTERVAL_SECS_ENV: &str = "LOGGER_FLUSH_INTERVAL_SECS";

pub const LOGGER_ENABLE_SERVICE_DEBUG_ENV: &str = "LOGGER_ENABLE_SERVICE_DEBUG";
pub const LOGGER_ENABLE_BUSINESS_DEBUG_ENV: &str = "LOGGER_ENABLE_BUSINESS_DEBUG";
pub const LOGGER_ENABLE_QUERY_ENV: &str = "LOGGER_ENABLE_QUERY";
pub const LOGGER_ENABLE_IMPORTANT_ENV: &str = "LOGGER_ENABLE_IMPORTANT";
pub const LOGGER_ENABLE_DECISION_ENV: &str = "LOGGER_ENABLE_DECISION";
pub const LOGGER_DEDICATED_IMPORTANT_FILE_ENV: &str = "LOGGER_DEDICATED_IMPORTANT_FILE";
pub const LOGGER_DEDICATED_QUERY_FILE_ENV: &str = "LOGGER_DEDICATED_QUERY_FILE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl LoggerConfig {
    /// Defaults overridden by every `LOGGER_*` variable that is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LoggerConfig::default();

        if let Some(v) = lookup(LOGGER_SERVICE_NAME_ENV) {
            config.service_name = v;
        }
        if let Some(v) = lookup(LOGGER_FOLDER_ENV) {
            config.log_folder = PathBuf::from(v);
        }
        if let Some(v) = lookup(LOGGER_PERMISSIONS_ENV) {
            config.permissions = v;
        }
        parse_into(&lookup, LOGGER_ROTATION_HOURS_ENV, &mut config.rotation_hours)?;
        parse_into(&lookup, LOGGER_BUFFER_THRESHOLD_ENV, &mut config.buffer_threshold)?;
        parse_into(&lookup, LOGGER_CHANNEL_CAPACITY_ENV, &mut config.channel_capacity)?;
        parse_into(&lookup, LOGGER_FLUSH_INTERVAL_SECS_ENV, &mut config.flush_interval_secs)?;
        parse_flag(&lookup, LOGGER_ENABLE_SERVICE_DEBUG_ENV, &mut config.enable_service_debug)?;
        parse_flag(&lookup, LOGGER_ENABLE_BUSINESS_DEBUG_ENV, &mut config.enable_business_debug)?;
        parse_flag(&lookup, LOGGER_ENABLE_QUERY_ENV, &mut config.enable_query)?;
        parse_flag(&lookup, LOGGER_ENABLE_IMPORTANT_ENV, &mut config.enable_important)?;
        parse_flag(&lookup, LOGGER_ENABLE_DECISION_ENV, &mut config.enable_decision)?;
        parse_flag(&lookup, LOGGER_DEDICATED_IMPORTANT_FILE_ENV, &mut config.dedicated_important_file)?;
        parse_flag(&lookup, LOGGER_DEDICATED_QUERY_FILE_ENV, &mut config.dedicated_query_file)?;

        Ok(config)
    }
}

fn parse_into<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value })?;
    }
    Ok(())
}

fn parse_flag<F>(lookup: &F, key: &'static str, slot: &mut bool) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *slot = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => return Err(ConfigError::InvalidEnv { key, value }),
        };
    }
    Ok(())
}
