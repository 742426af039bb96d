use crate::error::ConfigError;
use crate::file::parse_permissions;
use crate::rotation::FULL_DAY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings consumed by [`Logger::new`](crate::logger::Logger::new).
///
/// Treated as write-once: the logger copies what it needs at construction
/// and never re-reads it.
///
/// **Fields**
/// - `service_name`: first component of every file name.
/// - `log_folder`: directory holding the files; created when missing.
/// - `permissions`: octal mode for new files, e.g. `"0644"`.
/// - `rotation_hours`: bucket width, 1 to 24. 24 means one file per day.
/// - `buffer_threshold`: records buffered per destination before the
///   batch is handed to the writer.
/// - `channel_capacity`: batches queued per destination before producers
///   block.
/// - `flush_interval_secs`: idle flush period for partially filled
///   buffers.
/// - `enable_*`: gates for the optional categories.
/// - `dedicated_important_file` / `dedicated_query_file`: route those
///   categories to their own files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub service_name: String,
    pub log_folder: PathBuf,
    pub permissions: String,
    pub rotation_hours: u32,
    pub buffer_threshold: usize,
    pub channel_capacity: usize,
    pub flush_interval_secs: u64,
    pub enable_service_debug: bool,
    pub enable_business_debug: bool,
    pub enable_query: bool,
    pub enable_important: bool,
    pub enable_decision: bool,
    pub dedicated_important_file: bool,
    pub dedicated_query_file: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            log_folder: PathBuf::new(),
            permissions: "0644".to_string(),
            rotation_hours: FULL_DAY,
            buffer_threshold: 128,
            channel_capacity: 16,
            flush_interval_secs: 1,
            enable_service_debug: false,
            enable_business_debug: false,
            enable_query: false,
            enable_important: false,
            enable_decision: false,
            dedicated_important_file: false,
            dedicated_query_file: false,
        }
    }
}

impl LoggerConfig {
    /// Config with defaults writing into `log_folder`.
    pub fn new(service_name: impl Into<String>, log_folder: impl Into<PathBuf>) -> Self {
        Self {
            service_name: service_name.into(),
            log_folder: log_folder.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_folder.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLogFolder);
        }
        parse_permissions(&self.permissions)
            .map_err(|_| ConfigError::InvalidPermissions(self.permissions.clone()))?;
        check_range("rotation_hours", self.rotation_hours as u64, 1, FULL_DAY as u64)?;
        check_range("buffer_threshold", self.buffer_threshold as u64, 1, u32::MAX as u64)?;
        check_range("channel_capacity", self.channel_capacity as u64, 1, u32::MAX as u64)?;
        check_range("flush_interval_secs", self.flush_interval_secs, 1, u32::MAX as u64)?;
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
