use std::io;
use std::path::PathBuf;

/// Error type returned when validating a [`LoggerConfig`](crate::config::LoggerConfig).
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("log folder must not be empty")]
    EmptyLogFolder,

    #[error("{field} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("invalid permission spec {0:?}, expected an octal mode such as \"0644\"")]
    InvalidPermissions(String),

    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Error type returned by the file-open primitive.
#[derive(thiserror::Error, Debug)]
pub enum OpenError {
    #[error("invalid permission spec {0:?}")]
    InvalidPermissions(String),

    #[error("cannot create log folder {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open log file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Error type returned when building a [`Logger`](crate::logger::Logger).
#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("invalid logger configuration")]
    Config(#[from] ConfigError),

    #[error("cannot open {kind} log file")]
    Open {
        kind: &'static str,
        #[source]
        source: OpenError,
    },

    #[error("cannot start log writer or trigger thread")]
    Writer(#[source] io::Error),
}
