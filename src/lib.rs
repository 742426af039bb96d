//! Asynchronous structured logger writing JSON lines to time-rotated files.
//!
//! Producers call the per-level methods of [`Logger`]; records are buffered
//! per destination and handed in batches to a single writer thread that
//! owns every file, rotates by hour bucket and flushes idle buffers.

pub mod clock;
pub mod config;
pub mod destination;
pub mod env;
pub mod error;
pub mod file;
pub mod init;
#[cfg(feature = "layer")]
pub mod layer;
pub mod logger;
pub mod record;
pub mod rotation;
pub mod serialize;
pub mod trigger;
pub mod writer;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::LoggerConfig;
pub use error::{ConfigError, LoggerError, OpenError};
#[cfg(feature = "layer")]
pub use layer::FileLogLayer;
pub use logger::{BusinessLogger, Logger, ServiceLogger};
pub use record::{ErrorDetail, Fields, Level, LogRecord, Value};
pub use trigger::{FnTrigger, MonitoringTrigger, NoopTrigger, TriggerKind};
pub use writer::WriterHandle;
