use crate::config::LoggerConfig;
use crate::error::LoggerError;
use crate::logger::Logger;
use crate::writer::WriterHandle;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

static GLOBAL: Mutex<Option<(Arc<Logger>, WriterHandle)>> = Mutex::new(None);

/// Install a `fmt` subscriber on stderr for the logger's own diagnostics
/// (rotation and write failures, dropped batches).
///
/// **Returns**
/// - `Err(..)` when a global subscriber is already installed; the existing
///   one keeps receiving the diagnostics.
pub fn init_diagnostics() -> Result<(), SetGlobalDefaultError> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let subscriber = Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
}

/// Install a subscriber that prints diagnostics to stderr and routes every
/// other `tracing` event into `logger`'s files through a
/// [`FileLogLayer`](crate::layer::FileLogLayer).
#[cfg(feature = "layer")]
pub fn init_with_layer(logger: Arc<Logger>) -> Result<(), SetGlobalDefaultError> {
    use tracing_subscriber::Layer as _;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
            meta.target().starts_with(env!("CARGO_CRATE_NAME"))
        }));
    let subscriber = Registry::default()
        .with(crate::layer::FileLogLayer::new(logger))
        .with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
}

/// Make `logger` the process-wide logger returned by [`global`].
/// A previously installed logger is stopped and its writer joined.
pub fn install_global(logger: Logger, writer: WriterHandle) -> Arc<Logger> {
    let logger = Arc::new(logger);
    let previous = GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace((Arc::clone(&logger), writer));
    if let Some((old, old_writer)) = previous {
        old.stop();
        old_writer.join();
    }
    logger
}

/// Build a logger from `config` and install it globally.
pub fn init_global(config: LoggerConfig) -> Result<Arc<Logger>, LoggerError> {
    let (logger, writer) = Logger::new(config)?;
    Ok(install_global(logger, writer))
}

/// The process-wide logger, if one is installed.
pub fn global() -> Option<Arc<Logger>> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|(logger, _)| Arc::clone(logger))
}

/// Stop the process-wide logger and wait until its files are flushed and
/// closed. No-op when nothing is installed.
pub fn shutdown_global() {
    let installed = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some((logger, writer)) = installed {
        logger.stop();
        writer.join();
    }
}
