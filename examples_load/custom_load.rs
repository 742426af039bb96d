use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use json_file_logger::env::{env_or, LOGGER_FOLDER_ENV, LOGGER_SERVICE_NAME_ENV};
use json_file_logger::init::init_with_layer;
use json_file_logger::{ErrorDetail, FnTrigger, Logger, LoggerConfig, TriggerKind};
use tracing::error;

#[derive(Debug)]
struct Overloaded;

impl std::fmt::Display for Overloaded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("downstream overloaded")
    }
}

impl Error for Overloaded {}

fn main() {
    // Every LOGGER_* variable overrides these.
    let mut config = LoggerConfig::from_env().unwrap_or_else(|e| panic!("bad environment: {e}"));
    config.service_name = env_or(LOGGER_SERVICE_NAME_ENV, "custom_load");
    if config.log_folder.as_os_str().is_empty() {
        config.log_folder = env_or(LOGGER_FOLDER_ENV, "/tmp/json-file-logger-load").into();
    }
    config.buffer_threshold = 1_000;
    config.channel_capacity = 64;
    config.rotation_hours = 1;
    config.dedicated_important_file = true;

    let (mut logger, writer) =
        Logger::new(config).unwrap_or_else(|e| panic!("cannot start logger: {e}"));

    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&alerts);
    logger.set_monitoring_trigger(
        TriggerKind::Error,
        Arc::new(FnTrigger::new(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        })),
    );
    logger.set_error_classifier(|err| ErrorDetail::new(503, "Overload", err.to_string()));

    let logger = Arc::new(logger);
    init_with_layer(Arc::clone(&logger)).unwrap_or_else(|e| panic!("cannot install subscriber: {e}"));

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, error = &Overloaded as &(dyn Error + 'static), "custom load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.stop();
    writer.join();
    println!("error trigger fired {} times", alerts.load(Ordering::Relaxed));
}
