use std::sync::Arc;
use std::thread;
use std::time::Instant;

use json_file_logger::env::{env_or, LOGGER_FOLDER_ENV};
use json_file_logger::{fields, Logger, LoggerConfig};

fn main() {
    let folder = env_or(LOGGER_FOLDER_ENV, "/tmp/json-file-logger-load");
    let (logger, writer) = Logger::new(LoggerConfig::new("default_load", folder.as_str()))
        .unwrap_or_else(|e| panic!("cannot start logger: {e}"));
    let logger = Arc::new(logger);

    let threads: u64 = 8;
    let per_thread: u64 = 25_000;
    let start = Instant::now();

    let producers: Vec<_> = (0..threads)
        .map(|worker| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..per_thread {
                    logger.info(
                        fields! { "worker" => worker, "iteration" => i },
                        format_args!("default load test record"),
                    );
                }
            })
        })
        .collect();
    for producer in producers {
        let _ = producer.join();
    }

    let enqueued = start.elapsed();
    logger.stop();
    writer.join();
    let flushed = start.elapsed();

    let n = threads * per_thread;
    println!(
        "default config: logged {} records in {:?} (~{:.0} rec/s), on disk after {:?} in {}",
        n,
        enqueued,
        n as f64 / enqueued.as_secs_f64(),
        flushed,
        folder
    );
}
