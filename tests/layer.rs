#![cfg(feature = "layer")]

use chrono::{Local, TimeZone};
use json_file_logger::{FileLogLayer, Logger, LoggerConfig, MockClock};
use serde_json::Value as Json;
use std::error::Error;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Debug)]
struct Refused;

impl std::fmt::Display for Refused {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("connection refused")
    }
}

impl Error for Refused {}

#[test]
fn tracing_events_become_routed_records() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = LoggerConfig::new("svc", tmp.path());
    config.enable_business_debug = true;
    config.dedicated_important_file = true;

    let clock = Arc::new(MockClock::with_time(
        Local.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
    ));
    let (logger, writer) = Logger::with_clock(config, clock).unwrap();
    let logger = Arc::new(logger);

    let subscriber = Registry::default().with(FileLogLayer::new(Arc::clone(&logger)));
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(order_id = 7u64, paid = true, ratio = 0.5, "order {} accepted", "A1");
        tracing::debug!("service debug is disabled");
        tracing::trace!(step = "pricing", "business detail");
        tracing::error!(error = &Refused as &(dyn Error + 'static), "payment call failed");
    });

    logger.stop();
    writer.join();

    let read = |kind: &str| -> Vec<Json> {
        fs::read_to_string(tmp.path().join(format!("svc_{kind}_2024-01-15_00.log")))
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    };

    let lines = read("default");
    assert_eq!(lines.len(), 3);

    assert_eq!(lines[0]["level"], "INFO");
    assert_eq!(lines[0]["message"], "order A1 accepted");
    assert_eq!(lines[0]["order_id"], 7);
    assert_eq!(lines[0]["paid"], true);
    assert_eq!(lines[0]["target"], "layer");

    assert_eq!(lines[1]["level"], "DEBUG_BUSINESS");
    assert_eq!(lines[1]["step"], "pricing");

    assert_eq!(lines[2]["level"], "ERROR");
    assert_eq!(lines[2]["error"]["message"], "connection refused");
    assert_eq!(lines[2]["message"], "payment call failed");

    let important = read("important");
    assert_eq!(important.len(), 1);
    assert_eq!(important[0]["message"], "payment call failed");
}
