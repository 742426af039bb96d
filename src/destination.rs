//! One output stream: a locked in-memory buffer fed by producers, a
//! bounded handoff queue, and the file half owned by the writer loop.
//!
//! Producers only ever touch [`Destination`]. The writer task owns the
//! matching [`DestinationWriter`], so the file handle has a single owner
//! and needs no lock.

use crate::clock::Clock;
use crate::error::OpenError;
use crate::file::open_append;
use crate::record::{ErrorDetail, Fields, Level, LogRecord};
use crate::rotation::{file_name, same_bucket};
use crate::serialize::serialize_batch;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendError, error::TrySendError};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Pause before the single retry of a failed write.
pub const WRITE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Output stream identity, used as the second component of file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Default,
    Important,
    Query,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Default => "default",
            DestinationKind::Important => "important",
            DestinationKind::Query => "query",
        }
    }
}

/// Records detached from a buffer in one swap. `seq` counts detaches per
/// destination and fixes the order batches are written in.
#[derive(Debug)]
pub(crate) struct Batch {
    pub seq: u64,
    pub records: Vec<LogRecord>,
}

struct Buffer {
    records: Vec<LogRecord>,
    next_seq: u64,
    /// `None` once the destination is closed.
    handoff: Option<mpsc::Sender<Batch>>,
}

impl Buffer {
    fn detach(&mut self, capacity: usize) -> Batch {
        let records = std::mem::replace(&mut self.records, Vec::with_capacity(capacity));
        let seq = self.next_seq;
        self.next_seq += 1;
        Batch { seq, records }
    }
}

/// Producer-facing half of a destination.
pub struct Destination {
    kind: DestinationKind,
    threshold: usize,
    clock: Arc<dyn Clock>,
    buffer: Mutex<Buffer>,
}

impl Destination {
    /// Create the destination together with the receiving end of its
    /// handoff queue. `threshold` and `channel_capacity` are at least 1.
    pub(crate) fn new(
        kind: DestinationKind,
        threshold: usize,
        channel_capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::Receiver<Batch>) {
        let threshold = threshold.max(1);
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let destination = Self {
            kind,
            threshold,
            clock,
            buffer: Mutex::new(Buffer {
                records: Vec::with_capacity(threshold),
                next_seq: 0,
                handoff: Some(tx),
            }),
        };
        (destination, rx)
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Stamp a record with the current instant and buffer it. Blocks the
    /// caller while the handoff queue is full.
    pub fn append(&self, level: Level, error: Option<ErrorDetail>, fields: Fields, message: String) {
        let record = LogRecord::new(self.clock.now(), level, error, fields, message);
        self.push(record);
    }

    pub(crate) fn push(&self, record: LogRecord) {
        let (handoff, batch) = {
            let mut buffer = self.lock();
            buffer.records.push(record);
            if buffer.records.len() < self.threshold {
                return;
            }
            match buffer.handoff.clone() {
                Some(handoff) => (handoff, buffer.detach(self.threshold)),
                None => {
                    // Closed: what is already buffered belongs to the final
                    // drain, only the late record goes.
                    buffer.records.pop();
                    warn!(
                        destination = self.kind.as_str(),
                        "logger is stopped, dropping record"
                    );
                    return;
                }
            }
        };
        self.hand_off(handoff, batch);
    }

    fn hand_off(&self, handoff: mpsc::Sender<Batch>, batch: Batch) {
        let batch = match handoff.try_send(batch) {
            Ok(()) => return,
            Err(TrySendError::Full(batch)) => batch,
            Err(TrySendError::Closed(batch)) => return self.report_dropped(&batch),
        };
        // The writer is behind: park the producer until a slot frees up.
        if let Err(SendError(batch)) = futures::executor::block_on(handoff.send(batch)) {
            self.report_dropped(&batch);
        }
    }

    fn report_dropped(&self, batch: &Batch) {
        warn!(
            destination = self.kind.as_str(),
            records = batch.records.len(),
            "log writer is gone, dropping batch"
        );
    }

    /// Detach whatever is buffered, regardless of the threshold.
    pub(crate) fn flush_if_non_empty(&self) -> Option<Batch> {
        let mut buffer = self.lock();
        if buffer.records.is_empty() {
            return None;
        }
        Some(buffer.detach(self.threshold))
    }

    /// Close the handoff input. Batches already detached still reach the
    /// writer; later appends are buffered for the final drain until the
    /// threshold, then dropped one by one.
    pub(crate) fn close(&self) {
        self.lock().handoff = None;
    }

    /// Number of records waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.lock().records.len()
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// File-related settings shared by every destination of one logger.
#[derive(Debug, Clone)]
pub(crate) struct FileSettings {
    pub service_name: String,
    pub folder: PathBuf,
    pub permissions: String,
    pub rotation_hours: u32,
}

enum WriteFailure {
    Io(io::Error),
    Short { expected: usize, written: usize },
}

/// Writer-facing half of a destination: the open file and rotation state.
pub(crate) struct DestinationWriter {
    kind: DestinationKind,
    settings: Arc<FileSettings>,
    clock: Arc<dyn Clock>,
    file: Option<File>,
    file_name: String,
    opened_at: DateTime<Local>,
    next_seq: u64,
    /// Batches that arrived ahead of an earlier sequence number.
    pending: BTreeMap<u64, Vec<LogRecord>>,
}

impl DestinationWriter {
    /// Open the file for the current bucket. Failing here is fatal to
    /// logger construction.
    pub(crate) fn open(
        kind: DestinationKind,
        settings: Arc<FileSettings>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OpenError> {
        let now = clock.now();
        let mut writer = Self {
            kind,
            settings,
            clock,
            file: None,
            file_name: String::new(),
            opened_at: now,
            next_seq: 0,
            pending: BTreeMap::new(),
        };
        writer.open_bucket(now)?;
        Ok(writer)
    }

    pub(crate) fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Name of the file currently written to.
    pub(crate) fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Swap files when the current instant left the bucket of the open
    /// file, or when no file is open after an earlier failure.
    pub(crate) fn rotate_if_needed(&mut self) -> Result<(), OpenError> {
        let now = self.clock.now();
        if self.file.is_some() && same_bucket(&self.opened_at, &now, self.settings.rotation_hours) {
            return Ok(());
        }
        self.close();
        self.open_bucket(now)
    }

    fn open_bucket(&mut self, now: DateTime<Local>) -> Result<(), OpenError> {
        let name = file_name(
            &self.settings.service_name,
            self.kind.as_str(),
            &now,
            self.settings.rotation_hours,
        );
        let file = open_append(&self.settings.folder, &name, &self.settings.permissions)?;
        debug!(destination = self.kind.as_str(), file = %name, "opened log file");
        self.file = Some(file);
        self.file_name = name;
        self.opened_at = now;
        Ok(())
    }

    /// Take a batch off the handoff queue (or the idle flush) and write
    /// every batch that is now next in sequence.
    pub(crate) async fn accept(&mut self, batch: Batch) {
        self.pending.insert(batch.seq, batch.records);
        while let Some(records) = self.pending.remove(&self.next_seq) {
            self.next_seq += 1;
            self.write(&serialize_batch(&records)).await;
        }
    }

    /// Write everything still pending in sequence order, skipping gaps
    /// left by batches that will never arrive.
    pub(crate) async fn drain(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (seq, records) in pending {
            self.next_seq = seq + 1;
            self.write(&serialize_batch(&records)).await;
        }
    }

    /// Write serialized records, retrying once after [`WRITE_RETRY_DELAY`].
    /// Failures end up in diagnostics only.
    pub(crate) async fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.write_once(bytes) {
            Ok(()) => return,
            Err(WriteFailure::Short { expected, written }) => {
                return self.report_short(expected, written);
            }
            Err(WriteFailure::Io(err)) => {
                warn!(
                    destination = self.kind.as_str(),
                    file = %self.file_name,
                    error = %err,
                    "log write failed, retrying"
                );
            }
        }

        sleep(WRITE_RETRY_DELAY).await;
        match self.write_once(bytes) {
            Ok(()) => {}
            Err(WriteFailure::Short { expected, written }) => self.report_short(expected, written),
            Err(WriteFailure::Io(err)) => {
                error!(
                    destination = self.kind.as_str(),
                    file = %self.file_name,
                    error = %err,
                    bytes = bytes.len(),
                    "log write failed twice, dropping batch"
                );
            }
        }
    }

    fn write_once(&mut self, bytes: &[u8]) -> Result<(), WriteFailure> {
        if let Err(err) = self.rotate_if_needed() {
            error!(
                destination = self.kind.as_str(),
                error = %err,
                "cannot rotate log file"
            );
        }
        let file = self.file.as_mut().ok_or_else(|| {
            WriteFailure::Io(io::Error::new(io::ErrorKind::NotFound, "no open log file"))
        })?;
        let written = file.write(bytes).map_err(WriteFailure::Io)?;
        if written != bytes.len() {
            return Err(WriteFailure::Short {
                expected: bytes.len(),
                written,
            });
        }
        Ok(())
    }

    fn report_short(&self, expected: usize, written: usize) {
        error!(
            destination = self.kind.as_str(),
            file = %self.file_name,
            expected,
            written,
            "short write to log file"
        );
    }

    /// Release the file. A failed sync is reported and otherwise ignored.
    pub(crate) fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(err) = file.sync_all() {
                warn!(
                    destination = self.kind.as_str(),
                    file = %self.file_name,
                    error = %err,
                    "cannot sync log file on close"
                );
            }
        }
    }
}
