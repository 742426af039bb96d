//! The single coordinating loop that owns every log file.
//!
//! All handoff queues are merged into one fan-in stream and raced against
//! the idle-flush ticker with `tokio::select!`, which picks uniformly among
//! ready branches, so a busy destination cannot starve the others or the
//! ticker. The loop lives on its own thread with a current-thread runtime:
//! producers that block on a full queue can never block the writer that
//! would unblock them. Monitoring triggers run elsewhere for the same
//! reason, since a trigger may log.

use crate::destination::{Batch, Destination, DestinationWriter};
use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Position of the mandatory default destination; its queue closing is the
/// shutdown signal.
pub(crate) const DEFAULT_SLOT: usize = 0;

enum Handoff {
    Batch(usize, Batch),
    Closed(usize),
}

/// Turn one receiver into a stream that yields its batches and then a
/// single `Closed` marker.
fn handoff_stream(slot: usize, rx: mpsc::Receiver<Batch>) -> BoxStream<'static, Handoff> {
    stream::unfold(Some(rx), move |state| async move {
        let mut rx = state?;
        match rx.recv().await {
            Some(batch) => Some((Handoff::Batch(slot, batch), Some(rx))),
            None => Some((Handoff::Closed(slot), None)),
        }
    })
    .boxed()
}

/// A destination as seen by the writer: the shared buffer for idle
/// flushes, the file half, and the queue receiver until the loop starts.
pub(crate) struct Slot {
    destination: Arc<Destination>,
    writer: DestinationWriter,
    handoff: mpsc::Receiver<Batch>,
}

impl Slot {
    pub(crate) fn new(
        destination: Arc<Destination>,
        writer: DestinationWriter,
        handoff: mpsc::Receiver<Batch>,
    ) -> Self {
        Self {
            destination,
            writer,
            handoff,
        }
    }
}

struct Active {
    destination: Arc<Destination>,
    writer: DestinationWriter,
}

pub(crate) struct WriteLoop {
    slots: Vec<Active>,
    handoffs: SelectAll<BoxStream<'static, Handoff>>,
    flush_interval: Duration,
}

impl WriteLoop {
    /// `slots[DEFAULT_SLOT]` must be the default destination.
    pub(crate) fn new(slots: Vec<Slot>, flush_interval: Duration) -> Self {
        let mut handoffs = SelectAll::new();
        let mut active = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            handoffs.push(handoff_stream(index, slot.handoff));
            active.push(Active {
                destination: slot.destination,
                writer: slot.writer,
            });
        }
        Self {
            slots: active,
            handoffs,
            flush_interval,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_idle().await;
                }
                handoff = self.handoffs.next() => match handoff {
                    Some(Handoff::Batch(slot, batch)) => {
                        self.slots[slot].writer.accept(batch).await;
                    }
                    Some(Handoff::Closed(DEFAULT_SLOT)) | None => break,
                    Some(Handoff::Closed(slot)) => {
                        debug!(destination = self.slots[slot].writer.kind().as_str(), "handoff queue closed");
                    }
                },
            }
        }

        self.shutdown().await;
    }

    async fn flush_idle(&mut self) {
        for slot in &mut self.slots {
            if let Some(batch) = slot.destination.flush_if_non_empty() {
                slot.writer.accept(batch).await;
            }
        }
    }

    /// Drain every queue until all producers are gone, flush partial
    /// buffers, then release the files.
    async fn shutdown(&mut self) {
        for slot in &self.slots {
            slot.destination.close();
        }
        while let Some(handoff) = self.handoffs.next().await {
            if let Handoff::Batch(slot, batch) = handoff {
                self.slots[slot].writer.accept(batch).await;
            }
        }
        self.flush_idle().await;
        for slot in &mut self.slots {
            slot.writer.drain().await;
            slot.writer.close();
        }
        debug!("log writer stopped");
    }
}

/// Owner of the writer thread. Dropping it detaches the thread.
pub struct WriterHandle {
    thread: Option<thread::JoinHandle<()>>,
}

impl WriterHandle {
    /// Block until the writer has drained every destination and closed its
    /// files. Without a prior [`Logger::stop`](crate::logger::Logger::stop)
    /// this waits until the logger is dropped.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("log writer thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Build the writer runtime. Nothing but the write loop runs on it.
pub(crate) fn runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

pub(crate) fn spawn(write_loop: WriteLoop, runtime: Runtime) -> io::Result<WriterHandle> {
    let thread = thread::Builder::new()
        .name("log-writer".to_string())
        .spawn(move || {
            runtime.block_on(write_loop.run());
        })?;
    Ok(WriterHandle {
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, MockClock};
    use crate::destination::{DestinationKind, FileSettings};
    use crate::fields;
    use crate::record::Level;
    use chrono::{Local, TimeZone};
    use std::fs;
    use std::path::Path;

    fn slot(kind: DestinationKind, folder: &Path, clock: Arc<dyn Clock>) -> (Arc<Destination>, Slot) {
        let settings = Arc::new(FileSettings {
            service_name: "svc".to_string(),
            folder: folder.to_path_buf(),
            permissions: "0644".to_string(),
            rotation_hours: 24,
        });
        let (destination, rx) = Destination::new(kind, 4, 2, Arc::clone(&clock));
        let destination = Arc::new(destination);
        let writer = DestinationWriter::open(kind, settings, clock).unwrap();
        (Arc::clone(&destination), Slot::new(destination, writer, rx))
    }

    fn count_lines(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn drains_every_destination_on_default_close() {
        let tmp = tempfile::tempdir().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(MockClock::with_time(
            Local.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        ));
        let (default, default_slot) = slot(DestinationKind::Default, tmp.path(), Arc::clone(&clock));
        let (query, query_slot) = slot(DestinationKind::Query, tmp.path(), Arc::clone(&clock));

        let write_loop = WriteLoop::new(vec![default_slot, query_slot], Duration::from_secs(3600));
        let handle = spawn(write_loop, runtime().unwrap()).unwrap();

        for n in 0..10 {
            default.append(Level::Info, None, fields! { "n" => n }, "d".to_string());
        }
        for n in 0..3 {
            query.append(Level::Query, None, fields! { "n" => n }, "q".to_string());
        }

        query.close();
        default.close();
        handle.join();

        assert_eq!(count_lines(&tmp.path().join("svc_default_2024-01-15_00.log")), 10);
        assert_eq!(count_lines(&tmp.path().join("svc_query_2024-01-15_00.log")), 3);
    }

    #[test]
    fn idle_ticks_flush_partial_buffers() {
        let tmp = tempfile::tempdir().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(MockClock::with_time(
            Local.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        ));
        let (default, default_slot) = slot(DestinationKind::Default, tmp.path(), clock);
        let path = tmp.path().join("svc_default_2024-01-15_00.log");

        let write_loop = WriteLoop::new(vec![default_slot], Duration::from_millis(20));
        let handle = spawn(write_loop, runtime().unwrap()).unwrap();
        assert!(!handle.is_finished());

        default.append(Level::Info, None, fields!(), "lonely".to_string());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count_lines(&path) == 0 {
            assert!(std::time::Instant::now() < deadline, "idle flush never happened");
            thread::sleep(Duration::from_millis(10));
        }

        default.close();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() {
            assert!(std::time::Instant::now() < deadline, "writer never exited");
            thread::sleep(Duration::from_millis(10));
        }
        handle.join();
        assert_eq!(count_lines(&path), 1);
    }
}
