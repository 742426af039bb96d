use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Grace period for in-flight triggers once the pool is dropped.
const TRIGGER_GRACE: Duration = Duration::from_secs(1);

/// External notification fired on fatal, error and important events,
/// e.g. an alerting webhook or a metrics counter.
///
/// Triggers run on their own thread, never on the log writer, so a
/// trigger may itself log. They are never awaited by the logging call. There is no delivery guarantee and no ordering
/// relative to the records being written; a panicking trigger is
/// contained in its own task.
#[async_trait]
pub trait MonitoringTrigger: Send + Sync {
    async fn trig(&self);
}

/// Which event class a trigger is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Fatal,
    Error,
    Important,
}

/// Adapter for plain blocking closures. The closure runs on the trigger
/// runtime's blocking pool so a slow closure never delays other triggers.
pub struct FnTrigger<F> {
    f: Arc<F>,
}

impl<F> FnTrigger<F>
where
    F: Fn() + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<F> MonitoringTrigger for FnTrigger<F>
where
    F: Fn() + Send + Sync + 'static,
{
    async fn trig(&self) {
        let f = Arc::clone(&self.f);
        if tokio::task::spawn_blocking(move || f()).await.is_err() {
            tracing::warn!("monitoring trigger panicked");
        }
    }
}

/// A trigger that does nothing.
#[derive(Clone, Default)]
pub struct NoopTrigger;

#[async_trait]
impl MonitoringTrigger for NoopTrigger {
    async fn trig(&self) {}
}

#[derive(Clone, Default)]
pub(crate) struct Triggers {
    fatal: Option<Arc<dyn MonitoringTrigger>>,
    error: Option<Arc<dyn MonitoringTrigger>>,
    important: Option<Arc<dyn MonitoringTrigger>>,
}

impl Triggers {
    pub(crate) fn set(&mut self, kind: TriggerKind, trigger: Arc<dyn MonitoringTrigger>) {
        *self.slot(kind) = Some(trigger);
    }

    pub(crate) fn clear(&mut self, kind: TriggerKind) {
        *self.slot(kind) = None;
    }

    fn slot(&mut self, kind: TriggerKind) -> &mut Option<Arc<dyn MonitoringTrigger>> {
        match kind {
            TriggerKind::Fatal => &mut self.fatal,
            TriggerKind::Error => &mut self.error,
            TriggerKind::Important => &mut self.important,
        }
    }

    pub(crate) fn get(&self, kind: TriggerKind) -> Option<&Arc<dyn MonitoringTrigger>> {
        match kind {
            TriggerKind::Fatal => self.fatal.as_ref(),
            TriggerKind::Error => self.error.as_ref(),
            TriggerKind::Important => self.important.as_ref(),
        }
    }

    /// Fire-and-forget: spawns the trigger and returns immediately.
    pub(crate) fn fire(&self, kind: TriggerKind, pool: &TriggerPool) {
        if let Some(trigger) = self.get(kind) {
            let trigger = Arc::clone(trigger);
            pool.handle.spawn(async move { trigger.trig().await });
        }
    }
}

/// Current-thread runtime on a dedicated `log-trigger` thread. Dropping the
/// pool lets in-flight triggers finish within [`TRIGGER_GRACE`] and then
/// ends the thread without waiting for it.
pub(crate) struct TriggerPool {
    handle: Handle,
    _shutdown: oneshot::Sender<()>,
}

impl TriggerPool {
    pub(crate) fn start() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .max_blocking_threads(4)
            .thread_name("log-trigger")
            .build()?;
        let handle = runtime.handle().clone();
        let (shutdown, stopped) = oneshot::channel::<()>();
        thread::Builder::new()
            .name("log-trigger".to_string())
            .spawn(move || {
                // Resolves once the sender is dropped.
                let _ = runtime.block_on(stopped);
                runtime.shutdown_timeout(TRIGGER_GRACE);
            })?;
        Ok(Self {
            handle,
            _shutdown: shutdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fn_trigger_runs_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let trigger = FnTrigger::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        trigger.trig().await;
        trigger.trig().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_closure_is_contained() {
        let trigger = FnTrigger::new(|| panic!("alerting backend down"));
        trigger.trig().await;
    }

    #[test]
    fn pool_runs_triggers_off_the_calling_thread() {
        let pool = TriggerPool::start().unwrap();
        let caller = thread::current().id();
        let (tx, rx) = std::sync::mpsc::channel();
        let mut triggers = Triggers::default();
        triggers.set(
            TriggerKind::Fatal,
            Arc::new(FnTrigger::new(move || {
                let _ = tx.send(thread::current().id());
            })),
        );

        triggers.fire(TriggerKind::Fatal, &pool);
        let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(ran_on, caller);
    }

    #[test]
    fn slots_are_independent() {
        let mut triggers = Triggers::default();
        triggers.set(TriggerKind::Error, Arc::new(NoopTrigger));

        assert!(triggers.get(TriggerKind::Error).is_some());
        assert!(triggers.get(TriggerKind::Fatal).is_none());
        assert!(triggers.get(TriggerKind::Important).is_none());

        triggers.clear(TriggerKind::Error);
        assert!(triggers.get(TriggerKind::Error).is_none());
    }
}
