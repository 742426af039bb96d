use crate::clock::{Clock, SystemClock};
use crate::config::LoggerConfig;
use crate::destination::{Destination, DestinationKind, DestinationWriter, FileSettings};
use crate::error::LoggerError;
use crate::record::{default_classifier, ErrorClassifier, ErrorDetail, Fields, Level};
use crate::trigger::{MonitoringTrigger, TriggerKind, TriggerPool, Triggers};
use crate::writer::{self, Slot, WriteLoop, WriterHandle};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Operational logging surface: failures and service lifecycle.
pub trait ServiceLogger: Send + Sync {
    fn fatal(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>);
    fn error(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>);
    fn warning(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>);
    fn info(&self, fields: Fields, message: fmt::Arguments<'_>);
    fn service_debug(&self, fields: Fields, message: fmt::Arguments<'_>);
    fn stop(&self);
}

/// Business logging surface: domain debugging, queries, notable events
/// and branch decisions.
pub trait BusinessLogger: Send + Sync {
    fn business_debug(&self, fields: Fields, message: fmt::Arguments<'_>);
    fn query(&self, fields: Fields, message: fmt::Arguments<'_>);
    fn important(&self, fields: Fields, message: fmt::Arguments<'_>);
    fn decision(&self, fields: Fields, message: fmt::Arguments<'_>);
}

#[derive(Debug, Clone, Copy)]
struct Enablement {
    service_debug: bool,
    business_debug: bool,
    query: bool,
    important: bool,
    decision: bool,
}

/// Routes records by level to the default, important and query
/// destinations and fires monitoring triggers.
///
/// Logging calls never fail and never touch a file: they buffer the
/// record and, once a buffer is full, hand it to the writer thread. Share
/// the logger across threads with an `Arc`. Setters take `&mut self` and
/// therefore must run before the logger is shared.
pub struct Logger {
    enabled: Enablement,
    default: Arc<Destination>,
    important: Option<Arc<Destination>>,
    query: Option<Arc<Destination>>,
    triggers: Triggers,
    classifier: ErrorClassifier,
    trigger_pool: TriggerPool,
}

impl Logger {
    /// Validate `config`, open the first file of every destination and
    /// start the writer thread.
    ///
    /// **Returns**
    /// - the logger and the [`WriterHandle`] to join after [`Logger::stop`].
    /// - `Err(..)` on invalid configuration or when a file cannot be
    ///   opened.
    pub fn new(config: LoggerConfig) -> Result<(Self, WriterHandle), LoggerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`Logger::new`] with an explicit time source.
    pub fn with_clock(
        config: LoggerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, WriterHandle), LoggerError> {
        config.validate()?;

        let settings = Arc::new(FileSettings {
            service_name: config.service_name.clone(),
            folder: config.log_folder.clone(),
            permissions: config.permissions.clone(),
            rotation_hours: config.rotation_hours,
        });

        let mut slots = Vec::with_capacity(3);
        let default = open_destination(DestinationKind::Default, &config, &settings, &clock, &mut slots)?;
        let important = if config.dedicated_important_file {
            Some(open_destination(DestinationKind::Important, &config, &settings, &clock, &mut slots)?)
        } else {
            None
        };
        let query = if config.dedicated_query_file {
            Some(open_destination(DestinationKind::Query, &config, &settings, &clock, &mut slots)?)
        } else {
            None
        };

        let trigger_pool = TriggerPool::start().map_err(LoggerError::Writer)?;
        let runtime = writer::runtime().map_err(LoggerError::Writer)?;
        let writer = writer::spawn(WriteLoop::new(slots, config.flush_interval()), runtime)
            .map_err(LoggerError::Writer)?;

        let logger = Logger {
            enabled: Enablement {
                service_debug: config.enable_service_debug,
                business_debug: config.enable_business_debug,
                query: config.enable_query,
                important: config.enable_important,
                decision: config.enable_decision,
            },
            default,
            important,
            query,
            triggers: Triggers::default(),
            classifier: Arc::new(default_classifier),
            trigger_pool,
        };
        Ok((logger, writer))
    }

    pub fn set_monitoring_trigger(&mut self, kind: TriggerKind, trigger: Arc<dyn MonitoringTrigger>) {
        self.triggers.set(kind, trigger);
    }

    pub fn clear_monitoring_trigger(&mut self, kind: TriggerKind) {
        self.triggers.clear(kind);
    }

    /// Replace the function that turns errors into `(code, kind, message)`.
    /// Applies to every destination.
    pub fn set_error_classifier<F>(&mut self, classifier: F)
    where
        F: Fn(&(dyn Error + 'static)) -> ErrorDetail + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
    }

    pub fn classify(&self, error: &(dyn Error + 'static)) -> ErrorDetail {
        (self.classifier)(error)
    }

    /// Whether records of `level` are written at all.
    pub fn enabled(&self, level: Level) -> bool {
        match level {
            Level::ServiceDebug => self.enabled.service_debug,
            Level::BusinessDebug => self.enabled.business_debug,
            Level::Query => self.enabled.query,
            Level::Important => self.enabled.important,
            Level::Decision => self.enabled.decision,
            Level::Fatal | Level::Error | Level::Warning | Level::Info => true,
        }
    }

    /// Level-generic entry point behind every per-level method.
    ///
    /// Fatal, error and important records go to the important file (when
    /// configured) and to the default file; queries go to the query file
    /// when configured, otherwise to the default file; everything else
    /// goes to the default file. The important trigger fires even when
    /// important records are disabled.
    pub fn log(&self, level: Level, fields: Fields, error: Option<ErrorDetail>, message: fmt::Arguments<'_>) {
        if self.enabled(level) {
            let message = message.to_string();
            match level {
                Level::Fatal | Level::Error | Level::Important => {
                    if let Some(important) = &self.important {
                        important.append(level, error.clone(), fields.clone(), message.clone());
                    }
                    self.default.append(level, error, fields, message);
                }
                Level::Query => {
                    let target = self.query.as_deref().unwrap_or(&*self.default);
                    target.append(level, error, fields, message);
                }
                _ => self.default.append(level, error, fields, message),
            }
        }

        let trigger = match level {
            Level::Fatal => TriggerKind::Fatal,
            Level::Error => TriggerKind::Error,
            Level::Important => TriggerKind::Important,
            _ => return,
        };
        self.triggers.fire(trigger, &self.trigger_pool);
    }

    pub fn fatal(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>) {
        let detail = error.map(|e| self.classify(e));
        self.log(Level::Fatal, fields, detail, message);
    }

    pub fn error(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>) {
        let detail = error.map(|e| self.classify(e));
        self.log(Level::Error, fields, detail, message);
    }

    pub fn warning(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>) {
        let detail = error.map(|e| self.classify(e));
        self.log(Level::Warning, fields, detail, message);
    }

    pub fn info(&self, fields: Fields, message: fmt::Arguments<'_>) {
        self.log(Level::Info, fields, None, message);
    }

    pub fn service_debug(&self, fields: Fields, message: fmt::Arguments<'_>) {
        self.log(Level::ServiceDebug, fields, None, message);
    }

    pub fn business_debug(&self, fields: Fields, message: fmt::Arguments<'_>) {
        self.log(Level::BusinessDebug, fields, None, message);
    }

    pub fn query(&self, fields: Fields, message: fmt::Arguments<'_>) {
        self.log(Level::Query, fields, None, message);
    }

    pub fn important(&self, fields: Fields, message: fmt::Arguments<'_>) {
        self.log(Level::Important, fields, None, message);
    }

    pub fn decision(&self, fields: Fields, message: fmt::Arguments<'_>) {
        self.log(Level::Decision, fields, None, message);
    }

    /// Close every handoff queue. The writer then drains all destinations,
    /// closes the files and exits; join its [`WriterHandle`] to wait for
    /// that. Flushing on shutdown is best-effort: a call racing with
    /// `stop` may be dropped. Idempotent.
    pub fn stop(&self) {
        for destination in self.important.iter().chain(self.query.iter()) {
            destination.close();
        }
        self.default.close();
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_destination(
    kind: DestinationKind,
    config: &LoggerConfig,
    settings: &Arc<FileSettings>,
    clock: &Arc<dyn Clock>,
    slots: &mut Vec<Slot>,
) -> Result<Arc<Destination>, LoggerError> {
    let writer = DestinationWriter::open(kind, Arc::clone(settings), Arc::clone(clock))
        .map_err(|source| LoggerError::Open {
            kind: kind.as_str(),
            source,
        })?;
    let (destination, handoff) = Destination::new(
        kind,
        config.buffer_threshold,
        config.channel_capacity,
        Arc::clone(clock),
    );
    let destination = Arc::new(destination);
    slots.push(Slot::new(Arc::clone(&destination), writer, handoff));
    Ok(destination)
}

impl ServiceLogger for Logger {
    fn fatal(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>) {
        Logger::fatal(self, fields, error, message)
    }

    fn error(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>) {
        Logger::error(self, fields, error, message)
    }

    fn warning(&self, fields: Fields, error: Option<&(dyn Error + 'static)>, message: fmt::Arguments<'_>) {
        Logger::warning(self, fields, error, message)
    }

    fn info(&self, fields: Fields, message: fmt::Arguments<'_>) {
        Logger::info(self, fields, message)
    }

    fn service_debug(&self, fields: Fields, message: fmt::Arguments<'_>) {
        Logger::service_debug(self, fields, message)
    }

    fn stop(&self) {
        Logger::stop(self)
    }
}

impl BusinessLogger for Logger {
    fn business_debug(&self, fields: Fields, message: fmt::Arguments<'_>) {
        Logger::business_debug(self, fields, message)
    }

    fn query(&self, fields: Fields, message: fmt::Arguments<'_>) {
        Logger::query(self, fields, message)
    }

    fn important(&self, fields: Fields, message: fmt::Arguments<'_>) {
        Logger::important(self, fields, message)
    }

    fn decision(&self, fields: Fields, message: fmt::Arguments<'_>) {
        Logger::decision(self, fields, message)
    }
}
