use crate::logger::Logger;
use crate::record::{ErrorDetail, Fields, Level, Value};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that routes `tracing` events through a
/// [`Logger`], so code instrumented with `tracing` macros ends up in the
/// same JSON-lines files as direct logger calls.
///
/// Levels map as `ERROR → ERROR`, `WARN → WARNING`, `INFO → INFO`,
/// `DEBUG → DEBUG_SERVICE` and `TRACE → DEBUG_BUSINESS`; disabled levels
/// are dropped by the logger as usual. Events emitted by this crate are
/// ignored so the logger's own diagnostics never loop back into its files.
pub struct FileLogLayer {
    logger: Arc<Logger>,
}

impl FileLogLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        tracing::Level::DEBUG => Level::ServiceDebug,
        tracing::Level::TRACE => Level::BusinessDebug,
    }
}

impl<S> Layer<S> for FileLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }
        let level = map_level(meta.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut fields = Fields::new();
        let mut message = String::new();
        let mut error = None;
        let mut visitor = FieldVisitor {
            logger: &self.logger,
            fields: &mut fields,
            message: &mut message,
            error: &mut error,
        };
        event.record(&mut visitor);
        fields.insert("target".to_string(), Value::from(meta.target()));

        self.logger.log(level, fields, error, format_args!("{message}"));
    }
}

struct FieldVisitor<'a> {
    logger: &'a Logger,
    fields: &'a mut Fields,
    message: &'a mut String,
    error: &'a mut Option<ErrorDetail>,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        // The first error-valued field becomes the record's error object.
        if self.error.is_none() {
            *self.error = Some(self.logger.classify(value));
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.message = format!("{value:?}");
        } else {
            self.fields.insert(field.name().to_string(), Value::from(format!("{value:?}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_tracing_level() {
        assert_eq!(map_level(&tracing::Level::ERROR), Level::Error);
        assert_eq!(map_level(&tracing::Level::WARN), Level::Warning);
        assert_eq!(map_level(&tracing::Level::INFO), Level::Info);
        assert_eq!(map_level(&tracing::Level::DEBUG), Level::ServiceDebug);
        assert_eq!(map_level(&tracing::Level::TRACE), Level::BusinessDebug);
    }
}
