use chrono::{DateTime, Local, NaiveTime, Timelike};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Severity or category of a record. Also decides which destination a
/// record is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Fatal,
    Error,
    Warning,
    Info,
    ServiceDebug,
    BusinessDebug,
    Query,
    Important,
    Decision,
}

impl Level {
    /// Name written into the `level` key of every line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Fatal => "FATAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::ServiceDebug => "DEBUG_SERVICE",
            Level::BusinessDebug => "DEBUG_BUSINESS",
            Level::Query => "QUERY",
            Level::Important => "IMPORTANT",
            Level::Decision => "DECISION",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code, kind and text extracted from an error by an [`ErrorClassifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: u32,
    /// Category such as "Internal", "External", "Request" or "Business".
    pub kind: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: u32, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Maps an application error to the `(code, kind, message)` triple that
/// ends up in the `error` object of a record.
pub type ErrorClassifier = Arc<dyn Fn(&(dyn Error + 'static)) -> ErrorDetail + Send + Sync>;

/// Classifier used until the application installs its own: no code, no
/// kind, the error's `Display` output as message.
pub fn default_classifier(err: &(dyn Error + 'static)) -> ErrorDetail {
    ErrorDetail::new(0, "", err.to_string())
}

/// Unordered structured fields attached to a record.
pub type Fields = HashMap<String, Value>;

/// A dynamically-typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I64(i64),
    U64(u64),
    F64(f64),
    F32(f32),
    Bool(bool),
    Str(String),
    Map(Fields),
    Array(Vec<Value>),
    /// Placeholder for values that have no JSON representation; carries
    /// the Rust type name which is written as a quoted string.
    Opaque(&'static str),
}

impl Value {
    pub fn opaque<T: ?Sized>() -> Self {
        Value::Opaque(std::any::type_name::<T>())
    }
}

macro_rules! value_from {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )+
    };
}

value_from!(I64 as i64: i8, i16, i32, i64, isize);
value_from!(U64 as u64: u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Opaque("null"),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else {
                    n.as_f64().map(Value::F64).unwrap_or(Value::Opaque("number"))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Builds a [`Fields`] map from `key => value` pairs.
///
/// ```
/// use json_file_logger::fields;
///
/// let fields = fields! { "worker" => 1, "arg1" => "asds" };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::record::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::record::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::record::Value::from($value));
        )+
        fields
    }};
}

/// One line of a log file. Never mutated after it is buffered.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Wall-clock time of day of the same instant, rendered as `HH:MM:SS`.
    /// The date lives in the file name.
    pub time: NaiveTime,
    pub level: Level,
    pub error: Option<ErrorDetail>,
    pub fields: Fields,
    pub message: String,
}

impl LogRecord {
    pub fn new(
        now: DateTime<Local>,
        level: Level,
        error: Option<ErrorDetail>,
        fields: Fields,
        message: String,
    ) -> Self {
        let time = now.time();
        Self {
            timestamp: now.timestamp(),
            // Leap-second nanos render as :60 otherwise.
            time: time.with_nanosecond(0).unwrap_or(time),
            level,
            error,
            fields,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fields_macro_converts_values() {
        let fields = fields! {
            "worker" => 1,
            "name" => "asds",
            "ratio" => 0.5,
            "ok" => true,
            "ids" => vec![1u64, 2, 3],
        };

        assert_eq!(fields["worker"], Value::I64(1));
        assert_eq!(fields["name"], Value::Str("asds".to_string()));
        assert_eq!(fields["ratio"], Value::F64(0.5));
        assert_eq!(fields["ok"], Value::Bool(true));
        assert_eq!(
            fields["ids"],
            Value::Array(vec![Value::U64(1), Value::U64(2), Value::U64(3)])
        );
    }

    #[test]
    fn json_values_map_onto_variants() {
        let json = serde_json::json!({
            "n": -3,
            "big": u64::MAX,
            "f": 1.25,
            "nested": { "a": [true, null] }
        });

        let Value::Map(map) = Value::from(json) else {
            panic!("object should become a map");
        };
        assert_eq!(map["n"], Value::I64(-3));
        assert_eq!(map["big"], Value::U64(u64::MAX));
        assert_eq!(map["f"], Value::F64(1.25));
        let Value::Map(nested) = &map["nested"] else {
            panic!("nested object should become a map");
        };
        assert_eq!(
            nested["a"],
            Value::Array(vec![Value::Bool(true), Value::Opaque("null")])
        );
    }

    #[test]
    fn opaque_carries_type_name() {
        struct Handle;
        let Value::Opaque(name) = Value::opaque::<Handle>() else {
            panic!("expected opaque");
        };
        assert!(name.ends_with("Handle"));
    }

    #[test]
    fn default_classifier_uses_display() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let detail = default_classifier(&err);
        assert_eq!(detail, ErrorDetail::new(0, "", "disk on fire"));
    }

    #[test]
    fn record_derives_both_times_from_one_instant() {
        let now = Local.with_ymd_and_hms(2024, 1, 15, 13, 4, 5).unwrap();
        let record = LogRecord::new(now, Level::Info, None, Fields::new(), "hi".into());

        assert_eq!(record.timestamp, now.timestamp());
        assert_eq!(record.time.format("%H:%M:%S").to_string(), "13:04:05");
    }
}
