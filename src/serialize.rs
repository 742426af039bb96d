//! Compact, deterministic JSON lines.
//!
//! Every record becomes exactly one line:
//!
//! ```text
//! {"stamp":1700000000,"time":"13:04:05","level":"WARNING","error":{...},"a":1,"b":"x","message":"..."}
//! ```
//!
//! The fixed keys come first, the caller's fields follow in byte-wise
//! ascending key order, and `message` always closes the object. Writing
//! into a byte buffer cannot fail, so neither can serialization: values
//! without a JSON form degrade to a quoted placeholder.

use crate::record::{ErrorDetail, Fields, LogRecord, Value};
use std::io::Write;

/// Serialize a single record, newline included.
pub fn serialize(record: &LogRecord) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + record.message.len());
    write_record(&mut buf, record);
    buf
}

/// Serialize a batch into one buffer so it can be written with a single
/// call.
pub fn serialize_batch(records: &[LogRecord]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(records.len() * 160);
    for record in records {
        write_record(&mut buf, record);
    }
    buf
}

/// Append one serialized record to `buf`.
pub fn write_record(buf: &mut Vec<u8>, record: &LogRecord) {
    let _ = write!(
        buf,
        "{{\"stamp\":{},\"time\":\"{}\",\"level\":\"{}\",",
        record.timestamp,
        record.time.format("%H:%M:%S"),
        record.level.as_str()
    );

    if let Some(error) = &record.error {
        buf.extend_from_slice(b"\"error\":");
        write_error(buf, error);
        buf.push(b',');
    }

    for (key, value) in sorted(&record.fields) {
        write_str(buf, key);
        buf.push(b':');
        write_value(buf, value);
        buf.push(b',');
    }

    buf.extend_from_slice(b"\"message\":");
    write_str(buf, &record.message);
    buf.extend_from_slice(b"}\n");
}

fn write_error(buf: &mut Vec<u8>, error: &ErrorDetail) {
    // An unclassified error carries only its text.
    if error.code != 0 && !error.kind.is_empty() {
        let _ = write!(buf, "{{\"code\":{},\"type\":", error.code);
        write_str(buf, &error.kind);
        buf.extend_from_slice(b",\"message\":");
    } else {
        buf.extend_from_slice(b"{\"message\":");
    }
    write_str(buf, &error.message);
    buf.push(b'}');
}

/// Entries ordered by key bytes; a key sorts before every key it prefixes.
fn sorted(fields: &Fields) -> Vec<(&str, &Value)> {
    let mut entries: Vec<(&str, &Value)> =
        fields.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    entries
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::I64(v) => {
            let _ = write!(buf, "{}", v);
        }
        Value::U64(v) => {
            let _ = write!(buf, "{}", v);
        }
        Value::F64(v) => {
            if v.is_finite() {
                let _ = write!(buf, "{:E}", v);
            } else {
                write_str(buf, &v.to_string());
            }
        }
        Value::F32(v) => {
            if v.is_finite() {
                let _ = write!(buf, "{:E}", v);
            } else {
                write_str(buf, &v.to_string());
            }
        }
        Value::Bool(v) => buf.extend_from_slice(if *v { b"true" } else { b"false" }),
        Value::Str(v) => write_str(buf, v),
        Value::Map(map) => {
            buf.push(b'{');
            for (i, (key, value)) in sorted(map).into_iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_str(buf, key);
                buf.push(b':');
                write_value(buf, value);
            }
            buf.push(b'}');
        }
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(buf, item);
            }
            buf.push(b']');
        }
        Value::Opaque(type_name) => write_str(buf, type_name),
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    if serde_json::to_writer(&mut *buf, s).is_err() {
        buf.extend_from_slice(b"\"\"");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::record::Level;
    use chrono::NaiveTime;

    fn record(level: Level, error: Option<ErrorDetail>, fields: Fields, message: &str) -> LogRecord {
        LogRecord {
            timestamp: 100500,
            time: NaiveTime::from_hms_opt(13, 4, 5).unwrap(),
            level,
            error,
            fields,
            message: message.to_string(),
        }
    }

    fn line(record: &LogRecord) -> String {
        String::from_utf8(serialize(record)).unwrap()
    }

    #[test]
    fn matches_reference_line() {
        let record = record(
            Level::Warning,
            Some(ErrorDetail::new(
                42,
                "Business",
                "cant do something: \"becouse of...,\"",
            )),
            fields! {
                "worker" => 1,
                "arg1asd" => "asddsadasd",
                "arg1" => "asds",
                "arg2" => "fdsjkfhdsfjkh",
            },
            "while something",
        );

        let expected = concat!(
            r#"{"stamp":100500,"time":"13:04:05","level":"WARNING","#,
            r#""error":{"code":42,"type":"Business","message":"cant do something: \"becouse of...,\""},"#,
            r#""arg1":"asds","arg1asd":"asddsadasd","arg2":"fdsjkfhdsfjkh","worker":1,"#,
            r#""message":"while something"}"#,
            "\n"
        );
        assert_eq!(line(&record), expected);
    }

    #[test]
    fn output_is_valid_json_and_stable() {
        let record = record(
            Level::Info,
            None,
            fields! {
                "zeta" => "quote \" and \n newline",
                "alpha" => vec![1, 2],
                "mid" => fields! { "y" => false, "x" => 2.5 },
            },
            "tab\there",
        );

        let first = serialize(&record);
        let second = serialize(&record);
        assert_eq!(first, second);
        assert_eq!(*first.last().unwrap(), b'\n');

        let parsed: serde_json::Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(parsed["zeta"], "quote \" and \n newline");
        assert_eq!(parsed["message"], "tab\there");
        assert_eq!(parsed["mid"]["x"], 2.5);
    }

    #[test]
    fn keys_are_byte_ordered_with_prefix_first() {
        let record = record(
            Level::Info,
            None,
            fields! { "b" => 1, "ab" => 1, "a" => 1, "B" => 1, "aa" => 1 },
            "m",
        );
        let text = line(&record);
        let positions: Vec<usize> = ["\"B\":", "\"a\":", "\"aa\":", "\"ab\":", "\"b\":"]
            .iter()
            .map(|key| text.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }

    #[test]
    fn nested_maps_are_sorted_too() {
        let record = record(
            Level::Info,
            None,
            fields! { "outer" => fields! { "c" => 3, "a" => 1, "b" => 2 } },
            "m",
        );
        assert!(line(&record).contains(r#""outer":{"a":1,"b":2,"c":3},"#));
    }

    #[test]
    fn unclassified_error_has_message_only() {
        let record = record(
            Level::Error,
            Some(ErrorDetail::new(0, "", "boom")),
            Fields::new(),
            "failed",
        );
        assert_eq!(
            line(&record),
            "{\"stamp\":100500,\"time\":\"13:04:05\",\"level\":\"ERROR\",\"error\":{\"message\":\"boom\"},\"message\":\"failed\"}\n"
        );
    }

    #[test]
    fn scalars_use_their_own_encoding() {
        let record = record(
            Level::Info,
            None,
            fields! {
                "f" => 1234.5,
                "g" => 0.1f32,
                "nan" => f64::NAN,
                "neg" => -7,
                "u" => u64::MAX,
                "t" => true,
                "o" => Value::Opaque("my::Handle"),
            },
            "m",
        );
        let text = line(&record);
        assert!(text.contains(r#""f":1.2345E3,"#), "{text}");
        assert!(text.contains(r#""g":1E-1,"#), "{text}");
        assert!(text.contains(r#""nan":"NaN","#), "{text}");
        assert!(text.contains(r#""neg":-7,"#), "{text}");
        assert!(text.contains(r#""o":"my::Handle","#), "{text}");
        assert!(text.contains(r#""t":true,"#), "{text}");
        assert!(text.contains(&format!(r#""u":{},"#, u64::MAX)), "{text}");
        serde_json::from_str::<serde_json::Value>(&text).unwrap();
    }

    #[test]
    fn batch_is_concatenated_lines() {
        let a = record(Level::Info, None, Fields::new(), "a");
        let b = record(Level::Decision, None, Fields::new(), "b");
        let bytes = serialize_batch(&[a.clone(), b.clone()]);
        let mut expected = serialize(&a);
        expected.extend(serialize(&b));
        assert_eq!(bytes, expected);
        assert_eq!(bytes.iter().filter(|&&c| c == b'\n').count(), 2);
    }
}
