// larder/src/model/timestamp.rs

//! Timestamps arrive in several encodings: RFC 3339 strings, epoch
//! milliseconds, and `{seconds, nanoseconds}` objects from the hosted store's
//! native timestamp type. All of them are accepted; anything else is `None`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
  match value {
    Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
      .ok()
      .map(|dt| dt.with_timezone(&Utc)),
    Value::Number(n) => {
      let millis = n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
      DateTime::from_timestamp_millis(millis)
    }
    Value::Object(map) => {
      let seconds = map.get("seconds").or_else(|| map.get("_seconds"))?.as_i64()?;
      let nanos = map
        .get("nanoseconds")
        .or_else(|| map.get("_nanoseconds"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
      DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
    }
    _ => None,
  }
}

/// The encoding this crate writes.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
  Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
