// larder/src/model/mod.rs

//! Domain types read from (and written to) store documents.

pub mod lifecycle;
pub mod order;
pub mod shop;
pub mod timestamp;
pub mod user;

pub use lifecycle::{LifecycleState, COUNTDOWN_SECONDS};
pub use order::{format_order_number, Order};
pub use shop::{MenuItem, Shop};
pub use user::User;

use serde_json::{Map, Value};

/// Money in minor currency units.
pub type Cents = i64;

pub(crate) fn value_str(data: &Map<String, Value>, key: &str) -> Option<String> {
  match data.get(key)? {
    Value::String(s) => {
      let trimmed = s.trim();
      (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
    // Shop ids were sometimes written as numbers.
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

pub(crate) fn value_cents(data: &Map<String, Value>, key: &str) -> Option<Cents> {
  let value = data.get(key)?;
  value
    .as_i64()
    .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as Cents))
}

pub(crate) fn value_u64(data: &Map<String, Value>, key: &str) -> Option<u64> {
  let value = data.get(key)?;
  value
    .as_u64()
    .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
