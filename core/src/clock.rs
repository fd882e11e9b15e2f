// larder/src/clock.rs

use chrono::{DateTime, TimeDelta, Utc};

/// Source of "now" for countdown arithmetic.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A wall-clock reading advanced by the tokio timer. Under a paused tokio
/// runtime it moves only when the runtime's time is advanced, which keeps
/// countdowns and the timers that enforce them on the same time line.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
  base: DateTime<Utc>,
  started: tokio::time::Instant,
}

impl TokioClock {
  pub fn new() -> Self {
    Self::starting_at(Utc::now())
  }

  pub fn starting_at(base: DateTime<Utc>) -> Self {
    Self {
      base,
      started: tokio::time::Instant::now(),
    }
  }
}

impl Default for TokioClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for TokioClock {
  fn now(&self) -> DateTime<Utc> {
    let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or_else(|_| TimeDelta::zero());
    self.base + elapsed
  }
}
