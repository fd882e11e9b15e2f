// larder/src/core/control.rs

//! Flow signals returned by workflow step handlers and the outcome of a run.

/// Returned by a handler to say whether the workflow goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  Continue,
  /// Halt the run. Later handlers and steps are not executed.
  Stop,
}

/// Outcome of a full workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  Completed,
  Stopped,
}
