// larder/src/workflow/execution.rs

use crate::core::context_data::ContextData;
use crate::core::control::{RunOutcome, StepControl};
use crate::error::{LarderError, LarderResult};
use crate::workflow::definition::Workflow;
use tracing::{event, span, Instrument, Level};

impl<T> Workflow<T>
where
  T: 'static + Send + Sync,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// A non-optional step without handlers is a setup error and fails the run
  /// with `HandlerMissing`. The first handler error aborts the run and is
  /// returned unchanged.
  pub async fn run(&self, ctx_data: ContextData<T>) -> LarderResult<RunOutcome> {
    let run_span = span!(Level::DEBUG, "workflow_run", workflow = self.name, num_steps = self.steps.len());
    self.run_steps(ctx_data).instrument(run_span).await
  }

  async fn run_steps(&self, ctx_data: ContextData<T>) -> LarderResult<RunOutcome> {
    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_cond) = &step_def.skip_if {
        if skip_cond(&ctx_data) {
          event!(Level::TRACE, step = step_name, "Step skipped by condition.");
          continue;
        }
      }

      let handlers = match self.handlers.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step_def.optional => {
          event!(Level::TRACE, step = step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        _ => {
          event!(Level::ERROR, step = step_name, "Non-optional step has no handlers.");
          return Err(LarderError::HandlerMissing {
            step_name: step_def.name.clone(),
          });
        }
      };

      let step_span = span!(Level::DEBUG, "workflow_step", step = step_name, step_index = step_idx);
      for handler_fn in handlers {
        match handler_fn(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(StepControl::Continue) => {}
          Ok(StepControl::Stop) => {
            event!(Level::DEBUG, workflow = self.name, step = step_name, "Workflow stopped by handler.");
            return Ok(RunOutcome::Stopped);
          }
          Err(e) => {
            event!(Level::DEBUG, workflow = self.name, step = step_name, error = %e, "Step handler failed.");
            return Err(e);
          }
        }
      }
    }

    Ok(RunOutcome::Completed)
  }
}
