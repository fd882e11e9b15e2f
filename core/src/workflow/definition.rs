// larder/src/workflow/definition.rs

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::StepControl;
use crate::core::step::StepDef;
use crate::error::{LarderError, LarderResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// An ordered list of named steps over shared data `T`.
pub struct Workflow<T>
where
  T: 'static + Send + Sync,
{
  pub(crate) name: &'static str,
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) handlers: HashMap<String, Vec<Handler<T>>>,
}

impl<T> Workflow<T>
where
  T: 'static + Send + Sync,
{
  /// `step_defs` is `(name, optional)` in execution order.
  pub fn new(name: &'static str, step_defs: &[(&str, bool)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step_name, optional)| StepDef {
        name: (*step_name).to_string(),
        optional: *optional,
        skip_if: None,
      })
      .collect();

    Self {
      name,
      steps,
      handlers: HashMap::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn step_mut(&mut self, step_name: &str) -> LarderResult<&mut StepDef<T>> {
    self
      .steps
      .iter_mut()
      .find(|s| s.name == step_name)
      .ok_or_else(|| LarderError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }

  /// Registers a handler for `step_name`. Several handlers on one step run in
  /// registration order.
  pub fn on<F>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<T>) -> F + Send + Sync + 'static,
  ) -> LarderResult<&mut Self>
  where
    F: Future<Output = LarderResult<StepControl>> + Send + 'static,
  {
    self.step_mut(step_name)?;
    let handler: Handler<T> = Box::new(move |ctx_data| Box::pin(handler_fn(ctx_data)));
    self.handlers.entry(step_name.to_string()).or_default().push(handler);
    Ok(self)
  }

  /// Skips `step_name` whenever `condition` holds at the moment the step is
  /// reached.
  pub fn skip_if(
    &mut self,
    step_name: &str,
    condition: impl Fn(&ContextData<T>) -> bool + Send + Sync + 'static,
  ) -> LarderResult<&mut Self> {
    self.step_mut(step_name)?.skip_if = Some(Arc::new(condition));
    Ok(self)
  }
}
