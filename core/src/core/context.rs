// larder/src/core/context.rs

//! Handler type for workflow steps.

use crate::core::context_data::ContextData;
use crate::core::control::StepControl;
use crate::error::LarderResult;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An asynchronous step handler.
///
/// It receives its own clone of the shared `ContextData<T>`, takes short-lived
/// guards on it (never across an `.await`) and returns whether the workflow
/// should continue.
pub type Handler<T> = Box<dyn Fn(ContextData<T>) -> BoxFuture<'static, LarderResult<StepControl>> + Send + Sync>;
