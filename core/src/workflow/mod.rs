// larder/src/workflow/mod.rs

//! A small ordered-step engine. Both the reconciliation pass and the checkout
//! flow are expressed as a `Workflow<T>` so that the order in which their
//! effects happen is the order in which their steps are declared.

pub mod definition;
pub mod execution;

pub use definition::Workflow;
