// larder/src/reconciler/mod.rs

//! Order lifecycle reconciliation.
//!
//! An [`OrderTracker`] follows the signed-in user's orders. On every snapshot
//! it classifies the orders, splits them into active and history views,
//! mirrors in-flight orders into the local ledger and drives the automatic
//! accepted-to-completed transition with one timer per accepted order.

pub mod completion;
pub mod pass;
pub mod tracker;
pub mod views;

pub use completion::{complete_order, CompletionOutcome};
pub use pass::{ClassifiedOrder, PassReport, PASS_STEPS};
pub use tracker::{OrderTracker, TrackerDeps};
pub use views::{HistorySummary, OrderView, OrderViews};
