// larder/src/lib.rs

//! Larder: order lifecycle tracking for a food-ordering client.
//!
//! The crate keeps a signed-in user's orders consistent between the hosted
//! document store and the device:
//!  - Status text is classified into a closed lifecycle (`awaiting`,
//!    `accepted`, `completed`, `cancelled`) through synonym sets.
//!  - Accepted orders are completed automatically once their countdown runs
//!    out, with the countdown anchor persisted locally so it survives a
//!    restart.
//!  - Checkout debits the wallet, allocates the shop's next order number and
//!    creates the order in one atomic transaction.
//!
//! Collaborators (the remote store, local key-value storage and the identity
//! provider) are traits; in-process implementations are provided for tests
//! and simulations.

pub mod checkout;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod model;
pub mod reconciler;
pub mod scheduler;
pub mod session;
pub mod shops;
pub mod store;
pub mod wallet;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::core::{ContextData, RunOutcome, StepControl};
pub use crate::workflow::Workflow;

pub use crate::checkout::{Checkout, CheckoutReceipt, CheckoutRequest};
pub use crate::clock::{Clock, SystemClock, TokioClock};
pub use crate::config::Settings;
pub use crate::error::{LarderError, LarderResult};
pub use crate::identity::{IdentityProvider, StaticIdentity};
pub use crate::ledger::{LedgerEntry, PendingLedger};
pub use crate::model::{Cents, LifecycleState, Order, Shop, User, COUNTDOWN_SECONDS};
pub use crate::reconciler::{CompletionOutcome, OrderTracker, OrderView, OrderViews, PassReport, TrackerDeps};
pub use crate::scheduler::TimerScheduler;
pub use crate::session::SessionManager;
pub use crate::shops::ShopCache;
pub use crate::store::{DocumentSnapshot, FileKv, KeyValueStore, MemoryKv, MemoryStore, RemoteStore};
pub use crate::wallet::{ActivityEntry, ActivityKind, Wallet};
