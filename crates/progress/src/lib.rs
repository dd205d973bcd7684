//! Learner progress tracking.
//!
//! Document store, completion recomputation, change notification, and
//! best-effort reconciliation with the server of record.

#![warn(missing_docs)]

pub mod config;
pub mod notify;
pub mod store;
pub mod remote;
pub mod reconciler;
pub mod tracker;

pub use config::{Identity, RemoteConfig, TrackerConfig};
pub use notify::{EmbedForwarder, Notifier, ProgressListener, Subscription};
pub use store::{ImportError, ProgressStore};
pub use remote::{HttpProgressClient, RemoteError, RemoteProgress};
pub use reconciler::{ErrorReporter, Reconciler, TracingReporter};
pub use tracker::ProgressTracker;
