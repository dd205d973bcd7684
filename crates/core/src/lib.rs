//! SafeScape core progress model.
//!
//! This crate defines the learner progress document, the per-module
//! section schema, the completion engine, and the merge rules used to
//! migrate persisted data and reconcile with the server of record.

#![warn(missing_docs)]

// Identity of a module
mod module_num;

// Document model
mod section;
pub mod schema;
mod document;

// Evaluation and reconciliation
pub mod completion;
pub mod merge;
mod remote;
mod event;

// Re-exports
pub use module_num::{ModuleNum, InvalidModuleNum, MODULE_COUNT};
pub use section::{SectionValue, Sections};
pub use document::{ProgressDocument, Module, Modules};
pub use completion::{
    calculate_overall_progress, is_module_satisfied, module_fill_ratio, recompute_completion,
};
pub use merge::{deep_merge, merge_onto_defaults, merge_remote, MergeError};
pub use remote::{ProgressUpdate, RemoteModuleResponse, RemoteProgressRecord, RemoteSnapshot};
pub use event::ProgressEvent;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
