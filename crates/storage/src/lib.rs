//! Storage abstraction and implementations for SafeScape progress.
//!
//! This crate provides a key-value storage interface with a JSON file
//! implementation and an in-memory one.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{ProgressStorage, StorageError, Result};
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
