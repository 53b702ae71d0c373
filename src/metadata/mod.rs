//! metadata
//!
//! The registry's persisted state: entries, tree, codec, and storage.
//!
//! # Modules
//!
//! - [`entry`] - The per-module metadata record and plugin assignments
//! - [`tree`] - The ordered, copy-on-write collection of entries
//! - [`codec`] - Document (de)serialization, validation, and bootstrap
//! - [`storage`] - Whole-document persistence boundary
//!
//! # Architecture
//!
//! Every layer here works on values. The tree a reconcile operation
//! receives is never mutated; the operation builds a replacement, the
//! codec serializes it, and storage swaps the whole document atomically.

pub mod codec;
pub mod entry;
pub mod storage;
pub mod tree;

// Re-export main types for convenience
pub use entry::{EntryOverrides, ModuleEntry, PluginAssignment};
pub use storage::{FileStorage, StorageError, TreeStorage};
pub use tree::{MetadataTree, TreeError};
