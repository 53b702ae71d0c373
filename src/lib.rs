//! Modstore - module metadata registry for a YANG-based configuration store
//!
//! Modstore tracks which schema modules a configuration platform has
//! installed: their revisions, enabled features, datastore plugin bindings,
//! and replay-support flags. The registry is persisted as one structured
//! document shared by every process of the platform and is reconciled
//! against the live schema context on every module lifecycle event.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`core`] - Domain types, schema-layer boundary, dependency resolution,
//!   consistency verification, paths, and configuration
//! - [`metadata`] - The entry model, the tree value, the document codec,
//!   and the persistence boundary
//! - [`reconcile`] - The five reconciliation operations, the process-shared
//!   lock, and the lock-load-apply-verify-persist lifecycle
//!
//! # Correctness Invariants
//!
//! 1. Every tracked module exists in the active schema context, and every
//!    trackable context module is tracked exactly once
//! 2. All mutations flow through the reconcile lifecycle under a single
//!    process-shared writer lock
//! 3. Operations are pure tree-to-tree transformations; a failure never
//!    leaves a partially applied tree, in memory or on disk
//! 4. Persistence is whole-document replacement; readers never observe a
//!    torn write

pub mod core;
pub mod metadata;
pub mod reconcile;
