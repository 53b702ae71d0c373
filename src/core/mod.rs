//! core
//!
//! Core domain types, boundaries, and resolution for Modstore.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ModuleName, Revision, Datastore, etc.
//! - [`context`] - Schema-layer and plugin-layer boundary descriptors
//! - [`resolver`] - Install/removal closures and feature validation
//! - [`verify`] - Fast tree-vs-context consistency verification
//! - [`config`] - Store configuration schema and loading
//! - [`paths`] - Centralized path routing for registry storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Resolution and verification are deterministic pure functions
//! - The schema context is read, never rebuilt, by this crate

pub mod config;
pub mod context;
pub mod paths;
pub mod resolver;
pub mod types;
pub mod verify;
