//! core::verify
//!
//! Fast consistency verification between tree and schema context.
//!
//! # Modes
//!
//! - **Consistency check**: run before and after every mutation
//!   - Every entry names a module present in the context
//!   - Every trackable context module has exactly one entry
//!   - Enabled features are declared, revisions agree
//!
//! - **Plugin check**: optional, needs a plugin catalog snapshot
//!   - Every binding names an existing plugin supporting that kind
//!
//! # Invariants
//!
//! - Never mutates tree or context
//! - Must be deterministic; all findings are accumulated, not short-circuited

use thiserror::Error;

use crate::core::context::{PluginCatalog, SchemaContext};
use crate::core::types::{Datastore, FeatureName, ModuleName, PluginName, Revision};
use crate::metadata::tree::MetadataTree;

/// A single consistency finding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    /// An entry names a module the context does not have.
    #[error("entry '{0}' has no module in the schema context")]
    DanglingEntry(ModuleName),

    /// A trackable context module has no entry.
    #[error("module '{0}' is present in the schema context but not tracked")]
    MissingEntry(ModuleName),

    /// Entry and context disagree on the module's revision.
    #[error("module '{module}' revision mismatch: entry has {entry:?}, context has {context:?}")]
    RevisionMismatch {
        module: ModuleName,
        entry: Option<Revision>,
        context: Option<Revision>,
    },

    /// An enabled feature is not declared by the current revision.
    #[error("module '{module}' has feature '{feature}' enabled but not declared")]
    UndeclaredFeature {
        module: ModuleName,
        feature: FeatureName,
    },

    /// A plugin binding names a plugin that is missing or unsuitable.
    #[error("module '{module}' binds {datastore} to plugin '{plugin}' which does not support it")]
    UnknownPlugin {
        module: ModuleName,
        datastore: Datastore,
        plugin: PluginName,
    },
}

/// Result of a verification pass.
#[derive(Debug)]
pub struct VerifyResult {
    /// Whether verification passed.
    pub ok: bool,
    /// Findings, empty on success.
    pub errors: Vec<ConsistencyError>,
}

impl VerifyResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: vec![],
        }
    }

    /// Create a failed result with findings.
    pub fn failure(errors: Vec<ConsistencyError>) -> Self {
        Self { ok: false, errors }
    }

    fn from_errors(errors: Vec<ConsistencyError>) -> Self {
        if errors.is_empty() {
            Self::success()
        } else {
            Self::failure(errors)
        }
    }
}

/// Check that the tree and the schema context agree.
///
/// Covers both directions: no dangling entries, no untracked trackable
/// modules, and per-entry revision/feature agreement. Implicit modules are
/// exempt from tracking.
pub fn check_consistency(tree: &MetadataTree, ctx: &SchemaContext) -> VerifyResult {
    let mut errors = Vec::new();

    for entry in tree {
        match ctx.module(&entry.name) {
            None => errors.push(ConsistencyError::DanglingEntry(entry.name.clone())),
            Some(module) => {
                if entry.revision.as_ref() != module.revision() {
                    errors.push(ConsistencyError::RevisionMismatch {
                        module: entry.name.clone(),
                        entry: entry.revision.clone(),
                        context: module.revision().cloned(),
                    });
                }
                for feature in &entry.enabled_features {
                    if !module.declares_feature(feature) {
                        errors.push(ConsistencyError::UndeclaredFeature {
                            module: entry.name.clone(),
                            feature: feature.clone(),
                        });
                    }
                }
            }
        }
    }

    for module in ctx.modules() {
        if module.is_implicit() {
            continue;
        }
        if !tree.contains(module.name()) {
            errors.push(ConsistencyError::MissingEntry(module.name().clone()));
        }
    }

    VerifyResult::from_errors(errors)
}

/// Check every plugin binding against a catalog snapshot.
pub fn check_plugins(tree: &MetadataTree, catalog: &PluginCatalog) -> VerifyResult {
    let mut errors = Vec::new();

    for entry in tree {
        for (datastore, plugin) in &entry.datastore_plugins {
            if !catalog.supports(plugin, *datastore) {
                errors.push(ConsistencyError::UnknownPlugin {
                    module: entry.name.clone(),
                    datastore: *datastore,
                    plugin: plugin.clone(),
                });
            }
        }
    }

    VerifyResult::from_errors(errors)
}
