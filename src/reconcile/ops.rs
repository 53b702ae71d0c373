//! reconcile::ops
//!
//! The five reconciliation operations over the metadata tree.
//!
//! # Architecture
//!
//! Each operation is a pure function from (old tree, contexts, inputs) to
//! (new tree, ancillary results) or a typed error. The input tree is never
//! mutated: success hands back a fully constructed replacement, failure
//! hands back nothing, so partial application cannot exist. Persisting the
//! replacement is the caller's job (see [`run_with_writer`]).
//!
//! [`run_with_writer`]: crate::reconcile::run_with_writer
//!
//! # Invariants
//!
//! - A failed operation has no observable effect on the tree
//! - Entry install order is preserved across updates and toggles
//! - The accumulating [`ModuleSet`] names every module a change touched,
//!   each exactly once

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::core::context::{ModuleDescriptor, PluginCatalog, SchemaContext};
use crate::core::resolver::{
    closure_for_install, closure_for_removal, validate_feature_change, ModuleSet, ResolveError,
};
use crate::core::types::{Datastore, FeatureName, ModuleName, PluginName};
use crate::metadata::entry::{EntryOverrides, ModuleEntry, PluginAssignment};
use crate::metadata::tree::{MetadataTree, TreeError};

/// Errors from reconciliation operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// An entry already exists for the module. Defensive: callers are
    /// expected to query before installing.
    #[error("module '{0}' already has a registry entry")]
    DuplicateModule(ModuleName),

    /// No entry exists for the module. Defensive: unreachable under
    /// correct usage, surfaced as a bug rather than retried.
    #[error("module '{0}' has no registry entry")]
    ModuleNotFound(ModuleName),

    /// The schema context does not match what the operation requires.
    #[error("schema context disagrees for module '{module}': {detail}")]
    SchemaMismatch { module: ModuleName, detail: String },

    /// A plugin binding names a plugin the catalog does not support.
    #[error("no plugin '{plugin}' supporting the {datastore} datastore")]
    UnknownPlugin {
        plugin: PluginName,
        datastore: Datastore,
    },

    /// Dependency resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<TreeError> for ReconcileError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::DuplicateEntry(name) => ReconcileError::DuplicateModule(name),
            TreeError::EntryNotFound(name) => ReconcileError::ModuleNotFound(name),
        }
    }
}

/// Modules newly present in the context, reachable from `root` through
/// imports, that have no entry yet. Implicit modules are never included.
fn newly_present(
    tree: &MetadataTree,
    ctx: &SchemaContext,
    root: &ModuleName,
) -> Vec<ModuleName> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(desc) = ctx.module(&name) else {
            continue;
        };
        if desc.is_implicit() || tree.contains(&name) {
            // Already installed (or never tracked): its imports are too.
            continue;
        }
        out.push(name.clone());
        for import in desc.imports() {
            stack.push(import.clone());
        }
    }

    out
}

/// Validate every plugin binding against the catalog. Kinds left unbound
/// are fine; a binding must name a plugin that supports its kind.
fn validate_assignment(
    assignment: &PluginAssignment,
    catalog: &PluginCatalog,
) -> Result<(), ReconcileError> {
    for (datastore, plugin) in assignment.iter() {
        if !catalog.supports(plugin, datastore) {
            return Err(ReconcileError::UnknownPlugin {
                plugin: plugin.clone(),
                datastore,
            });
        }
    }
    Ok(())
}

/// Install a newly added module.
///
/// `ctx` already contains the module (and anything it pulled in). The
/// install closure — the module, its newly present imports, and their
/// submodules — is appended to the tree in dependency order, every member
/// recorded in `mod_set` for the caller's datastore initialization.
///
/// # Errors
///
/// - [`ReconcileError::DuplicateModule`] if an entry already exists
/// - [`ReconcileError::SchemaMismatch`] if `ctx` lacks the module
/// - [`ReconcileError::UnknownPlugin`] if a binding names a plugin the
///   catalog cannot satisfy
pub fn add_module(
    tree: &MetadataTree,
    ctx: &SchemaContext,
    module: &ModuleName,
    assignment: &PluginAssignment,
    catalog: &PluginCatalog,
    mod_set: &mut ModuleSet,
) -> Result<MetadataTree, ReconcileError> {
    if tree.contains(module) {
        return Err(ReconcileError::DuplicateModule(module.clone()));
    }
    if !ctx.contains(module) {
        return Err(ReconcileError::SchemaMismatch {
            module: module.clone(),
            detail: "module to install is not present in the schema context".to_string(),
        });
    }
    validate_assignment(assignment, catalog)?;

    let new_modules = newly_present(tree, ctx, module);
    let closure = closure_for_install(ctx, &new_modules)?;

    let mut new_tree = tree.clone();
    for name in &closure {
        // Entries exist for proper modules only; submodules ride along in
        // their parent's entry but still count as affected.
        if let Some(desc) = ctx.module(name) {
            new_tree = new_tree.insert(ModuleEntry::new(desc, assignment))?;
        }
        mod_set.insert(name.clone());
    }

    debug!(module = %module, installed = closure.len(), "installed module closure");
    Ok(new_tree)
}

/// Remove modules from the registry.
///
/// `ctx_before` still contains the removed modules, `ctx_after` does not.
/// On success the matching entries leave the tree and are handed back in
/// teardown order so the caller can delete their datastore content.
///
/// # Errors
///
/// - [`ResolveError::StillDepended`] (wrapped) if a surviving module still
///   imports a removed one; the caller expands `removed` and retries
/// - [`ReconcileError::ModuleNotFound`] if a removed module has no entry
/// - [`ReconcileError::SchemaMismatch`] if a removed module is still in
///   `ctx_after`
pub fn del_module(
    tree: &MetadataTree,
    ctx_before: &SchemaContext,
    ctx_after: &SchemaContext,
    removed: &[ModuleName],
    mod_set: &mut ModuleSet,
) -> Result<(MetadataTree, Vec<ModuleEntry>), ReconcileError> {
    for name in removed {
        if ctx_after.contains(name) {
            return Err(ReconcileError::SchemaMismatch {
                module: name.clone(),
                detail: "module to remove is still present in the new schema context".to_string(),
            });
        }
        if !tree.contains(name) {
            return Err(ReconcileError::ModuleNotFound(name.clone()));
        }
    }

    let closure = closure_for_removal(ctx_before, ctx_after, removed)?;

    let mut new_tree = tree.clone();
    let mut deleted = Vec::new();
    for name in &closure {
        // Submodule names carry no entry of their own.
        if new_tree.contains(name) {
            let (smaller, entry) = new_tree.remove(name)?;
            new_tree = smaller;
            deleted.push(entry);
        }
        mod_set.insert(name.clone());
    }

    debug!(removed = deleted.len(), "removed module entries");
    Ok((new_tree, deleted))
}

/// Apply a module revision upgrade.
///
/// Replaces the entry's revision and submodules from the context's current
/// descriptor. Enabled features no longer declared by the new revision are
/// dropped and reported; everything else — plugin bindings, replay support,
/// unrelated entries — is untouched.
///
/// # Errors
///
/// - [`ReconcileError::ModuleNotFound`] if no entry exists (defensive)
/// - [`ReconcileError::SchemaMismatch`] if `ctx` lacks the module
pub fn upd_module(
    tree: &MetadataTree,
    ctx: &SchemaContext,
    module: &ModuleName,
) -> Result<(MetadataTree, Vec<FeatureName>), ReconcileError> {
    let entry = tree
        .get(module)
        .ok_or_else(|| ReconcileError::ModuleNotFound(module.clone()))?;
    let desc = ctx
        .module(module)
        .ok_or_else(|| ReconcileError::SchemaMismatch {
            module: module.clone(),
            detail: "updated module is not present in the schema context".to_string(),
        })?;

    let (kept, dropped): (Vec<_>, Vec<_>) = entry
        .enabled_features
        .iter()
        .cloned()
        .partition(|f| desc.declares_feature(f));

    let updated = entry.with(EntryOverrides {
        revision: Some(desc.revision().cloned()),
        enabled_features: Some(kept.into_iter().collect()),
        submodules: Some(desc.submodules().to_vec()),
        ..Default::default()
    });

    let new_tree = tree.replace(updated)?;
    if !dropped.is_empty() {
        debug!(module = %module, dropped = ?dropped, "features dropped by revision upgrade");
    }
    Ok((new_tree, dropped))
}

/// Apply a feature toggle.
///
/// `old_mod` carries the pre-toggle schema view (the baseline the entry's
/// enabled set is validated against), `new_mod` the post-toggle view whose
/// enabled-feature membership replaces the entry's set.
///
/// # Errors
///
/// - [`ResolveError::UnknownFeature`] / [`ResolveError::FeatureConflict`]
///   (wrapped) for an invalid requested state; surfaced, never retried
/// - [`ReconcileError::ModuleNotFound`] if no entry exists (defensive)
pub fn chng_feature(
    tree: &MetadataTree,
    old_mod: &ModuleDescriptor,
    new_mod: &ModuleDescriptor,
    feature: &FeatureName,
    enable: bool,
) -> Result<MetadataTree, ReconcileError> {
    if old_mod.name() != new_mod.name() {
        return Err(ReconcileError::SchemaMismatch {
            module: new_mod.name().clone(),
            detail: format!(
                "feature change descriptors disagree: old is '{}'",
                old_mod.name()
            ),
        });
    }

    let entry = tree
        .get(old_mod.name())
        .ok_or_else(|| ReconcileError::ModuleNotFound(old_mod.name().clone()))?;

    validate_feature_change(old_mod, &entry.enabled_features, feature, enable)?;

    let updated = entry.with(EntryOverrides {
        enabled_features: Some(new_mod.enabled_features().clone()),
        ..Default::default()
    });

    debug!(module = %old_mod.name(), feature = %feature, enable, "changed feature state");
    Ok(tree.replace(updated)?)
}

/// Set replay support on one module, or on all modules.
///
/// Entries already at the target value are left alone and not reported;
/// each entry that actually changed enters `mod_set` exactly once, telling
/// the caller which history stores to create or destroy.
///
/// # Errors
///
/// [`ReconcileError::ModuleNotFound`] for an explicit target with no entry.
pub fn chng_replay_support(
    tree: &MetadataTree,
    module: Option<&ModuleName>,
    enable: bool,
    mod_set: &mut ModuleSet,
) -> Result<MetadataTree, ReconcileError> {
    let targets: Vec<ModuleName> = match module {
        Some(name) => {
            if !tree.contains(name) {
                return Err(ReconcileError::ModuleNotFound(name.clone()));
            }
            vec![name.clone()]
        }
        None => tree.iter().map(|e| e.name.clone()).collect(),
    };

    let mut new_tree = tree.clone();
    for name in targets {
        let Some(entry) = tree.get(&name) else {
            continue;
        };
        if entry.replay_support == enable {
            continue;
        }
        let updated = entry.with(EntryOverrides {
            replay_support: Some(enable),
            ..Default::default()
        });
        new_tree = new_tree.replace(updated)?;
        mod_set.insert(name);
    }

    Ok(new_tree)
}
