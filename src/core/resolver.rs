//! core::resolver
//!
//! Dependency resolution over the schema import graph.
//!
//! # Architecture
//!
//! The import graph is a DAG where:
//! - Nodes are modules in the schema context
//! - Edges point from importer to imported module
//! - Submodules hang off their including module and are not nodes
//!
//! Resolution is a pure function over descriptors: it never touches the
//! metadata tree, storage, or locks, which keeps closure logic directly
//! unit-testable.
//!
//! # Invariants
//!
//! - Install closures list a module only after everything it imports
//! - Removal closures list importers before what they import
//! - A module's submodules immediately follow it in either closure
//! - Output order is deterministic for a given input order

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

use super::context::{ModuleDescriptor, SchemaContext};
use super::types::{FeatureName, ModuleName};

/// Errors from dependency resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A module slated for removal is still imported by a surviving module.
    ///
    /// Recoverable: the caller adds `required_by` to the removal set and
    /// retries the whole operation.
    #[error("module '{module}' is still required by '{required_by}'")]
    StillDepended {
        /// The module that cannot be removed yet.
        module: ModuleName,
        /// The surviving module that imports it.
        required_by: ModuleName,
    },

    /// The feature is not declared by the module's current revision.
    #[error("module '{module}' has no feature '{feature}'")]
    UnknownFeature {
        module: ModuleName,
        feature: FeatureName,
    },

    /// The requested feature state violates a prerequisite constraint.
    #[error("feature '{feature}' of module '{module}' {detail}")]
    FeatureConflict {
        module: ModuleName,
        feature: FeatureName,
        detail: String,
    },

    /// The import graph contains a cycle. A compiled schema context is
    /// acyclic, so this indicates corrupted input.
    #[error("import cycle detected at module '{0}'")]
    ImportCycle(ModuleName),
}

/// An ordered, deduplicating set of module names.
///
/// Used both as resolver output and as the per-operation accumulating set
/// reported back to the caller: the modules one logical change touched, in
/// the order they were touched, each at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet {
    names: Vec<ModuleName>,
    seen: HashSet<ModuleName>,
}

impl ModuleSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module name, keeping insertion order.
    ///
    /// Returns `true` if the name was not already present.
    pub fn insert(&mut self, name: ModuleName) -> bool {
        if self.seen.insert(name.clone()) {
            self.names.push(name);
            true
        } else {
            false
        }
    }

    /// Whether the set contains the name.
    pub fn contains(&self, name: &ModuleName) -> bool {
        self.seen.contains(name)
    }

    /// The names in insertion order.
    pub fn names(&self) -> &[ModuleName] {
        &self.names
    }

    /// Iterate over the names in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleName> {
        self.names.iter()
    }

    /// Number of names in the set.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl IntoIterator for ModuleSet {
    type Item = ModuleName;
    type IntoIter = std::vec::IntoIter<ModuleName>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModuleSet {
    type Item = &'a ModuleName;
    type IntoIter = std::slice::Iter<'a, ModuleName>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

/// Topologically order `names` so that a module never precedes one it
/// imports. Only edges between members of `names` constrain the order;
/// imports already satisfied outside the set are ignored.
fn topological_order(
    ctx: &SchemaContext,
    names: &[ModuleName],
) -> Result<Vec<ModuleName>, ResolveError> {
    let members: HashSet<&ModuleName> = names.iter().collect();
    let mut order = Vec::with_capacity(names.len());
    let mut visiting = HashSet::new();
    let mut done = HashSet::new();

    fn visit(
        ctx: &SchemaContext,
        name: &ModuleName,
        members: &HashSet<&ModuleName>,
        visiting: &mut HashSet<ModuleName>,
        done: &mut HashSet<ModuleName>,
        order: &mut Vec<ModuleName>,
    ) -> Result<(), ResolveError> {
        if done.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.clone()) {
            return Err(ResolveError::ImportCycle(name.clone()));
        }

        if let Some(desc) = ctx.module(name) {
            for import in desc.imports() {
                if members.contains(import) {
                    visit(ctx, import, members, visiting, done, order)?;
                }
            }
        }

        visiting.remove(name);
        done.insert(name.clone());
        order.push(name.clone());
        Ok(())
    }

    for name in names {
        visit(ctx, name, &members, &mut visiting, &mut done, &mut order)?;
    }

    Ok(order)
}

/// Compute the install closure for modules newly present in the context.
///
/// Returns the new modules in topological order (imports first), each
/// immediately followed by the submodules registered alongside it.
///
/// # Errors
///
/// Returns [`ResolveError::ImportCycle`] if imports among the new modules
/// form a cycle (defensive; a compiled context is acyclic).
///
/// # Example
///
/// ```
/// use modstore::core::context::{ModuleDescriptor, SchemaContext};
/// use modstore::core::resolver::closure_for_install;
/// use modstore::core::types::ModuleName;
///
/// let base = ModuleName::new("if-base").unwrap();
/// let dep = ModuleName::new("if-ext").unwrap();
///
/// let mut ctx = SchemaContext::new();
/// ctx.insert(ModuleDescriptor::builder(base.clone()).build());
/// ctx.insert(ModuleDescriptor::builder(dep.clone()).import(base.clone()).build());
///
/// // Seed order puts the importer first; the closure reorders it.
/// let set = closure_for_install(&ctx, &[dep.clone(), base.clone()]).unwrap();
/// assert_eq!(set.names(), &[base, dep]);
/// ```
pub fn closure_for_install(
    ctx: &SchemaContext,
    new_modules: &[ModuleName],
) -> Result<ModuleSet, ResolveError> {
    let mut set = ModuleSet::new();
    for name in topological_order(ctx, new_modules)? {
        let submodules = ctx
            .module(&name)
            .map(|d| d.submodules().to_vec())
            .unwrap_or_default();
        set.insert(name);
        for sub in submodules {
            set.insert(sub);
        }
    }
    Ok(set)
}

/// Compute the removal closure, verifying no surviving module still imports
/// a removed one.
///
/// `ctx_before` is the context with the modules still present; `ctx_after`
/// has them removed. The result lists the removed modules in teardown order
/// (importers before what they import), each followed by its submodules.
///
/// # Errors
///
/// Returns [`ResolveError::StillDepended`] naming the blocking module when
/// a module outside `removed` imports one inside it. The caller expands the
/// removal set and retries.
pub fn closure_for_removal(
    ctx_before: &SchemaContext,
    ctx_after: &SchemaContext,
    removed: &[ModuleName],
) -> Result<ModuleSet, ResolveError> {
    let removed_set: HashSet<&ModuleName> = removed.iter().collect();

    // Invariant: a surviving module's imports must not reach the removal
    // set. Direct edges suffice; a transitive path passes through some
    // removed module that itself has a direct surviving importer. The old
    // context is authoritative here, since the new one no longer carries
    // the removed modules' edges.
    for survivor in ctx_before.modules() {
        if removed_set.contains(survivor.name()) || !ctx_after.contains(survivor.name()) {
            continue;
        }
        for import in survivor.imports() {
            if removed_set.contains(import) {
                return Err(ResolveError::StillDepended {
                    module: import.clone(),
                    required_by: survivor.name().clone(),
                });
            }
        }
    }

    let mut set = ModuleSet::new();
    for name in topological_order(ctx_before, removed)?.into_iter().rev() {
        let submodules = ctx_before
            .module(&name)
            .map(|d| d.submodules().to_vec())
            .unwrap_or_default();
        set.insert(name);
        for sub in submodules {
            set.insert(sub);
        }
    }
    Ok(set)
}

/// Validate a single feature toggle against the module's declared features
/// and the currently enabled set.
///
/// When enabling, every prerequisite of the feature must already be enabled
/// (or be the feature itself). When disabling, no other enabled feature may
/// still require it.
///
/// # Errors
///
/// - [`ResolveError::UnknownFeature`] if the current revision does not
///   declare the feature
/// - [`ResolveError::FeatureConflict`] if a prerequisite constraint would
///   be violated
pub fn validate_feature_change(
    module: &ModuleDescriptor,
    enabled: &BTreeSet<FeatureName>,
    feature: &FeatureName,
    enable: bool,
) -> Result<(), ResolveError> {
    let spec = module
        .feature(feature)
        .ok_or_else(|| ResolveError::UnknownFeature {
            module: module.name().clone(),
            feature: feature.clone(),
        })?;

    if enable {
        for required in &spec.requires {
            if required != feature && !enabled.contains(required) {
                return Err(ResolveError::FeatureConflict {
                    module: module.name().clone(),
                    feature: feature.clone(),
                    detail: format!("requires feature '{required}' which is not enabled"),
                });
            }
        }
    } else {
        for other in enabled {
            if other == feature {
                continue;
            }
            if let Some(other_spec) = module.feature(other) {
                if other_spec.requires.contains(feature) {
                    return Err(ResolveError::FeatureConflict {
                        module: module.name().clone(),
                        feature: feature.clone(),
                        detail: format!("is still required by enabled feature '{other}'"),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ModuleDescriptor;

    fn mod_name(s: &str) -> ModuleName {
        ModuleName::new(s).unwrap()
    }

    fn feat(s: &str) -> FeatureName {
        FeatureName::new(s).unwrap()
    }

    fn names(set: &ModuleSet) -> Vec<&str> {
        set.iter().map(|n| n.as_str()).collect()
    }

    mod module_set {
        use super::*;

        #[test]
        fn insert_deduplicates_and_keeps_order() {
            let mut set = ModuleSet::new();
            assert!(set.insert(mod_name("b")));
            assert!(set.insert(mod_name("a")));
            assert!(!set.insert(mod_name("b")));

            assert_eq!(set.len(), 2);
            assert_eq!(names(&set), vec!["b", "a"]);
            assert!(set.contains(&mod_name("a")));
            assert!(!set.contains(&mod_name("c")));
        }

        #[test]
        fn empty_set() {
            let set = ModuleSet::new();
            assert!(set.is_empty());
            assert_eq!(set.len(), 0);
        }
    }

    mod install_closure {
        use super::*;

        #[test]
        fn empty_input_yields_empty_set() {
            let ctx = SchemaContext::new();
            let set = closure_for_install(&ctx, &[]).unwrap();
            assert!(set.is_empty());
        }

        #[test]
        fn single_module_without_imports() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("a")).build());

            let set = closure_for_install(&ctx, &[mod_name("a")]).unwrap();
            assert_eq!(names(&set), vec!["a"]);
        }

        #[test]
        fn imports_precede_importers() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("base")).build());
            ctx.insert(
                ModuleDescriptor::builder(mod_name("mid"))
                    .import(mod_name("base"))
                    .build(),
            );
            ctx.insert(
                ModuleDescriptor::builder(mod_name("top"))
                    .import(mod_name("mid"))
                    .build(),
            );

            // Seed in the wrong order on purpose.
            let set = closure_for_install(
                &ctx,
                &[mod_name("top"), mod_name("base"), mod_name("mid")],
            )
            .unwrap();
            assert_eq!(names(&set), vec!["base", "mid", "top"]);
        }

        #[test]
        fn imports_outside_new_set_do_not_constrain() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("old")).build());
            ctx.insert(
                ModuleDescriptor::builder(mod_name("new"))
                    .import(mod_name("old"))
                    .build(),
            );

            // "old" is already installed; only "new" is in the closure.
            let set = closure_for_install(&ctx, &[mod_name("new")]).unwrap();
            assert_eq!(names(&set), vec!["new"]);
        }

        #[test]
        fn submodules_follow_their_parent() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("base")).build());
            ctx.insert(
                ModuleDescriptor::builder(mod_name("parent"))
                    .import(mod_name("base"))
                    .submodule(mod_name("parent-sub1"))
                    .submodule(mod_name("parent-sub2"))
                    .build(),
            );

            let set =
                closure_for_install(&ctx, &[mod_name("parent"), mod_name("base")]).unwrap();
            assert_eq!(
                names(&set),
                vec!["base", "parent", "parent-sub1", "parent-sub2"]
            );
        }

        #[test]
        fn deterministic_for_same_input() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("a")).build());
            ctx.insert(ModuleDescriptor::builder(mod_name("b")).build());
            ctx.insert(ModuleDescriptor::builder(mod_name("c")).build());

            let input = [mod_name("c"), mod_name("a"), mod_name("b")];
            let set1 = closure_for_install(&ctx, &input).unwrap();
            let set2 = closure_for_install(&ctx, &input).unwrap();
            assert_eq!(set1, set2);
            // Unconstrained modules keep seed order.
            assert_eq!(names(&set1), vec!["c", "a", "b"]);
        }

        #[test]
        fn cycle_is_reported() {
            let mut ctx = SchemaContext::new();
            ctx.insert(
                ModuleDescriptor::builder(mod_name("a"))
                    .import(mod_name("b"))
                    .build(),
            );
            ctx.insert(
                ModuleDescriptor::builder(mod_name("b"))
                    .import(mod_name("a"))
                    .build(),
            );

            let err = closure_for_install(&ctx, &[mod_name("a"), mod_name("b")]).unwrap_err();
            assert!(matches!(err, ResolveError::ImportCycle(_)));
        }
    }

    mod removal_closure {
        use super::*;

        /// Context pair where `removed` names are present before and absent after.
        fn split_ctx(
            all: &[ModuleDescriptor],
            removed: &[ModuleName],
        ) -> (SchemaContext, SchemaContext) {
            let mut before = SchemaContext::new();
            let mut after = SchemaContext::new();
            for desc in all {
                before.insert(desc.clone());
                if !removed.contains(desc.name()) {
                    after.insert(desc.clone());
                }
            }
            (before, after)
        }

        #[test]
        fn unreferenced_module_is_removable() {
            let all = vec![
                ModuleDescriptor::builder(mod_name("a")).build(),
                ModuleDescriptor::builder(mod_name("b")).build(),
            ];
            let removed = [mod_name("a")];
            let (before, after) = split_ctx(&all, &removed);

            let set = closure_for_removal(&before, &after, &removed).unwrap();
            assert_eq!(names(&set), vec!["a"]);
        }

        #[test]
        fn surviving_importer_blocks_removal() {
            let all = vec![
                ModuleDescriptor::builder(mod_name("x")).build(),
                ModuleDescriptor::builder(mod_name("y"))
                    .import(mod_name("x"))
                    .build(),
            ];
            let removed = [mod_name("x")];
            let (before, after) = split_ctx(&all, &removed);

            let err = closure_for_removal(&before, &after, &removed).unwrap_err();
            assert_eq!(
                err,
                ResolveError::StillDepended {
                    module: mod_name("x"),
                    required_by: mod_name("y"),
                }
            );
        }

        #[test]
        fn removing_both_dependent_and_dependency_succeeds() {
            let all = vec![
                ModuleDescriptor::builder(mod_name("x")).build(),
                ModuleDescriptor::builder(mod_name("y"))
                    .import(mod_name("x"))
                    .build(),
            ];
            let removed = [mod_name("x"), mod_name("y")];
            let (before, after) = split_ctx(&all, &removed);

            let set = closure_for_removal(&before, &after, &removed).unwrap();
            // Teardown order: importer first.
            assert_eq!(names(&set), vec!["y", "x"]);
        }

        #[test]
        fn submodules_follow_parent_in_teardown() {
            let all = vec![ModuleDescriptor::builder(mod_name("p"))
                .submodule(mod_name("p-sub"))
                .build()];
            let removed = [mod_name("p")];
            let (before, after) = split_ctx(&all, &removed);

            let set = closure_for_removal(&before, &after, &removed).unwrap();
            assert_eq!(names(&set), vec!["p", "p-sub"]);
        }
    }

    mod feature_validation {
        use super::*;

        fn module_with_features() -> ModuleDescriptor {
            // b requires a; c stands alone
            ModuleDescriptor::builder(mod_name("m"))
                .feature(feat("a"))
                .feature_requires(feat("b"), vec![feat("a")])
                .feature(feat("c"))
                .build()
        }

        #[test]
        fn unknown_feature_rejected() {
            let module = module_with_features();
            let enabled = BTreeSet::new();
            let err =
                validate_feature_change(&module, &enabled, &feat("nope"), true).unwrap_err();
            assert!(matches!(err, ResolveError::UnknownFeature { .. }));
        }

        #[test]
        fn enable_without_prerequisite_fails() {
            let module = module_with_features();
            let enabled = BTreeSet::new();
            let err = validate_feature_change(&module, &enabled, &feat("b"), true).unwrap_err();
            assert!(matches!(err, ResolveError::FeatureConflict { .. }));
        }

        #[test]
        fn enable_with_prerequisite_enabled_succeeds() {
            let module = module_with_features();
            let enabled: BTreeSet<_> = [feat("a")].into_iter().collect();
            assert!(validate_feature_change(&module, &enabled, &feat("b"), true).is_ok());
        }

        #[test]
        fn disable_required_feature_fails() {
            let module = module_with_features();
            let enabled: BTreeSet<_> = [feat("a"), feat("b")].into_iter().collect();
            let err =
                validate_feature_change(&module, &enabled, &feat("a"), false).unwrap_err();
            assert!(matches!(err, ResolveError::FeatureConflict { .. }));
        }

        #[test]
        fn disable_unreferenced_feature_succeeds() {
            let module = module_with_features();
            let enabled: BTreeSet<_> = [feat("a"), feat("c")].into_iter().collect();
            assert!(validate_feature_change(&module, &enabled, &feat("c"), false).is_ok());
        }

        #[test]
        fn enable_standalone_feature_succeeds() {
            let module = module_with_features();
            let enabled = BTreeSet::new();
            assert!(validate_feature_change(&module, &enabled, &feat("a"), true).is_ok());
        }
    }
}
