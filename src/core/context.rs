//! core::context
//!
//! Boundary types for the schema layer and the datastore-plugin layer.
//!
//! # Architecture
//!
//! The registry never parses or compiles schemas itself. The platform's
//! schema layer hands it an immutable view of the active context: which
//! modules are compiled in, their revisions, declared and enabled features,
//! imports, and submodules. [`SchemaContext`] is that view.
//!
//! Likewise, the datastore-plugin layer owns plugin discovery; the registry
//! only checks plugin bindings against a [`PluginCatalog`] snapshot.
//!
//! # Invariants
//!
//! - Descriptors are immutable once built; a context change is a new set of
//!   descriptors, never an in-place edit of one.
//! - The registry reads the context; the only mutation it ever performs is
//!   registering its own internal module during bootstrap.

use std::collections::BTreeSet;

use crate::core::types::{Datastore, FeatureName, ModuleName, PluginName, Revision};

/// A feature declared by a module, with its prerequisite features.
///
/// Prerequisites mirror the schema's `if-feature` constraints: a feature may
/// only be enabled when everything it requires is enabled too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    /// The feature's name, unique within the module.
    pub name: FeatureName,
    /// Features that must be enabled before (or together with) this one.
    pub requires: Vec<FeatureName>,
}

impl FeatureSpec {
    /// Create a feature with no prerequisites.
    pub fn new(name: FeatureName) -> Self {
        Self {
            name,
            requires: Vec::new(),
        }
    }

    /// Create a feature with prerequisites.
    pub fn with_requires(name: FeatureName, requires: Vec<FeatureName>) -> Self {
        Self { name, requires }
    }
}

/// Immutable descriptor of one schema module as compiled into the context.
///
/// Built by the schema layer (or by [`ModuleDescriptor::builder`] in tests).
/// The registry reads it to create and update module entries and to walk the
/// import graph; it never stores descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    name: ModuleName,
    revision: Option<Revision>,
    features: Vec<FeatureSpec>,
    enabled_features: BTreeSet<FeatureName>,
    imports: Vec<ModuleName>,
    submodules: Vec<ModuleName>,
    implicit: bool,
}

impl ModuleDescriptor {
    /// Start building a descriptor.
    ///
    /// # Example
    ///
    /// ```
    /// use modstore::core::context::ModuleDescriptor;
    /// use modstore::core::types::{ModuleName, Revision};
    ///
    /// let desc = ModuleDescriptor::builder(ModuleName::new("ietf-interfaces").unwrap())
    ///     .revision(Revision::new("2018-02-20").unwrap())
    ///     .build();
    /// assert_eq!(desc.name().as_str(), "ietf-interfaces");
    /// ```
    pub fn builder(name: ModuleName) -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder::new(name)
    }

    /// The module's name.
    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    /// The module's revision, if it declares one.
    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    /// Look up a declared feature by name.
    pub fn feature(&self, name: &FeatureName) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| &f.name == name)
    }

    /// Whether the module declares the named feature.
    pub fn declares_feature(&self, name: &FeatureName) -> bool {
        self.feature(name).is_some()
    }

    /// All declared features.
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Features currently enabled in the compiled context.
    pub fn enabled_features(&self) -> &BTreeSet<FeatureName> {
        &self.enabled_features
    }

    /// Modules this module imports.
    pub fn imports(&self) -> &[ModuleName] {
        &self.imports
    }

    /// Submodules included by this module, in include order.
    pub fn submodules(&self) -> &[ModuleName] {
        &self.submodules
    }

    /// Whether the schema layer provides this module implicitly.
    ///
    /// Implicit modules are always present in every context and are not
    /// tracked by the registry.
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }
}

/// Builder for [`ModuleDescriptor`].
#[derive(Debug)]
pub struct ModuleDescriptorBuilder {
    name: ModuleName,
    revision: Option<Revision>,
    features: Vec<FeatureSpec>,
    enabled_features: BTreeSet<FeatureName>,
    imports: Vec<ModuleName>,
    submodules: Vec<ModuleName>,
    implicit: bool,
}

impl ModuleDescriptorBuilder {
    /// Create a builder with required fields.
    pub fn new(name: ModuleName) -> Self {
        Self {
            name,
            revision: None,
            features: Vec::new(),
            enabled_features: BTreeSet::new(),
            imports: Vec::new(),
            submodules: Vec::new(),
            implicit: false,
        }
    }

    /// Set the module revision.
    pub fn revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Declare a feature with no prerequisites.
    pub fn feature(mut self, name: FeatureName) -> Self {
        self.features.push(FeatureSpec::new(name));
        self
    }

    /// Declare a feature with prerequisites.
    pub fn feature_requires(mut self, name: FeatureName, requires: Vec<FeatureName>) -> Self {
        self.features.push(FeatureSpec::with_requires(name, requires));
        self
    }

    /// Mark a declared feature as enabled in the compiled context.
    pub fn enable_feature(mut self, name: FeatureName) -> Self {
        self.enabled_features.insert(name);
        self
    }

    /// Add an imported module.
    pub fn import(mut self, name: ModuleName) -> Self {
        self.imports.push(name);
        self
    }

    /// Add an included submodule.
    pub fn submodule(mut self, name: ModuleName) -> Self {
        self.submodules.push(name);
        self
    }

    /// Mark the module as implicitly provided by the schema layer.
    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> ModuleDescriptor {
        ModuleDescriptor {
            name: self.name,
            revision: self.revision,
            features: self.features,
            enabled_features: self.enabled_features,
            imports: self.imports,
            submodules: self.submodules,
            implicit: self.implicit,
        }
    }
}

/// The active schema context: an ordered, queryable set of module descriptors.
///
/// Order is preserved as modules were compiled in; names are unique
/// (inserting a descriptor for an existing name replaces it in place).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaContext {
    modules: Vec<ModuleDescriptor>,
}

impl SchemaContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a module by name.
    pub fn module(&self, name: &ModuleName) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.name() == name)
    }

    /// Whether a module with the given name is present.
    pub fn contains(&self, name: &ModuleName) -> bool {
        self.module(name).is_some()
    }

    /// Iterate over all modules in context order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.iter()
    }

    /// Number of modules in the context.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the context is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Insert a descriptor, replacing any existing one with the same name.
    ///
    /// Replacement keeps the original position so context order stays
    /// stable across revision upgrades.
    pub fn insert(&mut self, descriptor: ModuleDescriptor) {
        match self
            .modules
            .iter()
            .position(|m| m.name() == descriptor.name())
        {
            Some(idx) => self.modules[idx] = descriptor,
            None => self.modules.push(descriptor),
        }
    }

    /// Remove a descriptor by name.
    pub fn remove(&mut self, name: &ModuleName) -> Option<ModuleDescriptor> {
        let idx = self.modules.iter().position(|m| m.name() == name)?;
        Some(self.modules.remove(idx))
    }
}

/// One datastore plugin as advertised by the plugin layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    /// The plugin's name, unique in the catalog.
    pub name: PluginName,
    /// Datastore kinds this plugin can persist.
    pub datastores: BTreeSet<Datastore>,
}

impl PluginSpec {
    /// Create a plugin supporting the given datastore kinds.
    pub fn new(name: PluginName, datastores: impl IntoIterator<Item = Datastore>) -> Self {
        Self {
            name,
            datastores: datastores.into_iter().collect(),
        }
    }

    /// Create a plugin supporting every datastore kind.
    pub fn for_all(name: PluginName) -> Self {
        Self::new(name, Datastore::ALL)
    }
}

/// Snapshot of the plugins known to the datastore-plugin layer.
///
/// Used to check that a plugin binding names a plugin that exists and
/// supports the datastore kind it is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginCatalog {
    plugins: Vec<PluginSpec>,
}

impl PluginCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, replacing any existing one with the same name.
    pub fn insert(&mut self, plugin: PluginSpec) {
        match self.plugins.iter().position(|p| p.name == plugin.name) {
            Some(idx) => self.plugins[idx] = plugin,
            None => self.plugins.push(plugin),
        }
    }

    /// Look up a plugin by name.
    pub fn plugin(&self, name: &PluginName) -> Option<&PluginSpec> {
        self.plugins.iter().find(|p| &p.name == name)
    }

    /// Whether the named plugin exists.
    pub fn contains(&self, name: &PluginName) -> bool {
        self.plugin(name).is_some()
    }

    /// Whether the named plugin exists and supports the datastore kind.
    pub fn supports(&self, name: &PluginName, datastore: Datastore) -> bool {
        self.plugin(name)
            .map(|p| p.datastores.contains(&datastore))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mod_name(s: &str) -> ModuleName {
        ModuleName::new(s).unwrap()
    }

    fn feat(s: &str) -> FeatureName {
        FeatureName::new(s).unwrap()
    }

    mod descriptor {
        use super::*;

        #[test]
        fn builder_defaults() {
            let desc = ModuleDescriptor::builder(mod_name("ietf-interfaces")).build();
            assert_eq!(desc.name().as_str(), "ietf-interfaces");
            assert!(desc.revision().is_none());
            assert!(desc.features().is_empty());
            assert!(desc.enabled_features().is_empty());
            assert!(desc.imports().is_empty());
            assert!(desc.submodules().is_empty());
            assert!(!desc.is_implicit());
        }

        #[test]
        fn builder_sets_all_fields() {
            let desc = ModuleDescriptor::builder(mod_name("ietf-interfaces"))
                .revision(Revision::new("2018-02-20").unwrap())
                .feature(feat("if-mib"))
                .feature_requires(feat("arbitrary-names"), vec![feat("if-mib")])
                .enable_feature(feat("if-mib"))
                .import(mod_name("ietf-yang-types"))
                .submodule(mod_name("ietf-interfaces-sub"))
                .build();

            assert_eq!(desc.revision().unwrap().as_str(), "2018-02-20");
            assert!(desc.declares_feature(&feat("if-mib")));
            assert!(desc.declares_feature(&feat("arbitrary-names")));
            assert!(!desc.declares_feature(&feat("nope")));
            assert!(desc.enabled_features().contains(&feat("if-mib")));
            assert_eq!(desc.imports(), &[mod_name("ietf-yang-types")]);
            assert_eq!(desc.submodules(), &[mod_name("ietf-interfaces-sub")]);
        }

        #[test]
        fn feature_lookup_returns_requires() {
            let desc = ModuleDescriptor::builder(mod_name("m"))
                .feature_requires(feat("b"), vec![feat("a")])
                .build();
            let spec = desc.feature(&feat("b")).unwrap();
            assert_eq!(spec.requires, vec![feat("a")]);
        }
    }

    mod schema_context {
        use super::*;

        #[test]
        fn empty_context() {
            let ctx = SchemaContext::new();
            assert!(ctx.is_empty());
            assert!(!ctx.contains(&mod_name("anything")));
        }

        #[test]
        fn insert_and_lookup() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("a")).build());
            ctx.insert(ModuleDescriptor::builder(mod_name("b")).build());

            assert_eq!(ctx.len(), 2);
            assert!(ctx.contains(&mod_name("a")));
            assert!(ctx.module(&mod_name("b")).is_some());
        }

        #[test]
        fn insert_replaces_in_place() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("a")).build());
            ctx.insert(ModuleDescriptor::builder(mod_name("b")).build());
            ctx.insert(
                ModuleDescriptor::builder(mod_name("a"))
                    .revision(Revision::new("2024-01-01").unwrap())
                    .build(),
            );

            assert_eq!(ctx.len(), 2);
            let names: Vec<_> = ctx.modules().map(|m| m.name().as_str()).collect();
            assert_eq!(names, vec!["a", "b"]);
            assert!(ctx.module(&mod_name("a")).unwrap().revision().is_some());
        }

        #[test]
        fn remove_returns_descriptor() {
            let mut ctx = SchemaContext::new();
            ctx.insert(ModuleDescriptor::builder(mod_name("a")).build());

            let removed = ctx.remove(&mod_name("a")).unwrap();
            assert_eq!(removed.name().as_str(), "a");
            assert!(ctx.is_empty());
            assert!(ctx.remove(&mod_name("a")).is_none());
        }
    }

    mod plugin_catalog {
        use super::*;

        #[test]
        fn supports_checks_name_and_kind() {
            let mut catalog = PluginCatalog::new();
            catalog.insert(PluginSpec::new(
                PluginName::new("json-file").unwrap(),
                [Datastore::Running, Datastore::Startup],
            ));

            let name = PluginName::new("json-file").unwrap();
            assert!(catalog.supports(&name, Datastore::Running));
            assert!(!catalog.supports(&name, Datastore::Candidate));
            assert!(!catalog.supports(&PluginName::new("missing").unwrap(), Datastore::Running));
        }

        #[test]
        fn for_all_covers_every_kind() {
            let plugin = PluginSpec::for_all(PluginName::new("default").unwrap());
            for ds in Datastore::ALL {
                assert!(plugin.datastores.contains(&ds));
            }
        }

        #[test]
        fn insert_replaces_by_name() {
            let mut catalog = PluginCatalog::new();
            catalog.insert(PluginSpec::new(
                PluginName::new("p").unwrap(),
                [Datastore::Running],
            ));
            catalog.insert(PluginSpec::for_all(PluginName::new("p").unwrap()));

            let name = PluginName::new("p").unwrap();
            assert!(catalog.supports(&name, Datastore::Operational));
        }
    }
}
