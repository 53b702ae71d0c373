//! metadata::entry
//!
//! The per-module metadata record.
//!
//! # Schema Design
//!
//! Entries are plain serde values with no boolean blindness beyond the
//! replay flag itself; sets and maps are B-tree backed so the serialized
//! form is deterministic.
//!
//! A module's import dependencies are deliberately absent: they are derived
//! from the schema context during resolution and would only go stale if
//! persisted here.
//!
//! # Example
//!
//! ```
//! use modstore::core::context::ModuleDescriptor;
//! use modstore::core::types::{ModuleName, PluginName};
//! use modstore::metadata::entry::{ModuleEntry, PluginAssignment};
//!
//! let desc = ModuleDescriptor::builder(ModuleName::new("ietf-interfaces").unwrap()).build();
//! let plugins = PluginAssignment::uniform(PluginName::new("default").unwrap());
//!
//! let entry = ModuleEntry::new(&desc, &plugins);
//! assert!(entry.enabled_features.is_empty());
//! assert!(!entry.replay_support);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::context::ModuleDescriptor;
use crate::core::types::{Datastore, FeatureName, ModuleName, PluginName, Revision};

/// Per-datastore plugin bindings for one module.
///
/// A complete assignment binds every datastore kind. [`uniform`] is the
/// common case: one plugin for everything.
///
/// [`uniform`]: PluginAssignment::uniform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginAssignment {
    bindings: BTreeMap<Datastore, PluginName>,
}

impl PluginAssignment {
    /// Create an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the same plugin to every datastore kind.
    pub fn uniform(plugin: PluginName) -> Self {
        let mut bindings = BTreeMap::new();
        for ds in Datastore::ALL {
            bindings.insert(ds, plugin.clone());
        }
        Self { bindings }
    }

    /// Bind a plugin to one datastore kind, replacing any existing binding.
    pub fn insert(&mut self, datastore: Datastore, plugin: PluginName) {
        self.bindings.insert(datastore, plugin);
    }

    /// Builder-style form of [`insert`](Self::insert).
    pub fn with(mut self, datastore: Datastore, plugin: PluginName) -> Self {
        self.insert(datastore, plugin);
        self
    }

    /// The plugin bound to a datastore kind, if any.
    pub fn get(&self, datastore: Datastore) -> Option<&PluginName> {
        self.bindings.get(&datastore)
    }

    /// Iterate over the bindings in datastore order.
    pub fn iter(&self) -> impl Iterator<Item = (Datastore, &PluginName)> {
        self.bindings.iter().map(|(ds, p)| (*ds, p))
    }

    /// Datastore kinds with no binding.
    pub fn missing(&self) -> Vec<Datastore> {
        Datastore::ALL
            .into_iter()
            .filter(|ds| !self.bindings.contains_key(ds))
            .collect()
    }

    /// Whether every datastore kind is bound.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// The underlying binding map.
    pub fn as_map(&self) -> &BTreeMap<Datastore, PluginName> {
        &self.bindings
    }
}

/// Metadata record for one installed schema module.
///
/// Entries are pure values; every reconciler operation copies and replaces
/// rather than mutating in place, so a failed operation leaves the old
/// tree intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleEntry {
    /// The module's unique name. Immutable once created.
    pub name: ModuleName,

    /// The installed revision, if the module declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,

    /// Features currently enabled on this module.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub enabled_features: BTreeSet<FeatureName>,

    /// Plugin bound to each datastore kind.
    pub datastore_plugins: BTreeMap<Datastore, PluginName>,

    /// Whether change-notification history is retained for this module.
    #[serde(default)]
    pub replay_support: bool,

    /// Submodules included by this module, in include order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub submodules: Vec<ModuleName>,
}

impl ModuleEntry {
    /// Build a fresh entry from a schema module descriptor.
    ///
    /// Features start empty and replay support disabled; revision and
    /// submodules come from the descriptor.
    pub fn new(module: &ModuleDescriptor, plugins: &PluginAssignment) -> Self {
        Self {
            name: module.name().clone(),
            revision: module.revision().cloned(),
            enabled_features: BTreeSet::new(),
            datastore_plugins: plugins.as_map().clone(),
            replay_support: false,
            submodules: module.submodules().to_vec(),
        }
    }

    /// Produce a modified copy, preserving every field not overridden.
    ///
    /// This is how updates keep unrelated settings intact: only the fields
    /// present in `overrides` change.
    ///
    /// # Example
    ///
    /// ```
    /// use modstore::core::context::ModuleDescriptor;
    /// use modstore::core::types::{ModuleName, PluginName};
    /// use modstore::metadata::entry::{EntryOverrides, ModuleEntry, PluginAssignment};
    ///
    /// let desc = ModuleDescriptor::builder(ModuleName::new("m").unwrap()).build();
    /// let entry = ModuleEntry::new(
    ///     &desc,
    ///     &PluginAssignment::uniform(PluginName::new("default").unwrap()),
    /// );
    ///
    /// let toggled = entry.with(EntryOverrides {
    ///     replay_support: Some(true),
    ///     ..Default::default()
    /// });
    /// assert!(toggled.replay_support);
    /// assert_eq!(toggled.datastore_plugins, entry.datastore_plugins);
    /// ```
    pub fn with(&self, overrides: EntryOverrides) -> Self {
        Self {
            name: self.name.clone(),
            revision: overrides.revision.unwrap_or_else(|| self.revision.clone()),
            enabled_features: overrides
                .enabled_features
                .unwrap_or_else(|| self.enabled_features.clone()),
            datastore_plugins: overrides
                .datastore_plugins
                .unwrap_or_else(|| self.datastore_plugins.clone()),
            replay_support: overrides.replay_support.unwrap_or(self.replay_support),
            submodules: overrides
                .submodules
                .unwrap_or_else(|| self.submodules.clone()),
        }
    }
}

// Entries order by name only; install order is what the tree preserves,
// name order is what lookups and reports sort by.
impl PartialOrd for ModuleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// Field overrides for [`ModuleEntry::with`].
///
/// `None` preserves the current value. `revision` is doubly optional so an
/// update can clear a revision as well as replace it.
#[derive(Debug, Clone, Default)]
pub struct EntryOverrides {
    pub revision: Option<Option<Revision>>,
    pub enabled_features: Option<BTreeSet<FeatureName>>,
    pub datastore_plugins: Option<BTreeMap<Datastore, PluginName>>,
    pub replay_support: Option<bool>,
    pub submodules: Option<Vec<ModuleName>>,
}
