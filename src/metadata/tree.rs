//! metadata::tree
//!
//! The metadata tree: an ordered collection of module entries.
//!
//! # Architecture
//!
//! The tree is a pure value. Mutating operations take `&self` and return a
//! new tree, leaving the receiver untouched; a failed reconcile therefore
//! cannot leave a half-applied tree behind, and persistence is always a
//! whole-tree replace of a value that was fully constructed first.
//!
//! # Invariants
//!
//! - Entry names are unique
//! - Entry order is the order modules were first installed

use thiserror::Error;

use super::entry::ModuleEntry;
use crate::core::types::ModuleName;

/// Errors from tree construction and entry manipulation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// An entry with this name already exists.
    #[error("duplicate entry for module '{0}'")]
    DuplicateEntry(ModuleName),

    /// No entry with this name exists.
    #[error("no entry for module '{0}'")]
    EntryNotFound(ModuleName),
}

/// The ordered, unique-name collection of module entries.
///
/// # Example
///
/// ```
/// use modstore::core::context::ModuleDescriptor;
/// use modstore::core::types::{ModuleName, PluginName};
/// use modstore::metadata::entry::{ModuleEntry, PluginAssignment};
/// use modstore::metadata::tree::MetadataTree;
///
/// let desc = ModuleDescriptor::builder(ModuleName::new("m").unwrap()).build();
/// let entry = ModuleEntry::new(
///     &desc,
///     &PluginAssignment::uniform(PluginName::new("default").unwrap()),
/// );
///
/// let empty = MetadataTree::new();
/// let tree = empty.insert(entry).unwrap();
/// assert_eq!(empty.len(), 0); // original untouched
/// assert_eq!(tree.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTree {
    entries: Vec<ModuleEntry>,
}

impl MetadataTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from entries, rejecting duplicate names.
    pub fn from_entries(entries: Vec<ModuleEntry>) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for entry in &entries {
            if tree.contains(&entry.name) {
                return Err(TreeError::DuplicateEntry(entry.name.clone()));
            }
            tree.entries.push(entry.clone());
        }
        Ok(tree)
    }

    /// Look up an entry by module name.
    pub fn get(&self, name: &ModuleName) -> Option<&ModuleEntry> {
        self.entries.iter().find(|e| &e.name == name)
    }

    /// Whether an entry with the given name exists.
    pub fn contains(&self, name: &ModuleName) -> bool {
        self.get(name).is_some()
    }

    /// The entries in install order.
    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    /// Iterate over the entries in install order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return a new tree with the entry appended.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateEntry`] if an entry with the same name
    /// already exists.
    pub fn insert(&self, entry: ModuleEntry) -> Result<Self, TreeError> {
        if self.contains(&entry.name) {
            return Err(TreeError::DuplicateEntry(entry.name.clone()));
        }
        let mut entries = self.entries.clone();
        entries.push(entry);
        Ok(Self { entries })
    }

    /// Return a new tree with the matching entry replaced in place.
    ///
    /// The entry keeps its position, so install order survives updates.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EntryNotFound`] if no entry matches the name.
    pub fn replace(&self, entry: ModuleEntry) -> Result<Self, TreeError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.name == entry.name)
            .ok_or_else(|| TreeError::EntryNotFound(entry.name.clone()))?;
        let mut entries = self.entries.clone();
        entries[idx] = entry;
        Ok(Self { entries })
    }

    /// Return a new tree with the named entry removed, plus the entry.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EntryNotFound`] if no entry matches the name.
    pub fn remove(&self, name: &ModuleName) -> Result<(Self, ModuleEntry), TreeError> {
        let idx = self
            .entries
            .iter()
            .position(|e| &e.name == name)
            .ok_or_else(|| TreeError::EntryNotFound(name.clone()))?;
        let mut entries = self.entries.clone();
        let removed = entries.remove(idx);
        Ok((Self { entries }, removed))
    }
}

impl<'a> IntoIterator for &'a MetadataTree {
    type Item = &'a ModuleEntry;
    type IntoIter = std::slice::Iter<'a, ModuleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
