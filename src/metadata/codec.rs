//! metadata::codec
//!
//! (De)serialization of the registry document.
//!
//! # Schema Design
//!
//! The persisted document is self-describing with `kind` and
//! `schema_version`, strictly parsed (unknown fields rejected), and
//! validated against the active schema context before use: a document that
//! references a module, revision, or feature the context does not have is
//! drift or corruption and fails fast.
//!
//! # Bootstrap
//!
//! A fresh system instance has no document yet. When allowed, [`parse`]
//! synthesizes an empty tree and registers the registry's own internal
//! module in the context so the metadata itself is representable. The
//! augmentation is idempotent; repeated parses never duplicate it.
//!
//! # Example
//!
//! ```
//! use modstore::metadata::codec;
//! use modstore::metadata::tree::MetadataTree;
//!
//! let tree = MetadataTree::new();
//! let json = codec::serialize(&tree).unwrap();
//! let parsed = codec::parse_document(&json).unwrap();
//! assert_eq!(parsed, tree);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::entry::ModuleEntry;
use super::storage::{StorageError, TreeStorage};
use super::tree::{MetadataTree, TreeError};
use crate::core::context::{ModuleDescriptor, SchemaContext};
use crate::core::types::{ModuleName, Revision};

/// The kind identifier for the registry document.
pub const REGISTRY_KIND: &str = "modstore.module-registry";

/// Current schema version of the registry document.
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the internal module describing the registry's own metadata.
pub const INTERNAL_MODULE: &str = "modstore-registry";

/// Revision of the internal module definition shipped with this crate.
pub const INTERNAL_MODULE_REVISION: &str = "2024-01-15";

/// Errors from registry document encoding and decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The backing storage failed.
    #[error("registry storage failed: {0}")]
    Io(#[from] StorageError),

    /// The document is not valid JSON or not valid UTF-8.
    #[error("malformed registry document: {0}")]
    Malformed(String),

    /// The document's kind does not match [`REGISTRY_KIND`].
    #[error("invalid document kind '{found}', expected '{REGISTRY_KIND}'")]
    InvalidKind { found: String },

    /// The document's schema version is not supported.
    #[error("unsupported document schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),

    /// No document exists and bootstrap was not allowed.
    #[error("no registry document exists and context bootstrap is disabled")]
    Missing,

    /// The document references something the active context does not have.
    #[error("registry document disagrees with schema context for module '{module}': {detail}")]
    SchemaMismatch { module: ModuleName, detail: String },

    /// The document's entries violate tree invariants.
    #[error("invalid registry document: {0}")]
    InvalidDocument(#[from] TreeError),
}

/// Envelope for version dispatch before full parsing.
#[derive(Debug, Deserialize)]
struct DocumentEnvelope {
    kind: String,
    schema_version: u32,
}

/// The registry document (v1).
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocumentV1 {
    kind: String,
    schema_version: u32,
    modules: Vec<ModuleEntry>,
}

/// Register the registry's own internal module in the context.
///
/// Returns `true` if the module was added, `false` if it was already
/// present. Safe to call any number of times.
pub fn ensure_internal_modules(ctx: &mut SchemaContext) -> bool {
    let name = ModuleName::new(INTERNAL_MODULE).expect("valid internal module name");
    if ctx.contains(&name) {
        return false;
    }
    let revision = Revision::new(INTERNAL_MODULE_REVISION).expect("valid internal revision");
    ctx.insert(
        ModuleDescriptor::builder(name)
            .revision(revision)
            .implicit()
            .build(),
    );
    debug!("registered internal registry module in schema context");
    true
}

/// Serialize a tree to the canonical document text.
pub fn serialize(tree: &MetadataTree) -> Result<String, CodecError> {
    let doc = RegistryDocumentV1 {
        kind: REGISTRY_KIND.to_string(),
        schema_version: SCHEMA_VERSION,
        modules: tree.entries().to_vec(),
    };
    serde_json::to_string_pretty(&doc).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Parse document text with version dispatch, without context validation.
///
/// # Errors
///
/// Returns an error if the JSON is malformed, the `kind` is wrong, the
/// `schema_version` is unsupported, or entry names collide.
pub fn parse_document(json: &str) -> Result<MetadataTree, CodecError> {
    let envelope: DocumentEnvelope =
        serde_json::from_str(json).map_err(|e| CodecError::Malformed(e.to_string()))?;

    if envelope.kind != REGISTRY_KIND {
        return Err(CodecError::InvalidKind {
            found: envelope.kind,
        });
    }

    match envelope.schema_version {
        1 => {
            let doc: RegistryDocumentV1 =
                serde_json::from_str(json).map_err(|e| CodecError::Malformed(e.to_string()))?;
            Ok(MetadataTree::from_entries(doc.modules)?)
        }
        v => Err(CodecError::UnsupportedVersion(v)),
    }
}

/// Check that every reference in the tree resolves in the context.
///
/// Covers the document-side half of consistency: each entry's module must
/// exist, its revision must agree, and its enabled features must be
/// declared by the module's current revision.
pub fn validate_against(tree: &MetadataTree, ctx: &SchemaContext) -> Result<(), CodecError> {
    for entry in tree {
        let module = ctx
            .module(&entry.name)
            .ok_or_else(|| CodecError::SchemaMismatch {
                module: entry.name.clone(),
                detail: "module is not present in the schema context".to_string(),
            })?;

        if entry.revision.as_ref() != module.revision() {
            return Err(CodecError::SchemaMismatch {
                module: entry.name.clone(),
                detail: format!(
                    "entry revision {:?} does not match context revision {:?}",
                    entry.revision.as_ref().map(Revision::as_str),
                    module.revision().map(Revision::as_str),
                ),
            });
        }

        for feature in &entry.enabled_features {
            if !module.declares_feature(feature) {
                return Err(CodecError::SchemaMismatch {
                    module: entry.name.clone(),
                    detail: format!("enabled feature '{feature}' is not declared"),
                });
            }
        }
    }
    Ok(())
}

/// Load the persisted tree validated against the context.
///
/// When no document exists and `allow_context_bootstrap` is set, an empty
/// tree is synthesized and the context is augmented with the registry's
/// internal module. Without bootstrap, an absent document is
/// [`CodecError::Missing`].
///
/// # Errors
///
/// - [`CodecError::Io`] if storage cannot be read
/// - [`CodecError::SchemaMismatch`] if the document references a module,
///   revision, or feature absent from `ctx`
/// - [`CodecError::Missing`] if absent and bootstrap is disabled
pub fn parse(
    storage: &dyn TreeStorage,
    ctx: &mut SchemaContext,
    allow_context_bootstrap: bool,
) -> Result<MetadataTree, CodecError> {
    if allow_context_bootstrap {
        ensure_internal_modules(ctx);
    }

    let bytes = match storage.load()? {
        Some(bytes) => bytes,
        None => {
            if allow_context_bootstrap {
                debug!("no registry document found, bootstrapping empty tree");
                return Ok(MetadataTree::new());
            }
            return Err(CodecError::Missing);
        }
    };

    let json = String::from_utf8(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let tree = parse_document(&json)?;
    validate_against(&tree, ctx)?;
    Ok(tree)
}
