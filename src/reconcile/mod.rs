//! reconcile
//!
//! Orchestrates the reconcile lifecycle: Lock -> Load -> Apply -> Verify -> Persist.
//!
//! # Architecture
//!
//! The reconciler is the only code that mutates the metadata tree. Every
//! mutation runs as one critical section under the process-shared writer
//! lock:
//!
//! 1. **Lock**: acquire the exclusive writer lock
//! 2. **Load**: parse the persisted tree, validated against the context
//! 3. **Apply**: run one or more operations from [`ops`], producing a new
//!    tree value
//! 4. **Verify**: check the new tree and the final context agree
//! 5. **Persist**: serialize and atomically replace the document
//!
//! If any step fails, nothing is persisted and the lock is released; the
//! old document stays authoritative. There is no partial application and
//! no rollback to perform.
//!
//! # Example
//!
//! ```ignore
//! use modstore::reconcile::{self, ops};
//! use modstore::core::resolver::ModuleSet;
//!
//! let mut mod_set = ModuleSet::new();
//! reconcile::run_with_writer(&paths, &storage, &config, &mut ctx, None, |tree| {
//!     ops::add_module(tree, &ctx_view, &module, &assignment, &catalog, &mut mod_set)
//!         .map(|tree| (tree, ()))
//! })?;
//! // mod_set now lists the modules whose datastores need initializing.
//! ```

pub mod guard;
pub mod ops;

// Re-exports for convenience
pub use guard::{LockError, LockMode, StoreLock};
pub use ops::{
    add_module, chng_feature, chng_replay_support, del_module, upd_module, ReconcileError,
};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::config::StoreConfig;
use crate::core::context::SchemaContext;
use crate::core::paths::StorePaths;
use crate::core::types::Fingerprint;
use crate::core::verify::{self, ConsistencyError};
use crate::metadata::codec::{self, CodecError};
use crate::metadata::storage::TreeStorage;
use crate::metadata::tree::MetadataTree;

/// Errors from a full reconcile run.
///
/// `Lock` is the transient contention class and the only one worth an
/// automatic retry; everything else reports a real condition to the caller.
#[derive(Debug, Error)]
pub enum RunError {
    /// Lock acquisition failed or timed out.
    #[error("lock acquisition failed: {0}")]
    Lock(#[from] LockError),

    /// Loading or persisting the registry document failed.
    #[error("registry document error: {0}")]
    Codec(#[from] CodecError),

    /// The operation itself failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The produced tree and the final context disagree. This is a bug in
    /// the caller's operation composition, caught before persisting.
    #[error("metadata tree and schema context disagree after reconcile ({} findings)", .findings.len())]
    Inconsistent { findings: Vec<ConsistencyError> },
}

/// Run one reconcile-and-persist critical section.
///
/// The tree is parsed against `load_ctx` (the context the persisted tree
/// must still resolve in: for removals and revision upgrades, the *old*
/// context). The new tree is verified against `final_ctx`, or against
/// `load_ctx` when `None` (operations that leave the context unchanged).
///
/// `op` receives the loaded tree and returns the replacement tree plus its
/// ancillary output. Compose several operations inside one closure when a
/// logical change covers multiple modules; the document is rewritten once.
///
/// # Errors
///
/// - [`RunError::Lock`] if the writer lock cannot be acquired in time
/// - [`RunError::Codec`] for load/persist failures, including
///   [`CodecError::SchemaMismatch`] when the persisted tree has drifted
/// - [`RunError::Reconcile`] for operation failures; the document on disk
///   is untouched
/// - [`RunError::Inconsistent`] if the produced tree fails verification;
///   the document on disk is untouched
pub fn run_with_writer<F, T>(
    paths: &StorePaths,
    storage: &dyn TreeStorage,
    config: &StoreConfig,
    load_ctx: &mut SchemaContext,
    final_ctx: Option<&SchemaContext>,
    op: F,
) -> Result<T, RunError>
where
    F: FnOnce(&MetadataTree) -> Result<(MetadataTree, T), ReconcileError>,
{
    let _lock = StoreLock::writer_wait(paths, &config.lock)?;

    let tree = codec::parse(storage, load_ctx, config.store.bootstrap)?;
    debug!(entries = tree.len(), "loaded registry for reconcile");

    let (new_tree, output) = op(&tree)?;

    let check_ctx = final_ctx.unwrap_or(load_ctx);
    let result = verify::check_consistency(&new_tree, check_ctx);
    if !result.ok {
        warn!(findings = result.errors.len(), "reconcile produced inconsistent tree");
        return Err(RunError::Inconsistent {
            findings: result.errors,
        });
    }

    let json = codec::serialize(&new_tree)?;
    storage.store(json.as_bytes()).map_err(CodecError::Io)?;
    debug!(entries = new_tree.len(), "persisted reconciled registry");

    Ok(output)
}

/// Load the current tree under a shared reader lock.
///
/// Returns the tree and, when a document exists, its fingerprint; a reader
/// can compare fingerprints across loads to detect an intervening write
/// without re-parsing. A bootstrapping load of an absent document yields an
/// empty tree and no fingerprint (nothing is persisted by readers).
///
/// # Errors
///
/// - [`RunError::Lock`] if a writer holds the lock past the deadline
/// - [`RunError::Codec`] for read failures, drift, or an absent document
///   when bootstrap is disabled
pub fn load_with_reader(
    paths: &StorePaths,
    storage: &dyn TreeStorage,
    config: &StoreConfig,
    ctx: &mut SchemaContext,
) -> Result<(MetadataTree, Option<Fingerprint>), RunError> {
    let _lock = StoreLock::reader_wait(paths, &config.lock)?;

    let bytes = match storage.load().map_err(CodecError::Io)? {
        Some(bytes) => bytes,
        None => {
            if !config.store.bootstrap {
                return Err(CodecError::Missing.into());
            }
            codec::ensure_internal_modules(ctx);
            return Ok((MetadataTree::new(), None));
        }
    };

    let fingerprint = Fingerprint::compute(&bytes);
    let json =
        String::from_utf8(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let tree = codec::parse_document(&json)?;
    codec::validate_against(&tree, ctx)?;

    Ok((tree, Some(fingerprint)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::core::context::{ModuleDescriptor, PluginCatalog, PluginSpec};
    use crate::core::resolver::ModuleSet;
    use crate::core::types::{ModuleName, PluginName};
    use crate::metadata::entry::PluginAssignment;
    use crate::metadata::storage::FileStorage;

    struct TestStore {
        _dir: TempDir,
        paths: StorePaths,
        storage: FileStorage,
        config: StoreConfig,
    }

    impl TestStore {
        fn new() -> Self {
            let dir = TempDir::new().expect("create temp dir");
            let paths = StorePaths::new(dir.path().join("store"));
            let storage = FileStorage::new(paths.registry_path());
            let config = StoreConfig {
                lock: crate::core::config::LockConfig {
                    timeout_ms: 200,
                    poll_ms: 5,
                },
                ..Default::default()
            };
            Self {
                _dir: dir,
                paths,
                storage,
                config,
            }
        }
    }

    fn mod_name(s: &str) -> ModuleName {
        ModuleName::new(s).unwrap()
    }

    fn catalog() -> PluginCatalog {
        let mut catalog = PluginCatalog::new();
        catalog.insert(PluginSpec::for_all(PluginName::new("default").unwrap()));
        catalog
    }

    fn assignment() -> PluginAssignment {
        PluginAssignment::uniform(PluginName::new("default").unwrap())
    }

    #[test]
    fn add_lifecycle_persists_and_reloads() {
        let store = TestStore::new();
        let mut ctx = SchemaContext::new();
        ctx.insert(ModuleDescriptor::builder(mod_name("m")).build());

        let ctx_view = ctx.clone();
        let mut mod_set = ModuleSet::new();
        run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| {
                add_module(
                    tree,
                    &ctx_view,
                    &mod_name("m"),
                    &assignment(),
                    &catalog(),
                    &mut mod_set,
                )
                .map(|t| (t, ()))
            },
        )
        .unwrap();

        let (tree, fingerprint) =
            load_with_reader(&store.paths, &store.storage, &store.config, &mut ctx).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.contains(&mod_name("m")));
        assert!(fingerprint.is_some());
    }

    #[test]
    fn failed_operation_persists_nothing() {
        let store = TestStore::new();
        let mut ctx = SchemaContext::new();
        ctx.insert(ModuleDescriptor::builder(mod_name("m")).build());

        // First install succeeds.
        let ctx_view = ctx.clone();
        let mut mod_set = ModuleSet::new();
        run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| {
                add_module(
                    tree,
                    &ctx_view,
                    &mod_name("m"),
                    &assignment(),
                    &catalog(),
                    &mut mod_set,
                )
                .map(|t| (t, ()))
            },
        )
        .unwrap();
        let before = store.storage.load().unwrap().unwrap();

        // Duplicate install fails and leaves the document alone.
        let err = run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| {
                let mut mod_set = ModuleSet::new();
                add_module(
                    tree,
                    &ctx_view,
                    &mod_name("m"),
                    &assignment(),
                    &catalog(),
                    &mut mod_set,
                )
                .map(|t| (t, ()))
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            RunError::Reconcile(ReconcileError::DuplicateModule(_))
        ));
        assert_eq!(store.storage.load().unwrap().unwrap(), before);
    }

    #[test]
    fn inconsistent_result_is_caught_before_persist() {
        let store = TestStore::new();
        let mut ctx = SchemaContext::new();
        ctx.insert(ModuleDescriptor::builder(mod_name("m")).build());

        // Identity op leaves "m" untracked: the post-check must refuse.
        let err = run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| Ok((tree.clone(), ())),
        )
        .unwrap_err();

        assert!(matches!(err, RunError::Inconsistent { .. }));
        assert!(store.storage.load().unwrap().is_none());
    }

    #[test]
    fn held_writer_lock_times_out_contender() {
        let store = TestStore::new();
        let _held = StoreLock::writer(&store.paths).expect("hold lock");

        let mut ctx = SchemaContext::new();
        let err = run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| Ok((tree.clone(), ())),
        )
        .unwrap_err();

        assert!(matches!(err, RunError::Lock(LockError::Timeout { .. })));
    }

    #[test]
    fn reader_fingerprint_changes_with_document() {
        let store = TestStore::new();
        let mut ctx = SchemaContext::new();
        ctx.insert(ModuleDescriptor::builder(mod_name("a")).build());

        let ctx_view = ctx.clone();
        let mut mod_set = ModuleSet::new();
        run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| {
                add_module(
                    tree,
                    &ctx_view,
                    &mod_name("a"),
                    &assignment(),
                    &catalog(),
                    &mut mod_set,
                )
                .map(|t| (t, ()))
            },
        )
        .unwrap();
        let (_, fp1) =
            load_with_reader(&store.paths, &store.storage, &store.config, &mut ctx).unwrap();

        let mut mod_set = ModuleSet::new();
        run_with_writer(
            &store.paths,
            &store.storage,
            &store.config,
            &mut ctx,
            None,
            |tree| {
                chng_replay_support(tree, None, true, &mut mod_set).map(|t| (t, ()))
            },
        )
        .unwrap();
        let (_, fp2) =
            load_with_reader(&store.paths, &store.storage, &store.config, &mut ctx).unwrap();

        assert_ne!(fp1, fp2);
    }

    #[test]
    fn bootstrapping_reader_sees_empty_tree() {
        let store = TestStore::new();
        let mut ctx = SchemaContext::new();

        let (tree, fingerprint) =
            load_with_reader(&store.paths, &store.storage, &store.config, &mut ctx).unwrap();
        assert!(tree.is_empty());
        assert!(fingerprint.is_none());
        // Nothing persisted by a reader.
        assert!(store.storage.load().unwrap().is_none());
    }

    #[test]
    fn reader_without_bootstrap_reports_missing() {
        let mut store = TestStore::new();
        store.config.store.bootstrap = false;
        let mut ctx = SchemaContext::new();

        let err = load_with_reader(&store.paths, &store.storage, &store.config, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, RunError::Codec(CodecError::Missing)));
    }
}
