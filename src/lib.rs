//! # content-tree: Dereferenced Content Tree Import/Export
//!
//! Serializes a subtree of a hierarchical content repository to a
//! portable event stream and imports it back, possibly into a different
//! tree, with the references inside it intact.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `ContentStore` is the contract between the engine and storage
//! 2. **Plain data**: `ContentNode`, `Property`, `Value` and `SerializedEvent` cross all boundaries
//! 3. **Export is read-only**: reference carriers are computed, never stashed in the source tree
//! 4. **Two passes on import**: structure first, references once every node exists
//!
//! ## Quick Start
//!
//! ```rust
//! use content_tree::{Repository, ExportOptions, ImportOptions};
//! use content_tree::model::{names, Property};
//! use content_tree::storage::ContentStore;
//!
//! # fn main() -> content_tree::Result<()> {
//! let source = Repository::open_memory();
//! {
//!     let mut store = source.write();
//!     let root = store.root_id();
//!     let a = store.add_child(root, "a", names::NT_UNSTRUCTURED)?;
//!     let b = store.add_child(a, "b", names::NT_UNSTRUCTURED)?;
//!     store.set_property(a, Property::reference("rel", b))?;
//! }
//!
//! let events = source.export("/a", &ExportOptions::default())?;
//!
//! let destination = Repository::open_memory();
//! let summary = destination.import("/", events.into_iter().map(Ok), &ImportOptions::default())?;
//! assert_eq!(summary.references_resolved, 1);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod transfer;

use std::io::{BufRead, Write};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    ContentNode, NodeId, Property, PropertyMap, PropertyType, PropertyValues, Value,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{ContentStore, MemoryStore, NewNode};

// ============================================================================
// Re-exports: Transfer
// ============================================================================

pub use transfer::{
    ConflictDecision, ExportOptions, IdentityPolicy, ImportOptions, ImportSummary,
    NamePolicy, PropertyFilter, SerializedEvent,
};

// ============================================================================
// Top-level Repository handle
// ============================================================================

/// Shared handle over a content store.
///
/// Exports run under a shared read section; imports hold the exclusive
/// write section for the whole run, since references are only valid once
/// reconciliation has finished.
pub struct Repository<S: ContentStore> {
    store: RwLock<S>,
}

impl<S: ContentStore> Repository<S> {
    pub fn with_store(store: S) -> Self {
        Self { store: RwLock::new(store) }
    }

    /// Shared read section.
    pub fn read(&self) -> RwLockReadGuard<'_, S> {
        self.store.read()
    }

    /// Exclusive write section.
    pub fn write(&self) -> RwLockWriteGuard<'_, S> {
        self.store.write()
    }

    pub fn into_inner(self) -> S {
        self.store.into_inner()
    }

    /// Export the subtree at `path` into memory.
    pub fn export(&self, path: &str, options: &ExportOptions) -> Result<Vec<SerializedEvent>> {
        let store = self.read();
        let root = lookup(&*store, path)?;
        transfer::export(&*store, root, options.clone())?.collect()
    }

    /// Export the subtree at `path` as JSON lines. Returns the event count.
    pub fn export_to<W: Write>(&self, path: &str, options: &ExportOptions, writer: W) -> Result<usize> {
        let store = self.read();
        let root = lookup(&*store, path)?;
        transfer::export_to_writer(&*store, root, options.clone(), writer)
    }

    /// Import an event stream under the node at `target_path`.
    pub fn import<I>(&self, target_path: &str, events: I, options: &ImportOptions) -> Result<ImportSummary>
    where
        I: IntoIterator<Item = Result<SerializedEvent>>,
    {
        let mut store = self.write();
        let target = lookup(&*store, target_path)?;
        transfer::import_stream(&mut *store, events, target, options)
    }

    /// Import JSON lines under the node at `target_path`.
    pub fn import_from<R: BufRead>(&self, target_path: &str, reader: R, options: &ImportOptions) -> Result<ImportSummary> {
        self.import(target_path, transfer::EventReader::new(reader), options)
    }
}

/// In-memory repository for testing and embedding.
impl Repository<MemoryStore> {
    pub fn open_memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

fn lookup<S: ContentStore + ?Sized>(store: &S, path: &str) -> Result<NodeId> {
    store.node_by_path(path)?
        .ok_or_else(|| Error::NotFound(format!("Path {path}")))
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed encoded reference: {0}")]
    FormatError(String),

    #[error("Import conflict: {0}")]
    ConflictError(String),

    #[error("Dangling reference: property '{property}' of node {holder} points to missing node {target}")]
    DanglingReferenceError {
        holder: NodeId,
        property: String,
        target: NodeId,
    },

    #[error("Unresolved reference: {0}")]
    ResolutionError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed event stream: {0}")]
    StreamError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Fatal errors abort the run; the others skip the affected unit.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::FormatError(_) | Error::DanglingReferenceError { .. } | Error::ResolutionError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(!Error::FormatError("x".into()).is_fatal());
        assert!(!Error::ResolutionError("x".into()).is_fatal());
        assert!(!Error::DanglingReferenceError {
            holder: NodeId::new(),
            property: "rel".into(),
            target: NodeId::new(),
        }.is_fatal());
        assert!(Error::ConflictError("x".into()).is_fatal());
        assert!(Error::StorageError("x".into()).is_fatal());
    }

    #[test]
    fn test_repository_missing_path() {
        let repo = Repository::open_memory();
        let result = repo.export("/nope", &ExportOptions::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
