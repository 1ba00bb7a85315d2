//! # Dereferenced Import/Export
//!
//! Serializes a content subtree to a relocatable event stream and imports
//! it back, possibly into another tree.
//!
//! ```text
//! ExportWalker ──events──▶ TreeImporter (pass 1: structure)
//!                               │ PendingReference worklist
//!                               ▼
//!                          ReferenceReconciler (pass 2: references)
//! ```
//!
//! REFERENCE properties never travel as identities. The walker rewrites
//! them into path encodings (see [`codec`]) gathered in the reserved
//! carrier property `sys:pathreference`; the reconciler turns them back
//! into identities of the destination tree once every node exists.

pub mod codec;
pub mod conflict;
pub mod event;
pub mod export;
pub mod import;
pub mod reconcile;

use std::io::Write;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::{names, NodeId};
use crate::storage::ContentStore;
use crate::Result;

pub use codec::{Arity, DecodedReference};
pub use conflict::{ConflictDecision, IdentityPolicy, NamePolicy};
pub use event::{EventReader, EventWriter, SerializedEvent};
pub use export::ExportWalker;
pub use import::{PendingReference, StructuralImport, TreeImporter};
pub use reconcile::{ReconcileReport, ReferenceReconciler};

// ============================================================================
// Configuration
// ============================================================================

/// Property names dropped from exports and ignored on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilter {
    pub excluded: HashSet<String>,
}

impl PropertyFilter {
    /// Filter that drops nothing.
    pub fn none() -> Self {
        Self { excluded: HashSet::new() }
    }

    pub fn with_excluded(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into());
        self
    }

    pub fn excludes(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }
}

/// Drops derived caches, versioning history, lock ownership and facet counts.
impl Default for PropertyFilter {
    fn default() -> Self {
        Self {
            excluded: names::EXCLUDED_PROPERTIES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Export descendants; when false only the root node is emitted.
    pub recurse: bool,
    /// Emit binary properties without their values.
    pub skip_binary: bool,
    pub filter: PropertyFilter,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            recurse: true,
            skip_binary: false,
            filter: PropertyFilter::default(),
        }
    }
}

/// Conflict policies for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub identity_policy: IdentityPolicy,
    pub name_policy: NamePolicy,
    pub filter: PropertyFilter,
}

impl ImportOptions {
    pub fn new(identity_policy: IdentityPolicy, name_policy: NamePolicy) -> Self {
        Self {
            identity_policy,
            name_policy,
            filter: PropertyFilter::default(),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Counters for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub nodes_created: u64,
    pub nodes_replaced: u64,
    pub nodes_removed: u64,
    pub nodes_skipped: u64,
    pub nodes_retained: u64,
    pub properties_set: u64,
    pub references_resolved: u64,
    pub references_unresolved: u64,
    pub carriers_removed: u64,
    /// First top-level node materialized or retained by the import.
    pub root: Option<NodeId>,
}

impl ImportSummary {
    pub fn absorb(&mut self, report: &ReconcileReport) {
        self.references_resolved += report.resolved;
        self.references_unresolved += report.unresolved;
        self.carriers_removed += report.carriers_removed;
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Lazily export the subtree rooted at `root`.
pub fn export<S>(store: &S, root: NodeId, options: ExportOptions) -> Result<ExportWalker<'_, S>>
where
    S: ContentStore + ?Sized,
{
    ExportWalker::new(store, root, options)
}

/// Export the subtree rooted at `root` as JSON lines. Returns the event count.
pub fn export_to_writer<S, W>(store: &S, root: NodeId, options: ExportOptions, writer: W) -> Result<usize>
where
    S: ContentStore + ?Sized,
    W: Write,
{
    let mut writer = EventWriter::new(writer);
    let count = writer.write_all(export(store, root, options)?)?;
    writer.into_inner()?;
    Ok(count)
}

/// Import an event stream under `target`: structural pass, then reference
/// reconciliation.
///
/// A fatal error leaves the tree as far as it was mutated; callers needing
/// all-or-nothing semantics wrap the run in their own atomic boundary.
#[tracing::instrument(skip_all, fields(target = %target))]
pub fn import_stream<S, I>(store: &mut S, events: I, target: NodeId, options: &ImportOptions) -> Result<ImportSummary>
where
    S: ContentStore + ?Sized,
    I: IntoIterator<Item = Result<SerializedEvent>>,
{
    let StructuralImport { mut summary, pending } = TreeImporter::run(store, events, target, options)?;
    let report = ReferenceReconciler::new(store, summary.root)?.reconcile(pending)?;
    summary.absorb(&report);
    tracing::info!(
        created = summary.nodes_created,
        replaced = summary.nodes_replaced,
        skipped = summary.nodes_skipped,
        resolved = summary.references_resolved,
        unresolved = summary.references_unresolved,
        "import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_drops_system_properties() {
        let filter = PropertyFilter::default();
        for name in [names::SYS_PATHS, names::JCR_LOCK_OWNER, names::JCR_BASE_VERSION, names::SYS_COUNT] {
            assert!(filter.excludes(name), "{name}");
        }
        assert!(!filter.excludes("title"));
        assert!(!filter.excludes(names::PATH_REFERENCE));
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: ImportOptions = serde_json::from_str(r#"{"name_policy":"Overwrite"}"#).unwrap();
        assert_eq!(options.name_policy, NamePolicy::Overwrite);
        assert_eq!(options.identity_policy, IdentityPolicy::CreateNew);
        assert!(options.filter.excludes(names::SYS_RELATED));

        let export: ExportOptions = serde_json::from_str(r#"{"skip_binary":true}"#).unwrap();
        assert!(export.recurse);
        assert!(export.skip_binary);
    }

    #[test]
    fn test_filter_extension() {
        let filter = PropertyFilter::none().with_excluded("cms:cache");
        assert!(filter.excludes("cms:cache"));
        assert!(!filter.excludes(names::SYS_PATHS));
    }
}
