//! Reference reconciliation: pass 2 of an import run.
//!
//! Each pending carrier value is decoded, its paths resolved against the
//! destination tree and, when every path resolves, written back as a
//! REFERENCE property under its original name and arity. Carriers are
//! removed from all holders afterwards, whatever the outcome.
//!
//! Path resolution:
//!
//! | Encoded path | Resolved against |
//! |--------------|------------------|
//! | `/x/y` | tree root |
//! | `b/c` | import root |
//! | `.` | the import root itself |

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{names, path, NodeId, Property};
use crate::storage::ContentStore;
use crate::{Error, Result};
use super::codec::{self, Arity};
use super::PendingReference;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub resolved: u64,
    pub unresolved: u64,
    pub carriers_removed: u64,
}

pub struct ReferenceReconciler<'a, S: ContentStore + ?Sized> {
    store: &'a mut S,
    /// Import root and its path in the destination tree.
    base: Option<(NodeId, String)>,
}

impl<'a, S: ContentStore + ?Sized> ReferenceReconciler<'a, S> {
    pub fn new(store: &'a mut S, import_root: Option<NodeId>) -> Result<Self> {
        let base = match import_root {
            Some(root) => store.path_of(root)?.map(|p| (root, p)),
            None => None,
        };
        Ok(Self { store, base })
    }

    #[tracing::instrument(skip_all, fields(pending = pending.len()))]
    pub fn reconcile(self, pending: Vec<PendingReference>) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut holders = Vec::new();
        let mut seen = HashSet::new();

        for reference in &pending {
            if seen.insert(reference.holder) {
                holders.push(reference.holder);
            }
            match self.resolve(reference) {
                Ok(property) => {
                    debug!(holder = %reference.holder, property = %property.name, "reference restored");
                    self.store.set_property(reference.holder, property)?;
                    report.resolved += 1;
                }
                Err(err) if !err.is_fatal() => {
                    warn!(holder = %reference.holder, encoded = %reference.encoded, error = %err, "skipping reference");
                    report.unresolved += 1;
                }
                Err(err) => return Err(err),
            }
        }

        for holder in holders {
            if self.store.contains(holder)? && self.store.remove_property(holder, names::PATH_REFERENCE)? {
                report.carriers_removed += 1;
            }
        }
        Ok(report)
    }

    /// Rebuild the REFERENCE property encoded by one pending entry.
    fn resolve(&self, reference: &PendingReference) -> Result<Property> {
        if !self.store.contains(reference.holder)? {
            return Err(Error::ResolutionError(format!(
                "holder {} no longer exists",
                reference.holder
            )));
        }
        let decoded = codec::decode(&reference.encoded)?;
        let mut targets = Vec::with_capacity(decoded.paths.len());
        for encoded_path in &decoded.paths {
            match self.resolve_path(encoded_path)? {
                Some(id) => targets.push(id),
                None => {
                    return Err(Error::ResolutionError(format!(
                        "'{}' of property '{}': {} of {} paths resolved",
                        encoded_path,
                        decoded.property,
                        targets.len(),
                        decoded.paths.len()
                    )));
                }
            }
        }

        Ok(match decoded.arity {
            Arity::Single => Property::reference(decoded.property, targets[0]),
            Arity::Multi => Property::references(decoded.property, targets),
        })
    }

    fn resolve_path(&self, encoded: &str) -> Result<Option<NodeId>> {
        if path::is_absolute(encoded) {
            return self.store.node_by_path(encoded);
        }
        let Some((root, base)) = &self.base else {
            return Err(Error::ResolutionError(format!("relative path '{encoded}' without an import root")));
        };
        if encoded == path::SELF {
            return Ok(Some(*root));
        }
        self.store.node_by_path(&path::join(base, encoded))
    }
}
