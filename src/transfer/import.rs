//! Structural import: pass 1 of an import run.
//!
//! Consumes events, consults the conflict resolver for every `NodeStart`,
//! builds the destination tree and records reference carriers as
//! [`PendingReference`]s for the reconciler.

use tracing::{debug, warn};

use crate::model::{names, Mixins, NodeId, Property, PropertyType, Value};
use crate::storage::{ContentStore, NewNode};
use crate::{Error, Result};
use super::codec;
use super::conflict::{self, ConflictDecision, IdentityConflict, NameConflict};
use super::event::{self, SerializedEvent};
use super::{ImportOptions, ImportSummary};

/// An encoded reference waiting for pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    /// Node holding the carrier in the destination tree.
    pub holder: NodeId,
    pub encoded: String,
}

impl PendingReference {
    /// Name of the original reference property.
    pub fn property(&self) -> Option<&str> {
        codec::property_name(&self.encoded)
    }
}

/// Result of pass 1: the worklist is handed on explicitly.
#[derive(Debug, Clone, Default)]
pub struct StructuralImport {
    pub summary: ImportSummary,
    pub pending: Vec<PendingReference>,
}

/// Entry on the active-parent stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// The node the import was asked to write under.
    Target(NodeId),
    Created(NodeId),
    /// Exported repository root mapped onto the import target.
    Merged(NodeId),
    /// Existing protected node reused as-is.
    Retained(NodeId),
    Skipped,
}

/// Where a new node goes.
struct Slot {
    parent: NodeId,
    position: Option<usize>,
}

/// Identity-axis outcome once the decision is made, before any mutation.
#[derive(Debug, Clone, Copy)]
enum IdentityAction {
    Keep,
    Mint,
    Remove(NodeId),
    Replace(NodeId),
}

pub struct TreeImporter<'a, S: ContentStore + ?Sized> {
    store: &'a mut S,
    options: &'a ImportOptions,
    target: NodeId,
    stack: Vec<Frame>,
    pending: Vec<PendingReference>,
    summary: ImportSummary,
}

impl<'a, S: ContentStore + ?Sized> TreeImporter<'a, S> {
    pub fn new(store: &'a mut S, target: NodeId, options: &'a ImportOptions) -> Result<Self> {
        if !store.contains(target)? {
            return Err(Error::NotFound(format!("Import target {target}")));
        }
        Ok(Self {
            store,
            options,
            target,
            stack: vec![Frame::Target(target)],
            pending: Vec::new(),
            summary: ImportSummary::default(),
        })
    }

    /// Consume a whole stream and finish pass 1.
    #[tracing::instrument(skip_all, fields(target = %target))]
    pub fn run<I>(store: &'a mut S, events: I, target: NodeId, options: &'a ImportOptions) -> Result<StructuralImport>
    where
        I: IntoIterator<Item = Result<SerializedEvent>>,
    {
        let mut importer = Self::new(store, target, options)?;
        for event in events {
            importer.handle(event?)?;
        }
        importer.finish()
    }

    pub fn handle(&mut self, event: SerializedEvent) -> Result<()> {
        match event {
            SerializedEvent::NodeStart { name, type_name, mixins, identity } => {
                self.start_node(name, type_name, mixins, identity)
            }
            SerializedEvent::Property { name, kind, values, multivalued } => {
                self.apply_property(&name, kind, values, multivalued)
            }
            SerializedEvent::NodeEnd => self.end_node(),
        }
    }

    pub fn finish(self) -> Result<StructuralImport> {
        if self.stack.len() != 1 {
            return Err(Error::StreamError(format!(
                "{} node(s) left open at end of stream",
                self.stack.len() - 1
            )));
        }
        debug!(pending = self.pending.len(), "structural import finished");
        Ok(StructuralImport {
            summary: self.summary,
            pending: self.pending,
        })
    }

    // ========================================================================
    // NodeStart
    // ========================================================================

    fn start_node(
        &mut self,
        name: String,
        type_name: String,
        mixins: Mixins,
        identity: Option<NodeId>,
    ) -> Result<()> {
        let parent = match self.stack.last().copied() {
            Some(Frame::Skipped) => {
                self.summary.nodes_skipped += 1;
                self.stack.push(Frame::Skipped);
                return Ok(());
            }
            Some(Frame::Target(id) | Frame::Created(id) | Frame::Merged(id) | Frame::Retained(id)) => id,
            None => return Err(Error::StreamError("import stack underflow".into())),
        };

        // A whole-repository export starts with the root node, which has no
        // name and cannot be created; its content goes into the target.
        if self.stack.len() == 1 && type_name == names::REP_ROOT {
            debug!(target = %parent, "merging exported repository root into import target");
            self.summary.nodes_retained += 1;
            self.enter(Frame::Merged(parent), parent);
            return Ok(());
        }

        // Name axis.
        let mut replaced = None;
        if let Some(existing) = self.store.child_named(parent, &name)? {
            match self.resolve_name(parent, existing, &name, &type_name)? {
                ConflictDecision::CreateNew => {}
                ConflictDecision::ReplaceExisting(id) | ConflictDecision::RemoveExisting(id) => {
                    replaced = Some(id);
                }
                terminal => return self.apply_terminal(terminal, parent, &name),
            }
        }

        // Identity axis. The node about to be replaced (and its subtree)
        // no longer counts as a holder of the identity.
        let mut action = IdentityAction::Keep;
        if let Some(id) = identity {
            let superseded = match replaced {
                Some(r) => self.store.is_ancestor_or_self(r, id)?,
                None => false,
            };
            if !superseded && self.store.contains(id)? {
                action = match self.resolve_identity(parent, id)? {
                    ConflictDecision::CreateNew => IdentityAction::Mint,
                    ConflictDecision::RemoveExisting(e) => IdentityAction::Remove(e),
                    ConflictDecision::ReplaceExisting(e) => IdentityAction::Replace(e),
                    terminal => return self.apply_terminal(terminal, parent, &name),
                };
            }
        }

        // In-place replacement moves the node under the holder's parent,
        // which needs its own name check.
        let mut displaced = None;
        if let IdentityAction::Replace(existing) = action {
            if let Some((holder_parent, _)) = self.store.position_of(existing)? {
                if holder_parent != parent {
                    let clash = self.store.child_named(holder_parent, &name)?.filter(|c| *c != existing);
                    if let Some(clash) = clash {
                        match self.resolve_name(holder_parent, clash, &name, &type_name)? {
                            ConflictDecision::CreateNew => {}
                            ConflictDecision::ReplaceExisting(id) | ConflictDecision::RemoveExisting(id) => {
                                if self.store.is_ancestor_or_self(id, parent)? {
                                    return Err(Error::ConflictError(format!(
                                        "replacing '{name}' would remove node {id} enclosing the import target"
                                    )));
                                }
                                displaced = Some(id);
                            }
                            terminal => return self.apply_terminal(terminal, holder_parent, &name),
                        }
                    }
                }
            }
        }

        // Every decision is made; mutate. Removals run before positions are
        // read so sibling shifts are accounted for.
        let mut slot = Slot { parent, position: None };
        let identity = match action {
            IdentityAction::Mint => {
                debug!(name = %name, "identity already in use, minting a new one");
                None
            }
            _ => identity,
        };
        if let IdentityAction::Remove(existing) = action {
            debug!(node = %existing, "removing node holding the incoming identity");
            self.store.remove_node(existing)?;
            self.summary.nodes_removed += 1;
        }
        if let Some(existing) = replaced {
            slot.position = self.store.position_of(existing)?.map(|(_, pos)| pos);
            self.store.remove_node(existing)?;
            self.summary.nodes_replaced += 1;
        }
        if let Some(sibling) = displaced {
            debug!(node = %sibling, "removing same-name sibling of the node replaced in place");
            self.store.remove_node(sibling)?;
            self.summary.nodes_replaced += 1;
        }
        if let IdentityAction::Replace(existing) = action {
            let (p, position) = self.store.position_of(existing)?
                .ok_or_else(|| Error::ConflictError("the root node cannot be replaced".into()))?;
            debug!(node = %existing, "replacing node holding the incoming identity in place");
            self.store.remove_node(existing)?;
            self.summary.nodes_replaced += 1;
            slot = Slot { parent: p, position: Some(position) };
        }

        let mut new_node = NewNode::new(name, type_name);
        new_node.mixins = mixins;
        new_node.identity = identity;
        let id = self.store.add_node(slot.parent, new_node, slot.position)?;
        self.summary.nodes_created += 1;
        self.enter(Frame::Created(id), id);
        Ok(())
    }

    fn resolve_name(&self, parent: NodeId, existing: NodeId, name: &str, type_name: &str) -> Result<ConflictDecision> {
        let existing_node = self.store.node(existing)?
            .ok_or_else(|| Error::NotFound(format!("Node {existing}")))?;
        let parent_node = self.store.node(parent)?
            .ok_or_else(|| Error::NotFound(format!("Node {parent}")))?;
        let types = self.store.node_types();
        let conflict = NameConflict {
            name,
            existing,
            protected: existing_node.protected,
            satisfies_type: types.is_node_type(&existing_node.primary_type, type_name),
            same_name_siblings: types.allows_same_name_siblings(&parent_node.primary_type),
        };
        Ok(conflict::resolve_name(self.options.name_policy, &conflict))
    }

    fn resolve_identity(&self, parent: NodeId, identity: NodeId) -> Result<ConflictDecision> {
        let existing_node = self.store.node(identity)?
            .ok_or_else(|| Error::NotFound(format!("Node {identity}")))?;
        let encloses_target = self.store.is_ancestor_or_self(identity, parent)?
            || self.store.is_ancestor_or_self(identity, self.target)?;
        let conflict = IdentityConflict {
            identity,
            existing: identity,
            is_root: existing_node.is_root(),
            encloses_target,
        };
        Ok(conflict::resolve_identity(self.options.identity_policy, &conflict))
    }

    /// Handle decisions that end processing of this `NodeStart`.
    fn apply_terminal(&mut self, decision: ConflictDecision, parent: NodeId, name: &str) -> Result<()> {
        match decision {
            ConflictDecision::SkipSubtree => {
                debug!(name = %name, "skipping subtree");
                self.summary.nodes_skipped += 1;
                self.stack.push(Frame::Skipped);
                Ok(())
            }
            ConflictDecision::KeepExisting(existing) => {
                debug!(name = %name, node = %existing, "existing protected node already satisfies import");
                self.summary.nodes_retained += 1;
                self.enter(Frame::Retained(existing), existing);
                Ok(())
            }
            ConflictDecision::Throw(reason) => {
                let at = self.store.path_of(parent)?.unwrap_or_else(|| parent.to_string());
                Err(Error::ConflictError(format!("importing '{name}' under '{at}': {reason}")))
            }
            ConflictDecision::CreateNew
            | ConflictDecision::ReplaceExisting(_)
            | ConflictDecision::RemoveExisting(_) => Err(Error::ConflictError(format!(
                "decision {decision:?} for '{name}' does not end node processing"
            ))),
        }
    }

    fn enter(&mut self, frame: Frame, id: NodeId) {
        if self.stack.len() == 1 && self.summary.root.is_none() {
            self.summary.root = Some(id);
        }
        self.stack.push(frame);
    }

    // ========================================================================
    // Property
    // ========================================================================

    fn apply_property(&mut self, name: &str, kind: PropertyType, values: Vec<Value>, multivalued: bool) -> Result<()> {
        let holder = match self.stack.last().copied() {
            Some(Frame::Created(id) | Frame::Merged(id)) => id,
            Some(Frame::Skipped) => return Ok(()),
            Some(Frame::Retained(id)) => {
                debug!(node = %id, property = %name, "ignoring property of retained node");
                return Ok(());
            }
            Some(Frame::Target(_)) | None => {
                return Err(Error::StreamError(format!("property '{name}' outside of any node")));
            }
        };

        if name == names::PATH_REFERENCE {
            return self.capture_carrier(holder, values);
        }
        if self.options.filter.excludes(name) {
            debug!(property = %name, "ignoring filtered property");
            return Ok(());
        }
        if kind == PropertyType::Reference {
            for target in values.iter().filter_map(Value::as_reference) {
                if !self.store.contains(target)? {
                    warn!(holder = %holder, property = %name, target = %target, "dropping reference to missing node");
                    return Ok(());
                }
            }
        }

        match event::to_property(name, kind, values, multivalued) {
            Some(property) => {
                self.store.set_property(holder, property)?;
                self.summary.properties_set += 1;
            }
            None => debug!(property = %name, "single-valued property without value left unset"),
        }
        Ok(())
    }

    /// Store the carrier on the holder and queue each encoded value.
    fn capture_carrier(&mut self, holder: NodeId, values: Vec<Value>) -> Result<()> {
        let mut kept = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::String(encoded) => {
                    self.pending.push(PendingReference { holder, encoded: encoded.clone() });
                    kept.push(Value::String(encoded));
                }
                other => warn!(holder = %holder, value = %other, "ignoring non-string carrier value"),
            }
        }
        if !kept.is_empty() {
            let carrier = Property::multi(names::PATH_REFERENCE, PropertyType::String, kept);
            self.store.set_property(holder, carrier)?;
        }
        Ok(())
    }

    // ========================================================================
    // NodeEnd
    // ========================================================================

    fn end_node(&mut self) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::StreamError("NodeEnd without matching NodeStart".into()));
        }
        self.stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn start(name: &str) -> SerializedEvent {
        SerializedEvent::NodeStart {
            name: name.into(),
            type_name: names::NT_UNSTRUCTURED.into(),
            mixins: Mixins::new(),
            identity: None,
        }
    }

    fn run(store: &mut MemoryStore, events: Vec<SerializedEvent>, options: &ImportOptions) -> Result<StructuralImport> {
        let target = store.root_id();
        TreeImporter::run(store, events.into_iter().map(Ok), target, options)
    }

    #[test]
    fn test_builds_tree_and_records_root() {
        let mut store = MemoryStore::new();
        let events = vec![
            start("a"),
            SerializedEvent::Property {
                name: "title".into(),
                kind: PropertyType::String,
                values: vec![Value::from("A")],
                multivalued: false,
            },
            start("b"),
            SerializedEvent::NodeEnd,
            SerializedEvent::NodeEnd,
        ];
        let result = run(&mut store, events, &ImportOptions::default()).unwrap();

        let a = store.node_by_path("/a").unwrap().unwrap();
        assert_eq!(result.summary.root, Some(a));
        assert_eq!(result.summary.nodes_created, 2);
        assert_eq!(result.summary.properties_set, 1);
        assert!(store.node_by_path("/a/b").unwrap().is_some());
    }

    #[test]
    fn test_carrier_becomes_pending_reference() {
        let mut store = MemoryStore::new();
        let events = vec![
            start("a"),
            SerializedEvent::Property {
                name: names::PATH_REFERENCE.into(),
                kind: PropertyType::String,
                values: vec![Value::from("s*rel*b")],
                multivalued: true,
            },
            SerializedEvent::NodeEnd,
        ];
        let result = run(&mut store, events, &ImportOptions::default()).unwrap();

        let a = store.node_by_path("/a").unwrap().unwrap();
        assert_eq!(result.pending, vec![PendingReference { holder: a, encoded: "s*rel*b".into() }]);
        assert_eq!(result.pending[0].property(), Some("rel"));
        assert!(store.property(a, names::PATH_REFERENCE).unwrap().is_some());
    }

    #[test]
    fn test_filtered_property_ignored() {
        let mut store = MemoryStore::new();
        let events = vec![
            start("a"),
            SerializedEvent::Property {
                name: names::JCR_LOCK_OWNER.into(),
                kind: PropertyType::String,
                values: vec![Value::from("admin")],
                multivalued: false,
            },
            SerializedEvent::NodeEnd,
        ];
        run(&mut store, events, &ImportOptions::default()).unwrap();
        let a = store.node_by_path("/a").unwrap().unwrap();
        assert!(store.property(a, names::JCR_LOCK_OWNER).unwrap().is_none());
    }

    #[test]
    fn test_malformed_streams() {
        let options = ImportOptions::default();

        let mut store = MemoryStore::new();
        let err = run(&mut store, vec![SerializedEvent::NodeEnd], &options).unwrap_err();
        assert!(matches!(err, Error::StreamError(_)));

        let mut store = MemoryStore::new();
        let err = run(&mut store, vec![start("a")], &options).unwrap_err();
        assert!(matches!(err, Error::StreamError(_)));

        let mut store = MemoryStore::new();
        let orphan = SerializedEvent::Property {
            name: "x".into(),
            kind: PropertyType::Long,
            values: vec![Value::from(1)],
            multivalued: false,
        };
        let err = run(&mut store, vec![orphan], &options).unwrap_err();
        assert!(matches!(err, Error::StreamError(_)));
    }

    #[test]
    fn test_missing_target() {
        let mut store = MemoryStore::new();
        let options = ImportOptions::default();
        let result = TreeImporter::new(&mut store, NodeId::new(), &options);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_repository_root_merges_into_target() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let inbox = store.add_child(root, "inbox", names::NT_UNSTRUCTURED).unwrap();
        let events = vec![
            SerializedEvent::NodeStart {
                name: String::new(),
                type_name: names::REP_ROOT.into(),
                mixins: Mixins::new(),
                identity: None,
            },
            SerializedEvent::Property {
                name: "site".into(),
                kind: PropertyType::String,
                values: vec![Value::from("main")],
                multivalued: false,
            },
            start("a"),
            SerializedEvent::NodeEnd,
            SerializedEvent::NodeEnd,
        ];
        let options = ImportOptions::default();
        let result = TreeImporter::run(&mut store, events.into_iter().map(Ok), inbox, &options).unwrap();

        assert_eq!(result.summary.root, Some(inbox));
        assert_eq!(result.summary.nodes_retained, 1);
        assert_eq!(result.summary.nodes_created, 1);
        assert!(store.property(inbox, "site").unwrap().is_some());
        assert!(store.node_by_path("/inbox/a").unwrap().is_some());
    }

    #[test]
    fn test_direct_reference_to_missing_node_dropped() {
        let mut store = MemoryStore::new();
        let events = vec![
            start("a"),
            SerializedEvent::Property {
                name: "rel".into(),
                kind: PropertyType::Reference,
                values: vec![Value::Reference(NodeId::new())],
                multivalued: false,
            },
            SerializedEvent::NodeEnd,
        ];
        let result = run(&mut store, events, &ImportOptions::default()).unwrap();
        assert_eq!(result.summary.properties_set, 0);
    }
}
