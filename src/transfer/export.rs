//! Depth-first export of a content subtree.
//!
//! The walker is a lazy, single-pass iterator over [`SerializedEvent`]s.
//! It reads the store and never writes to it: reference carriers are
//! computed per node and emitted directly.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::model::{names, ContentNode, NodeId, Property, PropertyType, Value};
use crate::storage::ContentStore;
use crate::{Error, Result};
use super::codec::{self, Arity};
use super::{ExportOptions, SerializedEvent};

enum Step {
    Visit(NodeId),
    End,
}

/// Lazy serializer of one subtree. Fused after the first error.
pub struct ExportWalker<'s, S: ContentStore + ?Sized> {
    store: &'s S,
    options: ExportOptions,
    root: NodeId,
    /// Path of the export root; reference paths are relative to it.
    base_path: String,
    stack: Vec<Step>,
    queue: VecDeque<SerializedEvent>,
    done: bool,
}

impl<'s, S: ContentStore + ?Sized> ExportWalker<'s, S> {
    pub fn new(store: &'s S, root: NodeId, options: ExportOptions) -> Result<Self> {
        let base_path = store.path_of(root)?
            .ok_or_else(|| Error::NotFound(format!("Export root {root}")))?;
        Ok(Self {
            store,
            options,
            root,
            base_path,
            stack: vec![Step::Visit(root)],
            queue: VecDeque::new(),
            done: false,
        })
    }

    /// Queue the events of one node and schedule its children.
    fn visit(&mut self, id: NodeId) -> Result<()> {
        let Some(node) = self.store.node(id)? else {
            if id == self.root {
                return Err(Error::NotFound(format!("Export root {id}")));
            }
            warn!(node = %id, "child vanished during export, skipping");
            return Ok(());
        };

        if node.is_virtual() {
            debug!(node = %id, name = %node.name, "skipping virtual subtree");
            return Ok(());
        }

        self.stack.push(Step::End);
        if self.options.recurse || id != self.root {
            for child in node.children.iter().rev() {
                self.stack.push(Step::Visit(*child));
            }
        }

        self.queue.push_back(SerializedEvent::NodeStart {
            name: node.name.clone(),
            type_name: node.primary_type.clone(),
            mixins: node.mixins.clone(),
            identity: node.is_referenceable().then_some(node.id),
        });
        let properties = self.property_events(&node)?;
        self.queue.extend(properties);
        Ok(())
    }

    fn property_events(&self, node: &ContentNode) -> Result<Vec<SerializedEvent>> {
        let mut events = Vec::with_capacity(node.properties.len());
        let mut carrier = Vec::new();

        for property in node.properties.values() {
            if property.name == names::PATH_REFERENCE || self.options.filter.excludes(&property.name) {
                continue;
            }
            match property.kind {
                PropertyType::Reference => {
                    if let Some(encoded) = self.encode_reference(node, property)? {
                        carrier.push(Value::String(encoded));
                    }
                }
                PropertyType::Binary if self.options.skip_binary => {
                    events.push(SerializedEvent::Property {
                        name: property.name.clone(),
                        kind: PropertyType::Binary,
                        values: Vec::new(),
                        multivalued: property.is_multi(),
                    });
                }
                _ => events.push(SerializedEvent::property(property)),
            }
        }

        if !carrier.is_empty() {
            events.push(SerializedEvent::Property {
                name: names::PATH_REFERENCE.to_string(),
                kind: PropertyType::String,
                values: carrier,
                multivalued: true,
            });
        }
        Ok(events)
    }

    /// Path encoding of a REFERENCE property, or None when it must be dropped.
    fn encode_reference(&self, holder: &ContentNode, property: &Property) -> Result<Option<String>> {
        let mut paths = Vec::with_capacity(property.values().len());
        for target in property.reference_targets() {
            match self.store.path_of(target)? {
                Some(path) => paths.push(path),
                None => {
                    let err = Error::DanglingReferenceError {
                        holder: holder.id,
                        property: property.name.clone(),
                        target,
                    };
                    warn!(error = %err, "dropping reference property");
                    return Ok(None);
                }
            }
        }
        if paths.is_empty() {
            warn!(holder = %holder.id, property = %property.name, "dropping reference property without targets");
            return Ok(None);
        }

        match codec::encode(&self.base_path, Arity::of(property), &property.name, &paths) {
            Ok(encoded) => Ok(Some(encoded)),
            Err(err) => {
                warn!(holder = %holder.id, error = %err, "dropping unencodable reference");
                Ok(None)
            }
        }
    }
}

impl<S: ContentStore + ?Sized> Iterator for ExportWalker<'_, S> {
    type Item = Result<SerializedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.stack.pop() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Step::End) => return Some(Ok(SerializedEvent::NodeEnd)),
                Some(Step::Visit(id)) => {
                    if let Err(err) = self.visit(id) {
                        self.done = true;
                        self.stack.clear();
                        self.queue.clear();
                        return Some(Err(err));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Projection;
    use crate::storage::{MemoryStore, NewNode};
    use pretty_assertions::assert_eq;

    fn collect(store: &MemoryStore, root: NodeId, options: ExportOptions) -> Vec<SerializedEvent> {
        ExportWalker::new(store, root, options)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    fn starts(events: &[SerializedEvent]) -> Vec<&str> {
        events.iter()
            .filter(|e| e.is_node_start())
            .filter_map(SerializedEvent::name)
            .collect()
    }

    #[test]
    fn test_depth_first_order() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        let b = store.add_child(a, "b", names::NT_UNSTRUCTURED).unwrap();
        store.add_child(b, "b1", names::NT_UNSTRUCTURED).unwrap();
        store.add_child(a, "c", names::NT_UNSTRUCTURED).unwrap();

        let events = collect(&store, a, ExportOptions::default());
        assert_eq!(starts(&events), vec!["a", "b", "b1", "c"]);
        let ends = events.iter().filter(|e| **e == SerializedEvent::NodeEnd).count();
        assert_eq!(ends, 4);
        assert_eq!(events.last(), Some(&SerializedEvent::NodeEnd));
    }

    #[test]
    fn test_virtual_subtree_skipped() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        let facet = store.add_child(a, "facet", names::NT_UNSTRUCTURED).unwrap();
        store.add_child(facet, "result", names::NT_UNSTRUCTURED).unwrap();
        store.set_projection(facet, Some(Projection::Detached)).unwrap();

        let events = collect(&store, a, ExportOptions::default());
        assert_eq!(starts(&events), vec!["a"]);
    }

    #[test]
    fn test_identity_only_for_referenceable() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_node(root, NewNode::new("a", names::NT_UNSTRUCTURED).referenceable(), None).unwrap();
        store.add_child(a, "plain", names::NT_UNSTRUCTURED).unwrap();

        let events = collect(&store, a, ExportOptions::default());
        let identities: Vec<Option<NodeId>> = events.iter()
            .filter_map(|e| match e {
                SerializedEvent::NodeStart { identity, .. } => Some(*identity),
                _ => None,
            })
            .collect();
        assert_eq!(identities, vec![Some(a), None]);
    }

    #[test]
    fn test_non_recursive_export() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        store.add_child(a, "b", names::NT_UNSTRUCTURED).unwrap();
        store.set_property(a, Property::single("title", "A")).unwrap();

        let options = ExportOptions { recurse: false, ..Default::default() };
        let events = collect(&store, a, options);
        assert_eq!(events.len(), 3);
        assert_eq!(starts(&events), vec!["a"]);
    }

    #[test]
    fn test_skip_binary() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        store.set_property(a, Property::single("data", Value::Binary(vec![1, 2, 3]))).unwrap();

        let options = ExportOptions { skip_binary: true, ..Default::default() };
        let events = collect(&store, a, options);
        assert_eq!(events[1], SerializedEvent::Property {
            name: "data".into(),
            kind: PropertyType::Binary,
            values: Vec::new(),
            multivalued: false,
        });
    }

    #[test]
    fn test_stale_carrier_not_reexported() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        store.set_property(a, Property::multi(
            names::PATH_REFERENCE,
            PropertyType::String,
            vec![Value::from("s*x*y")],
        )).unwrap();

        let events = collect(&store, a, ExportOptions::default());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_empty_reference_list_dropped() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        store.set_property(a, Property::references("rels", Vec::<NodeId>::new())).unwrap();

        let events = collect(&store, a, ExportOptions::default());
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| !matches!(e, SerializedEvent::Property { .. })));
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let store = MemoryStore::new();
        let result = ExportWalker::new(&store, NodeId::new(), ExportOptions::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_export_does_not_mutate_source() {
        let mut store = MemoryStore::new();
        let root = store.root_id();
        let a = store.add_child(root, "a", names::NT_UNSTRUCTURED).unwrap();
        let b = store.add_child(a, "b", names::NT_UNSTRUCTURED).unwrap();
        store.set_property(a, Property::reference("rel", b)).unwrap();
        let before = store.node(a).unwrap();

        let _ = collect(&store, a, ExportOptions::default());
        assert_eq!(store.node(a).unwrap(), before);
    }
}
