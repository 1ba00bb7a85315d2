//! In-memory content store.
//!
//! This is the reference implementation of `ContentStore`. Nodes live in
//! a single identity-keyed map; parent/child links are identities.
//!
//! ## Limitations
//!
//! - **No persistence**: the tree lives as long as the store value.
//! - **No referential integrity**: removing a node does not check for
//!   REFERENCE properties pointing into the removed subtree.
//! - **No locking**: wrap in `Repository` for shared access.

use hashbrown::HashMap;

use crate::model::*;
use crate::{Error, Result};
use super::{ContentStore, NewNode};

/// Nesting limit for auto-created children, guarding against type
/// definitions that auto-create themselves.
const MAX_AUTO_CREATE_DEPTH: usize = 16;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory hierarchical content tree.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    nodes: HashMap<NodeId, ContentNode>,
    root: NodeId,
    types: NodeTypeRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_types(NodeTypeRegistry::with_builtins())
    }

    pub fn with_types(types: NodeTypeRegistry) -> Self {
        Self::with_root(NodeId::new(), types)
    }

    /// Store whose root carries a caller-chosen identity.
    pub fn with_root(root: NodeId, types: NodeTypeRegistry) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root, ContentNode::new(root, "", names::REP_ROOT));
        Self { nodes, root, types }
    }

    pub fn types_mut(&mut self) -> &mut NodeTypeRegistry {
        &mut self.types
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Mark a node as a projection of canonical content (or detach it).
    pub fn set_projection(&mut self, id: NodeId, projection: Option<Projection>) -> Result<()> {
        self.node_mut(id)?.projection = projection;
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut ContentNode> {
        self.nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    /// Recompute same-name-sibling indices of `parent`'s children named `name`.
    fn reindex(&mut self, parent: NodeId, name: &str) {
        let Some(children) = self.nodes.get(&parent).map(|p| p.children.clone()) else {
            return;
        };
        let mut seen = 0u32;
        for child in children {
            if let Some(node) = self.nodes.get_mut(&child) {
                if node.name == name {
                    seen += 1;
                    node.index = if seen > 1 { Some(seen) } else { None };
                }
            }
        }
    }

    fn insert_child(
        &mut self,
        parent: NodeId,
        node: NewNode,
        position: Option<usize>,
        protected: bool,
        depth: usize,
    ) -> Result<NodeId> {
        if depth > MAX_AUTO_CREATE_DEPTH {
            return Err(Error::StorageError(format!(
                "auto-created children of '{}' nest deeper than {MAX_AUTO_CREATE_DEPTH}",
                node.primary_type
            )));
        }
        if !names::is_legal_name(&node.name) {
            return Err(Error::StorageError(format!("Illegal node name '{}'", node.name)));
        }
        let parent_type = self.nodes.get(&parent)
            .map(|p| p.primary_type.clone())
            .ok_or_else(|| Error::NotFound(format!("Parent node {parent}")))?;

        let id = match node.identity {
            Some(id) if self.nodes.contains_key(&id) => {
                return Err(Error::StorageError(format!("Identity {id} is already in use")));
            }
            Some(id) => id,
            None => NodeId::new(),
        };

        if !self.types.allows_same_name_siblings(&parent_type)
            && self.child_named(parent, &node.name)?.is_some()
        {
            return Err(Error::StorageError(format!(
                "'{}' already has a child named '{}' and type '{parent_type}' forbids same-name siblings",
                self.path_of(parent)?.unwrap_or_default(),
                node.name,
            )));
        }

        let mut created = ContentNode::new(id, node.name.clone(), node.primary_type.clone());
        created.mixins = node.mixins;
        created.parent = Some(parent);
        created.protected = protected;
        self.nodes.insert(id, created);

        let siblings = &mut self.node_mut(parent)?.children;
        match position {
            Some(p) if p < siblings.len() => siblings.insert(p, id),
            _ => siblings.push(id),
        }
        self.reindex(parent, &node.name);

        let auto_created = self.types.auto_created(&node.primary_type).to_vec();
        for def in auto_created {
            let child = NewNode::new(def.name, def.primary_type);
            self.insert_child(id, child, None, def.protected, depth + 1)?;
        }

        Ok(id)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ContentStore impl
// ============================================================================

impl ContentStore for MemoryStore {
    fn root_id(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Result<Option<ContentNode>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn contains(&self, id: NodeId) -> Result<bool> {
        Ok(self.nodes.contains_key(&id))
    }

    fn node_by_path(&self, path: &str) -> Result<Option<NodeId>> {
        let mut current = self.root;
        for seg in path::segments(path) {
            let Some((name, index)) = path::parse_segment(seg) else {
                return Ok(None);
            };
            let Some(node) = self.nodes.get(&current) else {
                return Ok(None);
            };
            let next = node.children.iter()
                .filter(|c| self.nodes.get(*c).is_some_and(|n| n.name == name))
                .nth(index as usize - 1);
            match next {
                Some(id) => current = *id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn path_of(&self, id: NodeId) -> Result<Option<String>> {
        let mut segments = Vec::new();
        let mut current = match self.nodes.get(&id) {
            Some(node) => node,
            None => return Ok(None),
        };
        while let Some(parent) = current.parent {
            segments.push(path::segment(&current.name, current.index));
            current = self.nodes.get(&parent)
                .ok_or_else(|| Error::StorageError(format!("Dangling parent link {parent}")))?;
        }
        if segments.is_empty() {
            return Ok(Some(path::ROOT.to_string()));
        }
        segments.reverse();
        Ok(Some(format!("/{}", segments.join("/"))))
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.nodes.get(&id)
            .map(|n| n.children.clone())
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    fn node_types(&self) -> &NodeTypeRegistry {
        &self.types
    }

    fn add_node(&mut self, parent: NodeId, node: NewNode, position: Option<usize>) -> Result<NodeId> {
        self.insert_child(parent, node, position, false, 0)
    }

    fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(Error::StorageError("the root node cannot be removed".into()));
        }
        let node = self.nodes.get(&id)
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let parent = node.parent;
        let name = node.name.clone();

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&current) {
                pending.extend(removed.children);
            }
        }

        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
            self.reindex(parent, &name);
        }
        Ok(())
    }

    fn set_property(&mut self, id: NodeId, property: Property) -> Result<()> {
        if !names::is_legal_name(&property.name) {
            return Err(Error::StorageError(format!("Illegal property name '{}'", property.name)));
        }
        let node = self.node_mut(id)?;
        node.properties.insert(property.name.clone(), property);
        Ok(())
    }

    fn remove_property(&mut self, id: NodeId, name: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        Ok(node.properties.remove(name).is_some())
    }
}

// ============================================================================
// Tests
// ============================================================================
