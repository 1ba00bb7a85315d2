//! # Content Store Trait
//!
//! The contract between the transfer engine and whatever holds the tree.
//! It is deliberately narrow: lookup by identity and by path, child
//! enumeration, node creation/removal/replacement and property set/remove.
//! The engine assumes nothing richer.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory tree for testing/embedding |

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStore;

// ============================================================================
// Node creation request
// ============================================================================

/// Everything needed to create a node under a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    pub primary_type: String,
    pub mixins: Mixins,
    /// Identity to create the node with. `None` lets the store mint one.
    pub identity: Option<NodeId>,
}

impl NewNode {
    pub fn new(name: impl Into<String>, primary_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_type: primary_type.into(),
            mixins: Mixins::new(),
            identity: None,
        }
    }

    pub fn with_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    pub fn with_identity(mut self, id: NodeId) -> Self {
        self.identity = Some(id);
        self
    }

    /// Shorthand for a referenceable node.
    pub fn referenceable(self) -> Self {
        self.with_mixin(names::MIX_REFERENCEABLE)
    }
}

// ============================================================================
// ContentStore Trait
// ============================================================================

/// Tree storage contract.
///
/// Reads take `&self`; mutations take `&mut self`, so a caller holding a
/// `&mut` store has exclusive ownership of the tree for the duration.
pub trait ContentStore {
    // ========================================================================
    // Lookup
    // ========================================================================

    /// Identity of the tree root.
    fn root_id(&self) -> NodeId;

    /// Snapshot of a node. Returns None if not found.
    fn node(&self, id: NodeId) -> Result<Option<ContentNode>>;

    /// Resolve an absolute path to a node identity.
    fn node_by_path(&self, path: &str) -> Result<Option<NodeId>>;

    /// Absolute path of a node, or None if it does not exist.
    fn path_of(&self, id: NodeId) -> Result<Option<String>>;

    /// Children of a node in document order.
    fn children(&self, id: NodeId) -> Result<Vec<NodeId>>;

    /// Type system used to validate and auto-create nodes.
    fn node_types(&self) -> &NodeTypeRegistry;

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a node under `parent`, at `position` among its children or
    /// last when None. Auto-created children of the new node's type are
    /// created with it.
    fn add_node(&mut self, parent: NodeId, node: NewNode, position: Option<usize>) -> Result<NodeId>;

    /// Remove a node and its whole subtree.
    fn remove_node(&mut self, id: NodeId) -> Result<()>;

    /// Set a property (upsert).
    fn set_property(&mut self, id: NodeId, property: Property) -> Result<()>;

    /// Remove a property. Returns true if it existed.
    fn remove_property(&mut self, id: NodeId, name: &str) -> Result<bool>;

    // ========================================================================
    // Provided
    // ========================================================================

    fn contains(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.is_some())
    }

    fn property(&self, id: NodeId, name: &str) -> Result<Option<Property>> {
        Ok(self.node(id)?.and_then(|n| n.properties.get(name).cloned()))
    }

    /// First child of `parent` named `name`.
    fn child_named(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>> {
        for child in self.children(parent)? {
            if let Some(node) = self.node(child)? {
                if node.name == name {
                    return Ok(Some(child));
                }
            }
        }
        Ok(None)
    }

    /// Parent identity and position among its siblings. None for the root.
    fn position_of(&self, id: NodeId) -> Result<Option<(NodeId, usize)>> {
        let node = self.node(id)?
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let Some(parent) = node.parent else {
            return Ok(None);
        };
        let position = self.children(parent)?
            .iter()
            .position(|c| *c == id)
            .ok_or_else(|| Error::StorageError(format!("Node {id} missing from its parent {parent}")))?;
        Ok(Some((parent, position)))
    }

    /// True when `ancestor` is `id` or lies on its parent chain.
    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> Result<bool> {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return Ok(true);
            }
            current = self.node(cur)?.and_then(|n| n.parent);
        }
        Ok(false)
    }

    /// Replace `existing` with a new node at the same position under the
    /// same parent. The root cannot be replaced.
    fn replace_node(&mut self, existing: NodeId, node: NewNode) -> Result<NodeId> {
        let (parent, position) = self.position_of(existing)?
            .ok_or_else(|| Error::StorageError("the root node cannot be replaced".into()))?;
        self.remove_node(existing)?;
        self.add_node(parent, node, Some(position))
    }

    /// Convenience: append a child with a fresh identity.
    fn add_child(&mut self, parent: NodeId, name: &str, primary_type: &str) -> Result<NodeId> {
        self.add_node(parent, NewNode::new(name, primary_type), None)
    }
}
