//! Content node in the hierarchical tree.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use super::{names, Property, PropertyMap};

/// Stable node identity, unique within one repository instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Mint a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Mixin names applied to a node. Most nodes carry zero to two.
pub type Mixins = SmallVec<[String; 2]>;

/// How a node relates to canonical content.
///
/// Canonical nodes carry no projection. Virtual nodes are computed views
/// (search facets, mirrors) and are never exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// View of the canonical node with this identity.
    Of(NodeId),
    /// Computed node with no canonical counterpart.
    Detached,
}

/// Snapshot of a node as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: NodeId,
    pub name: String,
    pub primary_type: String,
    pub mixins: Mixins,
    pub properties: PropertyMap,
    /// Child identities in document order.
    pub children: Vec<NodeId>,
    /// `None` only for the tree root.
    pub parent: Option<NodeId>,
    /// 1-based same-name-sibling index; `None` when the node is the first
    /// (or only) child with its name.
    pub index: Option<u32>,
    /// Set on children auto-created by the node type system.
    pub protected: bool,
    pub projection: Option<Projection>,
}

impl ContentNode {
    pub fn new(id: NodeId, name: impl Into<String>, primary_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            primary_type: primary_type.into(),
            mixins: Mixins::new(),
            properties: PropertyMap::new(),
            children: Vec::new(),
            parent: None,
            index: None,
            protected: false,
            projection: None,
        }
    }

    pub fn with_mixin(mut self, mixin: impl Into<String>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    /// Identity of the canonical node this one stands for, if any.
    pub fn canonical_id(&self) -> Option<NodeId> {
        match self.projection {
            None => Some(self.id),
            Some(Projection::Of(id)) => Some(id),
            Some(Projection::Detached) => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.canonical_id() != Some(self.id)
    }

    pub fn has_mixin(&self, mixin: &str) -> bool {
        self.mixins.iter().any(|m| m == mixin)
    }

    /// Referenceable nodes export their identity.
    pub fn is_referenceable(&self) -> bool {
        self.has_mixin(names::MIX_REFERENCEABLE)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
