//! Node type definitions.
//!
//! The transfer engine needs three things from the type system: whether a
//! type allows same-name children, which protected children a type
//! auto-creates, and subtype checks ("does the existing node already
//! satisfy the incoming type").

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use super::names;

/// A child node the type system creates together with its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDefinition {
    pub name: String,
    pub primary_type: String,
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDef {
    pub name: String,
    pub supertypes: Vec<String>,
    /// Children of nodes of this type may share a name.
    pub same_name_siblings: bool,
    pub auto_created: Vec<ChildDefinition>,
}

impl NodeTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: vec![names::NT_BASE.to_string()],
            same_name_siblings: false,
            auto_created: Vec::new(),
        }
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn allowing_same_name_siblings(mut self) -> Self {
        self.same_name_siblings = true;
        self
    }

    /// Declare a protected child created with every node of this type.
    pub fn with_auto_created(mut self, name: impl Into<String>, primary_type: impl Into<String>) -> Self {
        self.auto_created.push(ChildDefinition {
            name: name.into(),
            primary_type: primary_type.into(),
            protected: true,
        });
        self
    }
}

/// Registry of known node types. Unknown types behave like `nt:base`.
#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    types: HashMap<String, NodeTypeDef>,
}

impl NodeTypeRegistry {
    pub fn empty() -> Self {
        Self { types: HashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(NodeTypeDef {
            name: names::NT_BASE.to_string(),
            supertypes: Vec::new(),
            same_name_siblings: false,
            auto_created: Vec::new(),
        });
        registry.register(
            NodeTypeDef::new(names::NT_UNSTRUCTURED).allowing_same_name_siblings(),
        );
        registry.register(NodeTypeDef::new(names::NT_FOLDER));
        registry.register(NodeTypeDef::new(names::REP_ROOT).with_supertype(names::NT_UNSTRUCTURED));
        registry
    }

    pub fn register(&mut self, def: NodeTypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&NodeTypeDef> {
        self.types.get(name)
    }

    /// True when `type_name` is `required` or inherits from it.
    pub fn is_node_type(&self, type_name: &str, required: &str) -> bool {
        if type_name == required || required == names::NT_BASE {
            return true;
        }
        let mut seen = HashSet::new();
        let mut pending = vec![type_name];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(def) = self.types.get(current) {
                for supertype in &def.supertypes {
                    if supertype == required {
                        return true;
                    }
                    pending.push(supertype);
                }
            }
        }
        false
    }

    pub fn allows_same_name_siblings(&self, type_name: &str) -> bool {
        self.types.get(type_name).is_some_and(|t| t.same_name_siblings)
    }

    pub fn auto_created(&self, type_name: &str) -> &[ChildDefinition] {
        self.types
            .get(type_name)
            .map(|t| t.auto_created.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
