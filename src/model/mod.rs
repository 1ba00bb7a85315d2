//! # Content Model
//!
//! Plain data types shared by the store and the transfer engine:
//! nodes, properties, values, paths and node types.
//!
//! Design rule: no storage handles and no I/O here. Everything in this
//! module can be cloned, compared and serialized.

pub mod node;
pub mod value;
pub mod property_map;
pub mod path;
pub mod node_type;
pub mod names;

pub use node::{ContentNode, Mixins, NodeId, Projection};
pub use value::{PropertyType, Value};
pub use property_map::{Property, PropertyMap, PropertyValues};
pub use node_type::{ChildDefinition, NodeTypeDef, NodeTypeRegistry};
