//! Conflict resolution for imports.
//!
//! Two independent axes, evaluated name first, identity second:
//!
//! | Axis | Trigger | Policy |
//! |------|---------|--------|
//! | Name | parent already has a child with the incoming name | [`NamePolicy`] |
//! | Identity | incoming identity exists anywhere in the tree | [`IdentityPolicy`] |
//!
//! Everything here is pure: the importer describes the conflict, the
//! resolver returns a [`ConflictDecision`], the importer acts on it.

use serde::{Deserialize, Serialize};

use crate::model::NodeId;

/// What to do when an incoming identity already exists in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IdentityPolicy {
    /// Ignore the incoming identity and mint a new one.
    #[default]
    CreateNew,
    /// Abort the import.
    Throw,
    /// Delete the conflicting node, then create the incoming node with the
    /// original identity at the current position in the stream.
    RemoveExisting,
    /// Replace the conflicting node in place, under its own parent.
    ReplaceExisting,
}

/// What to do when the parent already has a child with the incoming name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NamePolicy {
    /// Keep the existing child; skip the incoming subtree.
    Skip,
    /// Abort the import.
    Throw,
    /// Delete the existing child and create the incoming one.
    Overwrite,
    /// Add a same-name sibling where allowed, otherwise skip.
    #[default]
    AddOrSkip,
    /// Add a same-name sibling where allowed, otherwise overwrite.
    AddOrOverwrite,
}

/// Outcome of a conflict check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Create the incoming node (for the identity axis: with a fresh identity).
    CreateNew,
    /// Remove this node and create the incoming one in its slot.
    ReplaceExisting(NodeId),
    /// Remove this node and create the incoming one at the current parent.
    RemoveExisting(NodeId),
    /// The existing node already satisfies the incoming one; reuse it.
    KeepExisting(NodeId),
    /// Do not create the incoming node nor any of its descendants.
    SkipSubtree,
    /// Abort the import.
    Throw(String),
}

/// An existing sibling occupying the incoming node's name.
#[derive(Debug, Clone, Copy)]
pub struct NameConflict<'a> {
    pub name: &'a str,
    pub existing: NodeId,
    /// Existing child was auto-created by the type system.
    pub protected: bool,
    /// Existing child's type is, or inherits from, the incoming type.
    pub satisfies_type: bool,
    /// Parent's type allows several children with one name.
    pub same_name_siblings: bool,
}

/// A node elsewhere in the tree carrying the incoming identity.
#[derive(Debug, Clone, Copy)]
pub struct IdentityConflict {
    pub identity: NodeId,
    pub existing: NodeId,
    pub is_root: bool,
    /// Existing node is the import target, the current parent, or one of
    /// their ancestors. Removing it would delete the destination.
    pub encloses_target: bool,
}

/// Decide a name collision.
///
/// An existing protected child that already satisfies the incoming type
/// is kept whatever the policy says.
pub fn resolve_name(policy: NamePolicy, conflict: &NameConflict<'_>) -> ConflictDecision {
    if conflict.protected && conflict.satisfies_type {
        return ConflictDecision::KeepExisting(conflict.existing);
    }
    match policy {
        NamePolicy::Skip => ConflictDecision::SkipSubtree,
        NamePolicy::Throw => ConflictDecision::Throw(format!(
            "a node named '{}' already exists ({})",
            conflict.name, conflict.existing
        )),
        NamePolicy::Overwrite => ConflictDecision::ReplaceExisting(conflict.existing),
        NamePolicy::AddOrSkip if conflict.same_name_siblings => ConflictDecision::CreateNew,
        NamePolicy::AddOrSkip => ConflictDecision::SkipSubtree,
        NamePolicy::AddOrOverwrite if conflict.same_name_siblings => ConflictDecision::CreateNew,
        NamePolicy::AddOrOverwrite => ConflictDecision::ReplaceExisting(conflict.existing),
    }
}

/// Decide an identity collision.
pub fn resolve_identity(policy: IdentityPolicy, conflict: &IdentityConflict) -> ConflictDecision {
    match policy {
        IdentityPolicy::CreateNew => ConflictDecision::CreateNew,
        IdentityPolicy::Throw => ConflictDecision::Throw(format!(
            "identity {} already exists in the destination tree",
            conflict.identity
        )),
        IdentityPolicy::RemoveExisting if conflict.encloses_target => ConflictDecision::Throw(format!(
            "node {} holding identity {} encloses the import target and cannot be removed",
            conflict.existing, conflict.identity
        )),
        IdentityPolicy::RemoveExisting => ConflictDecision::RemoveExisting(conflict.existing),
        IdentityPolicy::ReplaceExisting if conflict.is_root => ConflictDecision::Throw(format!(
            "identity {} belongs to the root node, which cannot be replaced",
            conflict.identity
        )),
        IdentityPolicy::ReplaceExisting if conflict.encloses_target => ConflictDecision::Throw(format!(
            "node {} holding identity {} encloses the import target and cannot be replaced",
            conflict.existing, conflict.identity
        )),
        IdentityPolicy::ReplaceExisting => ConflictDecision::ReplaceExisting(conflict.existing),
    }
}
