//! Well-known node type, mixin and property names.

pub const NT_BASE: &str = "nt:base";
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";
pub const NT_FOLDER: &str = "nt:folder";
pub const REP_ROOT: &str = "rep:root";

pub const MIX_REFERENCEABLE: &str = "mix:referenceable";
pub const MIX_VERSIONABLE: &str = "mix:versionable";
pub const MIX_LOCKABLE: &str = "mix:lockable";

/// Reserved carrier for path-encoded references in a serialized stream.
pub const PATH_REFERENCE: &str = "sys:pathreference";

// Derived caches, recomputed by the repository.
pub const SYS_PATHS: &str = "sys:paths";
pub const SYS_RELATED: &str = "sys:related";

/// Result count on faceted search nodes.
pub const SYS_COUNT: &str = "sys:count";

pub const JCR_VERSION_HISTORY: &str = "jcr:versionHistory";
pub const JCR_BASE_VERSION: &str = "jcr:baseVersion";
pub const JCR_PREDECESSORS: &str = "jcr:predecessors";
pub const JCR_MERGE_FAILED: &str = "jcr:mergeFailed";
pub const JCR_IS_CHECKED_OUT: &str = "jcr:isCheckedOut";

pub const JCR_LOCK_OWNER: &str = "jcr:lockOwner";
pub const JCR_LOCK_IS_DEEP: &str = "jcr:lockIsDeep";

/// Properties never carried across an export.
pub const EXCLUDED_PROPERTIES: &[&str] = &[
    SYS_PATHS,
    SYS_RELATED,
    SYS_COUNT,
    JCR_VERSION_HISTORY,
    JCR_BASE_VERSION,
    JCR_PREDECESSORS,
    JCR_MERGE_FAILED,
    JCR_IS_CHECKED_OUT,
    JCR_LOCK_OWNER,
    JCR_LOCK_IS_DEEP,
];

/// Separator between segments of an encoded reference. Illegal in names.
pub const REFERENCE_SEPARATOR: char = '*';

/// Characters a property or node name may not contain.
pub const ILLEGAL_NAME_CHARS: &[char] = &['/', '[', ']', '|', '*'];

pub fn is_legal_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(ILLEGAL_NAME_CHARS)
}
