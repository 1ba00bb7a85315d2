//! Repository paths: `/a/b[2]/c`.
//!
//! Segments carry an optional 1-based same-name-sibling index. A segment
//! without an index addresses the first sibling with that name.

/// Path of the tree root.
pub const ROOT: &str = "/";

/// Relative path denoting the base node itself.
pub const SELF: &str = ".";

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Render a segment for `name` at same-name-sibling `index`.
pub fn segment(name: &str, index: Option<u32>) -> String {
    match index {
        Some(i) if i > 1 => format!("{name}[{i}]"),
        _ => name.to_string(),
    }
}

/// Split a segment into name and 1-based index. `None` for a malformed index.
pub fn parse_segment(segment: &str) -> Option<(&str, u32)> {
    match segment.strip_suffix(']') {
        None => Some((segment, 1)),
        Some(rest) => {
            let open = rest.rfind('[')?;
            let index: u32 = rest[open + 1..].parse().ok()?;
            if index == 0 {
                return None;
            }
            Some((&rest[..open], index))
        }
    }
}

/// Append a segment to a parent path.
pub fn join(parent: &str, segment: &str) -> String {
    if parent == ROOT || parent.is_empty() {
        format!("/{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}

/// Express `path` relative to `base` when it lies at or below it.
///
/// Paths outside `base`, and paths that are already relative, are
/// returned unchanged.
pub fn relativize(base: &str, path: &str) -> String {
    if !is_absolute(path) || !is_absolute(base) {
        return path.to_string();
    }
    if path == base {
        return SELF.to_string();
    }
    if base == ROOT {
        return path[1..].to_string();
    }
    match path.strip_prefix(base) {
        Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
        _ => path.to_string(),
    }
}

/// True when `ancestor` is `path` or one of its ancestors.
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    if ancestor == ROOT {
        return is_absolute(path);
    }
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}
