//! Dot-separated path handling

use crate::error::TreeError;

pub const SEPARATOR: char = '.';

/// Check that a child name can be addressed by a path
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name.contains(SEPARATOR) {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Split a path into its segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).collect()
}

/// Split a path into (parent path, terminal name)
pub fn split_last(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once(SEPARATOR) {
        Some((parent, name)) => (Some(parent), name),
        None => (None, path),
    }
}

/// Qualify `name` with `prefix` (an empty prefix leaves the name as is)
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        let mut joined = String::with_capacity(prefix.len() + name.len() + 1);
        joined.push_str(prefix);
        joined.push(SEPARATOR);
        joined.push_str(name);
        joined
    }
}

/// True when `path` is `scope` itself or lies below it
pub fn is_within(path: &str, scope: &str) -> bool {
    path == scope
        || (path.len() > scope.len()
            && path.starts_with(scope)
            && path[scope.len()..].starts_with(SEPARATOR))
}
