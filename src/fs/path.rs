//! Path helpers
//!
//! Paths in this crate are absolute, '/'-separated and normalized: no
//! empty, "." or ".." components and no trailing slash (except the root).

use globset::{GlobBuilder, GlobMatcher};

use super::errors::{FsError, FsResult};

/// Normalize a path: collapse separators and resolve "." and ".."
///
/// ".." never climbs above the root. Leading slashes are preserved, so
/// relative input stays relative.
pub fn normpath(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Normalize a path and make it absolute
pub fn abspath(path: &str) -> String {
    let normalized = normpath(path);
    if normalized.starts_with('/') {
        normalized
    } else {
        format!("/{}", normalized)
    }
}

/// Split a normalized path into (parent, basename)
///
/// The root splits into ("/", "").
pub fn pathsplit(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Last component of a normalized path
pub fn basename(path: &str) -> &str {
    pathsplit(path).1
}

/// Parent of a normalized path
pub fn dirname(path: &str) -> &str {
    pathsplit(path).0
}

/// Join a name onto a directory path
pub fn pathjoin(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Path of `path` relative to the root
pub fn relpath(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Whether `path` lies strictly below `dir`
pub fn is_descendant(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return path.len() > 1 && path.starts_with('/');
    }
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Compile an fnmatch-style wildcard matched against member names
///
/// Supports `*`, `?`, `[seq]` and `[!seq]`; `*` never crosses a `/`.
pub fn compile_wildcard(pattern: &str) -> FsResult<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| FsError::InvalidWildcard {
            pattern: pattern.to_string(),
            source,
        })?;
    Ok(glob.compile_matcher())
}
