//! Canonical path rules and path ranges.
//!
//! Every path inside a file set is a canonicalized string key: a single
//! leading `/`, a trailing `/` only on directories, and no other leading or
//! trailing slashes. Compaction work is partitioned along this key space
//! using half-open [`PathRange`] intervals.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Returns true if the path denotes a directory (trailing slash).
#[must_use]
pub fn is_dir(path: &str) -> bool {
    path.ends_with('/')
}

/// Canonicalizes a path into the form used for tar header names.
///
/// Ensures a single leading `/` and, for directories, a trailing `/`.
/// Idempotent: applying it to its own output is a no-op.
#[must_use]
pub fn clean_tar_path(path: &str, dir: bool) -> String {
    let mut cleaned = format!("/{}", path.trim_matches('/'));
    if dir && !is_dir(&cleaned) {
        cleaned.push('/');
    }
    cleaned
}

/// Returns true exactly when `path` is already in canonical form.
///
/// Callers at the tar boundary must reject non-canonical names rather than
/// silently normalizing them.
#[must_use]
pub fn is_clean_tar_path(path: &str, dir: bool) -> bool {
    clean_tar_path(path, dir) == path
}

/// Returns the lexicographically-smallest string strictly greater than every
/// path nested under the directory `path`.
///
/// Used to bound range scans over a subtree. The trailing `/` is stripped and
/// replaced with `0`, the first character whose ordinal value exceeds `/` in
/// the path ordering.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if `path` is not a directory path.
pub fn dir_upper_bound(path: &str) -> Result<String> {
    if !is_dir(path) {
        return Err(Error::InvalidPath {
            message: format!("'{path}' is not a directory path"),
        });
    }
    Ok(format!("{}0", path.trim_end_matches('/')))
}

/// A half-open interval `[lower, upper)` over canonical paths.
///
/// `upper == None` means the range is unbounded above. The full path space
/// is `PathRange::all()`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathRange {
    /// Inclusive lower bound.
    pub lower: String,
    /// Exclusive upper bound; `None` for unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<String>,
}

impl PathRange {
    /// The range covering the entire path space.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates a bounded range `[lower, upper)`.
    #[must_use]
    pub fn new(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self {
            lower: lower.into(),
            upper: Some(upper.into()),
        }
    }

    /// Creates a range bounded below and unbounded above.
    #[must_use]
    pub fn from(lower: impl Into<String>) -> Self {
        Self {
            lower: lower.into(),
            upper: None,
        }
    }

    /// Returns true if the range covers the entire path space.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_empty() && self.upper.is_none()
    }

    /// Returns true if `path` falls within the range.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        path >= self.lower.as_str() && self.upper.as_deref().map_or(true, |u| path < u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clean_adds_leading_slash() {
        assert_eq!(clean_tar_path("a/b", false), "/a/b");
        assert_eq!(clean_tar_path("//a/b//", false), "/a/b");
    }

    #[test]
    fn clean_adds_trailing_slash_for_dirs() {
        assert_eq!(clean_tar_path("a", true), "/a/");
        assert_eq!(clean_tar_path("/a/", true), "/a/");
    }

    #[test]
    fn is_clean_true_exactly_on_fixed_points() {
        assert!(is_clean_tar_path("/a/b", false));
        assert!(is_clean_tar_path("/a/b/", true));
        assert!(!is_clean_tar_path("a/b", false));
        assert!(!is_clean_tar_path("/a/b", true));
        assert!(!is_clean_tar_path("/a/b//", true));
    }

    #[test]
    fn dir_upper_bound_sorts_after_subtree() {
        let upper = dir_upper_bound("/a/").expect("directory path");
        assert_eq!(upper, "/a0");
        assert!(upper.as_str() > "/a/");
        assert!(upper.as_str() > "/a/zzz");
        assert!(upper.as_str() > "/a//deep/nesting");
        // ...but before any sibling starting with a character above '/'.
        assert!(upper.as_str() <= "/a0");
        assert!(upper.as_str() < "/ab");
    }

    #[test]
    fn dir_upper_bound_rejects_files() {
        assert!(dir_upper_bound("/a").is_err());
    }

    #[test]
    fn range_contains_half_open() {
        let range = PathRange::new("/a", "/b");
        assert!(range.contains("/a"));
        assert!(range.contains("/a/zzz"));
        assert!(!range.contains("/b"));
        assert!(!range.contains("/c"));
    }

    #[test]
    fn unbounded_range_contains_everything() {
        let range = PathRange::all();
        assert!(range.is_unbounded());
        assert!(range.contains(""));
        assert!(range.contains("/zzz"));
    }

    proptest! {
        #[test]
        fn clean_tar_path_is_idempotent(path in "[a-z/]{0,16}", dir in any::<bool>()) {
            let once = clean_tar_path(&path, dir);
            let twice = clean_tar_path(&once, dir);
            prop_assert_eq!(&once, &twice);
            prop_assert!(is_clean_tar_path(&once, dir));
        }
    }
}
