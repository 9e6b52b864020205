//! The sorted index mapping paths to their data operations.
//!
//! An index is the metadata half of a file set: every canonical path maps to
//! the ordered data operations written against it. Indexes are persisted as
//! JSON blobs in the object store and are small relative to the chunk data
//! they reference.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use silt_core::chunk::DataOp;
use silt_core::path::PathRange;

/// A sorted map from canonical path to data operations.
///
/// Entries are always delivered in strictly increasing path order. A sealed
/// (post-compaction) index contains no duplicate paths; during a merge,
/// same-path operations from multiple sources are concatenated in source
/// order before insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    entries: BTreeMap<String, Vec<DataOp>>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paths in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a path's data operations.
    ///
    /// Returns the previous operations if the path was already present;
    /// sealed indexes never contain duplicates, so writers treat a
    /// `Some` return as an ordering bug.
    pub fn insert(&mut self, path: String, data_ops: Vec<DataOp>) -> Option<Vec<DataOp>> {
        self.entries.insert(path, data_ops)
    }

    /// Looks up the data operations for a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[DataOp]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Iterates all entries in increasing path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DataOp])> {
        self.entries
            .iter()
            .map(|(path, ops)| (path.as_str(), ops.as_slice()))
    }

    /// Iterates the entries whose paths fall within `range`, in increasing
    /// path order.
    pub fn range<'a>(
        &'a self,
        range: &'a PathRange,
    ) -> impl Iterator<Item = (&'a str, &'a [DataOp])> + 'a {
        let upper: Bound<&str> = match range.upper.as_deref() {
            Some(u) => Bound::Excluded(u),
            None => Bound::Unbounded,
        };
        self.entries
            .range::<str, _>((Bound::Included(range.lower.as_str()), upper))
            .map(|(path, ops)| (path.as_str(), ops.as_slice()))
    }

    /// The paths in the index, in increasing order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Splits a sorted path list into at most `max_shards` disjoint, ordered,
/// half-open ranges of roughly equal entry count.
///
/// The first range is lower-unbounded (`lower = ""`) and the last is
/// upper-unbounded, so together the shards cover the entire path space, not
/// only the observed paths. Returns a single full range when `paths` is
/// empty or `max_shards <= 1`.
#[must_use]
pub fn shard_path_space(paths: &[&str], max_shards: usize) -> Vec<PathRange> {
    if paths.is_empty() || max_shards <= 1 {
        return vec![PathRange::all()];
    }
    let shards = max_shards.min(paths.len());
    let per_shard = paths.len().div_ceil(shards);

    let mut ranges = Vec::with_capacity(shards);
    let mut lower = String::new();
    let mut cut = per_shard;
    while cut < paths.len() {
        let upper = paths[cut].to_string();
        // Duplicate boundaries would produce an empty range.
        if upper != lower {
            ranges.push(PathRange::new(lower.clone(), upper.clone()));
            lower = upper;
        }
        cut += per_shard;
    }
    ranges.push(PathRange {
        lower,
        upper: None,
    });
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_core::chunk::OpTag;

    fn op() -> DataOp {
        DataOp::new(OpTag::Content)
    }

    #[test]
    fn entries_iterate_in_path_order() {
        let mut index = Index::new();
        index.insert("/c".into(), vec![op()]);
        index.insert("/a".into(), vec![op()]);
        index.insert("/b".into(), vec![op()]);

        let paths: Vec<&str> = index.paths().collect();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn range_is_half_open() {
        let mut index = Index::new();
        for path in ["/a", "/b", "/c", "/d"] {
            index.insert(path.into(), vec![op()]);
        }

        let range = PathRange::new("/b", "/d");
        let in_range: Vec<&str> = index.range(&range).map(|(p, _)| p).collect();
        assert_eq!(in_range, vec!["/b", "/c"]);
    }

    #[test]
    fn unbounded_range_returns_everything() {
        let mut index = Index::new();
        index.insert("/a".into(), vec![op()]);
        index.insert("/b".into(), vec![op()]);

        assert_eq!(index.range(&PathRange::all()).count(), 2);
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut index = Index::new();
        assert!(index.insert("/a".into(), vec![op()]).is_none());
        assert!(index.insert("/a".into(), vec![op()]).is_some());
    }

    #[test]
    fn index_survives_serialization() {
        let mut index = Index::new();
        index.insert("/x".into(), vec![op()]);
        let json = serde_json::to_string(&index).expect("serializes");
        let back: Index = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(index, back);
    }

    #[test]
    fn shard_covers_whole_path_space() {
        let paths = ["/a", "/b", "/c", "/d", "/e"];
        let ranges = shard_path_space(&paths, 2);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].lower, "");
        assert!(ranges.last().unwrap().upper.is_none());
        // Adjacent ranges meet exactly.
        assert_eq!(ranges[0].upper.as_deref(), Some(ranges[1].lower.as_str()));
    }

    #[test]
    fn shard_degenerates_to_full_range() {
        assert_eq!(shard_path_space(&[], 4), vec![PathRange::all()]);
        assert_eq!(shard_path_space(&["/a"], 1), vec![PathRange::all()]);
    }

    #[test]
    fn shard_count_never_exceeds_bound() {
        let paths: Vec<String> = (0..100).map(|i| format!("/f{i:03}")).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        for bound in [1, 2, 3, 7, 50, 200] {
            let ranges = shard_path_space(&refs, bound);
            assert!(ranges.len() <= bound.max(1));
            // Every path lands in exactly one shard.
            for path in &refs {
                assert_eq!(ranges.iter().filter(|r| r.contains(path)).count(), 1);
            }
        }
    }
}
