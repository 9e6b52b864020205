//! Lazy, visitor-driven iteration over a file set.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use silt_core::Error as CoreError;
use silt_core::path::PathRange;

use crate::error::Result;
use crate::file::File;
use crate::index::Index;

/// The visitor callback invoked once per file, in path order.
///
/// Boxed-future form so visitors can await (e.g. hand the file to a
/// channel); iteration stops at the first error the visitor returns.
pub type Visit<'a> = &'a mut (dyn FnMut(File) -> BoxFuture<'static, Result<()>> + Send);

/// A finite, ordered, lazily-produced sequence of files keyed by path.
///
/// Iteration is a single pass and is not restartable: issue a fresh
/// `iterate` call to read again. Within one file set, paths are strictly
/// increasing.
#[async_trait]
pub trait FileSet: Send + Sync {
    /// Visits every file in path order.
    ///
    /// Fails fast: a visitor error stops iteration and propagates.
    /// Cancellation is observed between files and surfaces as
    /// [`silt_core::Error::Canceled`].
    async fn iterate(&self, token: &CancellationToken, visit: Visit<'_>) -> Result<()>;
}

/// A file set backed by an in-memory index, optionally range-restricted.
#[derive(Debug, Clone)]
pub struct IndexFileSet {
    index: Index,
    range: PathRange,
}

impl IndexFileSet {
    /// Creates a file set over the full path space of `index`.
    #[must_use]
    pub fn new(index: Index) -> Self {
        Self {
            index,
            range: PathRange::all(),
        }
    }

    /// Creates a file set restricted to `range`.
    #[must_use]
    pub fn with_range(index: Index, range: PathRange) -> Self {
        Self { index, range }
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// The restriction applied to iteration.
    #[must_use]
    pub fn range(&self) -> &PathRange {
        &self.range
    }
}

#[async_trait]
impl FileSet for IndexFileSet {
    async fn iterate(&self, token: &CancellationToken, visit: Visit<'_>) -> Result<()> {
        for (path, ops) in self.index.range(&self.range) {
            if token.is_cancelled() {
                return Err(CoreError::Canceled("file set iteration".into()).into());
            }
            visit(File::new(path, ops.to_vec())).await?;
        }
        Ok(())
    }
}

/// Collects every file of a file set into a vector.
///
/// Convenience for tests and small file sets; production paths stream
/// through [`FileSet::iterate`] or [`crate::FileSetIterator`] instead.
pub async fn collect_files(fileset: &dyn FileSet, token: &CancellationToken) -> Result<Vec<File>> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut visit = move |file: File| -> BoxFuture<'static, Result<()>> {
        let tx = tx.clone();
        Box::pin(async move {
            tx.send(file)
                .map_err(|_| CoreError::Internal {
                    message: "collect channel closed".into(),
                })?;
            Ok(())
        })
    };
    fileset.iterate(token, &mut visit).await?;
    let mut files = Vec::new();
    while let Ok(file) = rx.try_recv() {
        files.push(file);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use silt_core::chunk::{DataOp, OpTag};

    fn index_of(paths: &[&str]) -> Index {
        let mut index = Index::new();
        for path in paths {
            index.insert((*path).into(), vec![DataOp::new(OpTag::Header)]);
        }
        index
    }

    #[tokio::test]
    async fn iterate_visits_in_path_order() {
        let fs = IndexFileSet::new(index_of(&["/c", "/a", "/b"]));
        let files = collect_files(&fs, &CancellationToken::new()).await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
    }

    #[tokio::test]
    async fn iterate_twice_is_deterministic() {
        let fs = IndexFileSet::new(index_of(&["/a", "/b"]));
        let token = CancellationToken::new();
        let first = collect_files(&fs, &token).await.unwrap();
        let second = collect_files(&fs, &token).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn range_restriction_applies() {
        let fs = IndexFileSet::with_range(
            index_of(&["/a", "/b", "/c"]),
            PathRange::new("/b", "/c"),
        );
        let files = collect_files(&fs, &CancellationToken::new()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "/b");
    }

    #[tokio::test]
    async fn visitor_error_stops_iteration() {
        let fs = IndexFileSet::new(index_of(&["/a", "/b", "/c"]));
        let mut seen = 0_usize;
        let seen_ref = &mut seen;
        let mut count = 0_usize;
        let mut visit = move |_file: File| -> BoxFuture<'static, Result<()>> {
            count += 1;
            let fail = count >= 2;
            *seen_ref = count;
            Box::pin(async move {
                if fail {
                    Err(CoreError::InvalidInput("boom".into()).into())
                } else {
                    Ok(())
                }
            })
        };
        let err = fs
            .iterate(&CancellationToken::new(), &mut visit)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Core(CoreError::InvalidInput(_))));
        assert_eq!(seen, 2, "iteration must stop at the failing visitor");
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_canceled() {
        let fs = IndexFileSet::new(index_of(&["/a"]));
        let token = CancellationToken::new();
        token.cancel();
        let err = collect_files(&fs, &token).await.unwrap_err();
        assert!(err.is_canceled());
    }
}
