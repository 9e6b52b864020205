//! File set persistence and the local range-restricted compaction routine.
//!
//! A file set is stored as two small blobs beside the chunk data it
//! references: the serialized index under `filesets/{id}/index` and
//! retention metadata under `filesets/{id}/meta`. File sets are immutable
//! once sealed; only the retention deadline can be extended.
//!
//! [`FilesetStorage::compact`] is the worker-side merge: a k-way merge over
//! the inputs' indexes limited to one path range, concatenating same-path
//! operations in input order. It performs no dispatch and no recursion -
//! the distributed compactor layers those on top.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use silt_core::chunk::ChunkStore;
use silt_core::id::FilesetId;
use silt_core::path::PathRange;
use silt_core::storage::{StorageBackend, WritePrecondition};

use crate::error::Result;
use crate::file::File;
use crate::fileset::{FileSet, IndexFileSet};
use crate::index::Index;
use crate::iterator::FileSetIterator;
use crate::writer::Writer;

pub(crate) fn index_key(id: FilesetId) -> String {
    format!("filesets/{id}/index")
}

pub(crate) fn meta_key(id: FilesetId) -> String {
    format!("filesets/{id}/meta")
}

/// Retention metadata stored beside a file set index.
///
/// A file set must be referenced (or its TTL extended) before the deadline
/// or it becomes eligible for garbage collection. Enforcement belongs to
/// the collector, which is outside this crate; this is bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesetMeta {
    /// When the file set was sealed.
    pub created_at: DateTime<Utc>,
    /// Retention deadline.
    pub expires_at: DateTime<Utc>,
}

impl FilesetMeta {
    /// Creates metadata with a deadline `ttl` from now.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        }
    }

    /// Returns true once the retention deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Storage for file sets over an object-store backend.
#[derive(Clone)]
pub struct FilesetStorage {
    backend: Arc<dyn StorageBackend>,
    chunks: ChunkStore,
}

impl FilesetStorage {
    /// Creates file set storage over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let chunks = ChunkStore::new(Arc::clone(&backend));
        Self { backend, chunks }
    }

    /// The chunk store backing this storage.
    #[must_use]
    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Opens a writer for a new file set with the given retention TTL.
    #[must_use]
    pub fn new_writer(&self, ttl: Duration) -> Writer {
        Writer::new(Arc::clone(&self.backend), self.chunks.clone(), ttl)
    }

    /// Opens a file set over its full path space.
    pub async fn open(&self, id: FilesetId) -> Result<IndexFileSet> {
        Ok(IndexFileSet::new(self.load_index(id).await?))
    }

    /// Opens a file set restricted to `range`.
    pub async fn open_range(&self, id: FilesetId, range: PathRange) -> Result<IndexFileSet> {
        Ok(IndexFileSet::with_range(self.load_index(id).await?, range))
    }

    async fn load_index(&self, id: FilesetId) -> Result<Index> {
        let bytes = match self.backend.get(&index_key(id)).await {
            Ok(bytes) => bytes,
            Err(silt_core::Error::NotFound(_)) => {
                return Err(silt_core::Error::resource_not_found("fileset", id).into());
            }
            Err(err) => return Err(err.into()),
        };
        let index = serde_json::from_slice(&bytes)
            .map_err(|e| silt_core::Error::serialization(format!("fileset index {id}: {e}")))?;
        Ok(index)
    }

    /// Reads a file set's retention metadata.
    pub async fn meta(&self, id: FilesetId) -> Result<FilesetMeta> {
        let bytes = match self.backend.get(&meta_key(id)).await {
            Ok(bytes) => bytes,
            Err(silt_core::Error::NotFound(_)) => {
                return Err(silt_core::Error::resource_not_found("fileset", id).into());
            }
            Err(err) => return Err(err.into()),
        };
        let meta = serde_json::from_slice(&bytes)
            .map_err(|e| silt_core::Error::serialization(format!("fileset meta {id}: {e}")))?;
        Ok(meta)
    }

    /// Extends a file set's retention deadline to at least `ttl` from now.
    ///
    /// The deadline never moves backwards.
    pub async fn set_ttl(&self, id: FilesetId, ttl: Duration) -> Result<()> {
        let mut meta = self.meta(id).await?;
        let candidate = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        if candidate > meta.expires_at {
            meta.expires_at = candidate;
        }
        let bytes = serde_json::to_vec(&meta)
            .map_err(|e| silt_core::Error::serialization(format!("fileset meta {id}: {e}")))?;
        self.backend
            .put(&meta_key(id), Bytes::from(bytes), WritePrecondition::None)
            .await?;
        Ok(())
    }

    /// Copies every file of `fileset` into `writer` by reference.
    pub async fn copy_files(
        &self,
        token: &CancellationToken,
        writer: &mut Writer,
        fileset: Arc<dyn FileSet>,
    ) -> Result<()> {
        let mut iter = FileSetIterator::new(token.clone(), fileset);
        while let Some(file) = iter.next().await? {
            writer.copy(&file)?;
        }
        Ok(())
    }

    /// Merges `inputs` restricted to `range` into one new file set.
    ///
    /// This is the purely local merge a dispatch worker executes: a k-way
    /// merge over the inputs' indexes in path order, with same-path data
    /// operations concatenated in input-list order. The output contains
    /// only paths within `range` and no duplicates.
    pub async fn compact(
        &self,
        token: &CancellationToken,
        inputs: &[FilesetId],
        ttl: Duration,
        range: &PathRange,
    ) -> Result<FilesetId> {
        let mut iters = Vec::with_capacity(inputs.len());
        for id in inputs {
            let fileset = self.open_range(*id, range.clone()).await?;
            iters.push(FileSetIterator::new(token.clone(), Arc::new(fileset)));
        }

        let mut writer = self.new_writer(ttl);
        loop {
            // The next output path is the minimum of the per-input heads.
            let mut next_path: Option<String> = None;
            for iter in &mut iters {
                if let Some(file) = iter.peek().await? {
                    let smaller = next_path
                        .as_deref()
                        .map_or(true, |current| file.path.as_str() < current);
                    if smaller {
                        next_path = Some(file.path.clone());
                    }
                }
            }
            let Some(path) = next_path else { break };

            let mut data_ops = Vec::new();
            for iter in &mut iters {
                let at_path = iter
                    .peek()
                    .await?
                    .map_or(false, |file| file.path == path);
                if at_path {
                    if let Some(file) = iter.next().await? {
                        data_ops.extend(file.data_ops);
                    }
                }
            }
            writer.copy(&File::new(path, data_ops))?;
        }

        let id = writer.close().await?;
        debug!(inputs = inputs.len(), output = %id, "compacted file sets");
        Ok(id)
    }

    /// Concatenates `ids` in the given order into one new file set.
    ///
    /// The inputs must cover disjoint, ascending path ranges; the
    /// concatenation is a pure reference copy. Path-order violations are
    /// caught by the writer.
    pub async fn concat(
        &self,
        token: &CancellationToken,
        ids: &[FilesetId],
        ttl: Duration,
    ) -> Result<FilesetId> {
        let mut writer = self.new_writer(ttl);
        for id in ids {
            let fileset = self.open(*id).await?;
            self.copy_files(token, &mut writer, Arc::new(fileset)).await?;
        }
        writer.close().await
    }

    /// Collects the distinct paths across `inputs` that fall within
    /// `range`, in increasing order.
    ///
    /// Used by the distributed compactor to choose shard boundaries.
    pub async fn combined_paths(
        &self,
        inputs: &[FilesetId],
        range: &PathRange,
    ) -> Result<Vec<String>> {
        let mut paths = BTreeSet::new();
        for id in inputs {
            let index = self.load_index(*id).await?;
            for (path, _) in index.range(range) {
                paths.insert(path.to_string());
            }
        }
        Ok(paths.into_iter().collect())
    }
}
