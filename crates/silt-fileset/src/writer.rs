//! Building new file sets.
//!
//! [`Writer`] accumulates path-ordered entries and seals them into a new,
//! immutable file set. [`Writer::copy`] appends an existing file's data
//! operations verbatim - a pure reference copy that never touches chunk
//! bytes, which is what makes fan-in concatenation of disjoint-range
//! partial results cheap.
//!
//! [`FileWriter`] is the ingest-side single-file writer: fresh bytes are
//! buffered and flushed to the chunk store, while structurally copied
//! operations pass through untouched.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use silt_core::chunk::{ChunkStore, DataOp, DataRef, OpTag};
use silt_core::id::FilesetId;
use silt_core::storage::{StorageBackend, WritePrecondition};

use crate::error::{Error, Result};
use crate::file::File;
use crate::index::Index;
use crate::storage::{FilesetMeta, index_key, meta_key};

/// Maximum bytes buffered before a chunk is cut.
const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Builds a new file set from path-ordered entries.
pub struct Writer {
    backend: Arc<dyn StorageBackend>,
    chunks: ChunkStore,
    ttl: Duration,
    id: FilesetId,
    index: Index,
    last_path: Option<String>,
}

impl Writer {
    pub(crate) fn new(backend: Arc<dyn StorageBackend>, chunks: ChunkStore, ttl: Duration) -> Self {
        Self {
            backend,
            chunks,
            ttl,
            id: FilesetId::generate(),
            index: Index::new(),
            last_path: None,
        }
    }

    /// The ID the sealed file set will carry.
    #[must_use]
    pub fn id(&self) -> FilesetId {
        self.id
    }

    /// The entries accumulated so far.
    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Appends a file's data operations verbatim.
    ///
    /// No chunk I/O happens here; the output references the same chunk
    /// ranges as the input.
    pub fn copy(&mut self, file: &File) -> Result<()> {
        self.push_entry(file.path.clone(), file.data_ops.clone())
    }

    /// Opens a [`FileWriter`] for a new file at `path`.
    ///
    /// Files must be created in strictly increasing path order; the entry
    /// is recorded when the file writer is closed.
    pub fn create(&mut self, path: impl Into<String>) -> FileWriter<'_> {
        FileWriter {
            chunks: self.chunks.clone(),
            writer: self,
            path: path.into(),
            ops: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn push_entry(&mut self, path: String, ops: Vec<DataOp>) -> Result<()> {
        if let Some(previous) = &self.last_path {
            if path.as_str() <= previous.as_str() {
                return Err(Error::PathOrder {
                    path,
                    previous: previous.clone(),
                });
            }
        }
        self.index.insert(path.clone(), ops);
        self.last_path = Some(path);
        Ok(())
    }

    /// Seals the file set: persists the index and retention metadata,
    /// returning the new file set ID.
    pub async fn close(self) -> Result<FilesetId> {
        let index_bytes = serde_json::to_vec(&self.index)
            .map_err(|e| silt_core::Error::serialization(format!("fileset index: {e}")))?;
        let meta = FilesetMeta::new(self.ttl);
        let meta_bytes = serde_json::to_vec(&meta)
            .map_err(|e| silt_core::Error::serialization(format!("fileset meta: {e}")))?;

        // The ID is freshly minted, so neither write can race.
        self.backend
            .put(
                &index_key(self.id),
                Bytes::from(index_bytes),
                WritePrecondition::DoesNotExist,
            )
            .await?;
        self.backend
            .put(
                &meta_key(self.id),
                Bytes::from(meta_bytes),
                WritePrecondition::DoesNotExist,
            )
            .await?;
        Ok(self.id)
    }
}

/// Writes one file's data operations, chunking fresh bytes as they arrive.
pub struct FileWriter<'w> {
    writer: &'w mut Writer,
    chunks: ChunkStore,
    path: String,
    ops: Vec<DataOp>,
    pending: Vec<u8>,
}

impl FileWriter<'_> {
    /// The path being written.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Starts a new data operation with the given tag.
    ///
    /// Pending bytes are flushed into the previous operation first.
    pub async fn append(&mut self, tag: OpTag) -> Result<()> {
        self.flush_pending().await?;
        self.ops.push(DataOp::new(tag));
        Ok(())
    }

    /// Accepts fresh content bytes for the current operation.
    ///
    /// Bytes are buffered and cut into chunks of at most `MAX_CHUNK_SIZE`.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= MAX_CHUNK_SIZE {
            let rest = self.pending.split_off(MAX_CHUNK_SIZE);
            let full = std::mem::replace(&mut self.pending, rest);
            self.cut_chunk(full).await?;
        }
        Ok(())
    }

    /// Appends existing data operations structurally: a reference copy with
    /// no chunk reads or writes.
    pub async fn copy(&mut self, ops: &[DataOp]) -> Result<()> {
        self.flush_pending().await?;
        self.ops.extend_from_slice(ops);
        Ok(())
    }

    /// Finishes the file, recording its entry in the parent writer.
    pub async fn close(mut self) -> Result<()> {
        self.flush_pending().await?;
        let ops = std::mem::take(&mut self.ops);
        let path = std::mem::take(&mut self.path);
        self.writer.push_entry(path, ops)
    }

    async fn flush_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.pending);
        self.cut_chunk(buf).await
    }

    async fn cut_chunk(&mut self, buf: Vec<u8>) -> Result<()> {
        let data_ref: DataRef = self.chunks.put(Bytes::from(buf)).await?;
        if self.ops.is_empty() {
            // Bytes written before any explicit append are content.
            self.ops.push(DataOp::new(OpTag::Content));
        }
        if let Some(op) = self.ops.last_mut() {
            op.data_refs.push(data_ref);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_core::storage::MemoryBackend;

    fn writer() -> Writer {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let chunks = ChunkStore::new(Arc::clone(&backend));
        Writer::new(backend, chunks, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn copy_preserves_ops_verbatim() {
        let mut w = writer();
        let file = File::new("/a", vec![DataOp::new(OpTag::Header)]);
        w.copy(&file).unwrap();
        assert_eq!(w.index.get("/a").unwrap(), file.data_ops.as_slice());
    }

    #[tokio::test]
    async fn out_of_order_paths_are_rejected() {
        let mut w = writer();
        w.copy(&File::new("/b", vec![])).unwrap();
        let err = w.copy(&File::new("/a", vec![])).unwrap_err();
        assert!(matches!(err, Error::PathOrder { .. }));
        // Duplicate paths are equally out of order.
        let err = w.copy(&File::new("/b", vec![])).unwrap_err();
        assert!(matches!(err, Error::PathOrder { .. }));
    }

    #[tokio::test]
    async fn file_writer_tags_ops_in_order() {
        let mut w = writer();
        let mut fw = w.create("/f");
        fw.append(OpTag::Header).await.unwrap();
        fw.write(b"header bytes").await.unwrap();
        fw.append(OpTag::Content).await.unwrap();
        fw.write(b"content bytes").await.unwrap();
        fw.append(OpTag::Padding).await.unwrap();
        fw.write(b"\0\0\0").await.unwrap();
        fw.close().await.unwrap();

        let ops = w.index.get("/f").unwrap();
        let tags: Vec<OpTag> = ops.iter().map(|op| op.tag).collect();
        assert_eq!(tags, vec![OpTag::Header, OpTag::Content, OpTag::Padding]);
        assert_eq!(ops[1].size_bytes(), 13);
    }

    #[tokio::test]
    async fn structural_copy_does_not_rechunk() {
        let mut w = writer();
        let existing = DataOp {
            tag: OpTag::Content,
            data_refs: vec![DataRef {
                chunk_id: silt_core::ChunkId::of(b"elsewhere"),
                offset: 0,
                size_bytes: 9,
            }],
        };
        let mut fw = w.create("/f");
        fw.append(OpTag::Header).await.unwrap();
        fw.write(b"hdr").await.unwrap();
        fw.copy(std::slice::from_ref(&existing)).await.unwrap();
        fw.close().await.unwrap();

        let ops = w.index.get("/f").unwrap();
        assert_eq!(&ops[1], &existing);
    }

    #[tokio::test]
    async fn close_persists_index_and_meta() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let chunks = ChunkStore::new(Arc::clone(&backend));
        let mut w = Writer::new(Arc::clone(&backend), chunks, Duration::from_secs(60));
        w.copy(&File::new("/a", vec![DataOp::new(OpTag::Header)]))
            .unwrap();
        let id = w.close().await.unwrap();

        assert!(backend.head(&index_key(id)).await.unwrap().is_some());
        assert!(backend.head(&meta_key(id)).await.unwrap().is_some());
    }
}
