//! The content model: chunks, data references, and tagged data operations.
//!
//! A **chunk** is an immutable, content-addressed byte blob. A [`DataRef`]
//! points at a contiguous byte range inside a chunk without ever copying the
//! bytes; a [`DataOp`] groups an ordered sequence of refs under a semantic
//! tag. Concatenating refs from different file sets is the mechanism for
//! zero-copy merge: compaction moves references, never bytes.
//!
//! Chunks are never rewritten in place. New data produces new chunks;
//! unreferenced chunks are reclaimed by garbage collection elsewhere.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::ChunkId;
use crate::storage::{StorageBackend, WritePrecondition};

/// Key prefix for chunk blobs in the object store.
const CHUNK_PREFIX: &str = "chunks";

/// A reference to a contiguous byte range inside a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    /// The chunk holding the bytes.
    pub chunk_id: ChunkId,
    /// Byte offset of the range within the chunk.
    pub offset: u64,
    /// Length of the range in bytes.
    pub size_bytes: u64,
}

/// The semantic tag carried by a [`DataOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTag {
    /// Archive header bytes for the path.
    Header,
    /// File body bytes.
    Content,
    /// Alignment padding bytes.
    Padding,
}

/// An ordered sequence of data references plus a tag, representing one
/// semantic write against a path.
///
/// The content a `DataOp` represents is the byte concatenation, in order, of
/// the referenced chunk ranges. Multiple ops with the same tag may exist for
/// a path; their ordering reflects write order across merged sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOp {
    /// Semantic tag of this write.
    pub tag: OpTag,
    /// The referenced chunk ranges, in content order.
    pub data_refs: Vec<DataRef>,
}

impl DataOp {
    /// Creates an empty op with the given tag.
    #[must_use]
    pub fn new(tag: OpTag) -> Self {
        Self {
            tag,
            data_refs: Vec::new(),
        }
    }

    /// Total content size of the op in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.data_refs.iter().map(|r| r.size_bytes).sum()
    }
}

/// A content-addressed chunk store layered over an object-storage backend.
///
/// Writers put bytes and get back a [`DataRef`]; identical bytes written by
/// independent writers deduplicate to the same chunk. Reads dereference a
/// ref with a ranged get and never mutate the underlying blob.
#[derive(Clone)]
pub struct ChunkStore {
    backend: Arc<dyn StorageBackend>,
}

impl ChunkStore {
    /// Creates a chunk store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn chunk_key(id: &ChunkId) -> String {
        format!("{CHUNK_PREFIX}/{id}")
    }

    /// Stores `data` as a chunk and returns a ref covering all of it.
    ///
    /// The write is conditional on the chunk not existing; a precondition
    /// failure means another writer already stored identical bytes, which is
    /// success from the caller's point of view.
    pub async fn put(&self, data: Bytes) -> Result<DataRef> {
        let chunk_id = ChunkId::of(&data);
        let size_bytes = data.len() as u64;
        // PreconditionFailed here is dedup, not an error.
        self.backend
            .put(
                &Self::chunk_key(&chunk_id),
                data,
                WritePrecondition::DoesNotExist,
            )
            .await?;
        Ok(DataRef {
            chunk_id,
            offset: 0,
            size_bytes,
        })
    }

    /// Reads the bytes a ref points at.
    ///
    /// A ref whose range extends past the end of its chunk is a content
    /// error and surfaces as [`Error::InvalidInput`]; it is never silently
    /// truncated.
    pub async fn get(&self, data_ref: &DataRef) -> Result<Bytes> {
        let key = Self::chunk_key(&data_ref.chunk_id);
        let meta = self
            .backend
            .head(&key)
            .await?
            .ok_or_else(|| Error::resource_not_found("chunk", &data_ref.chunk_id))?;
        let end = data_ref.offset + data_ref.size_bytes;
        if end > meta.size {
            return Err(Error::InvalidInput(format!(
                "data ref range {}..{end} exceeds chunk {} size {}",
                data_ref.offset, data_ref.chunk_id, meta.size
            )));
        }
        self.backend.get_range(&key, data_ref.offset..end).await
    }

    /// Reads and concatenates the content of a data op.
    pub async fn read_op(&self, op: &DataOp) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(usize::try_from(op.size_bytes()).unwrap_or(0));
        for data_ref in &op.data_refs {
            buf.extend_from_slice(&self.get(data_ref).await?);
        }
        Ok(buf.into())
    }
}
