//! The portable tar encoding of a file set.
//!
//! Each file is stored as a tagged operation sequence that mirrors the tar
//! wire format: a 512-byte header block, the content bytes, and zero
//! padding rounding the content up to block alignment. Ingest goes through
//! [`TarFileWriter`], which keeps an alignment cursor so that structurally
//! copied operations are *skipped* (the cursor advances, no chunk bytes
//! move) while fresh bytes are written through to the chunk store. Export
//! walks a file set in path order and regenerates padding from the content
//! length, so merge output never needs to carry padding ops at all.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use tar::Header;
use tokio_util::sync::CancellationToken;

use silt_core::chunk::{ChunkStore, DataOp, OpTag};
use silt_core::path::is_clean_tar_path;

use crate::error::{Error, Result};
use crate::file::File;
use crate::fileset::FileSet;
use crate::iterator::FileSetIterator;
use crate::writer::FileWriter;

/// Tar block size; headers and padding align to this.
pub const BLOCK_SIZE: u64 = 512;

/// End-of-archive marker: two zero blocks.
const END_OF_ARCHIVE: [u8; 1024] = [0; 1024];

fn padding_len(content_len: u64) -> u64 {
    (BLOCK_SIZE - content_len % BLOCK_SIZE) % BLOCK_SIZE
}

/// Writes one file's tar entry: header block, content bytes, padding.
///
/// The header's size field is refreshed from the file's actual content
/// length, since merging may have concatenated operations from several
/// sources after the header was recorded.
pub async fn write_tar_entry<W: Write>(
    chunks: &ChunkStore,
    out: &mut W,
    file: &File,
) -> Result<()> {
    let content_size = file.content_size();
    let mut header = file.header(chunks).await?;
    header.set_size(content_size);
    header.set_cksum();
    out.write_all(header.as_bytes())
        .map_err(|e| Error::tar(format!("writing header for '{}': {e}", file.path)))?;

    for op in file.content_ops() {
        for data_ref in &op.data_refs {
            let bytes = chunks.get(data_ref).await?;
            out.write_all(&bytes)
                .map_err(|e| Error::tar(format!("writing content for '{}': {e}", file.path)))?;
        }
    }

    let padding = padding_len(content_size);
    if padding > 0 {
        out.write_all(&vec![0_u8; usize::try_from(padding).unwrap_or(0)])
            .map_err(|e| Error::tar(format!("writing padding for '{}': {e}", file.path)))?;
    }
    Ok(())
}

/// Streams an entire file set as a tar archive, in path order, terminated
/// by the 1024-byte end-of-archive marker.
pub async fn write_tar_stream<W: Write>(
    chunks: &ChunkStore,
    out: &mut W,
    fileset: Arc<dyn FileSet>,
    token: &CancellationToken,
) -> Result<()> {
    let mut iter = FileSetIterator::new(token.clone(), fileset);
    while let Some(file) = iter.next().await? {
        write_tar_entry(chunks, out, &file).await?;
    }
    out.write_all(&END_OF_ARCHIVE)
        .map_err(|e| Error::tar(format!("writing end-of-archive marker: {e}")))?;
    Ok(())
}

/// Wraps a [`FileWriter`] to record a tar-shaped operation sequence.
///
/// Construction records the `header` op; [`write`] and [`copy`] feed the
/// content while tracking block alignment; [`close`] records the `padding`
/// op. The name being written must be a canonical tar path for the
/// header's entry type - non-canonical names are rejected, never
/// normalized.
///
/// [`write`]: Self::write
/// [`copy`]: Self::copy
/// [`close`]: Self::close
pub struct TarFileWriter<'w> {
    inner: FileWriter<'w>,
    content_len: u64,
}

impl std::fmt::Debug for TarFileWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarFileWriter")
            .field("content_len", &self.content_len)
            .finish_non_exhaustive()
    }
}

impl<'w> TarFileWriter<'w> {
    /// Validates the path and records the header block.
    pub async fn new(mut inner: FileWriter<'w>, header: &Header) -> Result<Self> {
        if !is_clean_tar_path(inner.path(), header.entry_type().is_dir()) {
            return Err(Error::UncleanTarPath {
                path: inner.path().to_string(),
            });
        }
        inner.append(OpTag::Header).await?;
        inner.write(header.as_bytes()).await?;
        inner.append(OpTag::Content).await?;
        Ok(Self {
            inner,
            content_len: 0,
        })
    }

    /// Accepts fresh content bytes, advancing the alignment cursor.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write(data).await?;
        self.content_len += data.len() as u64;
        Ok(())
    }

    /// Structurally copies existing operations.
    ///
    /// The alignment cursor advances by the referenced size but no chunk
    /// bytes are read or written; this is the skip that makes re-export of
    /// already-ingested content zero-copy.
    pub async fn copy(&mut self, ops: &[DataOp]) -> Result<()> {
        let skipped: u64 = ops.iter().map(DataOp::size_bytes).sum();
        self.inner.copy(ops).await?;
        self.content_len += skipped;
        Ok(())
    }

    /// Records the padding op and finishes the file.
    pub async fn close(mut self) -> Result<()> {
        let padding = padding_len(self.content_len);
        if padding > 0 {
            self.inner.append(OpTag::Padding).await?;
            self.inner
                .write(&vec![0_u8; usize::try_from(padding).unwrap_or(0)])
                .await?;
        }
        self.inner.close().await
    }
}

/// Runs `cb` against a [`TarFileWriter`] over `file_writer`, closing it
/// afterwards. The callback takes and returns the writer by value so its
/// future does not borrow from the caller's frame.
pub async fn with_tar_file_writer<'w, F, Fut>(
    file_writer: FileWriter<'w>,
    header: &Header,
    cb: F,
) -> Result<()>
where
    F: FnOnce(TarFileWriter<'w>) -> Fut,
    Fut: Future<Output = Result<TarFileWriter<'w>>>,
{
    let tar_writer = TarFileWriter::new(file_writer, header).await?;
    let tar_writer = cb(tar_writer).await?;
    tar_writer.close().await
}
