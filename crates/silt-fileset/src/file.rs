//! The read-side view of one path inside a file set.

use silt_core::chunk::{ChunkStore, DataOp, DataRef, OpTag};

use crate::error::{Error, Result};

/// One file: a canonical path plus the data operations written against it.
///
/// The first operation must be tagged `header`; a trailing `padding`
/// operation is optional (merge output regenerates padding at export time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// The canonical path of the file.
    pub path: String,
    /// The data operations, in write order across merged sources.
    pub data_ops: Vec<DataOp>,
}

impl File {
    /// Creates a file view from a path and its operations.
    #[must_use]
    pub fn new(path: impl Into<String>, data_ops: Vec<DataOp>) -> Self {
        Self {
            path: path.into(),
            data_ops,
        }
    }

    /// Returns the header data operation.
    ///
    /// # Errors
    ///
    /// A file whose first operation is not tagged `header` is malformed;
    /// the error surfaces to the caller that requested the read and is
    /// never silently skipped.
    pub fn header_op(&self) -> Result<&DataOp> {
        match self.data_ops.first() {
            Some(op) if op.tag == OpTag::Header => Ok(op),
            _ => Err(Error::MissingHeader {
                path: self.path.clone(),
            }),
        }
    }

    /// Returns the content data operations: everything except a leading
    /// `header` op and a trailing `padding` op.
    #[must_use]
    pub fn content_ops(&self) -> &[DataOp] {
        let mut ops = self.data_ops.as_slice();
        if let Some(first) = ops.first() {
            if first.tag == OpTag::Header {
                ops = &ops[1..];
            }
        }
        if let Some(last) = ops.last() {
            if last.tag == OpTag::Padding {
                ops = &ops[..ops.len() - 1];
            }
        }
        ops
    }

    /// Flattens the content operations into their data references.
    #[must_use]
    pub fn content_refs(&self) -> Vec<&DataRef> {
        self.content_ops()
            .iter()
            .flat_map(|op| op.data_refs.iter())
            .collect()
    }

    /// Total content size in bytes.
    #[must_use]
    pub fn content_size(&self) -> u64 {
        self.content_ops().iter().map(DataOp::size_bytes).sum()
    }

    /// Fetches and parses the stored archive header block for this file.
    pub async fn header(&self, chunks: &ChunkStore) -> Result<tar::Header> {
        let bytes = chunks.read_op(self.header_op()?).await?;
        if bytes.len() < 512 {
            return Err(Error::OpOrdering {
                path: self.path.clone(),
                message: format!("header op holds {} bytes, expected at least 512", bytes.len()),
            });
        }
        let mut header = tar::Header::new_gnu();
        header.as_mut_bytes().copy_from_slice(&bytes[..512]);
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: OpTag) -> DataOp {
        DataOp::new(tag)
    }

    #[test]
    fn header_op_is_the_leading_header() {
        let file = File::new(
            "/a",
            vec![tagged(OpTag::Header), tagged(OpTag::Content)],
        );
        assert_eq!(file.header_op().unwrap().tag, OpTag::Header);
    }

    #[test]
    fn missing_header_is_an_error() {
        let file = File::new("/a", vec![tagged(OpTag::Content)]);
        assert!(matches!(file.header_op(), Err(Error::MissingHeader { .. })));

        let empty = File::new("/a", vec![]);
        assert!(matches!(empty.header_op(), Err(Error::MissingHeader { .. })));
    }

    #[test]
    fn content_ops_strip_header_and_padding() {
        let file = File::new(
            "/a",
            vec![
                tagged(OpTag::Header),
                tagged(OpTag::Content),
                tagged(OpTag::Content),
                tagged(OpTag::Padding),
            ],
        );
        let content = file.content_ops();
        assert_eq!(content.len(), 2);
        assert!(content.iter().all(|op| op.tag == OpTag::Content));
    }

    #[test]
    fn content_ops_tolerate_missing_padding() {
        // Merge output carries header + content only; padding is
        // regenerated at export time.
        let file = File::new("/a", vec![tagged(OpTag::Header), tagged(OpTag::Content)]);
        assert_eq!(file.content_ops().len(), 1);
    }
}
