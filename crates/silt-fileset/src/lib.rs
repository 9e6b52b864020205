//! # silt-fileset
//!
//! The file set abstraction: an identified, ordered, lazily-iterable
//! collection of path-keyed entries built from tagged data operations.
//!
//! A file set is sealed once written. Its index maps canonical paths to the
//! data operations written against them; iterating a file set yields its
//! files in strictly increasing path order. Merging file sets concatenates
//! same-path operations in source order and never touches chunk bytes,
//! which is what makes compaction a structural operation instead of a data
//! copy.
//!
//! This crate provides:
//!
//! - [`index::Index`]: the sorted path -> operations map with range
//!   restriction
//! - [`file::File`]: the read-side view of one path
//! - [`fileset::FileSet`]: lazy visitor-driven iteration
//! - [`iterator::FileSetIterator`]: an explicit pull cursor with `peek`
//! - [`writer::Writer`] / [`writer::FileWriter`]: building new file sets
//! - [`tar`]: the portable archive encoding of a file set
//! - [`storage::FilesetStorage`]: persistence plus the local (in-process)
//!   range-restricted compaction routine

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod file;
pub mod fileset;
pub mod index;
pub mod iterator;
pub mod storage;
pub mod tar;
pub mod writer;

pub use error::{Error, Result};
pub use file::File;
pub use fileset::{FileSet, IndexFileSet, Visit, collect_files};
pub use index::{Index, shard_path_space};
pub use iterator::FileSetIterator;
pub use storage::{FilesetMeta, FilesetStorage};
pub use tar::{TarFileWriter, with_tar_file_writer, write_tar_entry, write_tar_stream};
pub use writer::{FileWriter, Writer};
