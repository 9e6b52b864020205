//! # silt-core
//!
//! Core abstractions for the Silt storage-compaction engine.
//!
//! This crate provides the foundational types used across all Silt components:
//!
//! - **Content Model**: content-addressed chunks, byte-range references, and
//!   tagged data operations enabling byte-level dedup and zero-copy merges
//! - **Paths**: canonical path rules and half-open path ranges used to
//!   partition compaction work
//! - **Identifiers**: strongly-typed IDs for chunks and file sets
//! - **Storage Backend**: abstract object-storage interface with conditional
//!   writes, plus an in-memory backend for tests
//! - **Error Types**: shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `silt-core` is the only crate allowed to define shared primitives. The
//! file-set, dispatch, and compactor layers all build on the types here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chunk;
pub mod error;
pub mod id;
pub mod observability;
pub mod path;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::chunk::{ChunkStore, DataOp, DataRef, OpTag};
    pub use crate::error::{Error, Result};
    pub use crate::id::{ChunkId, FilesetId};
    pub use crate::path::{PathRange, clean_tar_path, dir_upper_bound, is_clean_tar_path, is_dir};
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult,
    };
}

pub use chunk::{ChunkStore, DataOp, DataRef, OpTag};
pub use error::{Error, Result};
pub use id::{ChunkId, FilesetId};
pub use observability::{LogFormat, init_logging};
pub use path::PathRange;
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult};
