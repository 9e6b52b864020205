//! # silt-compact
//!
//! Distributed compaction of file sets with bounded fan-in.
//!
//! Compaction merges many file sets into one: paths are interleaved in
//! sorted order and same-path data operations are concatenated in input
//! order, all by reference - chunk bytes never move. This crate layers
//! the distribution strategy on top of the local merge in
//! [`silt_fileset::FilesetStorage`]:
//!
//! - [`compactor::DistributedCompactor`]: splits oversized input lists
//!   into fan-in-bounded groups and each group's path space into disjoint
//!   ranges, running subtasks concurrently and concatenating their
//!   outputs
//! - [`driver`]: wires the compactor to [`silt_work`]'s master/worker
//!   dispatch
//! - [`task`]: the subtask wire shapes and envelope helpers
//! - [`config::CompactorConfig`]: fan-in, namespace, and retention knobs

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod compactor;
pub mod config;
pub mod driver;
pub mod error;
pub mod task;

pub use compactor::DistributedCompactor;
pub use config::CompactorConfig;
pub use driver::{compact_with_master, run_compaction_worker};
pub use error::{Error, Result};
pub use task::{
    COMPACTION_RESULT_URL, COMPACTION_TASK_URL, CompactionResult, CompactionTask,
    deserialize_result, deserialize_task, serialize_result, serialize_task,
};
