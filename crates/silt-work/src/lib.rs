//! # silt-work
//!
//! The distributed work dispatch layer: a coordination-store interface,
//! self-describing task envelopes, and the master/worker protocol built
//! on them.
//!
//! A [`master::Master`] submits batches of opaque subtasks under a
//! namespace and blocks until workers report results; a
//! [`worker::Worker`] claims pending tasks by compare-and-swap, executes
//! them, and reports back. Results reach the master in arrival order,
//! one failed subtask fails its batch, and transport failures on the
//! worker side are retried forever with capped backoff.
//!
//! The protocol only assumes the small [`coord::CoordinationStore`]
//! interface: linearizable point operations, one-key transactions, and
//! prefix watches that replay current entries on connect.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod coord;
pub mod envelope;
pub mod error;
pub mod master;
pub mod worker;

pub use backoff::{Backoff, RetryPolicy};
pub use coord::memory::MemoryCoordStore;
pub use coord::{CoordinationStore, KvEntry, TxnFn, TxnOp, WatchEvent};
pub use envelope::{TaskPayload, pack, unpack};
pub use error::{Error, Result};
pub use master::{Master, OnResult, ResultRecord, TaskRecord, TaskResult, TaskState};
pub use worker::Worker;
