//! Pluggable coordination storage for task dispatch.
//!
//! The dispatch protocol consumes a small linearizable key-value interface
//! rather than a concrete backend: point reads and writes, an atomic
//! read-modify-write for claims, and prefix watches that deliver the
//! current entries on connect followed by subsequent changes.
//!
//! ## Design Principles
//!
//! - **CAS semantics**: claims go through [`CoordinationStore::txn`] so two
//!   workers can never both win the same task
//! - **Watch completeness**: a watch opened after writes still observes
//!   them, because connect replays the current prefix contents
//! - **Testability**: [`memory::MemoryCoordStore`] for tests and
//!   single-process use

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

/// One stored key-value entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// The full key.
    pub key: String,
    /// The stored value.
    pub value: Bytes,
    /// Monotonic per-key version, starting at 1.
    pub version: u64,
}

/// A change observed by a prefix watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A key was written (including the initial replay on connect).
    Put(KvEntry),
    /// A key was deleted.
    Delete(String),
}

/// The outcome a transaction closure requests for the key it read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    /// Write this value.
    Put(Bytes),
    /// Delete the key.
    Delete,
    /// Leave the key untouched and report the transaction as not applied.
    Abort,
}

/// The read-modify-write closure passed to [`CoordinationStore::txn`].
///
/// Receives the current value of the key (or `None`) and decides the
/// outcome. Runs under the store's internal synchronization, so it must
/// not block.
pub type TxnFn<'a> = &'a mut (dyn FnMut(Option<&[u8]>) -> TxnOp + Send);

/// Linearizable key-value coordination.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync`; masters and workers share one store
/// handle across tasks.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Writes a key unconditionally.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Reads a key. Returns `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<KvEntry>>;

    /// Deletes a key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists entries under a prefix in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>>;

    /// Atomically reads `key` and applies the outcome `f` requests.
    ///
    /// Returns true if the transaction was applied, false if `f` aborted.
    async fn txn(&self, key: &str, f: TxnFn<'_>) -> Result<bool>;

    /// Watches a prefix.
    ///
    /// The receiver first yields a [`WatchEvent::Put`] for every entry
    /// currently under the prefix, then yields subsequent changes in the
    /// order they were applied. The watch ends when the receiver is
    /// dropped.
    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>>;
}
