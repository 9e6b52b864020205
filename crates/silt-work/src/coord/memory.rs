//! In-memory coordination store for testing and single-process use.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no durability, no cross-process
//!   coordination
//! - **Single-process only**: state is not shared across process
//!   boundaries

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, Result};

use super::{CoordinationStore, KvEntry, TxnFn, TxnOp, WatchEvent};

/// Buffer sizes for the watch fan-out channels.
const EVENT_BUFFER: usize = 256;

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    silt_core::Error::storage("coordination lock poisoned").into()
}

#[derive(Debug, Clone)]
struct Stored {
    value: Bytes,
    version: u64,
}

/// In-memory implementation of [`CoordinationStore`].
///
/// A `BTreeMap` under a mutex gives linearizable point operations and
/// ordered prefix scans; watches fan out through a broadcast channel that
/// is subscribed while the write lock is held, so no event can fall
/// between a watch's initial replay and its live stream.
#[derive(Debug)]
pub struct MemoryCoordStore {
    entries: Mutex<BTreeMap<String, Stored>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryCoordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCoordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            entries: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Returns the number of keys currently stored.
    pub fn len(&self) -> Result<usize> {
        let entries = self.entries.lock().map_err(poison_err)?;
        Ok(entries.len())
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn broadcast(&self, event: WatchEvent) {
        // No active watches is fine; the error just means no receivers.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let entry = {
            let mut entries = self.entries.lock().map_err(poison_err)?;
            let version = entries.get(key).map_or(1, |s| s.version + 1);
            entries.insert(
                key.to_string(),
                Stored {
                    value: value.clone(),
                    version,
                },
            );
            KvEntry {
                key: key.to_string(),
                value,
                version,
            }
        };
        self.broadcast(WatchEvent::Put(entry));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<KvEntry>> {
        let entries = self.entries.lock().map_err(poison_err)?;
        Ok(entries.get(key).map(|s| KvEntry {
            key: key.to_string(),
            value: s.value.clone(),
            version: s.version,
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = {
            let mut entries = self.entries.lock().map_err(poison_err)?;
            entries.remove(key).is_some()
        };
        if removed {
            self.broadcast(WatchEvent::Delete(key.to_string()));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>> {
        let entries = self.entries.lock().map_err(poison_err)?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, s)| KvEntry {
                key: key.clone(),
                value: s.value.clone(),
                version: s.version,
            })
            .collect())
    }

    async fn txn(&self, key: &str, f: TxnFn<'_>) -> Result<bool> {
        let event = {
            let mut entries = self.entries.lock().map_err(poison_err)?;
            let current = entries.get(key).map(|s| s.value.clone());
            match f(current.as_deref()) {
                TxnOp::Put(value) => {
                    let version = entries.get(key).map_or(1, |s| s.version + 1);
                    entries.insert(
                        key.to_string(),
                        Stored {
                            value: value.clone(),
                            version,
                        },
                    );
                    Some(WatchEvent::Put(KvEntry {
                        key: key.to_string(),
                        value,
                        version,
                    }))
                }
                TxnOp::Delete => entries
                    .remove(key)
                    .map(|_| WatchEvent::Delete(key.to_string())),
                TxnOp::Abort => {
                    return Ok(false);
                }
            }
        };
        if let Some(event) = event {
            self.broadcast(event);
        }
        Ok(true)
    }

    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        // Subscribe while holding the lock: every event after the snapshot
        // is seen by the subscription, and none before it is replayed twice.
        let (snapshot, mut events) = {
            let entries = self.entries.lock().map_err(poison_err)?;
            let events = self.events.subscribe();
            let snapshot: Vec<KvEntry> = entries
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, s)| KvEntry {
                    key: key.clone(),
                    value: s.value.clone(),
                    version: s.version,
                })
                .collect();
            (snapshot, events)
        };

        let prefix = prefix.to_string();
        tokio::spawn(async move {
            for entry in snapshot {
                if tx.send(WatchEvent::Put(entry)).await.is_err() {
                    return;
                }
            }
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    // A lagged watcher skips events it was too slow for;
                    // dispatch tolerates this because every task gets its
                    // own key and terminal state is re-readable.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                let matches = match &event {
                    WatchEvent::Put(entry) => entry.key.starts_with(&prefix),
                    WatchEvent::Delete(key) => key.starts_with(&prefix),
                };
                if matches && tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
