//! The master side of the dispatch protocol.
//!
//! A master submits a batch of subtasks under its namespace and blocks
//! until every one has a result, surfacing results to the caller in
//! *arrival* order - the order workers finish, which carries no relation
//! to submission order. One failed subtask fails the whole batch.
//!
//! Key layout under a namespace `ns`:
//!
//! ```text
//! {ns}/task/{batch}/{seq}     TaskRecord   (written by master, claimed by worker)
//! {ns}/result/{batch}/{seq}   ResultRecord (written by worker)
//! ```

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::coord::{CoordinationStore, WatchEvent};
use crate::envelope::TaskPayload;
use crate::error::{Error, Result};

pub(crate) fn task_key(namespace: &str, batch: &str, seq: usize) -> String {
    format!("{namespace}/task/{batch}/{seq:08}")
}

pub(crate) fn result_key(namespace: &str, batch: &str, seq: usize) -> String {
    format!("{namespace}/result/{batch}/{seq:08}")
}

pub(crate) fn result_prefix(namespace: &str, batch: &str) -> String {
    format!("{namespace}/result/{batch}/")
}

/// Derives the result key a worker reports under from the task key it
/// claimed.
pub(crate) fn result_key_for(task_key: &str) -> String {
    task_key.replacen("/task/", "/result/", 1)
}

/// Extracts the sequence number from a task or result key.
pub(crate) fn key_seq(key: &str) -> Option<u64> {
    key.rsplit('/').next()?.parse().ok()
}

/// Lifecycle state of a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Written by the master, not yet claimed.
    Pending,
    /// Claimed by a worker, executing.
    Claimed,
    /// Finished successfully.
    Success,
    /// Finished with a handler error.
    Failure,
}

/// A submitted subtask as stored under the task prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// The opaque task payload.
    pub payload: TaskPayload,
    /// Claim state.
    pub state: TaskState,
}

/// A finished subtask as stored under the result prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Terminal state: `Success` or `Failure`.
    pub state: TaskState,
    /// Failure reason, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Output payload, when successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskPayload>,
}

/// One subtask outcome delivered to the caller.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Submission index of the subtask within its batch.
    pub seq: u64,
    /// The worker-reported record.
    pub record: ResultRecord,
}

/// The callback invoked once per subtask result, in arrival order.
///
/// Returning an error aborts the batch wait.
pub type OnResult<'a> = &'a mut (dyn FnMut(TaskResult) -> Result<()> + Send);

/// Submits subtask batches and collects their results.
///
/// `run_subtasks` takes `&mut self`: a master runs one batch at a time,
/// and the exclusive borrow makes concurrent invocation a compile error.
/// Callers multiplexing concurrent batches over one master wrap it in a
/// `tokio::sync::Mutex`.
pub struct Master {
    store: Arc<dyn CoordinationStore>,
    namespace: String,
}

impl Master {
    /// Creates a master submitting under `namespace`.
    #[must_use]
    pub fn new(store: Arc<dyn CoordinationStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// The namespace this master submits under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Runs a batch of subtasks to completion.
    ///
    /// Blocks until every subtask has a result, invoking `on_result` as
    /// each arrives. Fails fast on the first subtask recorded as failed,
    /// on a callback error, or on cancellation; batch keys are cleaned up
    /// best-effort either way.
    pub async fn run_subtasks(
        &mut self,
        token: &CancellationToken,
        tasks: &[TaskPayload],
        on_result: OnResult<'_>,
    ) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let batch = Ulid::new().to_string();
        debug!(
            namespace = %self.namespace,
            batch = %batch,
            count = tasks.len(),
            "submitting subtask batch"
        );

        // Watch before writing so no result can slip past; the watch
        // replays current entries on connect regardless.
        let mut watch = self
            .store
            .watch(&result_prefix(&self.namespace, &batch))
            .await?;

        let submitted = self.submit(&batch, tasks).await;
        let outcome = match submitted {
            Ok(()) => {
                self.collect(token, &mut watch, tasks.len(), on_result)
                    .await
            }
            Err(err) => Err(err),
        };
        self.cleanup(&batch, tasks.len()).await;
        outcome
    }

    async fn submit(&self, batch: &str, tasks: &[TaskPayload]) -> Result<()> {
        for (seq, payload) in tasks.iter().enumerate() {
            let record = TaskRecord {
                payload: payload.clone(),
                state: TaskState::Pending,
            };
            let bytes = serde_json::to_vec(&record)
                .map_err(|e| Error::envelope(format!("encoding task record: {e}")))?;
            self.store
                .put(&task_key(&self.namespace, batch, seq), Bytes::from(bytes))
                .await?;
        }
        Ok(())
    }

    async fn collect(
        &self,
        token: &CancellationToken,
        watch: &mut mpsc::Receiver<WatchEvent>,
        count: usize,
        on_result: OnResult<'_>,
    ) -> Result<()> {
        let mut outstanding = count;
        while outstanding > 0 {
            let event = tokio::select! {
                () = token.cancelled() => {
                    return Err(silt_core::Error::Canceled("subtask batch".into()).into());
                }
                event = watch.recv() => event,
            };
            match event {
                None => return Err(Error::WatchClosed),
                Some(WatchEvent::Delete(_)) => {}
                Some(WatchEvent::Put(entry)) => {
                    let Some(seq) = key_seq(&entry.key) else {
                        continue;
                    };
                    let record: ResultRecord = serde_json::from_slice(&entry.value)
                        .map_err(|e| Error::envelope(format!("decoding result record: {e}")))?;
                    let failure_reason = (record.state == TaskState::Failure)
                        .then(|| record.reason.clone().unwrap_or_default());
                    on_result(TaskResult { seq, record })?;
                    if let Some(reason) = failure_reason {
                        return Err(Error::TaskFailed { reason });
                    }
                    outstanding -= 1;
                }
            }
        }
        Ok(())
    }

    /// Removes the batch's task and result keys. Best-effort: the batch
    /// outcome is already decided, leftovers only cost space.
    async fn cleanup(&self, batch: &str, count: usize) {
        for seq in 0..count {
            for key in [
                task_key(&self.namespace, batch, seq),
                result_key(&self.namespace, batch, seq),
            ] {
                if let Err(err) = self.store.delete(&key).await {
                    warn!(key = %key, error = %err, "failed to clean up batch key");
                }
            }
        }
    }
}
