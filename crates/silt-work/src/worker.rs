//! The worker side of the dispatch protocol.
//!
//! A worker watches its namespace's task prefix, claims pending tasks by
//! compare-and-swap, executes them through a caller-supplied handler, and
//! reports results under the result prefix. Handler errors fail only the
//! task that raised them; transport errors abort the loop and are retried
//! by [`Worker::run_forever`].

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::backoff::RetryPolicy;
use crate::coord::{CoordinationStore, TxnOp, WatchEvent};
use crate::envelope::TaskPayload;
use crate::error::{Error, Result};
use crate::master::{ResultRecord, TaskRecord, TaskState, result_key_for};

/// Claims and executes subtasks under one namespace.
#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn CoordinationStore>,
    namespace: String,
}

impl Worker {
    /// Creates a worker serving `namespace`.
    #[must_use]
    pub fn new(store: Arc<dyn CoordinationStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// The namespace this worker serves.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Runs the claim-execute-report loop until cancellation or a
    /// transport error.
    ///
    /// The handler receives the cancellation token and the claimed
    /// payload; its error fails the task (a failure record is written and
    /// the loop continues) rather than the loop. This function never
    /// returns `Ok`: the loop is unending by design.
    pub async fn run<H, Fut>(&self, token: &CancellationToken, handler: &H) -> Result<()>
    where
        H: Fn(CancellationToken, TaskPayload) -> Fut + Send + Sync,
        Fut: Future<Output = Result<TaskPayload>> + Send,
    {
        let prefix = format!("{}/task/", self.namespace);
        let mut watch = self.store.watch(&prefix).await?;
        loop {
            let event = tokio::select! {
                () = token.cancelled() => {
                    return Err(silt_core::Error::Canceled("worker loop".into()).into());
                }
                event = watch.recv() => event,
            };
            let Some(event) = event else {
                return Err(Error::WatchClosed);
            };
            let WatchEvent::Put(entry) = event else {
                continue;
            };
            let record: TaskRecord = match serde_json::from_slice(&entry.value) {
                Ok(record) => record,
                Err(err) => {
                    // Not ours to execute; another protocol version may
                    // share the store.
                    warn!(key = %entry.key, error = %err, "skipping undecodable task record");
                    continue;
                }
            };
            if record.state != TaskState::Pending {
                continue;
            }
            if !self.claim(&entry.key).await? {
                continue;
            }
            debug!(key = %entry.key, "claimed task");

            let result = handler(token.clone(), record.payload).await;
            let report = match result {
                Ok(output) => ResultRecord {
                    state: TaskState::Success,
                    reason: None,
                    output: Some(output),
                },
                Err(err) if err.is_canceled() => return Err(err),
                Err(err) => {
                    warn!(key = %entry.key, error = %err, "task handler failed");
                    ResultRecord {
                        state: TaskState::Failure,
                        reason: Some(err.to_string()),
                        output: None,
                    }
                }
            };
            let bytes = serde_json::to_vec(&report)
                .map_err(|e| Error::envelope(format!("encoding result record: {e}")))?;
            self.store
                .put(&result_key_for(&entry.key), Bytes::from(bytes))
                .await?;
        }
    }

    /// Compare-and-swap claim: pending -> claimed. Returns false if
    /// another worker won.
    async fn claim(&self, key: &str) -> Result<bool> {
        self.store
            .txn(key, &mut |current| {
                let Some(bytes) = current else {
                    return TxnOp::Abort;
                };
                let Ok(mut record) = serde_json::from_slice::<TaskRecord>(bytes) else {
                    return TxnOp::Abort;
                };
                if record.state != TaskState::Pending {
                    return TxnOp::Abort;
                }
                record.state = TaskState::Claimed;
                match serde_json::to_vec(&record) {
                    Ok(value) => TxnOp::Put(Bytes::from(value)),
                    Err(_) => TxnOp::Abort,
                }
            })
            .await
    }

    /// Runs the worker loop forever, retrying transport failures with
    /// capped backoff.
    ///
    /// Returns `Ok(())` only on cancellation. A clean loop exit violates
    /// the protocol contract and surfaces as an internal error so the
    /// process fails loudly instead of idling without a worker.
    pub async fn run_forever<H, Fut>(&self, token: &CancellationToken, handler: &H) -> Result<()>
    where
        H: Fn(CancellationToken, TaskPayload) -> Fut + Send + Sync,
        Fut: Future<Output = Result<TaskPayload>> + Send,
    {
        let mut backoff = RetryPolicy::default().backoff();
        loop {
            match self.run(token, handler).await {
                Err(err) if err.is_canceled() => return Ok(()),
                Err(err) => {
                    error!(
                        namespace = %self.namespace,
                        error = %err,
                        "worker loop failed; retrying"
                    );
                    tokio::time::sleep(backoff.next_interval()).await;
                }
                Ok(()) => {
                    return Err(silt_core::Error::internal(
                        "worker loop exited without cancellation",
                    )
                    .into());
                }
            }
        }
    }
}
