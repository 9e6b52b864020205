//! Glue between the compactor and the dispatch layer.
//!
//! [`compact_with_master`] is the coordinator side: it hands every
//! compaction subtask to a shared [`Master`] as a one-task batch.
//! [`run_compaction_worker`] is the executor side: the unending worker
//! loop that claims those subtasks and runs the local range-restricted
//! merge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, info};

use silt_core::id::FilesetId;
use silt_core::observability::{compaction_span, worker_span};
use silt_fileset::FilesetStorage;
use silt_work::{Master, TaskPayload, Worker};

use crate::compactor::DistributedCompactor;
use crate::error::{Error, Result};
use crate::task::{
    CompactionResult, CompactionTask, deserialize_result, deserialize_task, serialize_result,
    serialize_task,
};

/// Compacts `inputs` by dispatching subtasks through `master`.
///
/// The compactor invokes its worker function concurrently while a master
/// runs one batch at a time, so access is serialized through the mutex.
/// A successful subtask that arrives without a result payload violates
/// the protocol and surfaces as an internal error; it is not retried.
pub async fn compact_with_master(
    token: &CancellationToken,
    storage: &FilesetStorage,
    master: &Arc<Mutex<Master>>,
    inputs: &[FilesetId],
    ttl: Duration,
    max_fan_in: usize,
) -> Result<FilesetId> {
    let worker_fn = |task: CompactionTask| {
        let master = Arc::clone(master);
        let token = token.clone();
        async move {
            let payload = serialize_task(&task)?;
            let mut output: Option<TaskPayload> = None;
            {
                let mut master = master.lock().await;
                master
                    .run_subtasks(&token, std::slice::from_ref(&payload), &mut |result| {
                        output = result.record.output;
                        Ok(())
                    })
                    .await?;
            }
            let payload = output.ok_or_else(|| {
                silt_core::Error::internal("subtask succeeded without a result payload")
            })?;
            let result = deserialize_result(&payload)?;
            Ok(result.id)
        }
    };

    let compactor = DistributedCompactor::new(storage.clone(), max_fan_in, worker_fn)?;
    let id = compactor
        .compact(token, inputs, ttl)
        .instrument(compaction_span("compact", inputs.len()))
        .await?;
    info!(inputs = inputs.len(), output = %id, "distributed compaction finished");
    Ok(id)
}

/// Runs the compaction worker loop until cancellation.
///
/// Each claimed subtask is a range-restricted local merge; intermediate
/// outputs carry `ttl` so abandoned partials age out. Handler errors fail
/// the individual subtask; transport failures are retried forever by the
/// worker.
pub async fn run_compaction_worker(
    token: &CancellationToken,
    worker: &Worker,
    storage: &FilesetStorage,
    ttl: Duration,
) -> Result<()> {
    let handler = |task_token: CancellationToken, payload: TaskPayload| {
        let storage = storage.clone();
        async move {
            let task = deserialize_task(&payload).map_err(worker_error)?;
            let id = storage
                .compact(&task_token, &task.inputs, ttl, &task.range)
                .await
                .map_err(|e| worker_error(e.into()))?;
            serialize_result(&CompactionResult { id }).map_err(worker_error)
        }
    };
    worker
        .run_forever(token, &handler)
        .instrument(worker_span("run", worker.namespace()))
        .await?;
    Ok(())
}

/// Adapts a compaction error to the dispatch layer's error type.
///
/// Core errors (including cancellation) pass through so the worker can
/// distinguish shutdown from task failure; everything else becomes the
/// task's failure reason.
fn worker_error(err: Error) -> silt_work::Error {
    match err {
        Error::Work(err) => err,
        Error::Core(err) | Error::Fileset(silt_fileset::Error::Core(err)) => {
            silt_work::Error::Core(err)
        }
        other => silt_work::Error::TaskFailed {
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_error_preserves_cancellation() {
        let err = worker_error(Error::Core(silt_core::Error::Canceled("x".into())));
        assert!(err.is_canceled());
    }

    #[test]
    fn worker_error_turns_content_errors_into_failures() {
        let err = worker_error(Error::Fileset(silt_fileset::Error::MissingHeader {
            path: "/a".into(),
        }));
        assert!(matches!(err, silt_work::Error::TaskFailed { .. }));
    }
}
