//! Wire shapes for compaction subtasks.

use serde::{Deserialize, Serialize};

use silt_core::id::FilesetId;
use silt_core::path::PathRange;
use silt_work::TaskPayload;

use crate::error::Result;

/// Envelope type URL for [`CompactionTask`].
pub const COMPACTION_TASK_URL: &str = "type.silt.dev/silt.CompactionTask";

/// Envelope type URL for [`CompactionResult`].
pub const COMPACTION_RESULT_URL: &str = "type.silt.dev/silt.CompactionResult";

/// One unit of compaction work: merge `inputs` restricted to `range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionTask {
    /// The file sets to merge, in precedence order.
    pub inputs: Vec<FilesetId>,
    /// The slice of the path space this task covers.
    pub range: PathRange,
}

/// The outcome of a compaction subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionResult {
    /// The merged file set.
    pub id: FilesetId,
}

/// Packs a task into its envelope.
pub fn serialize_task(task: &CompactionTask) -> Result<TaskPayload> {
    Ok(silt_work::pack(COMPACTION_TASK_URL, task)?)
}

/// Unpacks a task envelope, verifying its type URL.
pub fn deserialize_task(payload: &TaskPayload) -> Result<CompactionTask> {
    Ok(silt_work::unpack(COMPACTION_TASK_URL, payload)?)
}

/// Packs a result into its envelope.
pub fn serialize_result(result: &CompactionResult) -> Result<TaskPayload> {
    Ok(silt_work::pack(COMPACTION_RESULT_URL, result)?)
}

/// Unpacks a result envelope, verifying its type URL.
pub fn deserialize_result(payload: &TaskPayload) -> Result<CompactionResult> {
    Ok(silt_work::unpack(COMPACTION_RESULT_URL, payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn task_roundtrips_through_its_envelope() {
        let task = CompactionTask {
            inputs: vec![FilesetId::generate(), FilesetId::generate()],
            range: PathRange::new("/a", "/m"),
        };
        let payload = serialize_task(&task).unwrap();
        assert_eq!(payload.type_url, COMPACTION_TASK_URL);
        assert_eq!(deserialize_task(&payload).unwrap(), task);
    }

    #[test]
    fn result_envelope_rejects_task_payloads() {
        let task = CompactionTask {
            inputs: vec![FilesetId::generate()],
            range: PathRange::all(),
        };
        let payload = serialize_task(&task).unwrap();
        let err = deserialize_result(&payload).unwrap_err();
        assert!(matches!(err, Error::Work(silt_work::Error::Envelope { .. })));
    }
}
