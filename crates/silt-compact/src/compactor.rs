//! Fan-in-bounded distributed compaction.
//!
//! The compactor turns "merge these N file sets" into a tree of subtasks
//! in which no single task ever processes more than `max_fan_in` logical
//! inputs:
//!
//! 1. With more than `max_fan_in` inputs, the input list is split into
//!    consecutive groups of at most `max_fan_in`, the groups are compacted
//!    concurrently, and the compactor recurses on the group results.
//!    Grouping is consecutive, so precedence order is preserved.
//! 2. A single group is parallelized the other way: its combined path
//!    space is sharded into at most `max_fan_in` disjoint ordered ranges,
//!    one subtask per range runs concurrently, and the per-range outputs
//!    are concatenated in ascending range order.
//!
//! How a subtask actually runs is the caller's business: the compactor
//! only invokes its `worker_fn`, which may execute in-process or dispatch
//! through a master. Any subtask failure aborts the whole call with no
//! partial result; retries belong to the dispatch layer.

use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, try_join_all};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use silt_core::id::FilesetId;
use silt_core::path::PathRange;
use silt_fileset::{FilesetStorage, shard_path_space};

use crate::error::Result;
use crate::task::CompactionTask;

/// Runs compactions as bounded-fan-in subtask trees.
pub struct DistributedCompactor<W> {
    storage: FilesetStorage,
    max_fan_in: usize,
    worker_fn: W,
}

impl<W, Fut> DistributedCompactor<W>
where
    W: Fn(CompactionTask) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FilesetId>> + Send,
{
    /// Creates a compactor.
    ///
    /// `worker_fn` executes one [`CompactionTask`] and returns the merged
    /// file set. `max_fan_in` must be at least 2; a fan-in of 1 could
    /// never reduce the input count.
    pub fn new(storage: FilesetStorage, max_fan_in: usize, worker_fn: W) -> Result<Self> {
        if max_fan_in < 2 {
            return Err(silt_core::Error::InvalidInput(format!(
                "max_fan_in must be at least 2, got {max_fan_in}"
            ))
            .into());
        }
        Ok(Self {
            storage,
            max_fan_in,
            worker_fn,
        })
    }

    /// The fan-in bound in effect.
    #[must_use]
    pub fn max_fan_in(&self) -> usize {
        self.max_fan_in
    }

    /// Compacts `inputs` (in precedence order) into one file set.
    pub async fn compact(
        &self,
        token: &CancellationToken,
        inputs: &[FilesetId],
        ttl: Duration,
    ) -> Result<FilesetId> {
        self.compact_range(token, inputs.to_vec(), ttl, PathRange::all())
            .await
    }

    /// Recursion body. Boxed because the group step re-enters it with the
    /// partial results.
    fn compact_range<'a>(
        &'a self,
        token: &'a CancellationToken,
        inputs: Vec<FilesetId>,
        ttl: Duration,
        range: PathRange,
    ) -> BoxFuture<'a, Result<FilesetId>> {
        Box::pin(async move {
            if inputs.is_empty() {
                // An empty merge is a valid, empty file set.
                let writer = self.storage.new_writer(ttl);
                return Ok(writer.close().await?);
            }
            if inputs.len() <= self.max_fan_in {
                return self.compact_group(token, &inputs, ttl, &range).await;
            }

            debug!(
                inputs = inputs.len(),
                fan_in = self.max_fan_in,
                "splitting compaction into groups"
            );
            let groups = inputs
                .chunks(self.max_fan_in)
                .map(|group| self.compact_group_owned(token, group.to_vec(), ttl, range.clone()));
            let partials = try_join_all(groups).await?;
            self.compact_range(token, partials, ttl, range).await
        })
    }

    async fn compact_group_owned(
        &self,
        token: &CancellationToken,
        inputs: Vec<FilesetId>,
        ttl: Duration,
        range: PathRange,
    ) -> Result<FilesetId> {
        self.compact_group(token, &inputs, ttl, &range).await
    }

    /// Merges one group of at most `max_fan_in` inputs by sharding its
    /// path space and dispatching one subtask per shard.
    async fn compact_group(
        &self,
        token: &CancellationToken,
        inputs: &[FilesetId],
        ttl: Duration,
        range: &PathRange,
    ) -> Result<FilesetId> {
        let paths = self.storage.combined_paths(inputs, range).await?;
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let mut shards = shard_path_space(&path_refs, self.max_fan_in);

        // Shards cover the whole path space; clip the outermost bounds to
        // the enclosing range so no task reaches outside it.
        if let Some(first) = shards.first_mut() {
            first.lower.clone_from(&range.lower);
        }
        if let Some(last) = shards.last_mut() {
            last.upper.clone_from(&range.upper);
        }

        debug!(
            inputs = inputs.len(),
            shards = shards.len(),
            "dispatching range subtasks"
        );
        let tasks = shards.into_iter().map(|shard| {
            (self.worker_fn)(CompactionTask {
                inputs: inputs.to_vec(),
                range: shard,
            })
        });
        let outputs = try_join_all(tasks).await?;

        if outputs.len() == 1 {
            return Ok(outputs[0]);
        }
        // Outputs cover disjoint ascending ranges; join them by reference.
        Ok(self.storage.concat(token, &outputs, ttl).await?)
    }
}
