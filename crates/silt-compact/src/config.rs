//! Compactor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_fan_in() -> usize {
    8
}

fn default_task_namespace() -> String {
    "compaction".to_string()
}

fn default_ttl_secs() -> u64 {
    600
}

/// Tunables for distributed compaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactorConfig {
    /// Maximum logical inputs any single subtask processes.
    #[serde(default = "default_max_fan_in")]
    pub max_fan_in: usize,

    /// Coordination namespace compaction subtasks dispatch under.
    #[serde(default = "default_task_namespace")]
    pub task_namespace: String,

    /// Retention TTL in seconds for intermediate and output file sets.
    /// Callers extend retention on outputs they keep.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            max_fan_in: default_max_fan_in(),
            task_namespace: default_task_namespace(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl CompactorConfig {
    /// The default TTL as a [`Duration`].
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}
