use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker loops, i.e. jobs transcoded at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// How long shutdown waits for in-flight jobs before aborting workers.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl WorkerConfig {
    pub fn with_workers(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = n;
        self
    }

    pub fn with_shutdown_grace(mut self, secs: u64) -> Self {
        self.shutdown_grace_secs = secs;
        self
    }
}
