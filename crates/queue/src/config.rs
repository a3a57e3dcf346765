use std::time::Duration;

/// Default maximum number of queued plus in-flight jobs.
pub const DEFAULT_MAX_SIZE: usize = 10;

/// Default retention for finished jobs: 1 hour.
pub const DEFAULT_CLEANUP_AGE: Duration = Duration::from_secs(3600);

/// Default reaper sweep interval: 5 minutes.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(300);

/// Default deadline for loading a preset onto the GPU.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(900);

/// Default deadline for a single generation.
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(600);

/// Queue settings fixed at process start.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Admission limit on queued + processing jobs. Zero rejects everything.
    pub max_size: usize,
    /// How long completed/failed jobs stay visible to `get`.
    pub cleanup_age: Duration,
    /// How often the reaper sweeps the job map.
    pub reap_interval: Duration,
    pub load_timeout: Duration,
    pub generate_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            cleanup_age: DEFAULT_CLEANUP_AGE,
            reap_interval: DEFAULT_REAP_INTERVAL,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            generate_timeout: DEFAULT_GENERATE_TIMEOUT,
        }
    }
}
