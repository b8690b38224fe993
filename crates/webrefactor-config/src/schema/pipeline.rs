//! Pipeline tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and sizing of the refactor pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Initial attempt plus retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Commands executed between two fingerprint samples.
    #[serde(default = "default_sub_batch_size")]
    pub sub_batch_size: usize,

    /// Pause after each sub-batch, before sampling.
    #[serde(default = "default_sub_batch_yield_ms")]
    pub sub_batch_yield_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Probes after injection before giving up.
    #[serde(default = "default_inject_attempts")]
    pub inject_attempts: u32,

    /// Wait after injection and between re-probes.
    #[serde(default = "default_inject_settle_ms")]
    pub inject_settle_ms: u64,

    /// Timeout for extract/execute/reset requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay between load completion and automatic replay.
    #[serde(default = "default_replay_settle_ms")]
    pub replay_settle_ms: u64,

    /// Lifetime of the "last successful batch" memo.
    #[serde(default = "default_last_batch_ttl_secs")]
    pub last_batch_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            sub_batch_size: default_sub_batch_size(),
            sub_batch_yield_ms: default_sub_batch_yield_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            inject_attempts: default_inject_attempts(),
            inject_settle_ms: default_inject_settle_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            replay_settle_ms: default_replay_settle_ms(),
            last_batch_ttl_secs: default_last_batch_ttl_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn sub_batch_yield(&self) -> Duration {
        Duration::from_millis(self.sub_batch_yield_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn inject_settle(&self) -> Duration {
        Duration::from_millis(self.inject_settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn replay_settle(&self) -> Duration {
        Duration::from_millis(self.replay_settle_ms)
    }

    pub fn last_batch_ttl(&self) -> Duration {
        Duration::from_secs(self.last_batch_ttl_secs)
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_sub_batch_size() -> usize {
    10
}

fn default_sub_batch_yield_ms() -> u64 {
    50
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_inject_attempts() -> u32 {
    3
}

fn default_inject_settle_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_replay_settle_ms() -> u64 {
    2000
}

fn default_last_batch_ttl_secs() -> u64 {
    60
}
