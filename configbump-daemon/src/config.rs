use std::path::PathBuf;
use std::time::Duration;

use configbump_core::Selector;

/// Quiet period after a manifest change before the store is re-listed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
/// How often a full sync runs regardless of events.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);
/// Delay before a full sync is retried after a failed pass.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const SYNC_QUEUE_DEPTH: usize = 64;

/// Everything the daemon needs to run.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory the resources are synced into.
    pub target_dir: PathBuf,
    /// Directory of ConfigMap manifests acting as the resource store.
    pub manifests_dir: PathBuf,
    pub selector: Selector,
    pub debounce: Duration,
    /// `Duration::ZERO` disables periodic resyncs.
    pub resync_interval: Duration,
    pub retry_delay: Duration,
}

impl DaemonConfig {
    pub fn new(
        target_dir: impl Into<PathBuf>,
        manifests_dir: impl Into<PathBuf>,
        selector: Selector,
    ) -> Self {
        Self {
            target_dir: target_dir.into(),
            manifests_dir: manifests_dir.into(),
            selector,
            debounce: DEFAULT_DEBOUNCE,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}
