//! `configbump watch`: run the sync daemon in the foreground.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use configbump_daemon::{DaemonConfig, DEFAULT_DEBOUNCE, DEFAULT_RESYNC_INTERVAL};

use crate::SourceArgs;

/// Arguments for `configbump watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Quiet period after a manifest change before resyncing.
    #[arg(long, env = "CONFIG_BUMP_DEBOUNCE_MS", default_value_t = DEFAULT_DEBOUNCE.as_millis() as u64)]
    pub debounce_ms: u64,

    /// Seconds between periodic full syncs. 0 disables them.
    #[arg(long, env = "CONFIG_BUMP_RESYNC_SECS", default_value_t = DEFAULT_RESYNC_INTERVAL.as_secs())]
    pub resync_secs: u64,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let config = DaemonConfig::new(
            self.source.dir.clone(),
            self.source.manifests.clone(),
            self.source.selector()?,
        )
        .with_debounce(Duration::from_millis(self.debounce_ms))
        .with_resync_interval(Duration::from_secs(self.resync_secs));

        configbump_daemon::start_blocking(config).with_context(|| {
            format!(
                "watch failed for '{}' (manifests '{}')",
                self.source.dir.display(),
                self.source.manifests.display()
            )
        })
    }
}
