//! configbump daemon: watches a manifest directory and keeps the target
//! directory in sync as ConfigMaps change.

mod config;
mod error;
mod runtime;
pub mod watch;

pub use config::{
    DaemonConfig, DEFAULT_DEBOUNCE, DEFAULT_RESYNC_INTERVAL, DEFAULT_RETRY_DELAY,
    SYNC_QUEUE_DEPTH,
};
pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_with_shutdown, start_blocking};
