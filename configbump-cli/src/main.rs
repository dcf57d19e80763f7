//! configbump: keep a directory in sync with ConfigMaps.
//!
//! # Usage
//!
//! ```text
//! configbump sync  --dir <dir> --manifests <dir> [--namespace <ns>] [--labels <expr>] [--json]
//! configbump diff  --dir <dir> --manifests <dir> [--namespace <ns>] [--labels <expr>]
//! configbump watch --dir <dir> --manifests <dir> [--debounce-ms <ms>] [--resync-secs <s>]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{diff::DiffArgs, sync::SyncArgs, watch::WatchArgs};
use configbump_core::{LabelSelector, ManifestDirStore, Selector};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "configbump",
    version,
    about = "Mirror the files of labelled ConfigMaps into a local directory",
    long_about = None,
)]
struct Cli {
    /// Emit log records as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one full sync of the target directory.
    Sync(SyncArgs),

    /// Show unified diffs of what `sync` would change.
    Diff(DiffArgs),

    /// Keep the target directory in sync until interrupted.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Shared source arguments
// ---------------------------------------------------------------------------

/// Where resources come from and where their files go.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// The directory to which the files retrieved from ConfigMaps are persisted.
    #[arg(short = 'd', long = "dir", env = "CONFIG_BUMP_DIR")]
    pub dir: PathBuf,

    /// Directory of ConfigMap manifests (*.yaml, *.yml).
    #[arg(short = 'm', long = "manifests", env = "CONFIG_BUMP_MANIFESTS")]
    pub manifests: PathBuf,

    /// Only consider ConfigMaps in this namespace.
    #[arg(short = 'n', long, env = "CONFIG_BUMP_NAMESPACE")]
    pub namespace: Option<String>,

    /// Label selector such as `app=che,tier=ide`. Empty selects everything.
    #[arg(short = 'l', long, env = "CONFIG_BUMP_LABELS", default_value = "")]
    pub labels: String,
}

impl SourceArgs {
    pub fn selector(&self) -> Result<Selector> {
        let labels = LabelSelector::parse(&self.labels)
            .with_context(|| format!("invalid label selector '{}'", self.labels))?;
        Ok(Selector::new(self.namespace.clone(), labels))
    }

    pub fn store(&self) -> ManifestDirStore {
        ManifestDirStore::new(&self.manifests)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = configbump_daemon::init_tracing(cli.log_json) {
        eprintln!("warning: {err}");
    }
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}
