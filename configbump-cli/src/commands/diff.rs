//! `configbump diff`: show unified diffs for what sync would change.

use anyhow::{Context, Result};
use clap::Args;

use configbump_sync::diff;

use crate::SourceArgs;

/// Arguments for `configbump diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let selector = self.source.selector()?;
        let diffs = diff::plan(&self.source.store(), &selector, &self.source.dir)
            .with_context(|| format!("diff failed for '{}'", self.source.dir.display()))?;

        if diffs.is_empty() {
            println!("No differences for '{}'.", self.source.dir.display());
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
