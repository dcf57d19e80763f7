//! `configbump sync`: one full sync of the target directory.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use configbump_sync::{full, FileChange, SkippedFile, SyncReport};

use crate::SourceArgs;

/// Arguments for `configbump sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Emit the sync report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    target_dir: &'a Path,
    resources: usize,
    written: usize,
    removed: usize,
    unchanged: usize,
    report: &'a SyncReport,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let selector = self.source.selector()?;
        let store = self.source.store();
        let (report, cache) = full::full_sync(&store, &selector, &self.source.dir)
            .with_context(|| format!("sync failed for '{}'", self.source.dir.display()))?;

        if self.json {
            let summary = JsonSummary {
                target_dir: &self.source.dir,
                resources: cache.len(),
                written: report.written(),
                removed: report.removed(),
                unchanged: report.unchanged(),
                report: &report,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize sync JSON")?
            );
        } else {
            print_report(&self.source.dir, cache.len(), &report);
        }

        Ok(())
    }
}

fn print_report(target_dir: &Path, resources: usize, report: &SyncReport) {
    let dir = target_dir.display();
    if !report.has_mutations() {
        println!("✓ '{dir}' up to date ({resources} resource(s), nothing to do)");
    } else {
        println!(
            "✓ '{dir}' synced from {resources} resource(s) ({} written, {} removed, {} unchanged)",
            report.written(),
            report.removed(),
            report.unchanged(),
        );
    }

    for change in &report.changes {
        match change {
            FileChange::Created { path } => println!("  {}  {}", "+".green(), path.display()),
            FileChange::Updated { path } => println!("  {}  {}", "✎".yellow(), path.display()),
            FileChange::Removed { path } => println!("  {}  {}", "-".red(), path.display()),
            FileChange::Unchanged { .. } => {}
        }
    }

    for SkippedFile {
        resource,
        name,
        reason,
    } in &report.skipped
    {
        println!("  {}  '{name}' from {resource}: {reason}", "!".red().bold());
    }
}
