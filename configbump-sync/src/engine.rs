//! The sync engine: owns the cache and drives both reconciliation paths.
//!
//! Every operation takes `&mut self`; one pass runs at a time and passes
//! never interleave. Hosts that receive events concurrently must funnel them
//! through a single owner (the daemon uses one queue consumer and a mutex).

use std::path::{Path, PathBuf};

use configbump_core::{ResourceEvent, ResourceId, ResourceStore, Selector, Snapshot};

use crate::cache::SyncCache;
use crate::digest::FileDigests;
use crate::error::SyncError;
use crate::full;
use crate::reconcile::{self, EventPlan};
use crate::report::{PassKind, SyncReport};

/// Callback invoked once after every successful pass.
pub type SyncHook = Box<dyn FnMut(&SyncReport) + Send>;

pub struct SyncEngine<S> {
    store: S,
    selector: Selector,
    target_dir: PathBuf,
    cache: SyncCache,
    on_sync_complete: Option<SyncHook>,
}

impl<S: ResourceStore> SyncEngine<S> {
    /// Create an engine with an empty cache. Call [`SyncEngine::full_sync`]
    /// before feeding events.
    pub fn new(store: S, selector: Selector, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            selector,
            target_dir: target_dir.into(),
            cache: SyncCache::new(),
            on_sync_complete: None,
        }
    }

    pub fn with_sync_hook(mut self, hook: impl FnMut(&SyncReport) + Send + 'static) -> Self {
        self.on_sync_complete = Some(Box::new(hook));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn cache(&self) -> &SyncCache {
        &self.cache
    }

    /// Files last synchronized for `id`, if it is tracked.
    pub fn current_files(&self, id: &ResourceId) -> Option<&FileDigests> {
        self.cache.get(id)
    }

    /// Reconcile the whole target directory and rebuild the cache.
    ///
    /// On error the previous cache is kept as-is.
    pub fn full_sync(&mut self) -> Result<SyncReport, SyncError> {
        let (report, cache) = full::full_sync(&self.store, &self.selector, &self.target_dir)?;
        self.cache = cache;
        tracing::info!(
            "full sync of {}: {} written, {} removed, {} unchanged, {} resource(s) tracked",
            self.target_dir.display(),
            report.written(),
            report.removed(),
            report.unchanged(),
            self.cache.len(),
        );
        self.notify(&report);
        Ok(report)
    }

    /// Apply one resource change. `None` means the resource is gone.
    ///
    /// On error the cache entry for `id` is left unchanged, so replaying the
    /// same event recomputes the same operations.
    pub fn on_resource_event(
        &mut self,
        id: ResourceId,
        snapshot: Option<Snapshot>,
    ) -> Result<SyncReport, SyncError> {
        if self.is_contested(&id, snapshot.as_ref()) {
            tracing::info!("{id} shares file names with another resource; running a full sync");
            return self.full_sync();
        }

        let ops = match reconcile::plan_event(self.cache.get(&id), snapshot.as_ref()) {
            EventPlan::Apply(ops) => ops,
            EventPlan::FullResync => {
                tracing::info!("{id} vanished but was never synced; running a full sync");
                return self.full_sync();
            }
        };

        let mut report = SyncReport::new(PassKind::Incremental);
        reconcile::apply(&self.target_dir, &id, snapshot.as_ref(), &ops, &mut report)?;

        tracing::info!(
            "synced {id}: {} created, {} updated, {} removed",
            ops.creates.len(),
            ops.updates.len(),
            ops.deletes.len(),
        );
        match ops.next_entry {
            Some(files) => {
                self.cache.insert(id, files);
            }
            None => {
                self.cache.remove(&id);
            }
        }

        let report = report.finish();
        self.notify(&report);
        Ok(report)
    }

    /// [`SyncEngine::on_resource_event`] for a bundled event.
    pub fn apply_event(&mut self, event: ResourceEvent) -> Result<SyncReport, SyncError> {
        self.on_resource_event(event.id, event.snapshot)
    }

    /// Whether any name `id` had or now provides is claimed by another resource.
    /// Ownership of such names is only decided by a full sync.
    fn is_contested(&self, id: &ResourceId, snapshot: Option<&Snapshot>) -> bool {
        let cached = self.cache.get(id).into_iter().flat_map(|files| files.keys());
        let shadowed = self.cache.shadowed(id).into_iter().flatten();
        let incoming = snapshot.into_iter().flat_map(|snap| snap.keys());
        cached
            .chain(shadowed)
            .chain(incoming)
            .any(|name| self.cache.claimed_elsewhere(id, name))
    }

    fn notify(&mut self, report: &SyncReport) {
        if let Some(hook) = self.on_sync_complete.as_mut() {
            hook(report);
        }
    }
}
