use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::MissedTickBehavior;

use configbump_core::{ManifestDirStore, ResourceEvent, ResourceStore, Selector};
use configbump_sync::{SyncEngine, SyncError, SyncReport};

use crate::config::{DaemonConfig, SYNC_QUEUE_DEPTH};
use crate::error::{io_err, DaemonError};
use crate::watch::{diff_listings, listing_from, touches_manifests, Listing};

type SharedEngine<S> = Arc<Mutex<SyncEngine<S>>>;

#[derive(Debug)]
enum Job {
    Event(ResourceEvent),
    FullSync { reason: &'static str },
}

impl Job {
    fn label(&self) -> String {
        match self {
            Job::Event(event) => event.id.to_string(),
            Job::FullSync { reason } => format!("full sync ({reason})"),
        }
    }
}

/// Full resync requests after a failed pass. At most one is outstanding.
#[derive(Clone)]
struct RetryScheduler {
    jobs: mpsc::Sender<Job>,
    delay: Duration,
    pending: Arc<AtomicBool>,
}

impl RetryScheduler {
    fn new(jobs: mpsc::Sender<Job>, delay: Duration) -> Self {
        Self {
            jobs,
            delay,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    fn schedule(&self) {
        if self.pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let jobs = self.jobs.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = jobs.send(Job::FullSync { reason: "retry" }).await;
        });
    }

    /// A full sync is starting; it covers whatever the pending retry was for.
    fn clear(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

/// Build a multi-threaded runtime and run the daemon until ctrl-c.
pub fn start_blocking(config: DaemonConfig) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon until ctrl-c is received.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    run_with_shutdown(config, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received ctrl-c, shutting down"),
            Err(err) => tracing::error!(error = %err, "ctrl-c handler failed, shutting down"),
        }
    })
    .await
}

/// Run the daemon until `shutdown_signal` resolves or a task fails.
///
/// The initial full sync must succeed; its error is returned before any
/// background task starts.
pub async fn run_with_shutdown<F>(
    config: DaemonConfig,
    shutdown_signal: F,
) -> Result<(), DaemonError>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Watch before the first listing so no change slips between the two.
    let (fs_tx, fs_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = fs_tx.send(event);
    })?;
    watcher.watch(&config.manifests_dir, RecursiveMode::NonRecursive)?;

    let listing_store = ManifestDirStore::new(&config.manifests_dir);
    let baseline = list_resources(listing_store.clone(), config.selector.clone()).await??;

    let engine = SyncEngine::new(
        ManifestDirStore::new(&config.manifests_dir),
        config.selector.clone(),
        &config.target_dir,
    )
    .with_sync_hook(log_sync_complete);
    let engine: SharedEngine<_> = Arc::new(Mutex::new(engine));
    run_job(engine.clone(), Job::FullSync { reason: "startup" }).await??;

    tracing::info!(
        target_dir = %config.target_dir.display(),
        manifests_dir = %config.manifests_dir.display(),
        selector = %config.selector.labels,
        resources = baseline.len(),
        "daemon started",
    );

    let (job_tx, job_rx) = mpsc::channel::<Job>(SYNC_QUEUE_DEPTH);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let source = ListingSource {
            store: listing_store,
            selector: config.selector.clone(),
            debounce: config.debounce,
        };
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result = watcher_task(watcher, source, baseline, fs_rx, job_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let retry = RetryScheduler::new(job_tx.clone(), config.retry_delay);
        tokio::spawn(async move {
            let result = processor_task(engine, job_rx, retry, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let resync_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let interval = config.resync_interval;
        tokio::spawn(async move {
            let result = resync_task(interval, job_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                _ = shutdown_signal => {
                    let _ = shutdown.send(());
                }
            }
            Ok(())
        })
    };

    let (watcher_result, processor_result, resync_result, signal_result) =
        tokio::join!(watcher_handle, processor_handle, resync_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("resync", resync_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

struct ListingSource {
    store: ManifestDirStore,
    selector: Selector,
    debounce: Duration,
}

async fn watcher_task(
    _watcher: RecommendedWatcher,
    source: ListingSource,
    mut listing: Listing,
    mut fs_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = fs_rx.recv() => {
                let Some(event) = event else { break };
                if !wants_relist(event) {
                    continue;
                }

                // Let a burst of saves settle, then fold it into one relist.
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(source.debounce) => {}
                }
                while fs_rx.try_recv().is_ok() {}

                let relisted = list_resources(source.store.clone(), source.selector.clone()).await?;
                let current = match relisted {
                    Ok(current) => current,
                    Err(err) => {
                        tracing::warn!(error = %err, "manifest listing failed, keeping previous state");
                        continue;
                    }
                };

                let events = diff_listings(&listing, &current);
                listing = current;
                tracing::debug!(events = events.len(), "manifests relisted");
                for event in events {
                    if job_tx.send(Job::Event(event)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

fn wants_relist(event: notify::Result<Event>) -> bool {
    match event {
        Ok(event) => touches_manifests(&event),
        Err(err) => {
            // Events may have been lost; a relist recovers them.
            tracing::warn!(error = %err, "watcher event error");
            true
        }
    }
}

async fn processor_task<S>(
    engine: SharedEngine<S>,
    mut job_rx: mpsc::Receiver<Job>,
    retry: RetryScheduler,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    S: ResourceStore + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                if matches!(job, Job::FullSync { .. }) {
                    retry.clear();
                }
                let label = job.label();
                if let Err(err) = run_job(engine.clone(), job).await? {
                    tracing::error!(job = %label, error = %err, "sync failed, scheduling full resync");
                    retry.schedule();
                }
            }
        }
    }

    Ok(())
}

async fn resync_task(
    interval: Duration,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if interval.is_zero() {
        let _ = shutdown_rx.recv().await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately and startup already synced.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if job_tx.send(Job::FullSync { reason: "periodic" }).await.is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Run one job on the blocking pool. The outer error is a task failure, the
/// inner one a failed sync pass.
async fn run_job<S>(
    engine: SharedEngine<S>,
    job: Job,
) -> Result<Result<SyncReport, SyncError>, DaemonError>
where
    S: ResourceStore + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut engine = engine.blocking_lock();
        match job {
            Job::Event(event) => engine.apply_event(event),
            Job::FullSync { .. } => engine.full_sync(),
        }
    })
    .await
    .map_err(|err| DaemonError::Task(format!("sync job join error: {err}")))
}

async fn list_resources(
    store: ManifestDirStore,
    selector: Selector,
) -> Result<Result<Listing, configbump_core::StoreError>, DaemonError> {
    tokio::task::spawn_blocking(move || store.list_matching(&selector).map(listing_from))
        .await
        .map_err(|err| DaemonError::Task(format!("listing join error: {err}")))
}

fn log_sync_complete(report: &SyncReport) {
    tracing::info!(
        pass = ?report.pass,
        written = report.written(),
        removed = report.removed(),
        unchanged = report.unchanged(),
        skipped = report.skipped.len(),
        finished_at = %report.finished_at,
        "sync completed",
    );
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global subscriber on stderr. `RUST_LOG` overrides the
/// default `info`; `log` records are bridged as well.
///
/// Fails if a global subscriber or `log` logger is already installed.
pub fn init_tracing(json: bool) -> Result<(), DaemonError> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| DaemonError::Tracing(err.to_string()))
}
