//! Watch registration and lifecycle
//!
//! The registry is the process-scoped table of active watches. Each watch
//! owns a subscription to the notification primitive, a notification pump
//! that filters and debounces raw notifications, and a classifier loop that
//! turns flushed bursts into callback deliveries. Teardown is cooperative:
//! cancelling a watch's token stops both tasks and releases the OS
//! subscription.
//!
//! File-level watches subscribe at the parent directory rather than the file
//! itself, so the watch survives the file being renamed over; notifications
//! for siblings are discarded in the pump. When identity metadata is
//! unavailable, replace-vs-remove classification falls back to the burst's
//! raw-code shape, which is a best-effort heuristic rather than a guarantee.

use crate::classifier::EventClassifier;
use crate::config::WatcherConfig;
use crate::debouncer::{DebounceCoalescer, FlushCycle};
use crate::events::{ExistenceSnapshot, SemanticEvent, SemanticKind};
use crate::filter::ExclusionFilter;
use crate::source::{NotificationSource, NotifyBackend, Subscription};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use vigil_core::{Error, Result};
use walkdir::WalkDir;

/// Callback invoked for each delivered semantic event
pub type EventCallback = Arc<dyn Fn(SemanticEvent) + Send + Sync>;

/// Opaque handle to an active watch
///
/// Handles are tied to one registration: after `unwatch` or a re-register of
/// the same path, a stale handle is a harmless no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHandle {
    id: u64,
    path: PathBuf,
}

impl WatchHandle {
    /// The originally registered path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One active watch
struct WatchEntry {
    id: u64,
    /// Path the caller registered
    target: PathBuf,
    is_dir: bool,
    /// Subscription root: the target for directories, its parent for files
    sub_root: PathBuf,
    filter: ExclusionFilter,
    callback: EventCallback,
    token: CancellationToken,
}

impl WatchEntry {
    /// Narrow a resolved notification path to this watch's scope
    ///
    /// Directory watches accept everything their subscription reports. A
    /// file-level watch subscribes at the parent, so sibling noise is
    /// dropped here, and an ambiguous report of the root itself falls back
    /// to the watched file.
    fn narrow(&self, affected: PathBuf) -> Option<PathBuf> {
        if self.is_dir {
            return Some(affected);
        }
        if affected == self.target {
            Some(affected)
        } else if affected == self.sub_root {
            Some(self.target.clone())
        } else {
            None
        }
    }
}

/// Process-wide table of active watches
///
/// Starts empty; `unwatch_all` returns it to that state. At most one entry
/// exists per target path — re-registering a path replaces the previous
/// watch rather than duplicating it.
pub struct WatchRegistry {
    config: WatcherConfig,
    entries: Arc<DashMap<PathBuf, Arc<WatchEntry>>>,
    source: Arc<dyn NotificationSource>,
    next_id: AtomicU64,
}

impl WatchRegistry {
    /// Create a registry backed by the platform notification primitive
    pub fn new(config: WatcherConfig) -> Self {
        Self::with_source(config, Arc::new(NotifyBackend::new()))
    }

    pub(crate) fn with_source(config: WatcherConfig, source: Arc<dyn NotificationSource>) -> Self {
        Self {
            config,
            entries: Arc::new(DashMap::new()),
            source,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a watch on `path`
    ///
    /// Fails if the path does not exist at registration time or an exclusion
    /// rule fails to compile. The initial existence snapshot is taken before
    /// this call returns, so the first classification cycle always has a
    /// baseline to compare against.
    pub async fn watch(
        &self,
        path: impl AsRef<Path>,
        exclusion_rules: &[String],
        callback: impl Fn(SemanticEvent) + Send + Sync + 'static,
    ) -> Result<WatchHandle> {
        let target = path.as_ref().to_path_buf();

        let meta = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::invalid_path(&target),
                _ => Error::Io(e),
            })?;
        let is_dir = meta.is_dir();

        let mut rules = self.config.base_exclusions.clone();
        rules.extend(exclusion_rules.iter().cloned());
        let filter = ExclusionFilter::compile(&rules)?;

        // Retire any previous registration for this path before its
        // subscription is replaced, so the old pump winds down quietly
        // instead of reporting a lost subscription.
        if let Some((_, old)) = self.entries.remove(&target) {
            debug!("replacing existing watch for {:?}", target);
            old.token.cancel();
        }

        let sub_root = if is_dir {
            target.clone()
        } else {
            parent_of(&target)
        };
        let subscription =
            self.source
                .subscribe(&sub_root, is_dir, self.config.max_queue_size)?;

        let snapshots = self.seed_snapshots(&target, is_dir, &filter).await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let entry = Arc::new(WatchEntry {
            id,
            target: target.clone(),
            is_dir,
            sub_root,
            filter,
            callback: Arc::new(callback),
            token: token.clone(),
        });

        self.entries.insert(target.clone(), Arc::clone(&entry));

        let (flush_tx, flush_rx) = mpsc::channel(self.config.max_queue_size);
        let coalescer =
            DebounceCoalescer::new(self.config.debounce_duration(), flush_tx.clone(), token);

        tokio::spawn(run_pump(
            Arc::clone(&entry),
            subscription,
            coalescer,
            flush_tx,
        ));
        tokio::spawn(run_classifier(
            Arc::clone(&entry),
            Arc::clone(&self.entries),
            EventClassifier::new(&self.config),
            snapshots,
            flush_rx,
        ));

        debug!("watching {:?} (recursive: {})", entry.target, is_dir);
        Ok(WatchHandle { id, path: target })
    }

    /// Release a watch; idempotent
    ///
    /// No callback fires for this handle after the call returns, apart from
    /// a flush that was already past its point of no return when the token
    /// was cancelled. In-flight raw notifications are dropped silently.
    pub fn unwatch(&self, handle: &WatchHandle) {
        if let Some((_, entry)) = self
            .entries
            .remove_if(&handle.path, |_, entry| entry.id == handle.id)
        {
            debug!("unwatching {:?}", handle.path);
            entry.token.cancel();
        }
    }

    /// Tear down every active watch; safe with zero active watches
    pub fn unwatch_all(&self) {
        debug!("tearing down {} active watches", self.entries.len());
        self.entries.retain(|_, entry| {
            entry.token.cancel();
            false
        });
    }

    /// Number of active watches
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any watches are active
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Probe the target (and, for directories, every non-excluded
    /// descendant) so classification starts from the registration-time state
    async fn seed_snapshots(
        &self,
        target: &Path,
        is_dir: bool,
        filter: &ExclusionFilter,
    ) -> HashMap<PathBuf, ExistenceSnapshot> {
        let mut snapshots = HashMap::new();

        match ExistenceSnapshot::probe(target, self.config.follow_symlinks).await {
            Ok(snapshot) => {
                snapshots.insert(target.to_path_buf(), snapshot);
            }
            Err(e) => warn!("initial probe of {:?} failed: {}", target, e),
        }

        if is_dir {
            let walk = WalkDir::new(target).follow_links(self.config.follow_symlinks);
            for dirent in walk.into_iter().filter_map(|e| e.ok()) {
                let path = dirent.path();
                if path == target || filter.should_ignore(path) {
                    continue;
                }
                if let Ok(meta) = dirent.metadata() {
                    snapshots.insert(path.to_path_buf(), ExistenceSnapshot::from_metadata(&meta));
                }
            }
        }

        snapshots
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

fn parent_of(target: &Path) -> PathBuf {
    target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Drive raw notifications from the subscription into the coalescer
async fn run_pump(
    entry: Arc<WatchEntry>,
    mut subscription: Subscription,
    coalescer: DebounceCoalescer,
    flush_tx: mpsc::Sender<FlushCycle>,
) {
    loop {
        tokio::select! {
            biased;
            _ = entry.token.cancelled() => break,
            raw = subscription.notifications.recv() => {
                let Some(raw) = raw else {
                    // The primitive's stream died underneath the watch
                    if !entry.token.is_cancelled() {
                        warn!("subscription lost for {:?}", entry.target);
                        let _ = flush_tx.send(FlushCycle::SubscriptionLost).await;
                    }
                    break;
                };
                let affected = raw.resolve(&entry.sub_root);
                let Some(affected) = entry.narrow(affected) else {
                    continue;
                };
                if entry.filter.should_ignore(&affected) {
                    trace!("excluded path {:?}", affected);
                    continue;
                }
                coalescer.admit(affected, raw.kind);
            }
        }
    }
    debug!("notification pump stopped for {:?}", entry.target);
}

/// Consume flush cycles: classify, deliver, record
///
/// A single consumer per watch serializes all classification work, so a
/// path's snapshot is always updated before its next burst is examined. The
/// callback runs inline here, which bounds backlog growth for a hot path to
/// the flush channel's capacity.
async fn run_classifier(
    entry: Arc<WatchEntry>,
    entries: Arc<DashMap<PathBuf, Arc<WatchEntry>>>,
    classifier: EventClassifier,
    mut snapshots: HashMap<PathBuf, ExistenceSnapshot>,
    mut flush_rx: mpsc::Receiver<FlushCycle>,
) {
    loop {
        tokio::select! {
            biased;
            _ = entry.token.cancelled() => break,
            cycle = flush_rx.recv() => {
                let Some(cycle) = cycle else { break };
                match cycle {
                    FlushCycle::SubscriptionLost => {
                        (entry.callback)(SemanticEvent::new(
                            SemanticKind::Remove,
                            entry.target.clone(),
                            entry.target.clone(),
                        ));
                        teardown(&entries, &entry);
                        break;
                    }
                    FlushCycle::Burst(path, burst) => {
                        let prior = snapshots
                            .get(&path)
                            .cloned()
                            .unwrap_or_else(ExistenceSnapshot::absent);
                        let decision = classifier
                            .classify(&entry.target, entry.is_dir, &path, &prior, &burst)
                            .await;
                        let Some((kind, probed)) = decision else { continue };

                        debug!(
                            "{} {:?} (burst of {})",
                            kind, path, burst.occurrence_count
                        );
                        (entry.callback)(SemanticEvent::new(
                            kind,
                            entry.target.clone(),
                            path.clone(),
                        ));

                        let terminal =
                            kind == SemanticKind::Remove && entry.is_dir && path == entry.target;
                        snapshots.insert(path, probed);

                        if terminal {
                            // The watched root itself is gone; the
                            // subscription cannot recover.
                            warn!("watched root {:?} removed, tearing down", entry.target);
                            teardown(&entries, &entry);
                            break;
                        }
                    }
                }
            }
        }
    }
    debug!("classifier stopped for {:?}", entry.target);
}

fn teardown(entries: &DashMap<PathBuf, Arc<WatchEntry>>, entry: &WatchEntry) {
    entries.remove_if(&entry.target, |_, e| e.id == entry.id);
    entry.token.cancel();
}
