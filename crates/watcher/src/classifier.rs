//! Semantic event classification
//!
//! Given one flushed burst for a path, the prior tracked snapshot, and a
//! fresh existence probe, decide which semantic event (if any) actually
//! happened. Raw codes are treated as hints only; the probe is the source of
//! truth for existence, and identity metadata disambiguates
//! rename-over-target from in-place modification where the platform provides
//! it.

use crate::config::WatcherConfig;
use crate::events::{ExistenceSnapshot, PendingBurst, SemanticKind};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Stateless classification engine, one per watch
pub(crate) struct EventClassifier {
    probe_retry_delay: Duration,
    follow_symlinks: bool,
}

impl EventClassifier {
    pub(crate) fn new(config: &WatcherConfig) -> Self {
        Self {
            probe_retry_delay: config.probe_retry_delay(),
            follow_symlinks: config.follow_symlinks,
        }
    }

    /// Classify one flush cycle
    ///
    /// Returns the event to deliver together with the snapshot to record
    /// after delivery, or `None` when the cycle produces no observable
    /// transition (or the probe failed twice, in which case the tracked
    /// snapshot must stay untouched so the next cycle re-evaluates from the
    /// same baseline).
    pub(crate) async fn classify(
        &self,
        watched: &Path,
        is_dir_watch: bool,
        affected: &Path,
        prior: &ExistenceSnapshot,
        burst: &PendingBurst,
    ) -> Option<(SemanticKind, ExistenceSnapshot)> {
        let probed = self.probe_with_retry(affected).await?;
        let kind = decide(watched, is_dir_watch, affected, prior, &probed, burst)?;
        Some((kind, probed))
    }

    /// Probe with a single retry; transient failures never reach the caller
    async fn probe_with_retry(&self, path: &Path) -> Option<ExistenceSnapshot> {
        match ExistenceSnapshot::probe(path, self.follow_symlinks).await {
            Ok(snapshot) => Some(snapshot),
            Err(first) => {
                warn!("probe of {:?} failed ({}), retrying once", path, first);
                sleep(self.probe_retry_delay).await;
                match ExistenceSnapshot::probe(path, self.follow_symlinks).await {
                    Ok(snapshot) => Some(snapshot),
                    Err(second) => {
                        warn!(
                            "probe of {:?} failed again ({}), suppressing cycle",
                            path, second
                        );
                        None
                    }
                }
            }
        }
    }
}

/// The decision table
///
/// Replace-vs-create hinges on whether the path is the watched target of a
/// file-level watch: a reappearing or identity-swapped target was renamed
/// over, while a new path under a directory watch is a plain create. When no
/// identity metadata is available the name-code shape of the burst stands in
/// for it (best effort; see the registry docs).
fn decide(
    watched: &Path,
    is_dir_watch: bool,
    affected: &Path,
    prior: &ExistenceSnapshot,
    probed: &ExistenceSnapshot,
    burst: &PendingBurst,
) -> Option<SemanticKind> {
    let is_file_target = !is_dir_watch && affected == watched;

    match (prior.exists, probed.exists) {
        (false, true) => {
            if is_file_target && (burst.saw_name_code || identity_swapped(prior, probed)) {
                Some(SemanticKind::Replace)
            } else {
                Some(SemanticKind::Create)
            }
        }
        (true, false) => Some(SemanticKind::Remove),
        (true, true) => {
            if prior.matches(probed) {
                // Net-zero flicker inside the window, or pure read noise
                None
            } else if is_file_target && burst.saw_name_code && identity_swapped(prior, probed) {
                Some(SemanticKind::Replace)
            } else {
                Some(SemanticKind::Change)
            }
        }
        (false, false) => None,
    }
}

fn identity_swapped(prior: &ExistenceSnapshot, probed: &ExistenceSnapshot) -> bool {
    match (prior.file_id, probed.file_id) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RawKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn classifier() -> EventClassifier {
        EventClassifier::new(&WatcherConfig::default())
    }

    fn data_burst() -> PendingBurst {
        PendingBurst::new(RawKind::Data)
    }

    fn name_burst() -> PendingBurst {
        PendingBurst::new(RawKind::Name)
    }

    async fn write(path: &Path, contents: &str) {
        tokio::fs::write(path, contents).await.expect("write");
        // Keep consecutive writes from landing inside one mtime granule
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn snapshot(path: &Path) -> ExistenceSnapshot {
        ExistenceSnapshot::probe(path, false).await.expect("probe")
    }

    #[tokio::test]
    async fn test_in_place_write_is_change() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("watched.txt");
        write(&file, "one").await;
        let prior = snapshot(&file).await;

        write(&file, "two").await;

        let (kind, probed) = classifier()
            .classify(&file, false, &file, &prior, &data_burst())
            .await
            .expect("a write must classify");
        assert_eq!(kind, SemanticKind::Change);
        assert!(probed.exists);
    }

    #[tokio::test]
    async fn test_unchanged_path_is_silent() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("watched.txt");
        write(&file, "one").await;
        let prior = snapshot(&file).await;

        let decision = classifier()
            .classify(&file, false, &file, &prior, &data_burst())
            .await;
        assert!(decision.is_none(), "no net transition, no event");
    }

    #[tokio::test]
    async fn test_deletion_is_remove() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("watched.txt");
        write(&file, "one").await;
        let prior = snapshot(&file).await;

        tokio::fs::remove_file(&file).await.expect("remove");

        let (kind, probed) = classifier()
            .classify(&file, false, &file, &prior, &name_burst())
            .await
            .expect("a deletion must classify");
        assert_eq!(kind, SemanticKind::Remove);
        assert!(!probed.exists);
    }

    #[tokio::test]
    async fn test_new_child_under_directory_watch_is_create() {
        let dir = TempDir::new().expect("test setup failed");
        let child = dir.path().join("fresh.txt");
        let prior = ExistenceSnapshot::absent();

        write(&child, "hello").await;

        let (kind, _) = classifier()
            .classify(dir.path(), true, &child, &prior, &name_burst())
            .await
            .expect("a new child must classify");
        assert_eq!(kind, SemanticKind::Create);
    }

    #[tokio::test]
    async fn test_rename_over_watched_file_is_replace() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("watched.txt");
        write(&file, "original").await;
        let prior = snapshot(&file).await;

        let staged = dir.path().join("staged.txt");
        write(&staged, "replacement").await;
        tokio::fs::rename(&staged, &file).await.expect("rename");

        let (kind, _) = classifier()
            .classify(&file, false, &file, &prior, &name_burst())
            .await
            .expect("rename-over must classify");
        #[cfg(unix)]
        assert_eq!(kind, SemanticKind::Replace);
        #[cfg(not(unix))]
        assert!(matches!(kind, SemanticKind::Replace | SemanticKind::Change));
    }

    #[tokio::test]
    async fn test_remove_and_recreate_within_window_is_single_replace() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("watched.txt");
        write(&file, "original").await;
        let prior = snapshot(&file).await;

        // Both transitions land in one burst; only the final state counts
        tokio::fs::remove_file(&file).await.expect("remove");
        write(&file, "recreated").await;

        let mut burst = name_burst();
        burst.absorb(RawKind::Name);

        let (kind, _) = classifier()
            .classify(&file, false, &file, &prior, &burst)
            .await
            .expect("net transition must classify");
        assert!(
            matches!(kind, SemanticKind::Replace | SemanticKind::Change),
            "a within-window remove+recreate must never produce a remove"
        );
    }

    #[tokio::test]
    async fn test_reappearing_file_target_is_replace() {
        let dir = TempDir::new().expect("test setup failed");
        let file = dir.path().join("watched.txt");

        // Tracker recorded the remove; the path now reappears
        let prior = ExistenceSnapshot::absent();
        write(&file, "new body").await;

        let (kind, _) = classifier()
            .classify(&file, false, &file, &prior, &name_burst())
            .await
            .expect("reappearance must classify");
        assert_eq!(kind, SemanticKind::Replace);
    }

    #[tokio::test]
    async fn test_still_absent_path_is_silent() {
        let missing = PathBuf::from("/no/such/path/anywhere");
        let prior = ExistenceSnapshot::absent();

        let decision = classifier()
            .classify(&missing, false, &missing, &prior, &name_burst())
            .await;
        assert!(decision.is_none());
    }
}
