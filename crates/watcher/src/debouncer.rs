//! Raw notification debouncing
//!
//! Collapses bursts of raw notifications arriving within a short window into
//! a single classification cycle per affected path. A path's window extends
//! on each arrival; once the path has been quiet for a full window its burst
//! is flushed downstream exactly once.

#![allow(dead_code)]

use crate::events::{PendingBurst, RawKind};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One unit of work handed to the classifier
pub(crate) enum FlushCycle {
    /// A path quiesced; classify its accumulated burst
    Burst(PathBuf, PendingBurst),
    /// The subscription died underneath the watch
    SubscriptionLost,
}

/// Per-watch debounce state
///
/// Timers for distinct paths run independently; the flush channel serializes
/// everything downstream, so no two classification cycles for the same path
/// can overlap.
pub(crate) struct DebounceCoalescer {
    /// Debounce window duration
    window: Duration,
    /// Pending burst per affected path
    pending: Arc<DashMap<PathBuf, PendingBurst>>,
    /// Channel to the classifier
    flush_tx: mpsc::Sender<FlushCycle>,
    /// Cancelled on unwatch; suppresses any flush not yet past the point of
    /// no return
    token: CancellationToken,
}

impl DebounceCoalescer {
    pub(crate) fn new(
        window: Duration,
        flush_tx: mpsc::Sender<FlushCycle>,
        token: CancellationToken,
    ) -> Self {
        Self {
            window,
            pending: Arc::new(DashMap::new()),
            flush_tx,
            token,
        }
    }

    /// Admit a raw notification for `path`
    ///
    /// The first notification for a quiet path schedules its flush timer;
    /// later ones fold into the pending burst and extend the window.
    pub(crate) fn admit(&self, path: PathBuf, kind: RawKind) {
        let mut scheduled = false;

        self.pending
            .entry(path.clone())
            .and_modify(|burst| {
                trace!("extending burst for {:?}", path);
                burst.absorb(kind);
            })
            .or_insert_with(|| {
                scheduled = true;
                PendingBurst::new(kind)
            });

        if scheduled {
            debug!("new burst for {:?}", path);
            self.schedule_flush(path);
        }
    }

    /// Number of paths with a pending burst
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn schedule_flush(&self, path: PathBuf) {
        let pending = Arc::clone(&self.pending);
        let flush_tx = self.flush_tx.clone();
        let window = self.window;
        let token = self.token.clone();

        tokio::spawn(async move {
            let mut delay = window;
            loop {
                sleep(delay).await;

                if token.is_cancelled() {
                    return;
                }

                // Removal under the shard lock is the point of no return:
                // once the burst is taken, the flush completes even if the
                // watch is torn down concurrently.
                match pending.remove_if(&path, |_, burst| burst.quiesced(window)) {
                    Some((path, burst)) => {
                        trace!(
                            "flushing burst of {} for {:?}",
                            burst.occurrence_count,
                            path
                        );
                        let _ = flush_tx.send(FlushCycle::Burst(path, burst)).await;
                        return;
                    }
                    None => {
                        // Still hot (window was extended) or gone entirely.
                        match pending.get(&path) {
                            Some(burst) => {
                                delay = window.saturating_sub(burst.last_extended.elapsed());
                            }
                            None => return,
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn coalescer(
        window_ms: u64,
    ) -> (
        DebounceCoalescer,
        mpsc::Receiver<FlushCycle>,
        CancellationToken,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        (
            DebounceCoalescer::new(Duration::from_millis(window_ms), tx, token.clone()),
            rx,
            token,
        )
    }

    fn expect_burst(cycle: FlushCycle) -> (PathBuf, PendingBurst) {
        match cycle {
            FlushCycle::Burst(path, burst) => (path, burst),
            FlushCycle::SubscriptionLost => panic!("unexpected lost-subscription cycle"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_flushes_once() {
        let (coalescer, mut rx, _token) = coalescer(75);
        let path = PathBuf::from("/w/file.txt");

        coalescer.admit(path.clone(), RawKind::Data);
        coalescer.admit(path.clone(), RawKind::Name);
        coalescer.admit(path.clone(), RawKind::Data);

        let (flushed, burst) = expect_burst(rx.recv().await.expect("one flush"));
        assert_eq!(flushed, path);
        assert_eq!(burst.occurrence_count, 3);
        assert!(burst.saw_name_code);

        assert!(rx.try_recv().is_err(), "burst must flush exactly once");
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_extends_window() {
        let (coalescer, mut rx, _token) = coalescer(75);
        let path = PathBuf::from("/w/file.txt");

        coalescer.admit(path.clone(), RawKind::Data);
        sleep(Duration::from_millis(50)).await;
        coalescer.admit(path.clone(), RawKind::Data);

        // 75ms after the first arrival the path is still hot
        sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err(), "window should have extended");

        let (_, burst) = expect_burst(rx.recv().await.expect("flush after quiet window"));
        assert_eq!(burst.occurrence_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_paths_flush_independently() {
        let (coalescer, mut rx, _token) = coalescer(75);

        coalescer.admit(PathBuf::from("/w/a"), RawKind::Data);
        coalescer.admit(PathBuf::from("/w/b"), RawKind::Name);
        assert_eq!(coalescer.pending_count(), 2);

        let mut flushed = vec![
            expect_burst(rx.recv().await.expect("first flush")).0,
            expect_burst(rx.recv().await.expect("second flush")).0,
        ];
        flushed.sort();
        assert_eq!(flushed, vec![PathBuf::from("/w/a"), PathBuf::from("/w/b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_suppresses_pending_flush() {
        let (coalescer, mut rx, token) = coalescer(75);

        coalescer.admit(PathBuf::from("/w/file.txt"), RawKind::Data);
        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        match outcome {
            Err(_elapsed) => {} // nothing flushed within 500ms
            Ok(None) => {}      // or the channel closed outright
            Ok(Some(_)) => panic!("cancelled burst must not flush"),
        }
    }
}
