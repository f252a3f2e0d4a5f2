//! Notification primitive abstraction
//!
//! The platform's change-notification facility is consumed as a black box:
//! subscribe to a root, receive raw `(code, path)` notifications until the
//! subscription is dropped. The production implementation sits on the
//! `notify` crate; tests script their own notification sequences through the
//! same seam.

use crate::events::{RawKind, RawNotification};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::error;
use vigil_core::{Error, Result};

/// A live subscription to raw notifications for one root path
///
/// Dropping the subscription releases the underlying OS resources; the
/// receiver then yields `None`, which consumers treat as a lost
/// subscription unless they initiated the drop themselves.
pub(crate) struct Subscription {
    pub(crate) notifications: mpsc::Receiver<RawNotification>,
    _keepalive: Option<Box<dyn std::any::Any + Send>>,
}

impl Subscription {
    pub(crate) fn new(
        notifications: mpsc::Receiver<RawNotification>,
        keepalive: Option<Box<dyn std::any::Any + Send>>,
    ) -> Self {
        Self {
            notifications,
            _keepalive: keepalive,
        }
    }
}

/// Capability interface over the platform notification primitive
pub(crate) trait NotificationSource: Send + Sync + 'static {
    /// Subscribe to raw notifications for `root`
    ///
    /// `recursive` covers descendants as well; `capacity` bounds the number
    /// of undelivered notifications before the primitive starts shedding.
    fn subscribe(&self, root: &Path, recursive: bool, capacity: usize) -> Result<Subscription>;
}

/// Production source backed by `notify::RecommendedWatcher`
#[derive(Default)]
pub(crate) struct NotifyBackend;

impl NotifyBackend {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl NotificationSource for NotifyBackend {
    fn subscribe(&self, root: &Path, recursive: bool, capacity: usize) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(capacity);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    for raw in raw_notifications(event) {
                        if let Err(e) = tx.try_send(raw) {
                            error!("failed to queue raw notification: {}", e);
                        }
                    }
                }
                Err(e) => {
                    error!("notify backend error: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::subscribe(format!("failed to create watcher: {e}")))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(root, mode)
            .map_err(|e| Error::subscribe(format!("failed to watch {root:?}: {e}")))?;

        Ok(Subscription::new(rx, Some(Box::new(watcher))))
    }
}

/// Collapse a notify event into raw notifications, one per reported path
///
/// Access events are pure read noise and produce nothing. Rename-class
/// modifications count as name codes alongside create/remove; everything
/// else a platform reports about content or metadata is a data code.
fn raw_notifications(event: NotifyEvent) -> Vec<RawNotification> {
    use notify::event::ModifyKind;

    let kind = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) | EventKind::Remove(_) => RawKind::Name,
        EventKind::Modify(ModifyKind::Name(_)) => RawKind::Name,
        EventKind::Modify(_) => RawKind::Data,
        EventKind::Any | EventKind::Other => RawKind::Data,
    };

    if event.paths.is_empty() {
        vec![RawNotification::bare(kind)]
    } else {
        event
            .paths
            .into_iter()
            .map(|path| RawNotification {
                kind,
                path: Some(path),
            })
            .collect()
    }
}
