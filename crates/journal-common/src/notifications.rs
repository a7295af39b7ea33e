use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;

/// Lifetime of a notification when the caller does not pick one.
pub const DEFAULT_TTL_MS: u64 = 3000;

/// What a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// A transient, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    /// Milliseconds until automatic removal; `0` keeps it until removed.
    pub ttl_ms: u64,
}

struct QueueInner {
    items: watch::Sender<Vec<Notification>>,
    next_id: AtomicU64,
}

/// Ordered queue of visible notifications with timed expiry.
///
/// Cloning yields another handle to the same queue. Entries are only ever
/// appended or removed, so ids are unique among visible entries and
/// insertion order is display order.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        let (items, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(QueueInner {
                items,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Append a notification and return its id.
    ///
    /// With `ttl_ms > 0` the entry is removed after that long on a tokio
    /// timer. Outside a runtime the entry stays until removed explicitly.
    pub fn add(&self, message: impl Into<String>, kind: NotificationKind, ttl_ms: u64) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id,
            message: message.into(),
            kind,
            ttl_ms,
        };
        tracing::debug!(id, ?kind, ttl_ms, "notification added");
        self.inner.items.send_modify(|items| items.push(notification));

        if ttl_ms > 0 {
            self.schedule_expiry(id, Duration::from_millis(ttl_ms));
        }
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.add(message, NotificationKind::Success, DEFAULT_TTL_MS)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.add(message, NotificationKind::Error, DEFAULT_TTL_MS)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.add(message, NotificationKind::Info, DEFAULT_TTL_MS)
    }

    /// Remove the entry with `id`. Returns `false` if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        remove_from(&self.inner, id)
    }

    /// Snapshot of the visible notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.items.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.items.subscribe()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    fn schedule_expiry(&self, id: u64, ttl: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(id, "no tokio runtime, notification will not expire");
            return;
        };
        let queue: Weak<QueueInner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = queue.upgrade() {
                remove_from(&inner, id);
            }
        });
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_from(inner: &QueueInner, id: u64) -> bool {
    inner.items.send_if_modified(|items| {
        match items.iter().position(|n| n.id == id) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    })
}
