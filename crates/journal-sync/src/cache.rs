//! Client-side read model of recorded instances.
//!
//! Loads are stamped with a generation number at call time. A response
//! whose stamp has been superseded is dropped, so rapid filter changes can
//! never leave an older result on screen.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use journal_common::{Instance, InstanceStatus, Locale, MessageKey, NotificationQueue, UserFilter};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::backend::{BackendApi, INSTANCE_PAGE_LIMIT};

/// What became of a [`InstanceCache::load`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response replaced the collection.
    Applied,
    /// A newer load was issued before this one resolved; nothing changed.
    Stale,
    /// The fetch failed; the prior collection is kept.
    Failed,
}

/// Generation counter and the loading flag it drives.
struct LoadTracker {
    generation: AtomicU64,
    loading: watch::Sender<bool>,
}

impl LoadTracker {
    fn issue(self: &Arc<Self>) -> LoadTicket {
        let id = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.loading.send_replace(true);
        LoadTicket {
            tracker: Arc::clone(self),
            id,
        }
    }

    fn is_current(&self, id: u64) -> bool {
        self.generation.load(Ordering::Acquire) == id
    }
}

/// Stamp of one load. Dropping it, whether the load finished or was
/// cancelled, clears the loading flag unless a newer load was issued.
struct LoadTicket {
    tracker: Arc<LoadTracker>,
    id: u64,
}

impl LoadTicket {
    fn is_current(&self) -> bool {
        self.tracker.is_current(self.id)
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        let tracker = &self.tracker;
        let id = self.id;
        // Checked under the flag's lock so a newer `issue` always lands after.
        tracker.loading.send_if_modified(|loading| {
            if *loading && tracker.is_current(id) {
                *loading = false;
                true
            } else {
                false
            }
        });
    }
}

pub struct InstanceCache {
    api: Arc<dyn BackendApi>,
    notifications: NotificationQueue,
    locale: watch::Receiver<Locale>,
    instances: watch::Sender<Vec<Instance>>,
    stale: watch::Sender<bool>,
    tracker: Arc<LoadTracker>,
}

impl InstanceCache {
    pub fn new(
        api: Arc<dyn BackendApi>,
        notifications: NotificationQueue,
        locale: watch::Receiver<Locale>,
    ) -> Self {
        let (instances, _) = watch::channel(Vec::new());
        let (loading, _) = watch::channel(false);
        let (stale, _) = watch::channel(false);
        Self {
            api,
            notifications,
            locale,
            instances,
            stale,
            tracker: Arc::new(LoadTracker {
                generation: AtomicU64::new(0),
                loading,
            }),
        }
    }

    /// Fetch the instances for `filter` and replace the collection.
    ///
    /// The load is stamped when this is called, not when the future is
    /// first polled. Dropping the future cancels the load.
    pub fn load(&self, filter: UserFilter) -> impl Future<Output = LoadOutcome> + Send + '_ {
        let ticket = self.tracker.issue();
        self.fetch(ticket, filter)
    }

    /// Mark the instance with `instance_id` as completed at `ended_at`.
    /// Returns `false` if it is not in the collection.
    pub fn reconcile_ended(&self, instance_id: i64, ended_at: &str) -> bool {
        let updated = self.instances.send_if_modified(|list| {
            match list.iter_mut().find(|i| i.id == instance_id) {
                Some(instance) => {
                    instance.status = InstanceStatus::Completed;
                    instance.ended_at = Some(ended_at.to_string());
                    true
                }
                None => false,
            }
        });
        if updated {
            debug!(instance_id, ended_at, "instance marked completed");
        } else {
            debug!(instance_id, "ended instance not loaded, ignoring");
        }
        updated
    }

    /// Flag the collection as possibly out of date without fetching.
    pub fn mark_stale(&self) {
        if self.stale.send_if_modified(|stale| !std::mem::replace(stale, true)) {
            debug!("instance list marked stale");
        }
    }

    /// Load for the current filter now and again whenever it changes.
    ///
    /// The task ends once the filter's sender is dropped and the loads it
    /// started have finished. Aborting the task cancels those loads.
    pub fn watch_filter(self: &Arc<Self>, mut filter: watch::Receiver<UserFilter>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut loads = JoinSet::new();
            'watch: loop {
                let current = *filter.borrow_and_update();
                let ticket = cache.tracker.issue();
                let loader = Arc::clone(&cache);
                loads.spawn(async move { loader.fetch(ticket, current).await });

                loop {
                    tokio::select! {
                        changed = filter.changed() => {
                            if changed.is_err() {
                                break 'watch;
                            }
                            break;
                        }
                        Some(_) = loads.join_next(), if !loads.is_empty() => {}
                    }
                }
            }
            while loads.join_next().await.is_some() {}
            debug!("user filter closed, instance watcher stopped");
        })
    }

    pub fn instances(&self) -> Vec<Instance> {
        self.instances.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.tracker.loading.borrow()
    }

    pub fn is_stale(&self) -> bool {
        *self.stale.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Instance>> {
        self.instances.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.tracker.loading.subscribe()
    }

    pub fn subscribe_stale(&self) -> watch::Receiver<bool> {
        self.stale.subscribe()
    }

    async fn fetch(&self, ticket: LoadTicket, filter: UserFilter) -> LoadOutcome {
        let result = self.api.fetch_instances(filter, INSTANCE_PAGE_LIMIT).await;
        if !ticket.is_current() {
            debug!(%filter, ticket = ticket.id, "discarding superseded instance load");
            return LoadOutcome::Stale;
        }

        match result {
            Ok(list) => {
                let count = list.len();
                // The stamp is rechecked under the collection's lock, so a
                // newer load always writes after this one.
                let applied = self.instances.send_if_modified(|current| {
                    if !ticket.is_current() {
                        return false;
                    }
                    *current = list;
                    true
                });
                if !applied {
                    debug!(%filter, ticket = ticket.id, "discarding superseded instance load");
                    return LoadOutcome::Stale;
                }
                info!(%filter, count, "instances loaded");
                self.stale.send_replace(false);
                LoadOutcome::Applied
            }
            Err(e) => {
                error!(%filter, "failed to load instances: {e}");
                let locale = *self.locale.borrow();
                self.notifications
                    .error(MessageKey::InstanceLoadFailed.with_detail(locale, &e));
                LoadOutcome::Failed
            }
        }
    }
}
