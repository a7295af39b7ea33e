//! Owned client state and its wiring to backend events.

use std::sync::{Arc, Mutex, PoisonError};

use journal_common::NotificationQueue;
use journal_config::{DocumentRoot, LocaleStore, OsLocale, PreferenceStore, SelectedUserStore, ThemeStore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actions::JournalActions;
use crate::backend::{BackendApi, PushChannel};
use crate::bridge::{EventBridge, EventHandlers, Subscription};
use crate::cache::InstanceCache;
use crate::readiness::ReadinessGate;
use crate::users::UserDirectory;

/// External collaborators [`JournalState`] is built from.
pub struct Collaborators {
    pub api: Arc<dyn BackendApi>,
    pub channel: Arc<dyn PushChannel>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub document: Arc<dyn DocumentRoot>,
    pub os_locale: Arc<dyn OsLocale>,
}

/// Every piece of client state, created once at startup.
pub struct JournalState {
    bridge: EventBridge,
    os_locale: Arc<dyn OsLocale>,
    notifications: NotificationQueue,
    locale: Arc<LocaleStore>,
    theme: Arc<ThemeStore>,
    selection: Arc<SelectedUserStore>,
    users: Arc<UserDirectory>,
    cache: Arc<InstanceCache>,
    actions: JournalActions,
    filter_watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl JournalState {
    pub fn new(c: Collaborators) -> Self {
        let notifications = NotificationQueue::new();
        let locale = Arc::new(LocaleStore::new(c.preferences.clone()));
        let theme = Arc::new(ThemeStore::new(c.preferences.clone(), c.document));
        let selection = Arc::new(SelectedUserStore::new(c.preferences));
        let users = Arc::new(UserDirectory::new(c.api.clone(), selection.clone()));
        let cache = Arc::new(InstanceCache::new(
            c.api.clone(),
            notifications.clone(),
            locale.subscribe(),
        ));
        let actions = JournalActions::new(c.api.clone(), notifications.clone(), locale.subscribe());
        let bridge = EventBridge::new(c.api, c.channel, Arc::new(ReadinessGate::new()));

        Self {
            bridge,
            os_locale: c.os_locale,
            notifications,
            locale,
            theme,
            selection,
            users,
            cache,
            actions,
            filter_watcher: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolve the persisted preferences and subscribe to backend events.
    /// Must be called inside a tokio runtime.
    pub async fn start(&self) -> Subscription {
        let locale = self.locale.init(self.os_locale.as_ref()).await;
        let theme = self.theme.init();
        info!(%locale, theme = theme.as_str(), selected = %self.selection.selected(), "preferences restored");
        self.bridge.subscribe(self.handlers())
    }

    /// Unsubscribe and stop reloading on filter changes.
    pub fn stop(&self, subscription: &Subscription) {
        subscription.unsubscribe();
        let watcher = self
            .filter_watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        debug!("journal state stopped");
    }

    fn handlers(&self) -> EventHandlers {
        let users = self.users.clone();
        let cache = self.cache.clone();
        let selection = self.selection.clone();
        let watcher = self.filter_watcher.clone();
        let on_ready = move || {
            spawn_user_load(&users);
            let mut slot = watcher.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(cache.watch_filter(selection.subscribe()));
            }
        };

        let users = self.users.clone();
        let on_local_player = move || spawn_user_load(&users);

        let cache = self.cache.clone();
        let on_ended = move |id: i64, ended_at: &str| {
            cache.reconcile_ended(id, ended_at);
        };

        let (created, joined, left) = (self.cache.clone(), self.cache.clone(), self.cache.clone());
        EventHandlers::new()
            .on_backend_ready(on_ready)
            .on_local_player_updated(on_local_player)
            .on_instance_ended(on_ended)
            .on_instance_created(move || created.mark_stale())
            .on_player_joined(move || joined.mark_stale())
            .on_player_left(move || left.mark_stale())
    }

    pub fn gate(&self) -> &Arc<ReadinessGate> {
        self.bridge.gate()
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn locale(&self) -> &LocaleStore {
        &self.locale
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    pub fn selection(&self) -> &SelectedUserStore {
        &self.selection
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn cache(&self) -> &Arc<InstanceCache> {
        &self.cache
    }

    pub fn actions(&self) -> &JournalActions {
        &self.actions
    }
}

fn spawn_user_load(users: &Arc<UserDirectory>) {
    let users = users.clone();
    tokio::spawn(async move { users.load_users().await });
}
