//! Which local account the history views are filtered to.

use std::sync::Arc;

use journal_common::{LocalUser, UserFilter};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::store::{persist, PreferenceKey, PreferenceStore};

pub struct SelectedUserStore {
    store: Arc<dyn PreferenceStore>,
    selected: watch::Sender<UserFilter>,
}

impl SelectedUserStore {
    /// Restore the persisted selection. A missing value means
    /// [`UserFilter::All`]; a malformed one is reset to it and re-persisted.
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        let selected = match store.get(PreferenceKey::SelectedUser) {
            Some(raw) => UserFilter::parse(&raw).unwrap_or_else(|| {
                debug!(saved = %raw, "resetting malformed saved user selection");
                persist(store.as_ref(), PreferenceKey::SelectedUser, &UserFilter::All.to_string());
                UserFilter::All
            }),
            None => UserFilter::All,
        };
        let (selected, _) = watch::channel(selected);
        Self { store, selected }
    }

    pub fn select_user(&self, filter: UserFilter) {
        self.selected.send_replace(filter);
        persist(self.store.as_ref(), PreferenceKey::SelectedUser, &filter.to_string());
    }

    /// Reset to [`UserFilter::All`] if the selected account is not in `users`.
    /// Returns `true` when a reset happened.
    pub fn retain_known(&self, users: &[LocalUser]) -> bool {
        let UserFilter::User(id) = self.selected() else {
            return false;
        };
        if users.iter().any(|u| u.id == id) {
            return false;
        }
        info!(user_id = id, "selected user no longer exists, showing all users");
        self.select_user(UserFilter::All);
        true
    }

    pub fn selected(&self) -> UserFilter {
        *self.selected.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UserFilter> {
        self.selected.subscribe()
    }
}
