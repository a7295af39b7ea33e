//! Local accounts known to the backend.

use std::sync::Arc;

use journal_common::{LocalUser, UserFilter};
use journal_config::SelectedUserStore;
use tokio::sync::watch;
use tracing::{error, info};

use crate::backend::BackendApi;

pub struct UserDirectory {
    api: Arc<dyn BackendApi>,
    selection: Arc<SelectedUserStore>,
    users: watch::Sender<Vec<LocalUser>>,
}

impl UserDirectory {
    pub fn new(api: Arc<dyn BackendApi>, selection: Arc<SelectedUserStore>) -> Self {
        let (users, _) = watch::channel(Vec::new());
        Self {
            api,
            selection,
            users,
        }
    }

    /// Refresh the account list and drop a selection that no longer exists.
    /// On failure the previous list stays.
    pub async fn load_users(&self) {
        match self.api.fetch_local_users().await {
            Ok(users) => {
                info!(count = users.len(), "local users loaded");
                self.selection.retain_known(&users);
                self.users.send_replace(users);
            }
            Err(e) => error!("failed to load local users: {e}"),
        }
    }

    pub fn users(&self) -> Vec<LocalUser> {
        self.users.borrow().clone()
    }

    /// The selected account, if a single one is selected and known.
    pub fn selected_user(&self) -> Option<LocalUser> {
        let UserFilter::User(id) = self.selection.selected() else {
            return None;
        };
        self.users.borrow().iter().find(|u| u.id == id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users.borrow().len()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<LocalUser>> {
        self.users.subscribe()
    }
}
