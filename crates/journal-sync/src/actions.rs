//! User-triggered backend calls that report back through notifications.

use std::sync::Arc;

use journal_common::{Instance, Locale, MessageKey, NotificationQueue};
use tokio::sync::watch;
use tracing::{error, info};

use crate::backend::BackendApi;

pub struct JournalActions {
    api: Arc<dyn BackendApi>,
    notifications: NotificationQueue,
    locale: watch::Receiver<Locale>,
}

impl JournalActions {
    pub fn new(
        api: Arc<dyn BackendApi>,
        notifications: NotificationQueue,
        locale: watch::Receiver<Locale>,
    ) -> Self {
        Self {
            api,
            notifications,
            locale,
        }
    }

    /// Open the invite link for `instance`. Returns the URL on success.
    pub async fn open_invite_url(&self, instance: &Instance) -> Option<String> {
        match self
            .api
            .open_invite_url(&instance.world_id, &instance.instance_id)
            .await
        {
            Ok(url) => {
                info!(instance = instance.id, %url, "opened invite url");
                self.notifications
                    .success(MessageKey::InviteOpened.with_detail(self.locale(), &url));
                Some(url)
            }
            Err(e) => {
                error!(instance = instance.id, "failed to open invite url: {e}");
                self.report(MessageKey::GenericError, &e);
                None
            }
        }
    }

    pub async fn open_user_page(&self, user_id: &str) -> Option<String> {
        match self.api.open_user_page(user_id).await {
            Ok(url) => {
                info!(user_id, %url, "opened user page");
                self.notifications
                    .success(MessageKey::UserPageOpened.with_detail(self.locale(), &url));
                Some(url)
            }
            Err(e) => {
                error!(user_id, "failed to open user page: {e}");
                self.report(MessageKey::GenericError, &e);
                None
            }
        }
    }

    /// Reveal the directory holding `file_path`. Only failures are reported.
    pub async fn open_screenshot_directory(&self, file_path: &str) -> bool {
        match self.api.open_screenshot_directory(file_path).await {
            Ok(()) => true,
            Err(e) => {
                error!(file_path, "failed to open screenshot directory: {e}");
                self.report(MessageKey::OpenDirectoryFailed, &e);
                false
            }
        }
    }

    fn locale(&self) -> Locale {
        *self.locale.borrow()
    }

    fn report(&self, key: MessageKey, detail: &dyn std::fmt::Display) {
        self.notifications.error(key.with_detail(self.locale(), detail));
    }
}
