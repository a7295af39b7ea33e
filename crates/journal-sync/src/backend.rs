//! Ports to the backend process.

use async_trait::async_trait;
use journal_common::{BackendError, EventBus, Instance, LocalUser, UserFilter};
use tokio::sync::broadcast;

/// Page size used for instance fetches.
pub const INSTANCE_PAGE_LIMIT: usize = 100;

/// Request/response calls into the backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn fetch_instances(
        &self,
        filter: UserFilter,
        limit: usize,
    ) -> Result<Vec<Instance>, BackendError>;

    async fn fetch_local_users(&self) -> Result<Vec<LocalUser>, BackendError>;

    /// Whether the backend finished initialising before this call.
    async fn is_backend_ready(&self) -> Result<bool, BackendError>;

    /// Open the invite link for an instance, returning the URL opened.
    async fn open_invite_url(&self, world_id: &str, instance_id: &str) -> Result<String, BackendError>;

    /// Open a user's profile page, returning the URL opened.
    async fn open_user_page(&self, user_id: &str) -> Result<String, BackendError>;

    async fn open_screenshot_directory(&self, file_path: &str) -> Result<(), BackendError>;
}

/// The backend's push-event surface: named channels of JSON payloads.
pub trait PushChannel: Send + Sync {
    /// Start receiving `channel`. Messages sent before this call are not seen.
    fn listen(&self, channel: &str) -> broadcast::Receiver<serde_json::Value>;
}

impl PushChannel for EventBus {
    fn listen(&self, channel: &str) -> broadcast::Receiver<serde_json::Value> {
        self.subscribe(channel)
    }
}
