//! Backend served from a JSON snapshot file.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use journal_common::{BackendError, Instance, LocalUser, UserFilter};
use journal_sync::BackendApi;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Snapshot {
    ready: bool,
    users: Vec<LocalUser>,
    instances: Vec<Instance>,
}

/// Answers backend calls from fixed data. Opening URLs and directories is
/// only logged.
pub struct SnapshotBackend {
    ready: AtomicBool,
    users: Vec<LocalUser>,
    instances: Vec<Instance>,
}

impl SnapshotBackend {
    pub fn empty() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn load(path: &Path) -> journal_common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let backend = Self::parse(&contents)?;
        info!(
            path = %path.display(),
            users = backend.users.len(),
            instances = backend.instances.len(),
            "loaded backend snapshot"
        );
        Ok(backend)
    }

    pub fn parse(json: &str) -> journal_common::Result<Self> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            ready: AtomicBool::new(snapshot.ready),
            users: snapshot.users,
            instances: snapshot.instances,
        }
    }

    /// Report ready from now on.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    fn ensure_ready(&self) -> Result<(), BackendError> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("backend is still initialising".into()))
        }
    }
}

#[async_trait]
impl BackendApi for SnapshotBackend {
    async fn fetch_instances(
        &self,
        filter: UserFilter,
        limit: usize,
    ) -> Result<Vec<Instance>, BackendError> {
        self.ensure_ready()?;
        Ok(self
            .instances
            .iter()
            .filter(|i| filter.user_id().map_or(true, |id| i.local_user_id == id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_local_users(&self) -> Result<Vec<LocalUser>, BackendError> {
        self.ensure_ready()?;
        Ok(self.users.clone())
    }

    async fn is_backend_ready(&self) -> Result<bool, BackendError> {
        Ok(self.ready.load(Ordering::Acquire))
    }

    async fn open_invite_url(&self, world_id: &str, instance_id: &str) -> Result<String, BackendError> {
        let url = format!("https://vrchat.com/home/launch?worldId={world_id}&instanceId={instance_id}");
        info!(%url, "open invite url");
        Ok(url)
    }

    async fn open_user_page(&self, user_id: &str) -> Result<String, BackendError> {
        let url = format!("https://vrchat.com/home/user/{user_id}");
        info!(%url, "open user page");
        Ok(url)
    }

    async fn open_screenshot_directory(&self, file_path: &str) -> Result<(), BackendError> {
        let dir = Path::new(file_path)
            .parent()
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| BackendError::call("open_screenshot_directory", "directory not found"))?;
        info!(dir = %dir.display(), "open screenshot directory");
        Ok(())
    }
}
