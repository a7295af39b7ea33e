//! Scriptable in-memory backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use journal_common::{BackendError, Instance, InstanceStatus, LocalUser, PlatformError, UserFilter};
use journal_config::OsLocale;

use crate::backend::BackendApi;

type Scripted<T> = (Duration, Result<T, BackendError>);

pub(crate) struct FakeBackend {
    ready: Mutex<Scripted<bool>>,
    instances: Mutex<HashMap<UserFilter, Scripted<Vec<Instance>>>>,
    users: Mutex<Result<Vec<LocalUser>, BackendError>>,
    action_error: Mutex<Option<BackendError>>,
    fetches: AtomicUsize,
    opened: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            ready: Mutex::new((Duration::ZERO, Ok(false))),
            instances: Mutex::new(HashMap::new()),
            users: Mutex::new(Ok(Vec::new())),
            action_error: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.lock().unwrap().1 = Ok(ready);
    }

    pub(crate) fn set_ready_delay(&self, delay: Duration) {
        self.ready.lock().unwrap().0 = delay;
    }

    pub(crate) fn fail_ready(&self, message: &str) {
        self.ready.lock().unwrap().1 = Err(BackendError::call("is_backend_ready", message));
    }

    pub(crate) fn set_instances(&self, filter: UserFilter, delay: Duration, list: Vec<Instance>) {
        self.instances.lock().unwrap().insert(filter, (delay, Ok(list)));
    }

    pub(crate) fn fail_instances(&self, filter: UserFilter, delay: Duration, message: &str) {
        self.instances.lock().unwrap().insert(
            filter,
            (delay, Err(BackendError::call("get_instances_by_user", message))),
        );
    }

    pub(crate) fn set_users(&self, users: Vec<LocalUser>) {
        *self.users.lock().unwrap() = Ok(users);
    }

    pub(crate) fn fail_users(&self, message: &str) {
        *self.users.lock().unwrap() = Err(BackendError::call("get_local_users", message));
    }

    pub(crate) fn fail_actions(&self, message: &str) {
        *self.action_error.lock().unwrap() = Some(BackendError::call("open_url", message));
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    fn open(&self, target: String) -> Result<String, BackendError> {
        if let Some(err) = self.action_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.opened.lock().unwrap().push(target.clone());
        Ok(target)
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn fetch_instances(
        &self,
        filter: UserFilter,
        _limit: usize,
    ) -> Result<Vec<Instance>, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self
            .instances
            .lock()
            .unwrap()
            .get(&filter)
            .cloned()
            .unwrap_or((Duration::ZERO, Ok(Vec::new())));
        tokio::time::sleep(delay).await;
        result
    }

    async fn fetch_local_users(&self) -> Result<Vec<LocalUser>, BackendError> {
        self.users.lock().unwrap().clone()
    }

    async fn is_backend_ready(&self) -> Result<bool, BackendError> {
        let (delay, result) = self.ready.lock().unwrap().clone();
        tokio::time::sleep(delay).await;
        result
    }

    async fn open_invite_url(&self, world_id: &str, instance_id: &str) -> Result<String, BackendError> {
        self.open(format!(
            "https://vrchat.com/home/launch?worldId={world_id}&instanceId={instance_id}"
        ))
    }

    async fn open_user_page(&self, user_id: &str) -> Result<String, BackendError> {
        self.open(format!("https://vrchat.com/home/user/{user_id}"))
    }

    async fn open_screenshot_directory(&self, file_path: &str) -> Result<(), BackendError> {
        self.open(file_path.to_string()).map(|_| ())
    }
}

/// OS locale that always reports the same tag.
pub(crate) struct FixedLocale(pub(crate) Option<&'static str>);

#[async_trait]
impl OsLocale for FixedLocale {
    async fn locale(&self) -> Result<Option<String>, PlatformError> {
        Ok(self.0.map(str::to_string))
    }
}

/// Let spawned tasks run to quiescence. Requires a paused clock.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub(crate) fn instance(id: i64, local_user_id: i64) -> Instance {
    Instance {
        id,
        local_user_id,
        user_name: Some(format!("user{local_user_id}")),
        world_id: format!("wrld_{id}"),
        world_name: Some(format!("World {id}")),
        instance_id: format!("{id}~public"),
        started_at: "2024-05-01T12:00:00Z".into(),
        ended_at: None,
        status: InstanceStatus::Active,
        player_count: 4,
        screenshot_count: 2,
    }
}

pub(crate) fn user(id: i64) -> LocalUser {
    LocalUser {
        id,
        display_name: format!("user{id}"),
        user_id: format!("usr_{id}"),
        first_authenticated_at: "2024-01-01T00:00:00Z".into(),
        last_authenticated_at: "2024-01-02T00:00:00Z".into(),
    }
}
