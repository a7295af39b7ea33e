//! Backend push-event subscription and dispatch.
//!
//! [`EventBridge::subscribe`] listens on both push channels, then polls
//! the backend once for readiness, then dispatches decoded events one at a
//! time in arrival order to an [`EventHandlers`] table. The returned
//! [`Subscription`] tears all of it down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use journal_common::{BackendEvent, BACKEND_READY_CHANNEL, LOG_EVENT_CHANNEL};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::backend::{BackendApi, PushChannel};
use crate::readiness::{ReadinessGate, ReadyTrigger};

type Callback = Box<dyn Fn() + Send + Sync>;
type EndedCallback = Box<dyn Fn(i64, &str) + Send + Sync>;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Optional callback per event tag. Tags without a callback are ignored.
#[derive(Default)]
pub struct EventHandlers {
    on_backend_ready: Option<Callback>,
    on_local_player_updated: Option<Callback>,
    on_instance_created: Option<Callback>,
    on_instance_ended: Option<EndedCallback>,
    on_player_joined: Option<Callback>,
    on_player_left: Option<Callback>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs once, when this subscription observes the backend becoming ready.
    pub fn on_backend_ready(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_backend_ready = Some(Box::new(f));
        self
    }

    pub fn on_local_player_updated(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_local_player_updated = Some(Box::new(f));
        self
    }

    pub fn on_instance_created(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_instance_created = Some(Box::new(f));
        self
    }

    /// Receives `(instance_id, ended_at)`.
    pub fn on_instance_ended(mut self, f: impl Fn(i64, &str) + Send + Sync + 'static) -> Self {
        self.on_instance_ended = Some(Box::new(f));
        self
    }

    pub fn on_player_joined(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_player_joined = Some(Box::new(f));
        self
    }

    pub fn on_player_left(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_player_left = Some(Box::new(f));
        self
    }

    /// Run the callback registered for `event`. Returns whether one ran.
    pub fn dispatch(&self, event: &BackendEvent) -> bool {
        let callback = match event {
            BackendEvent::BackendReady => &self.on_backend_ready,
            BackendEvent::LocalPlayerUpdated => &self.on_local_player_updated,
            BackendEvent::InstanceCreated => &self.on_instance_created,
            BackendEvent::PlayerJoined => &self.on_player_joined,
            BackendEvent::PlayerLeft => &self.on_player_left,
            BackendEvent::InstanceEnded {
                instance_id,
                ended_at,
            } => {
                return match &self.on_instance_ended {
                    Some(f) => {
                        f(*instance_id, ended_at);
                        true
                    }
                    None => false,
                };
            }
            BackendEvent::Unknown => return false,
        };
        match callback {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch state
// ---------------------------------------------------------------------------

/// Shared between the dispatch task and the [`Subscription`].
///
/// Callbacks run while `in_dispatch` is held, so a closing thread can wait
/// out an in-flight callback. A close issued from inside a callback is
/// detected through `dispatching_thread` and does not wait.
struct DispatchState {
    handlers: EventHandlers,
    closed: AtomicBool,
    in_dispatch: Mutex<()>,
    dispatching_thread: Mutex<Option<ThreadId>>,
}

impl DispatchState {
    fn new(handlers: EventHandlers) -> Self {
        Self {
            handlers,
            closed: AtomicBool::new(false),
            in_dispatch: Mutex::new(()),
            dispatching_thread: Mutex::new(None),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run `f` against the handlers unless closed. Returns `false` if closed.
    fn deliver(&self, f: impl FnOnce(&EventHandlers)) -> bool {
        let _dispatching = self.in_dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return false;
        }
        let _owner = OwnerGuard::enter(&self.dispatching_thread);
        f(&self.handlers);
        true
    }

    fn deliver_ready(&self, gate: &ReadinessGate, trigger: ReadyTrigger) -> bool {
        self.deliver(|handlers| {
            if gate.mark_ready(trigger) {
                handlers.dispatch(&BackendEvent::BackendReady);
            }
        })
    }

    /// Close the table. Returns `false` if it was already closed.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let current = thread::current().id();
        let reentrant = *self
            .dispatching_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(current);
        if !reentrant {
            // Wait for a callback running on another thread to finish.
            drop(self.in_dispatch.lock().unwrap_or_else(PoisonError::into_inner));
        }
        true
    }
}

/// Records the dispatching thread for the duration of a callback.
struct OwnerGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> OwnerGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

struct SubscriptionInner {
    state: Arc<DispatchState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to an active bridge subscription. Clones share the subscription.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Stop dispatching and release both channel subscriptions.
    ///
    /// Idempotent. Once this returns no callback runs any more; called from
    /// inside a callback, none runs after that callback returns.
    pub fn unsubscribe(&self) {
        if !self.inner.state.close() {
            return;
        }
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        debug!("event bridge unsubscribed");
    }

    pub fn is_active(&self) -> bool {
        !self.inner.state.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

pub struct EventBridge {
    api: Arc<dyn BackendApi>,
    channel: Arc<dyn PushChannel>,
    gate: Arc<ReadinessGate>,
}

impl EventBridge {
    pub fn new(
        api: Arc<dyn BackendApi>,
        channel: Arc<dyn PushChannel>,
        gate: Arc<ReadinessGate>,
    ) -> Self {
        Self { api, channel, gate }
    }

    pub fn gate(&self) -> &Arc<ReadinessGate> {
        &self.gate
    }

    /// Subscribe `handlers` to backend events. Must be called inside a tokio
    /// runtime.
    ///
    /// Both channels are listened to before the readiness poll is issued,
    /// so a `backend-ready` sent while the poll is in flight is buffered
    /// rather than lost.
    pub fn subscribe(&self, handlers: EventHandlers) -> Subscription {
        let ready_rx = self.channel.listen(BACKEND_READY_CHANNEL);
        let log_rx = self.channel.listen(LOG_EVENT_CHANNEL);
        let state = Arc::new(DispatchState::new(handlers));

        let task = tokio::spawn(dispatch_loop(
            Arc::clone(&self.api),
            Arc::clone(&self.gate),
            Arc::clone(&state),
            ready_rx,
            log_rx,
        ));

        Subscription {
            inner: Arc::new(SubscriptionInner {
                state,
                task: Mutex::new(Some(task)),
            }),
        }
    }
}

async fn dispatch_loop(
    api: Arc<dyn BackendApi>,
    gate: Arc<ReadinessGate>,
    state: Arc<DispatchState>,
    mut ready_rx: broadcast::Receiver<serde_json::Value>,
    mut log_rx: broadcast::Receiver<serde_json::Value>,
) {
    match api.is_backend_ready().await {
        Ok(true) => {
            if !state.deliver_ready(&gate, ReadyTrigger::InitialPoll) {
                return;
            }
        }
        Ok(false) => debug!("backend not ready yet, waiting for {BACKEND_READY_CHANNEL}"),
        Err(e) => error!("failed to check backend ready status: {e}"),
    }

    loop {
        let event = tokio::select! {
            biased;
            msg = ready_rx.recv() => match msg {
                Ok(_) => BackendEvent::BackendReady,
                Err(RecvError::Lagged(n)) => {
                    warn!(channel = BACKEND_READY_CHANNEL, skipped = n, "push channel lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            msg = log_rx.recv() => match msg {
                Ok(payload) => {
                    if state.is_closed() {
                        break;
                    }
                    match BackendEvent::decode(LOG_EVENT_CHANNEL, payload) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!("dropping push event: {e}");
                            continue;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(channel = LOG_EVENT_CHANNEL, skipped = n, "push channel lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        let delivered = match event {
            BackendEvent::BackendReady => state.deliver_ready(&gate, ReadyTrigger::Event),
            event => state.deliver(|handlers| {
                let handled = handlers.dispatch(&event);
                debug!(tag = event.tag(), handled, "dispatched backend event");
            }),
        };
        if !delivered {
            break;
        }
    }
    debug!("event dispatch stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, FakeBackend};
    use journal_common::EventBus;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::OnceLock;
    use std::time::Duration;

    struct Harness {
        backend: Arc<FakeBackend>,
        bus: Arc<EventBus>,
        bridge: EventBridge,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let bus = Arc::new(EventBus::new(64));
        let bridge = EventBridge::new(backend.clone(), bus.clone(), Arc::new(ReadinessGate::new()));
        Harness {
            backend,
            bus,
            bridge,
        }
    }

    fn counting() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn ended(id: i64) -> serde_json::Value {
        json!({"type": "InstanceEnded", "instance_id": id, "ended_at": format!("t{id}")})
    }

    #[tokio::test(start_paused = true)]
    async fn ready_by_poll_then_event_fires_once() {
        let h = harness();
        h.backend.set_ready(true);
        let (count, on_ready) = counting();

        let _sub = h.bridge.subscribe(EventHandlers::new().on_backend_ready(on_ready));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(h.bridge.gate().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_at_poll_fires_on_event() {
        let h = harness();
        let (count, on_ready) = counting();

        let _sub = h.bridge.subscribe(EventHandlers::new().on_backend_ready(on_ready));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!h.bridge.gate().is_ready());

        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn event_during_poll_fires_once() {
        let h = harness();
        h.backend.set_ready(true);
        h.backend.set_ready_delay(Duration::from_millis(100));
        let (count, on_ready) = counting();

        let _sub = h.bridge.subscribe(EventHandlers::new().on_backend_ready(on_ready));
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn event_before_poll_fires_once() {
        let h = harness();
        h.backend.set_ready(true);
        let (count, on_ready) = counting();

        let _sub = h.bridge.subscribe(EventHandlers::new().on_backend_ready(on_ready));
        // The dispatch task has not run yet; the event is buffered.
        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_waits_for_event() {
        let h = harness();
        h.backend.fail_ready("channel closed");
        let (count, on_ready) = counting();

        let _sub = h.bridge.subscribe(EventHandlers::new().on_backend_ready(on_ready));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn events_dispatch_in_emission_order() {
        let h = harness();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = h.bridge.subscribe(
            EventHandlers::new()
                .on_instance_ended(move |id, at| s.lock().unwrap().push((id, at.to_string()))),
        );
        settle().await;

        for id in 1..=5 {
            h.bus.publish(LOG_EVENT_CHANNEL, ended(id));
        }
        settle().await;

        let seen = seen.lock().unwrap();
        let ids: Vec<i64> = seen.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        assert_eq!(seen[0].1, "t1");
    }

    #[tokio::test(start_paused = true)]
    async fn each_tag_reaches_its_handler() {
        let h = harness();
        let (joined, on_joined) = counting();
        let (left, on_left) = counting();
        let (created, on_created) = counting();
        let (local, on_local) = counting();
        let _sub = h.bridge.subscribe(
            EventHandlers::new()
                .on_player_joined(on_joined)
                .on_player_left(on_left)
                .on_instance_created(on_created)
                .on_local_player_updated(on_local),
        );
        settle().await;

        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "PlayerJoined"}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "UserJoined", "instance_id": 1}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "PlayerLeft"}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "InstanceCreated", "instance_id": 3}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "LocalPlayerUpdated"}));
        settle().await;

        assert_eq!(joined.load(Ordering::SeqCst), 2);
        assert_eq!(left.load(Ordering::SeqCst), 1);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(local.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unhandled_unknown_and_malformed_events_are_ignored() {
        let h = harness();
        let (count, on_ended) = counting();
        let _sub = h.bridge.subscribe(EventHandlers::new().on_instance_ended(move |_, _| on_ended()));
        settle().await;

        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "PlayerJoined"}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "AvatarChanged", "avatar_id": 5}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "InstanceEnded"}));
        h.bus.publish(LOG_EVENT_CHANNEL, json!(17));
        h.bus.publish(LOG_EVENT_CHANNEL, ended(9));
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_callbacks_after_unsubscribe() {
        let h = harness();
        let (count, on_created) = counting();
        let (ready_count, on_ready) = counting();
        let sub = h.bridge.subscribe(
            EventHandlers::new()
                .on_instance_created(on_created)
                .on_backend_ready(on_ready),
        );
        settle().await;

        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "InstanceCreated"}));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());

        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "InstanceCreated"}));
        h.bus.publish(BACKEND_READY_CHANNEL, serde_json::Value::Null);
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(ready_count.load(Ordering::SeqCst), 0);
        assert!(!h.bridge.gate().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_before_poll_resolves_suppresses_ready() {
        let h = harness();
        h.backend.set_ready(true);
        h.backend.set_ready_delay(Duration::from_millis(100));
        let (count, on_ready) = counting();

        let sub = h.bridge.subscribe(EventHandlers::new().on_backend_ready(on_ready));
        settle().await;
        sub.unsubscribe();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_from_inside_handler() {
        let h = harness();
        let slot: Arc<OnceLock<Subscription>> = Arc::new(OnceLock::new());
        let count = Arc::new(AtomicUsize::new(0));

        let (s, c) = (slot.clone(), count.clone());
        let sub = h.bridge.subscribe(EventHandlers::new().on_instance_created(move || {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = s.get() {
                sub.unsubscribe();
            }
        }));
        let _ = slot.set(sub.clone());
        settle().await;

        for _ in 0..3 {
            h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "InstanceCreated"}));
        }
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unsubscribe_waits_for_in_flight_callback() {
        let h = harness();
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let (st, fin, c) = (started.clone(), finished.clone(), calls.clone());
        let sub = h.bridge.subscribe(EventHandlers::new().on_player_joined(move || {
            c.fetch_add(1, Ordering::SeqCst);
            st.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            fin.store(true, Ordering::SeqCst);
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "PlayerJoined"}));
        while !started.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        sub.unsubscribe();
        assert!(finished.load(Ordering::SeqCst));

        h.bus.publish(LOG_EVENT_CHANNEL, json!({"type": "PlayerJoined"}));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
