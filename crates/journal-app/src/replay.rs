//! Feed recorded push messages through a live [`JournalState`].

use std::sync::Arc;

use journal_common::{EventBus, Result, BACKEND_READY_CHANNEL};
use journal_config::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, ScriptRoot, SystemLocale};
use journal_sync::{Collaborators, JournalState};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cli::Args;
use crate::snapshot::SnapshotBackend;

/// One line of replay input.
#[derive(Debug, Deserialize)]
struct PushMessage {
    channel: String,
    #[serde(default)]
    payload: serde_json::Value,
}

pub async fn run(args: Args) -> Result<()> {
    let backend = Arc::new(match &args.data {
        Some(path) => SnapshotBackend::load(path)?,
        None => SnapshotBackend::empty(),
    });
    let bus = Arc::new(EventBus::default());
    let state = JournalState::new(Collaborators {
        api: backend.clone(),
        channel: bus.clone(),
        preferences: open_preferences(&args),
        document: Arc::new(ScriptRoot::new(|script| debug!(%script, "theme script"))),
        os_locale: Arc::new(SystemLocale),
    });

    let observers = observe(&state);
    let subscription = state.start().await;

    let published = pump(BufReader::new(tokio::io::stdin()), &backend, &bus).await?;
    info!(published, "input closed");

    // Let work triggered by the last messages finish.
    tokio::task::yield_now().await;
    let _ = state.cache().subscribe_loading().wait_for(|loading| !*loading).await;

    state.stop(&subscription);
    for observer in observers {
        observer.abort();
    }
    print_summary(&state)
}

fn open_preferences(args: &Args) -> Arc<dyn PreferenceStore> {
    if args.memory_prefs {
        return Arc::new(MemoryPreferenceStore::new());
    }
    if let Some(path) = &args.prefs {
        return Arc::new(FilePreferenceStore::open(path));
    }
    match FilePreferenceStore::open_default() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("{e}, keeping preferences in memory");
            Arc::new(MemoryPreferenceStore::new())
        }
    }
}

/// Publish every message read from `input`. Returns how many were published.
async fn pump(
    input: impl AsyncBufRead + Unpin,
    backend: &SnapshotBackend,
    bus: &EventBus,
) -> Result<usize> {
    let mut lines = input.lines();
    let mut published = 0;
    while let Some(line) = lines.next_line().await? {
        let message = match parse_line(&line) {
            None => continue,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!("skipping malformed input line: {e}");
                continue;
            }
        };
        if message.channel == BACKEND_READY_CHANNEL {
            backend.mark_ready();
        }
        let receivers = bus.publish(&message.channel, message.payload);
        debug!(channel = %message.channel, receivers, "published");
        published += 1;
        // Keep the broadcast buffer from lagging.
        tokio::task::yield_now().await;
    }
    Ok(published)
}

fn parse_line(line: &str) -> Option<serde_json::Result<PushMessage>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line))
}

fn observe(state: &JournalState) -> Vec<JoinHandle<()>> {
    vec![
        log_changes(state.gate().subscribe(), |ready| info!(ready, "backend readiness")),
        log_changes(state.locale().subscribe(), |locale| info!(%locale, "locale")),
        log_changes(state.theme().subscribe(), |theme| info!(theme = theme.as_str(), "theme")),
        log_changes(state.selection().subscribe(), |filter| info!(%filter, "selected user")),
        log_changes(state.users().subscribe(), |users| info!(count = users.len(), "local users")),
        log_changes(state.cache().subscribe(), |list| info!(count = list.len(), "instances")),
        log_changes(state.cache().subscribe_stale(), |stale| info!(stale, "instances stale")),
        log_changes(state.notifications().subscribe(), |items| {
            if let Some(latest) = items.last() {
                info!(kind = ?latest.kind, message = %latest.message, "notification");
            }
        }),
    ]
}

fn log_changes<T>(
    mut rx: watch::Receiver<T>,
    describe: impl Fn(&T) + Send + 'static,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            describe(&rx.borrow_and_update());
        }
    })
}

fn print_summary(state: &JournalState) -> Result<()> {
    let notifications: Vec<String> = state
        .notifications()
        .notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();
    let summary = json!({
        "ready": state.gate().is_ready(),
        "locale": state.locale().locale(),
        "theme": state.theme().theme(),
        "selectedUser": state.selection().selected(),
        "users": state.users().users(),
        "instances": state.cache().instances(),
        "stale": state.cache().is_stale(),
        "notifications": notifications,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
