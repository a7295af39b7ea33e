use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::errors::BackendError;

/// Channel the backend emits on once it has finished initialising.
pub const BACKEND_READY_CHANNEL: &str = "backend-ready";

/// Channel carrying recorded domain facts.
pub const LOG_EVENT_CHANNEL: &str = "log-event";

/// A fact pushed by the backend.
///
/// `log-event` payloads are tagged by `"type"`. The backend's own names for
/// some facts are accepted as aliases; tags this client does not know decode
/// as [`BackendEvent::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendEvent {
    BackendReady,
    #[serde(alias = "UserAuthenticated")]
    LocalPlayerUpdated,
    InstanceCreated,
    InstanceEnded {
        instance_id: i64,
        ended_at: String,
    },
    #[serde(alias = "UserJoined")]
    PlayerJoined,
    #[serde(alias = "UserLeft")]
    PlayerLeft,
    #[serde(other)]
    Unknown,
}

impl BackendEvent {
    /// Decode a raw message received on `channel`.
    pub fn decode(channel: &str, payload: serde_json::Value) -> Result<Self, BackendError> {
        match channel {
            BACKEND_READY_CHANNEL => Ok(Self::BackendReady),
            LOG_EVENT_CHANNEL => {
                serde_json::from_value(payload).map_err(|e| BackendError::Decode(e.to_string()))
            }
            other => Err(BackendError::Decode(format!("unknown channel `{other}`"))),
        }
    }

    /// Stable tag name, used in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::BackendReady => "BackendReady",
            Self::LocalPlayerUpdated => "LocalPlayerUpdated",
            Self::InstanceCreated => "InstanceCreated",
            Self::InstanceEnded { .. } => "InstanceEnded",
            Self::PlayerJoined => "PlayerJoined",
            Self::PlayerLeft => "PlayerLeft",
            Self::Unknown => "Unknown",
        }
    }
}

/// In-process push channel with named topics.
///
/// Each topic is a [`broadcast`] channel created on first use; messages
/// published before anyone listens are dropped.
pub struct EventBus {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<serde_json::Value>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<serde_json::Value> {
        self.sender(channel).subscribe()
    }

    /// Publish on `channel`, returning the number of receivers reached.
    pub fn publish(&self, channel: &str, payload: serde_json::Value) -> usize {
        self.sender(channel).send(payload).unwrap_or(0)
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<serde_json::Value> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
