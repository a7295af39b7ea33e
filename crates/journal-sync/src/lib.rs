//! Reactive client state kept in sync with the journal backend.
//!
//! The backend is reached through two ports: [`BackendApi`] for
//! request/response calls and [`PushChannel`] for pushed events. The
//! [`EventBridge`] turns pushed events into handler calls, the
//! [`ReadinessGate`] resolves the startup handshake, and the
//! [`InstanceCache`] holds the history read model. [`JournalState`] owns
//! all of it.

pub mod actions;
pub mod backend;
pub mod bridge;
pub mod cache;
pub mod readiness;
pub mod state;
pub mod users;

#[cfg(test)]
mod testing;

pub use actions::JournalActions;
pub use backend::{BackendApi, PushChannel, INSTANCE_PAGE_LIMIT};
pub use bridge::{EventBridge, EventHandlers, Subscription};
pub use cache::{InstanceCache, LoadOutcome};
pub use readiness::{ReadinessGate, ReadyTrigger};
pub use state::{Collaborators, JournalState};
pub use users::UserDirectory;
