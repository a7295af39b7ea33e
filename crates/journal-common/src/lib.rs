pub mod errors;
pub mod events;
pub mod messages;
pub mod notifications;
pub mod types;

pub use errors::{BackendError, ConfigError, JournalError, PlatformError};
pub use events::{BackendEvent, EventBus, BACKEND_READY_CHANNEL, LOG_EVENT_CHANNEL};
pub use messages::MessageKey;
pub use notifications::{Notification, NotificationKind, NotificationQueue, DEFAULT_TTL_MS};
pub use types::{Instance, InstanceStatus, LocalUser, Locale, Theme, UserFilter, ALL_USERS};

pub type Result<T> = std::result::Result<T, JournalError>;
