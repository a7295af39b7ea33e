use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// UI language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ja,
    En,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ja => "ja",
            Self::En => "en",
        }
    }

    /// Parse a persisted locale tag. Only the exact tags `ja` and `en` are accepted.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ja" => Some(Self::Ja),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Map an OS-reported locale (`ja-JP`, `en_US.UTF-8`, ...) to a supported locale.
    pub fn from_system(tag: &str) -> Self {
        if tag.to_lowercase().starts_with("ja") {
            Self::Ja
        } else {
            Self::En
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color theme. `System` defers to the OS preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Cyberpunk,
    Pastel,
    Aurora,
    #[default]
    System,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Light,
        Theme::Dark,
        Theme::Cyberpunk,
        Theme::Pastel,
        Theme::Aurora,
        Theme::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Cyberpunk => "cyberpunk",
            Self::Pastel => "pastel",
            Self::Aurora => "aurora",
            Self::System => "system",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Value of the root `data-theme` attribute, or `None` when the attribute
    /// should be absent so media-query styling applies.
    pub fn root_attribute(&self) -> Option<&'static str> {
        match self {
            Self::System => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire and storage value of [`UserFilter::All`].
pub const ALL_USERS: i64 = -1;

/// Which local account's history is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum UserFilter {
    /// No filter: every local account.
    #[default]
    All,
    User(i64),
}

impl UserFilter {
    /// Parse a persisted selection. Returns `None` for anything that is not
    /// the sentinel or a non-negative integer.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().and_then(|v| Self::try_from(v).ok())
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::User(id) => Some(*id),
        }
    }
}

impl TryFrom<i64> for UserFilter {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            ALL_USERS => Ok(Self::All),
            id if id >= 0 => Ok(Self::User(id)),
            other => Err(format!("invalid user filter: {other}")),
        }
    }
}

impl From<UserFilter> for i64 {
    fn from(filter: UserFilter) -> Self {
        match filter {
            UserFilter::All => ALL_USERS,
            UserFilter::User(id) => id,
        }
    }
}

impl fmt::Display for UserFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}

// ---------------------------------------------------------------------------
// Read model
// ---------------------------------------------------------------------------

/// Lifecycle of a recorded instance (world visit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Active,
    Completed,
    Interrupted,
    SyncFailed,
}

/// Shadow copy of a backend instance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: i64,
    pub local_user_id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub world_id: String,
    #[serde(default)]
    pub world_name: Option<String>,
    pub instance_id: String,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub player_count: u32,
    #[serde(default)]
    pub screenshot_count: u32,
}

/// A local account that has authenticated on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUser {
    pub id: i64,
    pub display_name: String,
    pub user_id: String,
    pub first_authenticated_at: String,
    pub last_authenticated_at: String,
}
