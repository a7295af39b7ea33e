//! Locale preference: persisted value, or the OS locale on first run.

use std::sync::Arc;

use async_trait::async_trait;
use journal_common::{Locale, PlatformError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::{persist, PreferenceKey, PreferenceStore};

/// Source of the operating system's preferred locale.
#[async_trait]
pub trait OsLocale: Send + Sync {
    /// The OS locale tag (`ja-JP`, `en_US.UTF-8`, ...), `None` when unset.
    async fn locale(&self) -> Result<Option<String>, PlatformError>;
}

/// Reads the POSIX locale environment (`LC_ALL`, `LC_MESSAGES`, `LANG`).
pub struct SystemLocale;

#[async_trait]
impl OsLocale for SystemLocale {
    async fn locale(&self) -> Result<Option<String>, PlatformError> {
        for var in ["LC_ALL", "LC_MESSAGES", "LANG"] {
            match std::env::var(var) {
                Ok(value) if !value.is_empty() && value != "C" && value != "POSIX" => {
                    return Ok(Some(value))
                }
                Ok(_) | Err(std::env::VarError::NotPresent) => continue,
                Err(e) => return Err(PlatformError::LocaleUnavailable(format!("{var}: {e}"))),
            }
        }
        Ok(None)
    }
}

/// Map the OS locale to a supported [`Locale`]. A failed query falls back
/// to Japanese.
pub async fn detect_system_locale(os: &dyn OsLocale) -> Locale {
    match os.locale().await {
        Ok(Some(tag)) => Locale::from_system(&tag),
        Ok(None) => Locale::En,
        Err(e) => {
            warn!("failed to detect system locale, defaulting to ja: {e}");
            Locale::Ja
        }
    }
}

pub struct LocaleStore {
    store: Arc<dyn PreferenceStore>,
    locale: watch::Sender<Locale>,
}

impl LocaleStore {
    /// Starts at `ja` until [`LocaleStore::init`] resolves the real value.
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        let (locale, _) = watch::channel(Locale::Ja);
        Self { store, locale }
    }

    /// Resolve the effective locale (saved value, else OS locale) and persist it.
    pub async fn init(&self, os: &dyn OsLocale) -> Locale {
        let saved = self.store.get(PreferenceKey::Locale);
        let locale = match saved.as_deref().and_then(Locale::from_tag) {
            Some(locale) => locale,
            None => {
                if let Some(raw) = &saved {
                    debug!(saved = %raw, "ignoring invalid saved locale");
                }
                detect_system_locale(os).await
            }
        };
        self.set_locale(locale);
        locale
    }

    pub fn set_locale(&self, locale: Locale) {
        self.locale.send_replace(locale);
        persist(self.store.as_ref(), PreferenceKey::Locale, locale.as_str());
    }

    pub fn locale(&self) -> Locale {
        *self.locale.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Locale> {
        self.locale.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPreferenceStore;

    struct FixedLocale(Result<Option<&'static str>, &'static str>);

    #[async_trait]
    impl OsLocale for FixedLocale {
        async fn locale(&self) -> Result<Option<String>, PlatformError> {
            match &self.0 {
                Ok(tag) => Ok(tag.map(str::to_string)),
                Err(msg) => Err(PlatformError::LocaleUnavailable(msg.to_string())),
            }
        }
    }

    fn store_with(saved: Option<&str>) -> Arc<MemoryPreferenceStore> {
        Arc::new(match saved {
            Some(v) => MemoryPreferenceStore::with_entries([(PreferenceKey::Locale, v)]),
            None => MemoryPreferenceStore::new(),
        })
    }

    #[tokio::test]
    async fn saved_locale_wins_over_os() {
        let prefs = store_with(Some("en"));
        let store = LocaleStore::new(prefs.clone());

        let locale = store.init(&FixedLocale(Ok(Some("ja-JP")))).await;
        assert_eq!(locale, Locale::En);
        assert_eq!(store.locale(), Locale::En);
    }

    #[tokio::test]
    async fn invalid_saved_locale_uses_os_mapping() {
        let prefs = store_with(Some("xx"));
        let store = LocaleStore::new(prefs.clone());

        assert_eq!(store.init(&FixedLocale(Ok(Some("en-GB")))).await, Locale::En);
        assert_eq!(prefs.get(PreferenceKey::Locale).as_deref(), Some("en"));

        let prefs = store_with(Some("xx"));
        let store = LocaleStore::new(prefs.clone());
        assert_eq!(store.init(&FixedLocale(Ok(Some("ja_JP.UTF-8")))).await, Locale::Ja);
        assert_eq!(prefs.get(PreferenceKey::Locale).as_deref(), Some("ja"));
    }

    #[tokio::test]
    async fn os_failure_defaults_to_japanese() {
        let store = LocaleStore::new(store_with(None));
        let locale = store.init(&FixedLocale(Err("plugin missing"))).await;
        assert_eq!(locale, Locale::Ja);
    }

    #[tokio::test]
    async fn unset_os_locale_maps_to_english() {
        let store = LocaleStore::new(store_with(None));
        assert_eq!(store.init(&FixedLocale(Ok(None))).await, Locale::En);
    }

    #[tokio::test]
    async fn set_locale_persists_and_notifies() {
        let prefs = store_with(None);
        let store = LocaleStore::new(prefs.clone());
        let mut rx = store.subscribe();

        store.set_locale(Locale::En);

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Locale::En);
        assert_eq!(prefs.get(PreferenceKey::Locale).as_deref(), Some("en"));
    }
}
