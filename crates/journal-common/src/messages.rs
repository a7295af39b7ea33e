//! Localized texts for the notifications the state layer emits itself.
//!
//! View strings live with the views; only messages produced by background
//! work (failed loads, opened links) are kept here.

use crate::types::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    InstanceLoadFailed,
    InviteOpened,
    UserPageOpened,
    OpenDirectoryFailed,
    GenericError,
}

impl MessageKey {
    pub fn text(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::InstanceLoadFailed, Locale::Ja) => "インスタンスの読み込みに失敗しました",
            (Self::InstanceLoadFailed, Locale::En) => "Failed to load instances",
            (Self::InviteOpened, Locale::Ja) => "招待URLを開きました",
            (Self::InviteOpened, Locale::En) => "Opened invite URL",
            (Self::UserPageOpened, Locale::Ja) => "ユーザーページを開きました",
            (Self::UserPageOpened, Locale::En) => "Opened user page",
            (Self::OpenDirectoryFailed, Locale::Ja) => "フォルダを開けませんでした",
            (Self::OpenDirectoryFailed, Locale::En) => "Failed to open folder",
            (Self::GenericError, Locale::Ja) => "エラー",
            (Self::GenericError, Locale::En) => "Error",
        }
    }

    /// `"<text>: <detail>"`, the shape used for every detailed notification.
    pub fn with_detail(&self, locale: Locale, detail: impl std::fmt::Display) -> String {
        format!("{}: {detail}", self.text(locale))
    }
}
