//! Per-chat menu state. Transitions are pure functions over [`Session`] so
//! the conversation flow is testable without a live Telegram connection.

use std::collections::HashMap;

use teloxide::types::ChatId;
use url::Url;

use crate::format::MediaKind;

pub type SessionMap = HashMap<ChatId, Session>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    AwaitingFormat,
    AwaitingQuality(MediaKind),
}

/// One chat's conversation state. Lives for the process lifetime; the
/// remembered link survives a completed download so the user can re-request
/// the same media at another quality.
#[derive(Debug, Clone)]
pub struct Session {
    pub last_url: Option<String>,
    pub stage: Stage,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            last_url: None,
            stage: Stage::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextReply {
    /// A link was found and stored; show the video/audio menu.
    FormatMenu,
    /// No link in the message; the session is untouched.
    NotALink,
}

/// Handles an inbound text message: the first http(s) URL token becomes the
/// session's remembered link.
pub fn accept_text(session: &mut Session, text: &str) -> TextReply {
    match extract_url(text) {
        Some(url) => {
            session.last_url = Some(url);
            session.stage = Stage::AwaitingFormat;
            TextReply::FormatMenu
        }
        None => TextReply::NotALink,
    }
}

/// First whitespace-separated token that parses as an http(s) URL.
pub fn extract_url(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let parsed = Url::parse(token).ok()?;
        matches!(parsed.scheme(), "http" | "https").then(|| token.to_string())
    })
}

/// Inline-keyboard callback vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// `back`: return to the video/audio menu.
    FormatMenu,
    /// `v_menu` / `a_menu`: show the quality tiers for one format.
    QualityMenu(MediaKind),
    /// `dl|<mode>|<quality>`: start the download.
    Download { kind: MediaKind, quality: String },
}

pub fn parse_callback(data: &str) -> Option<MenuAction> {
    match data {
        "v_menu" => Some(MenuAction::QualityMenu(MediaKind::Video)),
        "a_menu" => Some(MenuAction::QualityMenu(MediaKind::Audio)),
        "back" => Some(MenuAction::FormatMenu),
        other => {
            let parts: Vec<&str> = other.split('|').collect();
            match parts.as_slice() {
                ["dl", kind, quality] => Some(MenuAction::Download {
                    kind: kind.parse().ok()?,
                    quality: (*quality).to_string(),
                }),
                _ => None,
            }
        }
    }
}

pub fn choose_format(session: &mut Session, kind: MediaKind) {
    session.stage = Stage::AwaitingQuality(kind);
}

pub fn back_to_format(session: &mut Session) {
    session.stage = Stage::AwaitingFormat;
}

/// Ends the menu interaction and hands back the remembered link, if any. The
/// session returns to idle either way; a missing link means the session was
/// lost (or a stale keyboard was pressed) and must fail visibly.
pub fn url_for_download(session: &mut Session) -> Option<String> {
    session.stage = Stage::Idle;
    session.last_url.clone()
}
