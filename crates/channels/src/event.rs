//! Canonical event model shared by normalizers, the relay engine and
//! delivery adapters.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

/// Transport chat identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Transport message identifier, increasing per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for MessageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Identity of a source message: `(source channel, source message id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingKey {
    pub channel: ChannelId,
    pub message: MessageId,
}

impl MappingKey {
    #[must_use]
    pub const fn new(channel: ChannelId, message: MessageId) -> Self {
        Self { channel, message }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.message)
    }
}

/// A formatting entity in Bot API wire shape.
///
/// `offset` and `length` are measured in UTF-16 code units. Kind-specific
/// attributes (`url`, `language`, `user`, `custom_emoji_id`, ...) are kept
/// verbatim so entities survive a trip through the core unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl TextEntity {
    #[must_use]
    pub fn new(kind: impl Into<String>, offset: usize, length: usize) -> Self {
        Self {
            kind: kind.into(),
            offset,
            length,
            attributes: serde_json::Map::new(),
        }
    }
}

/// What happened to the source message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    New,
    Edited,
    Deleted,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Edited => "edited",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media classification; delivery differs per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Document,
    Video,
    Other,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Document => "document",
            Self::Video => "video",
            Self::Other => "other",
        }
    }
}

/// Opaque handle to attached media.
///
/// `origin` is the source message the media was attached to, which lets an
/// adapter copy media server-side when it cannot resend it by file handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
    pub origin: MappingKey,
}

/// Rendering payload of a posted or edited message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Message text, or the caption when `media` is set.
    pub text: String,
    pub entities: Vec<TextEntity>,
    pub link_preview: bool,
    pub media: Option<MediaRef>,
}

impl MessageContent {
    /// Plain text content with link previews enabled.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            link_preview: true,
            media: None,
        }
    }

    /// Media content with an optional caption.
    #[must_use]
    pub fn media(media: MediaRef, caption: impl Into<String>) -> Self {
        Self {
            text: caption.into(),
            entities: Vec::new(),
            link_preview: true,
            media: Some(media),
        }
    }

    #[must_use]
    pub fn with_entities(mut self, entities: Vec<TextEntity>) -> Self {
        self.entities = entities;
        self
    }

    #[must_use]
    pub fn with_link_preview(mut self, enabled: bool) -> Self {
        self.link_preview = enabled;
        self
    }

    #[must_use]
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

/// Normalized unit of work for the relay engine.
///
/// Built only through [`MessageEvent::posted`], [`MessageEvent::edited`] and
/// [`MessageEvent::deleted`], so a deleted event never carries content.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    kind: EventKind,
    key: MappingKey,
    content: Option<MessageContent>,
}

impl MessageEvent {
    #[must_use]
    pub fn posted(key: MappingKey, content: MessageContent) -> Self {
        Self {
            kind: EventKind::New,
            key,
            content: Some(content),
        }
    }

    #[must_use]
    pub fn edited(key: MappingKey, content: MessageContent) -> Self {
        Self {
            kind: EventKind::Edited,
            key,
            content: Some(content),
        }
    }

    #[must_use]
    pub fn deleted(key: MappingKey) -> Self {
        Self {
            kind: EventKind::Deleted,
            key,
            content: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn key(&self) -> MappingKey {
        self.key
    }

    #[must_use]
    pub fn source_channel(&self) -> ChannelId {
        self.key.channel
    }

    /// Payload of a posted or edited message; `None` for deletions.
    #[must_use]
    pub fn content(&self) -> Option<&MessageContent> {
        self.content.as_ref()
    }

    #[must_use]
    pub fn has_media(&self) -> bool {
        self.content.as_ref().is_some_and(MessageContent::has_media)
    }
}
