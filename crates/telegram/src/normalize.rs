//! Telegram updates to [`MessageEvent`]s.
//!
//! Pure functions: nothing here talks to the Bot API.

use {
    chanmirror_channels::{
        ChannelId, Error, MappingKey, MediaKind, MediaRef, MessageContent, MessageEvent, MessageId,
        Result,
    },
    teloxide::types::{
        MediaKind as TgMediaKind, Message, MessageEntity, MessageKind, UpdateKind,
    },
};

use crate::entities;

/// A raw transport event, before normalization.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Posted(Message),
    Edited(Message),
    /// The Bot API never reports channel deletions; hosts with a deletion
    /// feed construct this directly.
    Deleted {
        chat: ChannelId,
        message: MessageId,
    },
}

impl TryFrom<UpdateKind> for InboundEvent {
    type Error = Error;

    fn try_from(kind: UpdateKind) -> Result<Self> {
        match kind {
            UpdateKind::ChannelPost(msg) | UpdateKind::Message(msg) => Ok(Self::Posted(msg)),
            UpdateKind::EditedChannelPost(msg) | UpdateKind::EditedMessage(msg) => {
                Ok(Self::Edited(msg))
            },
            other => Err(Error::unrecognized(format!(
                "update is not a post or an edit: {}",
                update_name(&other)
            ))),
        }
    }
}

/// Turn a raw event into a relay event.
///
/// # Errors
///
/// [`Error::Unrecognized`] for messages with nothing to mirror: service
/// messages, polls, locations, contacts and the like.
pub fn normalize(event: &InboundEvent) -> Result<MessageEvent> {
    match event {
        InboundEvent::Posted(msg) => Ok(MessageEvent::posted(key_of(msg), content_of(msg)?)),
        InboundEvent::Edited(msg) => Ok(MessageEvent::edited(key_of(msg), content_of(msg)?)),
        InboundEvent::Deleted { chat, message } => {
            Ok(MessageEvent::deleted(MappingKey::new(*chat, *message)))
        },
    }
}

fn key_of(msg: &Message) -> MappingKey {
    MappingKey::new(ChannelId(msg.chat.id.0), MessageId(msg.id.0))
}

fn content_of(msg: &Message) -> Result<MessageContent> {
    let key = key_of(msg);
    let MessageKind::Common(common) = &msg.kind else {
        return Err(Error::unrecognized(format!("{key}: service message")));
    };

    let attached = |kind: MediaKind,
                    file_id: &str,
                    caption: Option<&String>,
                    caption_entities: &[MessageEntity]|
     -> Result<MessageContent> {
        let media = MediaRef {
            kind,
            file_id: file_id.to_string(),
            origin: key,
        };
        Ok(
            MessageContent::media(media, caption.cloned().unwrap_or_default())
                .with_entities(entities::from_telegram(caption_entities)?),
        )
    };

    match &common.media_kind {
        TgMediaKind::Text(t) => {
            let preview_disabled = t
                .link_preview_options
                .as_ref()
                .is_some_and(|o| o.is_disabled);
            Ok(MessageContent::text(t.text.clone())
                .with_entities(entities::from_telegram(&t.entities)?)
                .with_link_preview(!preview_disabled))
        },
        TgMediaKind::Photo(p) => {
            let largest = p
                .photo
                .iter()
                .max_by_key(|ps| u64::from(ps.width) * u64::from(ps.height))
                .ok_or_else(|| Error::unrecognized(format!("{key}: photo without sizes")))?;
            attached(
                MediaKind::Photo,
                &largest.file.id,
                p.caption.as_ref(),
                &p.caption_entities,
            )
        },
        TgMediaKind::Document(d) => attached(
            MediaKind::Document,
            &d.document.file.id,
            d.caption.as_ref(),
            &d.caption_entities,
        ),
        TgMediaKind::Video(v) => attached(
            MediaKind::Video,
            &v.video.file.id,
            v.caption.as_ref(),
            &v.caption_entities,
        ),
        TgMediaKind::Animation(a) => attached(
            MediaKind::Other,
            &a.animation.file.id,
            a.caption.as_ref(),
            &a.caption_entities,
        ),
        TgMediaKind::Audio(a) => attached(
            MediaKind::Other,
            &a.audio.file.id,
            a.caption.as_ref(),
            &a.caption_entities,
        ),
        TgMediaKind::Voice(v) => attached(
            MediaKind::Other,
            &v.voice.file.id,
            v.caption.as_ref(),
            &v.caption_entities,
        ),
        TgMediaKind::VideoNote(v) => attached(MediaKind::Other, &v.video_note.file.id, None, &[]),
        TgMediaKind::Sticker(s) => attached(MediaKind::Other, &s.sticker.file.id, None, &[]),
        other => Err(Error::unrecognized(format!(
            "{key}: {} messages are not mirrored",
            describe_media_kind(other)
        ))),
    }
}

fn describe_media_kind(kind: &TgMediaKind) -> &'static str {
    match kind {
        TgMediaKind::Contact(_) => "contact",
        TgMediaKind::Game(_) => "game",
        TgMediaKind::Location(_) => "location",
        TgMediaKind::Poll(_) => "poll",
        TgMediaKind::Venue(_) => "venue",
        _ => "unsupported",
    }
}

fn update_name(kind: &UpdateKind) -> &'static str {
    match kind {
        UpdateKind::CallbackQuery(_) => "callback query",
        UpdateKind::InlineQuery(_) => "inline query",
        UpdateKind::MyChatMember(_) | UpdateKind::ChatMember(_) => "chat member",
        UpdateKind::ChatJoinRequest(_) => "chat join request",
        UpdateKind::Poll(_) | UpdateKind::PollAnswer(_) => "poll",
        _ => "other",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chanmirror_channels::EventKind,
        rstest::rstest,
        serde_json::{Value, json},
    };

    const CHANNEL: i64 = -1001234567890;

    fn channel_post(id: i32, body: Value) -> Message {
        let mut msg = json!({
            "message_id": id,
            "date": 1,
            "chat": { "id": CHANNEL, "type": "channel", "title": "News" },
            "sender_chat": { "id": CHANNEL, "type": "channel", "title": "News" },
        });
        msg.as_object_mut()
            .unwrap()
            .extend(body.as_object().unwrap().clone());
        serde_json::from_value(msg).expect("deserialize channel post")
    }

    fn file(id: &str) -> Value {
        json!({ "file_id": id, "file_unique_id": format!("{id}-unique"), "file_size": 10 })
    }

    fn with_file(id: &str, extra: Value) -> Value {
        let mut value = file(id);
        value
            .as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        value
    }

    #[test]
    fn text_post_with_entities() {
        let msg = channel_post(
            7,
            json!({
                "text": "Read this: https://example.com",
                "entities": [
                    { "type": "bold", "offset": 0, "length": 4 },
                    { "type": "url", "offset": 11, "length": 19 }
                ]
            }),
        );

        let event = normalize(&InboundEvent::Posted(msg)).unwrap();
        assert_eq!(event.kind(), EventKind::New);
        assert_eq!(
            event.key(),
            MappingKey::new(ChannelId(CHANNEL), MessageId(7))
        );
        let content = event.content().unwrap();
        assert_eq!(content.text, "Read this: https://example.com");
        assert_eq!(content.entities.len(), 2);
        assert_eq!(content.entities[1].kind, "url");
        assert!(content.link_preview);
        assert!(!content.has_media());
    }

    #[test]
    fn disabled_link_preview_is_carried() {
        let msg = channel_post(
            8,
            json!({
                "text": "https://example.com",
                "link_preview_options": { "is_disabled": true }
            }),
        );
        let event = normalize(&InboundEvent::Edited(msg)).unwrap();
        assert_eq!(event.kind(), EventKind::Edited);
        assert!(!event.content().unwrap().link_preview);
    }

    #[test]
    fn photo_uses_largest_size_and_caption() {
        let msg = channel_post(
            9,
            json!({
                "photo": [
                    with_file("small", json!({ "width": 90, "height": 60 })),
                    with_file("large", json!({ "width": 1280, "height": 853 })),
                    with_file("medium", json!({ "width": 320, "height": 213 }))
                ],
                "caption": "sunset",
                "caption_entities": [{ "type": "italic", "offset": 0, "length": 6 }]
            }),
        );

        let event = normalize(&InboundEvent::Posted(msg)).unwrap();
        let content = event.content().unwrap();
        let media = content.media.as_ref().unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.file_id, "large");
        assert_eq!(media.origin, event.key());
        assert_eq!(content.text, "sunset");
        assert_eq!(content.entities[0].kind, "italic");
    }

    #[rstest]
    #[case::document(
        json!({ "document": with_file("doc", json!({ "file_name": "a.pdf" })) }),
        MediaKind::Document,
        "doc"
    )]
    #[case::video(
        json!({ "video": with_file(
            "vid",
            json!({ "width": 1, "height": 1, "duration": 1, "mime_type": "video/mp4", "file_size": 1024 })
        ) }),
        MediaKind::Video,
        "vid"
    )]
    #[case::voice(
        json!({ "voice": with_file("ogg", json!({ "duration": 1, "mime_type": "audio/ogg", "file_size": 512 })) }),
        MediaKind::Other,
        "ogg"
    )]
    #[case::audio(
        json!({ "audio": with_file("mp3", json!({ "duration": 1, "mime_type": "audio/mpeg", "file_size": 2048 })) }),
        MediaKind::Other,
        "mp3"
    )]
    fn media_kinds(#[case] body: Value, #[case] kind: MediaKind, #[case] file_id: &str) {
        let event = normalize(&InboundEvent::Posted(channel_post(10, body))).unwrap();
        let media = event.content().unwrap().media.clone().unwrap();
        assert_eq!(media.kind, kind);
        assert_eq!(media.file_id, file_id);
        assert_eq!(event.content().unwrap().text, "");
    }

    #[test]
    fn location_is_unrecognized() {
        let msg = channel_post(
            11,
            json!({ "location": { "latitude": 48.85, "longitude": 2.35 } }),
        );
        let err = normalize(&InboundEvent::Posted(msg)).unwrap_err();
        assert!(matches!(err, Error::Unrecognized { .. }));
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn service_message_is_unrecognized() {
        let msg = channel_post(12, json!({ "new_chat_title": "Renamed" }));
        let err = normalize(&InboundEvent::Posted(msg)).unwrap_err();
        assert!(err.to_string().contains("service message"));
    }

    #[test]
    fn deleted_carries_only_the_key() {
        let event = normalize(&InboundEvent::Deleted {
            chat: ChannelId(CHANNEL),
            message: MessageId(3),
        })
        .unwrap();
        assert_eq!(event.kind(), EventKind::Deleted);
        assert!(event.content().is_none());
    }

    #[test]
    fn update_kinds_map_to_inbound_events() {
        let post = channel_post(1, json!({ "text": "hi" }));
        assert!(matches!(
            InboundEvent::try_from(UpdateKind::ChannelPost(post.clone())),
            Ok(InboundEvent::Posted(_))
        ));
        assert!(matches!(
            InboundEvent::try_from(UpdateKind::EditedChannelPost(post.clone())),
            Ok(InboundEvent::Edited(_))
        ));
        assert!(matches!(
            InboundEvent::try_from(UpdateKind::Message(post.clone())),
            Ok(InboundEvent::Posted(_))
        ));
        assert!(matches!(
            InboundEvent::try_from(UpdateKind::EditedMessage(post)),
            Ok(InboundEvent::Edited(_))
        ));
    }
}
