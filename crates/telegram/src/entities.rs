//! Conversion between Bot API message entities and the transport-neutral
//! [`TextEntity`].
//!
//! Both sides share the Bot API JSON shape, so conversion goes through
//! `serde_json` and keeps every entity attribute (urls, languages, custom
//! emoji ids) intact.

use {
    chanmirror_channels::{Result, TextEntity},
    teloxide::types::MessageEntity,
};

pub(crate) fn from_telegram(entities: &[MessageEntity]) -> Result<Vec<TextEntity>> {
    if entities.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(serde_json::to_value(entities)?)?)
}

pub(crate) fn to_telegram(entities: &[TextEntity]) -> Result<Vec<MessageEntity>> {
    if entities.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(serde_json::to_value(entities)?)?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn text_link_keeps_its_url() {
        let telegram: Vec<MessageEntity> = serde_json::from_value(json!([
            { "type": "bold", "offset": 0, "length": 4 },
            { "type": "text_link", "offset": 5, "length": 4, "url": "https://example.com/" }
        ]))
        .unwrap();

        let neutral = from_telegram(&telegram).unwrap();
        assert_eq!(neutral[0].kind, "bold");
        assert_eq!(neutral[1].kind, "text_link");
        assert_eq!(neutral[1].offset, 5);
        assert_eq!(neutral[1].attributes["url"], "https://example.com/");

        assert_eq!(to_telegram(&neutral).unwrap(), telegram);
    }

    #[test]
    fn pre_block_language_survives() {
        let mut pre = TextEntity::new("pre", 0, 10);
        pre.attributes.insert("language".into(), json!("rust"));
        let telegram = to_telegram(&[pre]).unwrap();
        let back = serde_json::to_value(&telegram).unwrap();
        assert_eq!(back[0]["language"], "rust");
    }
}
